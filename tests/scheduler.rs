mod common;

use common::{scripted_loop, scripted_loop_with_reads};
use keyloop::{Error, EventLoop};

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::Ordering;

#[test]
fn single_key_drives_a_task_to_completion() {
    let event_loop = scripted_loop(vec![65]);
    let inner = event_loop.clone();

    let key = event_loop.run(async move { inner.getch().await }).unwrap();
    assert_eq!(key, Some(65));
    assert!(event_loop.is_closed());
}

#[test]
fn concurrent_getch_shares_one_blocking_read() {
    let (event_loop, reads) = scripted_loop_with_reads(vec![65]);

    let first = {
        let inner = event_loop.clone();
        event_loop.create_task(async move { inner.getch().await })
    };
    let second = {
        let inner = event_loop.clone();
        event_loop.create_task(async move { inner.getch().await })
    };

    let value = event_loop
        .run_until_complete(&second.promise())
        .unwrap()
        .unwrap();

    // Both waiters observe the same broadcast key from a single read.
    assert_eq!(value, 65);
    assert!(first.done());
    assert_eq!(first.result().unwrap(), 65);
    assert_eq!(reads.load(Ordering::SeqCst), 1);
}

#[test]
fn loop_never_blocks_while_tasks_are_ready() {
    // The panicking console turns any blocking read into a test failure.
    let (event_loop, reads) = scripted_loop_with_reads(vec![]);

    let task = {
        let inner = event_loop.clone();
        event_loop.create_task(async move {
            inner.tick().await?;
            inner.tick().await?;
            inner.tick().await?;
            Ok(7)
        })
    };

    let value = event_loop.run_until_complete(&task.promise()).unwrap();
    assert_eq!(value, Some(7));
    assert_eq!(reads.load(Ordering::SeqCst), 0);
}

#[test]
fn call_soon_runs_callbacks_in_scheduling_order() {
    let event_loop = scripted_loop(vec![]);
    let order = Rc::new(RefCell::new(Vec::new()));

    {
        let event_loop_outer = event_loop.clone();
        let order = order.clone();
        event_loop.call_soon(move || {
            order.borrow_mut().push("outer");
            let inner_order = order.clone();
            event_loop_outer.call_soon(move || inner_order.borrow_mut().push("inner1"));
            let inner_order = order.clone();
            event_loop_outer.call_soon(move || inner_order.borrow_mut().push("inner2"));
            order.borrow_mut().push("outer-end");
        });
    }

    let task = {
        let inner = event_loop.clone();
        let order = order.clone();
        event_loop.create_task(async move {
            inner.tick().await?;
            inner.tick().await?;
            Ok(order.borrow().clone())
        })
    };

    let seen = event_loop
        .run_until_complete(&task.promise())
        .unwrap()
        .unwrap();
    // Callbacks scheduled during a pass run on the next one, in order.
    assert_eq!(seen, vec!["outer", "outer-end", "inner1", "inner2"]);
}

#[test]
fn cancelled_callback_handle_prevents_the_callback() {
    let event_loop = scripted_loop(vec![]);
    let fired = Rc::new(RefCell::new(false));

    let handle = {
        let fired = fired.clone();
        event_loop.call_soon(move || *fired.borrow_mut() = true)
    };
    handle.cancel();

    let task = {
        let inner = event_loop.clone();
        event_loop.create_task(async move {
            inner.tick().await?;
            Ok(())
        })
    };
    event_loop.run_until_complete(&task.promise()).unwrap();

    assert!(!*fired.borrow());
    assert!(handle.cancelled());
}

#[test]
fn stop_request_ends_the_run_without_a_value() {
    let (event_loop, reads) = scripted_loop_with_reads(vec![]);
    let never: keyloop::Promise<i32> = event_loop.promise();

    {
        let inner = event_loop.clone();
        event_loop.call_soon(move || inner.stop());
    }

    let outcome = event_loop.run_until_complete(&never).unwrap();
    assert_eq!(outcome, None);
    assert_eq!(reads.load(Ordering::SeqCst), 0);
}

#[test]
fn task_failure_surfaces_from_the_run() {
    let event_loop = scripted_loop(vec![]);

    let task = event_loop.create_task(async move {
        Err::<i32, _>(Error::failed(std::io::Error::other("device gone")))
    });

    match event_loop.run_until_complete(&task.promise()) {
        Err(Error::Failed(failure)) => assert_eq!(failure.to_string(), "device gone"),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn task_can_await_another_task() {
    let event_loop = scripted_loop(vec![65]);

    let producer = {
        let inner = event_loop.clone();
        event_loop.create_task(async move {
            let key = inner.getch().await?;
            Ok(key + 1)
        })
    };
    let consumer = {
        let producer = producer.clone();
        event_loop.create_task(async move {
            let value = producer.wait().await?;
            Ok(value * 10)
        })
    };

    let value = event_loop
        .run_until_complete(&consumer.promise())
        .unwrap()
        .unwrap();
    assert_eq!(value, 660);
}

#[test]
fn run_forever_exits_on_stop() {
    let event_loop = scripted_loop(vec![]);

    {
        let inner = event_loop.clone();
        event_loop.call_soon(move || inner.stop());
    }
    event_loop.run_forever().unwrap();
}

#[test]
fn default_loop_uses_the_terminal_console_lazily() {
    // Construction must not touch the terminal; open happens explicitly.
    let event_loop = EventLoop::new();
    assert!(event_loop.is_closed());
}
