mod common;

use common::scripted_loop;
use keyloop::Error;

use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn resolving_twice_reports_invalid_state() {
    let event_loop = scripted_loop(vec![]);
    let promise = event_loop.promise::<i32>();

    promise.set_result(1).unwrap();
    assert!(matches!(promise.set_result(2), Err(Error::InvalidState)));
    assert!(matches!(
        promise.set_exception(std::sync::Arc::new(std::io::Error::other("late"))),
        Err(Error::InvalidState)
    ));
    assert!(!promise.cancel(), "cancel after completion must be a no-op");

    // The stored value never changed.
    assert_eq!(promise.result().unwrap(), 1);
}

#[test]
fn result_on_pending_promise_reports_invalid_state() {
    let event_loop = scripted_loop(vec![]);
    let promise = event_loop.promise::<i32>();

    assert!(!promise.done());
    assert!(matches!(promise.result(), Err(Error::InvalidState)));
}

#[test]
fn cancelled_promise_reports_cancelled() {
    let event_loop = scripted_loop(vec![]);
    let promise = event_loop.promise::<i32>();

    assert!(promise.cancel());
    assert!(promise.done());
    assert!(promise.cancelled());
    assert!(matches!(promise.result(), Err(Error::Cancelled)));
}

#[test]
fn failed_promise_replays_the_original_failure() {
    let event_loop = scripted_loop(vec![]);
    let promise = event_loop.promise::<i32>();

    promise
        .set_exception(std::sync::Arc::new(std::io::Error::other("boom")))
        .unwrap();
    match promise.result() {
        Err(Error::Failed(failure)) => assert_eq!(failure.to_string(), "boom"),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn removed_callback_never_runs() {
    let event_loop = scripted_loop(vec![]);
    let promise = event_loop.promise::<i32>();
    let fired = Rc::new(RefCell::new(Vec::new()));

    let kept = {
        let fired = fired.clone();
        promise.add_done_callback(move |_| fired.borrow_mut().push("kept"))
    };
    let removed = {
        let fired = fired.clone();
        promise.add_done_callback(move |_| fired.borrow_mut().push("removed"))
    };

    assert!(promise.remove_done_callback(removed));
    assert!(!promise.remove_done_callback(removed));

    let task = {
        let event_loop = event_loop.clone();
        let promise = promise.clone();
        let fired = fired.clone();
        event_loop.clone().create_task(async move {
            promise.set_result(9)?;
            event_loop.tick().await?;
            event_loop.tick().await?;
            Ok(fired.borrow().clone())
        })
    };

    let seen = event_loop
        .run_until_complete(&task.promise())
        .unwrap()
        .unwrap();
    assert_eq!(seen, vec!["kept"]);
    let _ = kept;
}

// Resolving a promise must never invoke an observer synchronously; the
// observer runs on a later scheduling pass.
#[test]
fn done_callbacks_are_deferred_to_a_later_pass() {
    let event_loop = scripted_loop(vec![]);
    let promise = event_loop.promise::<i32>();
    let order = Rc::new(RefCell::new(Vec::new()));

    {
        let order = order.clone();
        promise.add_done_callback(move |done| {
            assert_eq!(done.result().unwrap(), 5);
            order.borrow_mut().push("callback");
        });
    }

    let task = {
        let event_loop = event_loop.clone();
        let promise = promise.clone();
        let order = order.clone();
        event_loop.clone().create_task(async move {
            promise.set_result(5)?;
            order.borrow_mut().push("resolved");
            event_loop.tick().await?;
            Ok(order.borrow().clone())
        })
    };

    let seen = event_loop
        .run_until_complete(&task.promise())
        .unwrap()
        .unwrap();
    assert_eq!(seen, vec!["resolved", "callback"]);
}

#[test]
fn callback_added_after_resolution_still_runs() {
    let event_loop = scripted_loop(vec![]);
    let promise = event_loop.promise::<i32>();
    promise.set_result(3).unwrap();

    let fired = Rc::new(RefCell::new(false));
    {
        let fired = fired.clone();
        promise.add_done_callback(move |_| *fired.borrow_mut() = true);
    }
    assert!(!*fired.borrow(), "registration must not invoke synchronously");

    let task = {
        let event_loop = event_loop.clone();
        let fired = fired.clone();
        event_loop.clone().create_task(async move {
            event_loop.tick().await?;
            Ok(*fired.borrow())
        })
    };
    let ran = event_loop
        .run_until_complete(&task.promise())
        .unwrap()
        .unwrap();
    assert!(ran);
}
