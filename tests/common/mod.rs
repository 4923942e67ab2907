#![allow(dead_code)]

use keyloop::term::{Cell, Console};
use keyloop::{EventLoop, LoopBuilder};

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// What a scripted console does once its keys run out.
pub enum OnEmpty {
    /// Treat an unexpected blocking read as a test failure.
    Panic,
    /// Simulate a signal-interrupted read: sleep briefly, report no key.
    Interrupt,
}

/// In-memory console feeding a fixed key script to the loop.
pub struct ScriptedConsole {
    keys: VecDeque<i32>,
    reads: Arc<AtomicUsize>,
    on_empty: OnEmpty,
    open: bool,
}

impl ScriptedConsole {
    pub fn new(keys: Vec<i32>) -> Self {
        ScriptedConsole {
            keys: keys.into(),
            reads: Arc::new(AtomicUsize::new(0)),
            on_empty: OnEmpty::Panic,
            open: false,
        }
    }

    pub fn interrupting(keys: Vec<i32>) -> Self {
        ScriptedConsole {
            keys: keys.into(),
            reads: Arc::new(AtomicUsize::new(0)),
            on_empty: OnEmpty::Interrupt,
            open: false,
        }
    }

    /// Shared counter of blocking reads issued against this console.
    pub fn reads(&self) -> Arc<AtomicUsize> {
        self.reads.clone()
    }
}

impl Console for ScriptedConsole {
    fn open(&mut self) -> io::Result<()> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn read_key(&mut self) -> io::Result<Option<i32>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.keys.pop_front() {
            Some(code) => Ok(Some(code)),
            None => match self.on_empty {
                OnEmpty::Panic => panic!("blocking read issued with no scripted input left"),
                OnEmpty::Interrupt => {
                    thread::sleep(Duration::from_millis(2));
                    Ok(None)
                }
            },
        }
    }

    fn render(&mut self, _cells: &[Cell]) {}

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Builds a loop over a panicking scripted console.
pub fn scripted_loop(keys: Vec<i32>) -> EventLoop {
    LoopBuilder::new()
        .console(Box::new(ScriptedConsole::new(keys)))
        .build()
}

/// Builds a loop over a scripted console and exposes its read counter.
pub fn scripted_loop_with_reads(keys: Vec<i32>) -> (EventLoop, Arc<AtomicUsize>) {
    let console = ScriptedConsole::new(keys);
    let reads = console.reads();
    let event_loop = LoopBuilder::new().console(Box::new(console)).build();
    (event_loop, reads)
}
