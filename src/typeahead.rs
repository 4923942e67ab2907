//! Buffered key input with a replay-limit safety net.
//!
//! Key-mapping logic pushes expanded key sequences back into a [`Typeahead`]
//! so they are consumed before the real terminal is consulted again. A
//! mapping that keeps expanding into itself would otherwise spin forever;
//! the replay counter bounds how many cached entries may be resolved between
//! two real key reads, and is reset exactly when a real key is consumed.

use crate::error::Error;
use crate::sched::EventLoop;

use std::collections::VecDeque;

use log::debug;

/// Default bound on consecutive cache replays without real input.
pub const DEFAULT_REPLAY_LIMIT: usize = 1000;

/// A buffered input entry: one key code or a whole key sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Key(i32),
    Keys(String),
}

impl From<i32> for Entry {
    fn from(code: i32) -> Self {
        Entry::Key(code)
    }
}

impl From<&str> for Entry {
    fn from(keys: &str) -> Self {
        Entry::Keys(keys.to_owned())
    }
}

impl From<String> for Entry {
    fn from(keys: String) -> Self {
        Entry::Keys(keys)
    }
}

/// FIFO cache layered over [`EventLoop::getch`].
///
/// # Example
/// ```ignore
/// let mut typeahead = Typeahead::new();
/// typeahead.push_front("ZZ");
/// let key = typeahead.getch(&event_loop).await?; // 'Z'
/// ```
pub struct Typeahead {
    cache: VecDeque<Entry>,
    replayed: usize,
    limit: usize,
}

impl Typeahead {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_REPLAY_LIMIT)
    }

    /// Creates a typeahead with an explicit replay limit.
    pub fn with_limit(limit: usize) -> Self {
        Typeahead {
            cache: VecDeque::new(),
            replayed: 0,
            limit,
        }
    }

    /// Pushes an entry to be consumed before everything already buffered.
    ///
    /// Key-map expansions go here so they replay in mapping order.
    pub fn push_front(&mut self, entry: impl Into<Entry>) {
        self.cache.push_front(entry.into());
    }

    /// Appends an entry after everything already buffered.
    pub fn push_back(&mut self, entry: impl Into<Entry>) {
        self.cache.push_back(entry.into());
    }

    /// Whether any buffered input remains.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Returns the next key: from the cache if possible, otherwise from the
    /// terminal.
    ///
    /// # Returns
    /// `Err(Error::ReplayLimit(_))` once more cached entries were resolved
    /// in a row than the configured limit allows. Consuming a real key
    /// resets the counter.
    pub async fn getch(&mut self, event_loop: &EventLoop) -> Result<i32, Error> {
        if let Some(code) = self.pop_cached()? {
            return Ok(code);
        }
        let code = event_loop.getch().await?;
        // Reset only once a real key actually arrived; an interrupted wait
        // leaves the counter where it was.
        self.replayed = 0;
        Ok(code)
    }

    fn pop_cached(&mut self) -> Result<Option<i32>, Error> {
        while let Some(entry) = self.cache.pop_front() {
            self.replayed += 1;
            if self.replayed > self.limit {
                debug!("typeahead replay limit {} exceeded", self.limit);
                return Err(Error::ReplayLimit(self.limit));
            }
            match entry {
                Entry::Key(code) => return Ok(Some(code)),
                Entry::Keys(keys) => {
                    let mut chars = keys.chars();
                    let Some(first) = chars.next() else {
                        continue;
                    };
                    let rest: String = chars.collect();
                    if !rest.is_empty() {
                        self.cache.push_front(Entry::Keys(rest));
                    }
                    return Ok(Some(first as i32));
                }
            }
        }
        Ok(None)
    }
}

impl Default for Typeahead {
    fn default() -> Self {
        Self::new()
    }
}
