//! Terminal input/output facility boundary.
//!
//! The scheduler drives a character-cell terminal but does not implement
//! one; it only needs the small capability surface captured by [`Console`]:
//! scoped raw-mode acquisition, a blocking single-key read that can be
//! interrupted, and buffered cell rendering with an explicit flush.
//!
//! [`TtyConsole`] is the real implementation over the process's controlling
//! terminal. Tests substitute scripted implementations of the same trait.

mod tty;

pub use tty::TtyConsole;

use std::io;

/// Sentinel input code reported when the terminal was resized.
///
/// Matches the value curses-style libraries report for a resize event, so
/// key codes remain comparable across consumers.
pub const KEY_RESIZE: i32 = 410;

/// Sentinel input code reported at end of input.
pub const KEY_EOF: i32 = -1;

/// A single character cell to draw, with a 0-based screen position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub row: u16,
    pub col: u16,
    pub ch: char,
}

/// Capability surface of the terminal facility.
///
/// All methods are called from the loop's thread only.
pub trait Console {
    /// Enables raw, no-echo, character-at-a-time input. Idempotent.
    fn open(&mut self) -> io::Result<()>;

    /// Restores the prior terminal mode. Safe to call repeatedly or on a
    /// console that was never opened.
    fn close(&mut self) -> io::Result<()>;

    /// Whether raw mode is currently active.
    fn is_open(&self) -> bool;

    /// Blocks until one input unit is available.
    ///
    /// # Returns
    /// - `Ok(Some(code))` for a key press or a sentinel such as
    ///   [`KEY_RESIZE`]
    /// - `Ok(None)` when the read was interrupted by a signal — "no unit
    ///   available this attempt", never an error
    /// - `Err(_)` for real I/O failures
    fn read_key(&mut self) -> io::Result<Option<i32>>;

    /// Buffers cells for display. Non-blocking; nothing reaches the screen
    /// until [`Console::flush`].
    fn render(&mut self, cells: &[Cell]);

    /// Pushes all buffered cells to the physical display in one write,
    /// avoiding visible tearing.
    fn flush(&mut self) -> io::Result<()>;
}
