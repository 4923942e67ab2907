//! Raw-mode console over the process's controlling terminal.

use crate::term::{Cell, Console, KEY_EOF, KEY_RESIZE};

use std::io::{self, Write};
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;

static RESIZED: AtomicBool = AtomicBool::new(false);

extern "C" fn winch_handler(_signal: libc::c_int) {
    RESIZED.store(true, Ordering::SeqCst);
}

/// Terminal console using termios raw mode on standard input.
///
/// `open` saves the current terminal attributes and switches to cbreak-style
/// input (no echo, no line buffering, one byte at a time); `close` restores
/// the saved attributes. A `SIGWINCH` handler is installed without
/// `SA_RESTART` so a resize interrupts the blocking read and surfaces as
/// [`KEY_RESIZE`].
pub struct TtyConsole {
    saved: Option<libc::termios>,
    buffer: Vec<u8>,
}

impl TtyConsole {
    pub fn new() -> Self {
        TtyConsole {
            saved: None,
            buffer: Vec::new(),
        }
    }
}

impl Default for TtyConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for TtyConsole {
    fn open(&mut self) -> io::Result<()> {
        if self.saved.is_some() {
            return Ok(());
        }
        unsafe {
            let mut original: libc::termios = mem::zeroed();
            if libc::tcgetattr(libc::STDIN_FILENO, &mut original) != 0 {
                return Err(io::Error::last_os_error());
            }

            let mut raw = original;
            raw.c_lflag &= !(libc::ICANON | libc::ECHO);
            raw.c_cc[libc::VMIN] = 1;
            raw.c_cc[libc::VTIME] = 0;
            if libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &raw) != 0 {
                return Err(io::Error::last_os_error());
            }

            let handler: extern "C" fn(libc::c_int) = winch_handler;
            let mut action: libc::sigaction = mem::zeroed();
            action.sa_sigaction = handler as usize;
            action.sa_flags = 0;
            libc::sigemptyset(&mut action.sa_mask);
            libc::sigaction(libc::SIGWINCH, &action, ptr::null_mut());

            self.saved = Some(original);
        }
        debug!("terminal raw mode enabled");
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        let Some(original) = self.saved.take() else {
            return Ok(());
        };
        let status = unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &original) };
        if status != 0 {
            return Err(io::Error::last_os_error());
        }
        debug!("terminal raw mode restored");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.saved.is_some()
    }

    fn read_key(&mut self) -> io::Result<Option<i32>> {
        let mut byte = 0u8;
        let count = unsafe {
            libc::read(
                libc::STDIN_FILENO,
                &mut byte as *mut u8 as *mut libc::c_void,
                1,
            )
        };
        if count < 0 {
            let error = io::Error::last_os_error();
            if error.kind() == io::ErrorKind::Interrupted {
                if RESIZED.swap(false, Ordering::SeqCst) {
                    return Ok(Some(KEY_RESIZE));
                }
                return Ok(None);
            }
            return Err(error);
        }
        if count == 0 {
            return Ok(Some(KEY_EOF));
        }
        Ok(Some(byte as i32))
    }

    fn render(&mut self, cells: &[Cell]) {
        for cell in cells {
            // Terminal cursor addressing is 1-based.
            let _ = write!(
                self.buffer,
                "\x1b[{};{}H{}",
                cell.row + 1,
                cell.col + 1,
                cell.ch
            );
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let buffer = mem::take(&mut self.buffer);
        let mut stdout = io::stdout().lock();
        stdout.write_all(&buffer)?;
        stdout.flush()
    }
}

impl Drop for TtyConsole {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
