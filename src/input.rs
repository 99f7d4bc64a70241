use std::io;
use std::os::unix::io::RawFd;

use crate::editor::{raw_mode, LineEditor};
use crate::prompt::Prompt;
use crate::signal_handler::SignalController;

/// Longest line the shell accepts, terminator included. Extra bytes of a
/// longer line are dropped.
pub const MAX_INPUT_SIZE: usize = 1024;

/// How often a blocked read wakes up to look for a pending interrupt.
pub const INTERRUPT_CHECK_MS: i32 = 100;

#[derive(Debug, PartialEq)]
pub enum ReadOutcome {
    Line(String),
    /// An interrupt arrived while waiting; any partial line is gone.
    Interrupted,
    Eof,
}

pub trait LineSource {
    fn read_line(&mut self, prompt: &Prompt) -> io::Result<ReadOutcome>;
}

/// Pick the line editor for a terminal and the plain reader otherwise.
pub fn open_line_source(signals: SignalController) -> Box<dyn LineSource> {
    if raw_mode::stdin_is_terminal() {
        log::debug!("stdin is a terminal, using the line editor");
        Box::new(LineEditor::new(signals))
    } else {
        Box::new(PlainReader::new(libc::STDIN_FILENO, signals))
    }
}

/// Reads newline-terminated lines straight from a file descriptor.
///
/// Uses `read(2)` directly: the std readers retry on `EINTR`, which would
/// swallow the interrupt we are waiting for.
pub struct PlainReader {
    fd: RawFd,
    pending: Vec<u8>,
    signals: SignalController,
}

impl PlainReader {
    pub fn new(fd: RawFd, signals: SignalController) -> Self {
        PlainReader {
            fd,
            pending: Vec::new(),
            signals,
        }
    }

    fn next_buffered_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=end).collect();
        Some(bounded(&line[..end]))
    }

    /// Keep the complete lines already read; drop whatever follows the last
    /// newline.
    fn discard_partial_line(&mut self) {
        let keep = self
            .pending
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |end| end + 1);
        self.pending.truncate(keep);
    }

    /// Append freshly read bytes. `pending` holds no newline at this point, so
    /// it is the start of the current line; once that reaches the limit the
    /// rest of the line is dropped up to its newline.
    fn buffer(&mut self, bytes: &[u8]) {
        let room = MAX_INPUT_SIZE.saturating_sub(self.pending.len());
        match bytes.iter().position(|&b| b == b'\n') {
            Some(end) => {
                self.pending.extend_from_slice(&bytes[..end.min(room)]);
                self.pending.extend_from_slice(&bytes[end..]);
            }
            None => self.pending.extend_from_slice(&bytes[..bytes.len().min(room)]),
        }
    }

    /// Wait until the descriptor is readable. `false` means we woke up for an
    /// interrupt or timeout instead.
    fn wait_readable(&self) -> io::Result<bool> {
        let mut fds = libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let rc = unsafe { libc::poll(&mut fds, 1, INTERRUPT_CHECK_MS) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(err);
        }
        Ok(rc > 0)
    }
}

impl LineSource for PlainReader {
    fn read_line(&mut self, prompt: &Prompt) -> io::Result<ReadOutcome> {
        prompt.display()?;

        loop {
            // Checked before any buffered line is handed out, so a stale
            // interrupt never carries over into the next command.
            if self.signals.interrupt_pending() {
                self.discard_partial_line();
                return Ok(ReadOutcome::Interrupted);
            }

            if let Some(line) = self.next_buffered_line() {
                return Ok(ReadOutcome::Line(line));
            }

            if !self.wait_readable()? {
                continue;
            }

            let mut chunk = [0u8; MAX_INPUT_SIZE];
            let n = unsafe { libc::read(self.fd, chunk.as_mut_ptr().cast(), chunk.len()) };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            if n == 0 {
                if self.pending.is_empty() {
                    return Ok(ReadOutcome::Eof);
                }
                let rest = std::mem::take(&mut self.pending);
                return Ok(ReadOutcome::Line(bounded(&rest)));
            }
            self.buffer(&chunk[..n as usize]);
        }
    }
}

fn bounded(bytes: &[u8]) -> String {
    let limit = bytes.len().min(MAX_INPUT_SIZE - 1);
    String::from_utf8_lossy(&bytes[..limit]).into_owned()
}
