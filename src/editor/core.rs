use std::io::{self, Write};
use std::time::Duration;

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    style::Print,
    terminal::{self, ClearType},
};

use super::raw_mode::RawModeGuard;
use crate::input::{LineSource, ReadOutcome, INTERRUPT_CHECK_MS, MAX_INPUT_SIZE};
use crate::prompt::Prompt;
use crate::signal_handler::SignalController;

/// Minimal raw-mode line editor for interactive terminals.
pub struct LineEditor {
    buffer: String,
    cursor_pos: usize,
    signals: SignalController,
}

impl LineEditor {
    pub fn new(signals: SignalController) -> Self {
        Self {
            buffer: String::new(),
            cursor_pos: 0,
            signals,
        }
    }

    fn read_key_loop(&mut self, prompt: &str) -> io::Result<ReadOutcome> {
        let mut stdout = io::stdout();
        let tick = Duration::from_millis(INTERRUPT_CHECK_MS as u64);

        loop {
            // SIGINT sent from elsewhere (e.g. `kill -INT`) still lands here.
            if self.signals.interrupt_pending() {
                self.buffer.clear();
                return Ok(ReadOutcome::Interrupted);
            }

            match event::poll(tick) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }

            let key_event = match event::read() {
                Ok(Event::Key(key)) if key.kind != KeyEventKind::Release => key,
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            match key_event {
                KeyEvent {
                    code: KeyCode::Enter,
                    ..
                } => {
                    execute!(stdout, Print("\r\n"))?;
                    return Ok(ReadOutcome::Line(std::mem::take(&mut self.buffer)));
                }

                KeyEvent {
                    code: KeyCode::Char('c'),
                    modifiers: KeyModifiers::CONTROL,
                    ..
                } => {
                    self.buffer.clear();
                    execute!(stdout, Print("^C"))?;
                    return Ok(ReadOutcome::Interrupted);
                }

                KeyEvent {
                    code: KeyCode::Char('d'),
                    modifiers: KeyModifiers::CONTROL,
                    ..
                } => {
                    if self.buffer.is_empty() {
                        execute!(stdout, Print("\r\n"))?;
                        return Ok(ReadOutcome::Eof);
                    }
                }

                KeyEvent {
                    code: KeyCode::Backspace,
                    ..
                } => {
                    if self.cursor_pos > 0 {
                        self.cursor_pos -= 1;
                        let at = self.byte_index_at_char_pos(self.cursor_pos);
                        self.buffer.remove(at);
                        self.redraw(prompt)?;
                    }
                }

                KeyEvent {
                    code: KeyCode::Delete,
                    ..
                } => {
                    if self.cursor_pos < self.char_len() {
                        let at = self.byte_index_at_char_pos(self.cursor_pos);
                        self.buffer.remove(at);
                        self.redraw(prompt)?;
                    }
                }

                KeyEvent {
                    code: KeyCode::Left,
                    ..
                } => {
                    if self.cursor_pos > 0 {
                        self.cursor_pos -= 1;
                        execute!(stdout, cursor::MoveLeft(1))?;
                    }
                }

                KeyEvent {
                    code: KeyCode::Right,
                    ..
                } => {
                    if self.cursor_pos < self.char_len() {
                        self.cursor_pos += 1;
                        execute!(stdout, cursor::MoveRight(1))?;
                    }
                }

                KeyEvent {
                    code: KeyCode::Home,
                    ..
                } => {
                    self.cursor_pos = 0;
                    self.redraw(prompt)?;
                }

                KeyEvent {
                    code: KeyCode::End,
                    ..
                } => {
                    self.cursor_pos = self.char_len();
                    self.redraw(prompt)?;
                }

                KeyEvent {
                    code: KeyCode::Char(c),
                    modifiers: KeyModifiers::NONE | KeyModifiers::SHIFT,
                    ..
                } => {
                    // Same bound as the plain reader.
                    if self.buffer.len() + c.len_utf8() < MAX_INPUT_SIZE {
                        let at = self.byte_index_at_char_pos(self.cursor_pos);
                        self.buffer.insert(at, c);
                        self.cursor_pos += 1;
                        self.redraw(prompt)?;
                    }
                }

                _ => {}
            }
        }
    }

    fn redraw(&self, prompt: &str) -> io::Result<()> {
        let mut stdout = io::stdout();
        let target_col = (prompt.chars().count() + self.cursor_pos) as u16;
        execute!(
            stdout,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine),
            Print(prompt),
            Print(&self.buffer),
            cursor::MoveToColumn(target_col),
        )?;
        stdout.flush()
    }

    fn char_len(&self) -> usize {
        self.buffer.chars().count()
    }

    fn byte_index_at_char_pos(&self, char_pos: usize) -> usize {
        self.buffer
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.buffer.len())
    }
}

impl LineSource for LineEditor {
    fn read_line(&mut self, prompt: &Prompt) -> io::Result<ReadOutcome> {
        self.buffer.clear();
        self.cursor_pos = 0;

        let _guard = RawModeGuard::enter()?;
        let mut stdout = io::stdout();
        execute!(stdout, Print(prompt.as_str()))?;
        stdout.flush()?;

        self.read_key_loop(prompt.as_str())
    }
}
