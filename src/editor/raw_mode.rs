use std::io;
use std::sync::Once;

use crossterm::terminal;
use crossterm::tty::IsTty;

static RESTORE_ON_PANIC: Once = Once::new();

pub fn stdin_is_terminal() -> bool {
    io::stdin().is_tty()
}

/// Raw mode for the duration of one line read. Ctrl+C reaches us as a key
/// event instead of SIGINT while this is alive.
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    pub fn enter() -> io::Result<Self> {
        RESTORE_ON_PANIC.call_once(|| {
            let previous = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                let _ = terminal::disable_raw_mode();
                previous(info);
            }));
        });

        terminal::enable_raw_mode()?;
        Ok(RawModeGuard { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            log::warn!("could not leave raw mode: {}", e);
        }
    }
}
