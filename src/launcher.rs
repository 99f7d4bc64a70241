use std::ffi::CString;
use std::thread;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{execvp, fork, setpgid, ForkResult, Pid};

use crate::error::{ShellError, ShellResult};
use crate::jobs::JobTable;
use crate::reaper;
use crate::signal_handler::{self, SignalController, SignalGuard};

/// Exit status of a child whose `execvp` failed.
pub const EXEC_FAILURE_STATUS: i32 = 127;

const FOREGROUND_POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, PartialEq)]
pub enum LaunchOutcome {
    /// Background request refused because the job table is full.
    Rejected,
    Background(Pid),
    Completed(WaitStatus),
    /// The foreground process was killed by an interrupt.
    Interrupted(Pid),
}

pub struct Launcher {
    signals: SignalController,
}

impl Launcher {
    pub fn new(signals: SignalController) -> Self {
        Launcher { signals }
    }

    pub fn launch(
        &self,
        argv: &[String],
        background: bool,
        jobs: &mut JobTable,
    ) -> ShellResult<LaunchOutcome> {
        let args = to_cstrings(argv)?;
        if args.is_empty() {
            return Err(ShellError::EmptyCommand);
        }

        // Nothing may interrupt us between the capacity check and the
        // registration (or between fork and publishing the foreground pid).
        let guard = SignalGuard::new()?;

        // An interrupt that landed between commands belongs to the previous
        // one, not to the process we are about to start.
        if self.signals.take_interrupt() {
            log::debug!("dropped an interrupt pending before launch");
        }

        if background && !jobs.has_capacity() {
            println!(
                "Shell: Reached the limit to have background processes. \
                 Please wait until 1 or more background processes are completed."
            );
            return Ok(LaunchOutcome::Rejected);
        }

        let pid = match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => child,
            Ok(ForkResult::Child) => exec_child(&args, background),
            Err(e) => return Err(ShellError::Fork(e)),
        };
        log::debug!("spawned {:?} as pid {} (background: {})", argv, pid, background);

        let outcome = if background {
            // Also done by the child; whichever runs first wins.
            let _ = setpgid(pid, pid);
            println!("Shell: Process {} running in background.", pid);
            jobs.register(pid);
            drop(guard);
            LaunchOutcome::Background(pid)
        } else {
            debug_assert!(self.signals.foreground().is_none());
            self.signals.set_foreground(pid);
            drop(guard);
            let waited = self.wait_foreground(pid);
            self.signals.clear_foreground();
            waited?
        };

        if !matches!(outcome, LaunchOutcome::Interrupted(_)) {
            reaper::reap(jobs);
        }
        Ok(outcome)
    }

    /// Poll the foreground child until it is gone. Polling instead of a
    /// blocking wait keeps the loop responsive to a pending interrupt.
    fn wait_foreground(&self, pid: Pid) -> ShellResult<LaunchOutcome> {
        loop {
            if self.signals.interrupt_pending() {
                self.kill_foreground(pid)?;
                return Ok(self.interrupted(pid));
            }

            if let Some(status) = self.try_collect(pid)? {
                if self.signals.interrupt_pending() {
                    return Ok(self.interrupted(pid));
                }
                return Ok(LaunchOutcome::Completed(status));
            }
            thread::sleep(FOREGROUND_POLL_INTERVAL);
        }
    }

    /// Reap the foreground child if it has finished. The pid is unpublished
    /// before SIGINT is unblocked again, so the handler never signals a pid
    /// that may already belong to someone else.
    fn try_collect(&self, pid: Pid) -> ShellResult<Option<WaitStatus>> {
        let _guard = SignalGuard::new()?;
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(status @ WaitStatus::Exited(..)) | Ok(status @ WaitStatus::Signaled(..)) => {
                self.signals.clear_foreground();
                Ok(Some(status))
            }
            Ok(_) | Err(Errno::EINTR) => Ok(None),
            Err(e) => {
                self.signals.clear_foreground();
                Err(ShellError::Wait(e))
            }
        }
    }

    fn kill_foreground(&self, pid: Pid) -> ShellResult<()> {
        let _guard = SignalGuard::new()?;
        let killed = signal_handler::kill_and_reap(pid);
        self.signals.clear_foreground();
        killed.map(|_| ())
    }

    fn interrupted(&self, pid: Pid) -> LaunchOutcome {
        self.signals.take_interrupt();
        println!(
            "\nShell: Foreground process with PID:{} interrupted and now reaped by parent.",
            pid
        );
        LaunchOutcome::Interrupted(pid)
    }
}

fn to_cstrings(argv: &[String]) -> ShellResult<Vec<CString>> {
    argv.iter()
        .map(|token| {
            CString::new(token.as_bytes()).map_err(|_| ShellError::InvalidArgument {
                token: token.clone(),
            })
        })
        .collect()
}

/// Runs in the forked child. Never returns into the shell.
fn exec_child(args: &[CString], background: bool) -> ! {
    signal_handler::restore_child_signals();
    if background {
        let _ = setpgid(Pid::from_raw(0), Pid::from_raw(0));
    }

    let err = match execvp(&args[0], args) {
        Err(e) => e,
        Ok(never) => match never {},
    };

    // Only raw writes after fork: no allocation, no buffered stdio.
    write_stderr(b"Shell: Incorrect command: ");
    write_stderr(args[0].as_bytes());
    write_stderr(b": ");
    write_stderr(err.desc().as_bytes());
    write_stderr(b"\n");
    unsafe { libc::_exit(EXEC_FAILURE_STATUS) }
}

fn write_stderr(bytes: &[u8]) {
    unsafe {
        libc::write(libc::STDERR_FILENO, bytes.as_ptr().cast(), bytes.len());
    }
}
