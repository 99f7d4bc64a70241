//! SIGINT handling for the interactive loop.
//!
//! The handler itself only touches atomics and calls `kill(2)`. Everything
//! else (reaping, printing, restarting the prompt) happens on the main thread
//! once it notices the pending interrupt.

use std::sync::atomic::{AtomicI32, AtomicU8, Ordering};

use nix::errno::Errno;
use nix::sys::signal::{
    self, sigaction, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal,
};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;

use crate::error::{ShellError, ShellResult};

const DISARMED: u8 = 0;
const ARMED: u8 = 1;
const UNWINDING: u8 = 2;

static STATE: AtomicU8 = AtomicU8::new(DISARMED);

// 0 means no foreground process.
static FOREGROUND_PID: AtomicI32 = AtomicI32::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// The loop is not running yet; interrupts are dropped.
    Disarmed,
    /// Waiting for the next interrupt.
    Armed,
    /// An interrupt arrived and the main loop has not acknowledged it.
    Unwinding,
}

extern "C" fn handle_sigint(_: libc::c_int) {
    if STATE.load(Ordering::SeqCst) == DISARMED {
        return;
    }
    STATE.store(UNWINDING, Ordering::SeqCst);

    let pid = FOREGROUND_PID.load(Ordering::SeqCst);
    if pid > 0 {
        let _ = signal::kill(Pid::from_raw(pid), Signal::SIGKILL);
    }
}

/// Handle on the process-wide interrupt state.
#[derive(Debug, Clone, Copy)]
pub struct SignalController {
    _private: (),
}

impl SignalController {
    /// Install the SIGINT handler. `SA_RESTART` is left off on purpose so a
    /// blocked `read(2)` comes back with `EINTR`.
    pub fn install() -> ShellResult<Self> {
        let action = SigAction::new(
            SigHandler::Handler(handle_sigint),
            SaFlags::empty(),
            SigSet::empty(),
        );
        unsafe { sigaction(Signal::SIGINT, &action) }.map_err(ShellError::Signal)?;
        log::debug!("SIGINT handler installed");

        Ok(SignalController { _private: () })
    }

    /// Start accepting interrupts. A pending interrupt is kept.
    pub fn arm(&self) {
        let _ = STATE.compare_exchange(DISARMED, ARMED, Ordering::SeqCst, Ordering::SeqCst);
    }

    pub fn disarm(&self) {
        STATE.store(DISARMED, Ordering::SeqCst);
    }

    pub fn state(&self) -> ControllerState {
        match STATE.load(Ordering::SeqCst) {
            DISARMED => ControllerState::Disarmed,
            ARMED => ControllerState::Armed,
            _ => ControllerState::Unwinding,
        }
    }

    pub fn interrupt_pending(&self) -> bool {
        STATE.load(Ordering::SeqCst) == UNWINDING
    }

    /// Acknowledge a pending interrupt and re-arm. Returns whether there was one.
    pub fn take_interrupt(&self) -> bool {
        STATE
            .compare_exchange(UNWINDING, ARMED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn set_foreground(&self, pid: Pid) {
        FOREGROUND_PID.store(pid.as_raw(), Ordering::SeqCst);
    }

    pub fn clear_foreground(&self) {
        FOREGROUND_PID.store(0, Ordering::SeqCst);
    }

    pub fn foreground(&self) -> Option<Pid> {
        match FOREGROUND_PID.load(Ordering::SeqCst) {
            0 => None,
            pid => Some(Pid::from_raw(pid)),
        }
    }
}

/// Blocks SIGINT for as long as it lives.
pub struct SignalGuard {
    previous: SigSet,
}

impl SignalGuard {
    pub fn new() -> ShellResult<Self> {
        let mut previous = SigSet::empty();
        signal::sigprocmask(
            SigmaskHow::SIG_BLOCK,
            Some(&sigint_set()),
            Some(&mut previous),
        )
        .map_err(ShellError::Signal)?;
        Ok(SignalGuard { previous })
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        let _ = signal::sigprocmask(SigmaskHow::SIG_SETMASK, Some(&self.previous), None);
    }
}

pub fn sigint_set() -> SigSet {
    let mut set = SigSet::empty();
    set.add(Signal::SIGINT);
    set
}

/// Put SIGINT back to its default disposition and unmask it. Only meant for
/// a freshly forked child that is about to exec.
pub fn restore_child_signals() {
    let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    unsafe {
        let _ = sigaction(Signal::SIGINT, &default);
    }
    let _ = signal::sigprocmask(SigmaskHow::SIG_UNBLOCK, Some(&sigint_set()), None);
}

/// Send SIGKILL to `pid` and block until the kernel confirms it is gone.
/// Returns `None` when the process had already been collected elsewhere.
pub fn kill_and_reap(pid: Pid) -> ShellResult<Option<WaitStatus>> {
    match signal::kill(pid, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => return Err(ShellError::Signal(e)),
    }

    loop {
        match waitpid(pid, None) {
            Ok(status @ WaitStatus::Exited(..)) | Ok(status @ WaitStatus::Signaled(..)) => {
                log::debug!("pid {} killed and reaped", pid);
                return Ok(Some(status));
            }
            Ok(_) | Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => return Ok(None),
            Err(e) => return Err(ShellError::Wait(e)),
        }
    }
}

#[cfg(test)]
pub(crate) static TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn lock() -> std::sync::MutexGuard<'static, ()> {
        TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn interrupt_state_machine() {
        let _lock = lock();
        let controller = SignalController::install().unwrap();

        controller.disarm();
        signal::raise(Signal::SIGINT).unwrap();
        assert_eq!(controller.state(), ControllerState::Disarmed);
        assert!(!controller.take_interrupt());

        controller.arm();
        assert_eq!(controller.state(), ControllerState::Armed);

        signal::raise(Signal::SIGINT).unwrap();
        assert_eq!(controller.state(), ControllerState::Unwinding);
        assert!(controller.interrupt_pending());

        // A second interrupt while idle is harmless.
        signal::raise(Signal::SIGINT).unwrap();
        assert!(controller.take_interrupt());
        assert!(!controller.take_interrupt());
        assert_eq!(controller.state(), ControllerState::Armed);
        controller.disarm();
    }

    #[test]
    fn foreground_tracking() {
        let _lock = lock();
        let controller = SignalController::install().unwrap();
        assert_eq!(controller.foreground(), None);

        controller.set_foreground(Pid::from_raw(4242));
        assert_eq!(controller.foreground(), Some(Pid::from_raw(4242)));

        controller.clear_foreground();
        assert_eq!(controller.foreground(), None);
    }

    #[test]
    fn interrupt_kills_foreground_process() {
        let _lock = lock();
        let controller = SignalController::install().unwrap();
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = Pid::from_raw(child.id() as i32);

        controller.arm();
        controller.set_foreground(pid);
        signal::raise(Signal::SIGINT).unwrap();

        let status = waitpid(pid, None).unwrap();
        assert!(matches!(status, WaitStatus::Signaled(_, Signal::SIGKILL, _)));

        controller.clear_foreground();
        assert!(controller.take_interrupt());
        controller.disarm();
    }

    #[test]
    fn kill_and_reap_confirms_death() {
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = Pid::from_raw(child.id() as i32);

        let status = kill_and_reap(pid).unwrap();
        assert_eq!(status, Some(WaitStatus::Signaled(pid, Signal::SIGKILL, false)));

        // Already reaped.
        assert!(matches!(kill_and_reap(pid), Ok(None)));
    }

    #[test]
    fn guard_blocks_and_restores_sigint() {
        let _lock = lock();
        {
            let _guard = SignalGuard::new().unwrap();
            let mut current = SigSet::empty();
            signal::sigprocmask(SigmaskHow::SIG_BLOCK, None, Some(&mut current)).unwrap();
            assert!(current.contains(Signal::SIGINT));
        }
        let mut current = SigSet::empty();
        signal::sigprocmask(SigmaskHow::SIG_BLOCK, None, Some(&mut current)).unwrap();
        assert!(!current.contains(Signal::SIGINT));
    }
}
