use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::jobs::JobTable;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reaped {
    Exited(Pid, i32),
    Signaled(Pid, Signal),
    /// Collected by someone else before we asked.
    Vanished(Pid),
}

impl Reaped {
    pub fn pid(&self) -> Pid {
        match *self {
            Reaped::Exited(pid, _) | Reaped::Signaled(pid, _) | Reaped::Vanished(pid) => pid,
        }
    }

    fn report(&self) {
        match self {
            Reaped::Exited(pid, code) => {
                println!(
                    "Shell: Background process with process id {} finished.",
                    pid
                );
                log::debug!("background pid {} exited with {}", pid, code);
            }
            Reaped::Signaled(pid, sig) => println!(
                "Shell: Background process with process id {} terminated by {}.",
                pid, sig
            ),
            Reaped::Vanished(pid) => log::debug!("background pid {} already collected", pid),
        }
    }
}

/// Ask about every registered job without blocking and drop the ones that
/// are gone.
pub fn reap(jobs: &mut JobTable) -> Vec<Reaped> {
    let mut reaped = Vec::new();

    for pid in jobs.pids() {
        let job = match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(pid, code)) => Reaped::Exited(pid, code),
            Ok(WaitStatus::Signaled(pid, sig, _)) => Reaped::Signaled(pid, sig),
            Ok(_) | Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => Reaped::Vanished(pid),
            Err(e) => {
                log::warn!("waitpid({}) failed: {}", pid, e);
                continue;
            }
        };
        job.report();
        jobs.remove_if_present(job.pid());
        reaped.push(job);
    }

    reaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::kill;
    use std::process::Command;
    use std::thread;
    use std::time::{Duration, Instant};

    fn spawn(program: &str, args: &[&str]) -> Pid {
        let child = Command::new(program).args(args).spawn().unwrap();
        Pid::from_raw(child.id() as i32)
    }

    fn reap_until_empty(jobs: &mut JobTable) -> Vec<Reaped> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut all = Vec::new();
        while !jobs.is_empty() && Instant::now() < deadline {
            all.extend(reap(jobs));
            thread::sleep(Duration::from_millis(10));
        }
        all
    }

    #[test]
    fn running_job_stays_registered() {
        let mut jobs = JobTable::new(2);
        let pid = spawn("sleep", &["30"]);
        jobs.register(pid);

        assert!(reap(&mut jobs).is_empty());
        assert!(jobs.contains(pid));

        kill(pid, Signal::SIGKILL).unwrap();
        waitpid(pid, None).unwrap();
    }

    #[test]
    fn finished_job_is_removed_and_stays_removed() {
        let mut jobs = JobTable::new(2);
        let pid = spawn("true", &[]);
        jobs.register(pid);

        let reaped = reap_until_empty(&mut jobs);
        assert_eq!(reaped, vec![Reaped::Exited(pid, 0)]);
        assert!(!jobs.contains(pid));

        assert!(reap(&mut jobs).is_empty());
        assert!(!jobs.contains(pid));
    }

    #[test]
    fn exit_status_is_reported() {
        let mut jobs = JobTable::new(1);
        let pid = spawn("sh", &["-c", "exit 3"]);
        jobs.register(pid);

        assert_eq!(reap_until_empty(&mut jobs), vec![Reaped::Exited(pid, 3)]);
    }

    #[test]
    fn killed_job_is_removed() {
        let mut jobs = JobTable::new(1);
        let pid = spawn("sleep", &["30"]);
        jobs.register(pid);
        kill(pid, Signal::SIGTERM).unwrap();

        assert_eq!(
            reap_until_empty(&mut jobs),
            vec![Reaped::Signaled(pid, Signal::SIGTERM)]
        );
    }

    #[test]
    fn already_collected_job_is_dropped() {
        let mut jobs = JobTable::new(1);
        let pid = spawn("true", &[]);
        waitpid(pid, None).unwrap();
        jobs.register(pid);

        assert_eq!(reap(&mut jobs), vec![Reaped::Vanished(pid)]);
        assert!(jobs.is_empty());
    }
}
