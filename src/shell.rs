use std::env;

use colored::Colorize;

use crate::command::Command;
use crate::config::ShellConfig;
use crate::error::{ShellError, ShellResult};
use crate::input::{self, LineSource, ReadOutcome};
use crate::jobs::JobTable;
use crate::launcher::{LaunchOutcome, Launcher};
use crate::prompt::Prompt;
use crate::reaper;
use crate::signal_handler::{self, SignalController};

/// Whether the loop keeps going after a command.
#[derive(Debug, PartialEq)]
pub enum Flow {
    Continue,
    Exit(i32),
}

pub struct Shell {
    prompt: Prompt,
    input: Box<dyn LineSource>,
    jobs: JobTable,
    launcher: Launcher,
    signals: SignalController,
}

impl Shell {
    pub fn new(config: &ShellConfig) -> ShellResult<Self> {
        let signals = SignalController::install()?;
        let input = input::open_line_source(signals);
        Ok(Self::with_input(config, signals, input))
    }

    pub fn with_input(
        config: &ShellConfig,
        signals: SignalController,
        input: Box<dyn LineSource>,
    ) -> Self {
        Self {
            prompt: Prompt::new(),
            input,
            jobs: JobTable::new(config.max_background_processes),
            launcher: Launcher::new(signals),
            signals,
        }
    }

    /// Run until `exit` or end of input. Returns the process exit status.
    pub fn run(&mut self) -> i32 {
        self.signals.arm();

        loop {
            let command = match self.input.read_line(&self.prompt) {
                Ok(ReadOutcome::Line(line)) => Command::from_line(&line),
                Ok(ReadOutcome::Interrupted) => {
                    log::debug!("interrupt at the prompt ({:?})", self.signals.state());
                    self.signals.take_interrupt();
                    println!();
                    continue;
                }
                Ok(ReadOutcome::Eof) => {
                    println!();
                    Command::Exit
                }
                Err(e) => {
                    report_error(&ShellError::Io(e));
                    Command::Exit
                }
            };

            if let Flow::Exit(code) = self.dispatch(command) {
                return code;
            }
        }
    }

    pub fn dispatch(&mut self, command: Command) -> Flow {
        match command {
            Command::Empty => {
                reaper::reap(&mut self.jobs);
            }
            Command::Exit => {
                self.shutdown();
                return Flow::Exit(0);
            }
            Command::Cd { target, extra } => {
                if extra {
                    println!("Shell: Incorrect command");
                }
                if let Err(e) = change_directory(target.as_deref()) {
                    report_error(&e);
                }
            }
            Command::External { argv, background } => {
                match self.launcher.launch(&argv, background, &mut self.jobs) {
                    Ok(LaunchOutcome::Completed(status)) => {
                        log::debug!("{} finished: {:?}", argv[0], status)
                    }
                    Ok(LaunchOutcome::Background(pid)) => {
                        log::debug!("{} running in background as {}", argv[0], pid)
                    }
                    Ok(LaunchOutcome::Interrupted(pid)) => {
                        log::debug!("{} ({}) interrupted", argv[0], pid)
                    }
                    Ok(LaunchOutcome::Rejected) => {}
                    Err(e) => report_error(&e),
                }
            }
        }
        Flow::Continue
    }

    /// Kill every background job, waiting for each one.
    fn shutdown(&mut self) {
        for pid in self.jobs.pids() {
            match signal_handler::kill_and_reap(pid) {
                Ok(_) => println!("Shell: Process {} killed during exit sequence.", pid),
                Err(e) => report_error(&e),
            }
            self.jobs.remove_if_present(pid);
        }
        self.signals.disarm();
    }
}

/// `cd` without an argument goes to `$HOME`.
pub fn change_directory(target: Option<&str>) -> ShellResult<()> {
    let home;
    let path = match target {
        Some(path) => path,
        None => {
            home = env::var("HOME").unwrap_or_else(|_| "/".to_string());
            home.as_str()
        }
    };

    env::set_current_dir(path).map_err(|source| ShellError::ChangeDirectory {
        path: path.to_string(),
        source,
    })?;
    log::debug!("changed directory to {}", path);
    Ok(())
}

fn report_error(err: &ShellError) {
    eprintln!("{} {}", "Shell:".red(), err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal_handler::TEST_LOCK;
    use std::collections::VecDeque;
    use std::io;

    /// Hands out canned read results, then end of input.
    struct Scripted(VecDeque<ReadOutcome>);

    impl Scripted {
        fn new(outcomes: Vec<ReadOutcome>) -> Box<Self> {
            Box::new(Scripted(outcomes.into()))
        }
    }

    impl LineSource for Scripted {
        fn read_line(&mut self, _prompt: &Prompt) -> io::Result<ReadOutcome> {
            Ok(self.0.pop_front().unwrap_or(ReadOutcome::Eof))
        }
    }

    fn line(text: &str) -> ReadOutcome {
        ReadOutcome::Line(text.to_string())
    }

    fn shell(capacity: usize, outcomes: Vec<ReadOutcome>) -> Shell {
        let signals = SignalController::install().unwrap();
        let config = ShellConfig {
            max_background_processes: capacity,
        };
        Shell::with_input(&config, signals, Scripted::new(outcomes))
    }

    fn lock() -> std::sync::MutexGuard<'static, ()> {
        TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn exit_returns_success() {
        let _lock = lock();
        let mut shell = shell(4, vec![line("true"), line(""), line("exit")]);
        assert_eq!(shell.run(), 0);
    }

    #[test]
    fn end_of_input_behaves_like_exit() {
        let _lock = lock();
        let mut shell = shell(4, vec![]);
        assert_eq!(shell.run(), 0);
    }

    #[test]
    fn exit_kills_background_jobs() {
        let _lock = lock();
        let mut shell = shell(
            4,
            vec![line("sleep 30 &"), line("sleep 30 &"), line("exit")],
        );
        assert_eq!(shell.run(), 0);
        assert!(shell.jobs.is_empty());
    }

    #[test]
    fn idle_interrupts_just_restart_the_prompt() {
        let _lock = lock();
        let mut shell = shell(
            4,
            vec![ReadOutcome::Interrupted, ReadOutcome::Interrupted, line("exit")],
        );
        assert_eq!(shell.run(), 0);
    }

    #[test]
    fn rejected_background_job_leaves_table_alone() {
        let _lock = lock();
        let mut shell = shell(1, vec![]);
        shell.signals.arm();

        shell.dispatch(Command::from_line("sleep 30 &"));
        let before = shell.jobs.pids();
        assert_eq!(before.len(), 1);

        shell.dispatch(Command::from_line("sleep 30 &"));
        assert_eq!(shell.jobs.pids(), before);

        assert_eq!(shell.dispatch(Command::Exit), Flow::Exit(0));
        assert!(shell.jobs.is_empty());
    }

    #[test]
    fn unknown_command_does_not_stop_the_loop() {
        let _lock = lock();
        let mut shell = shell(1, vec![]);
        shell.signals.arm();
        assert_eq!(
            shell.dispatch(Command::from_line("no-such-command-here --flag")),
            Flow::Continue
        );
        shell.signals.disarm();
    }

    #[test]
    fn cd_to_missing_directory_is_an_error() {
        let err = change_directory(Some("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, ShellError::ChangeDirectory { .. }));
        assert!(err.to_string().starts_with("cd: /definitely/not/here"));
    }
}
