use std::io;

use nix::errno::Errno;
use thiserror::Error;

pub type ShellResult<T> = Result<T, ShellError>;

/// Errors raised while running a single command. None of them end the shell.
#[derive(Error, Debug)]
pub enum ShellError {
    #[error("fork failed: {0}")]
    Fork(Errno),

    #[error("empty command")]
    EmptyCommand,

    #[error("argument contains a NUL byte: {token:?}")]
    InvalidArgument { token: String },

    #[error("cd: {path}: {source}")]
    ChangeDirectory { path: String, source: io::Error },

    #[error("signal handling failed: {0}")]
    Signal(Errno),

    #[error("waitpid failed: {0}")]
    Wait(Errno),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errors from parsing the command line.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("--max-background-processes requires an integer value")]
    MissingValue,

    #[error("No digits were found in '{value}'")]
    NoDigits { value: String },

    #[error("Invalid integer value '{value}'")]
    InvalidInteger { value: String },

    #[error("Value out of range '{value}'")]
    OutOfRange { value: String },
}
