use std::num::IntErrorKind;

use crate::error::ConfigError;

pub const DEFAULT_MAX_BACKGROUND_PROCESSES: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct ShellConfig {
    pub max_background_processes: usize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            max_background_processes: DEFAULT_MAX_BACKGROUND_PROCESSES,
        }
    }
}

/// What `main` should do after looking at the command line.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    Run(ShellConfig),
    Help,
    Invalid(String),
}

/// Parse `argv` (including the program name at index 0).
pub fn parse_args(args: &[String]) -> Result<CliAction, ConfigError> {
    let mut config = ShellConfig::default();
    let mut rest = args.iter().skip(1);

    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(CliAction::Help),
            "--max-background-processes" => {
                let value = rest.next().ok_or(ConfigError::MissingValue)?;
                config.max_background_processes = parse_capacity(value)?;
                log::debug!(
                    "background capacity set to {}",
                    config.max_background_processes
                );
            }
            other => return Ok(CliAction::Invalid(other.to_string())),
        }
    }

    Ok(CliAction::Run(config))
}

/// The whole value must be a non-negative integer, no trailing characters.
pub fn parse_capacity(value: &str) -> Result<usize, ConfigError> {
    match value.parse::<i64>() {
        Ok(n) if n < 0 => Err(ConfigError::OutOfRange {
            value: value.to_string(),
        }),
        Ok(n) => usize::try_from(n).map_err(|_| ConfigError::OutOfRange {
            value: value.to_string(),
        }),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                Err(ConfigError::OutOfRange {
                    value: value.to_string(),
                })
            }
            _ if has_leading_digits(value) => Err(ConfigError::InvalidInteger {
                value: value.to_string(),
            }),
            _ => Err(ConfigError::NoDigits {
                value: value.to_string(),
            }),
        },
    }
}

fn has_leading_digits(value: &str) -> bool {
    value
        .trim_start_matches(['+', '-'])
        .starts_with(|c: char| c.is_ascii_digit())
}

pub fn usage(program: &str) -> String {
    format!(
        "Usage: {} [OPTIONS]\n\
         --help/-h: help\n\
         --max-background-processes [INT]: Set maximum background process queue size",
        program
    )
}
