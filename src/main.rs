use std::env;
use std::process;
use std::time::Instant;

mod command;
mod config;
mod editor;
mod error;
mod input;
mod jobs;
mod launcher;
mod prompt;
mod reaper;
mod shell;
mod signal_handler;

use config::CliAction;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("jshell");

    let config = match config::parse_args(&args) {
        Ok(CliAction::Run(config)) => config,
        Ok(CliAction::Help) => {
            println!("{}", config::usage(program));
            process::exit(0);
        }
        Ok(CliAction::Invalid(arg)) => {
            log::debug!("rejecting argument {:?}", arg);
            println!("Invalid argument passed!\n");
            println!("{}", config::usage(program));
            process::exit(2);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if args.len() > 1 {
        println!(
            "Max background processes set to: {}",
            config.max_background_processes
        );
    }

    let start = Instant::now();
    let mut shell = match shell::Shell::new(&config) {
        Ok(shell) => shell,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    log::debug!("startup took {:?}", start.elapsed());

    process::exit(shell.run());
}
