#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use clap::error::ErrorKind;
use msgsheet::cli::app::{Cli, Command, RuntimeArgs};
use msgsheet::cli::commands;
use msgsheet::config::RuntimePaths;
use tracing_subscriber::EnvFilter;

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_USAGE_ERROR: i32 = 64;

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return exit_code_for_parse_error(error),
    };
    init_tracing(cli.runtime.verbose);
    let command_name = command_name(&cli.command);
    println!("msgsheet: starting `{command_name}`");

    match execute(cli) {
        Ok(()) => {
            println!("msgsheet: completed `{command_name}` (exit_code={EXIT_SUCCESS})");
            EXIT_SUCCESS
        }
        Err(error) => {
            eprintln!("msgsheet: failed `{command_name}` (exit_code={EXIT_RUNTIME_FAILURE})");
            eprintln!("{error:#}");
            EXIT_RUNTIME_FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    let runtime_paths = resolve_runtime_paths(&cli.runtime)?;
    match cli.command {
        Command::Render(args) => commands::render::run(&args, &runtime_paths),
        Command::Inspect(args) => commands::inspect::run(&args, &runtime_paths),
    }
}

/// `RUST_LOG` wins; otherwise `--verbose` selects debug output.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn exit_code_for_parse_error(error: clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = error.print();
            EXIT_SUCCESS
        }
        _ => {
            let _ = error.print();
            EXIT_USAGE_ERROR
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Render(_) => "render",
        Command::Inspect(_) => "inspect",
    }
}

fn resolve_runtime_paths(args: &RuntimeArgs) -> Result<RuntimePaths> {
    let home_dir = args
        .home_dir
        .clone()
        .or_else(|| std::env::var_os("HOME").map(PathBuf::from));

    let cwd = match &args.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };

    msgsheet::config::resolve_runtime_paths(home_dir.as_deref(), &cwd)
}
