use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::commands::{inspect::InspectArgs, render::RenderArgs};

#[derive(Debug, Parser)]
#[command(
    name = "msgsheet",
    version,
    about = "Render Messenger chat exports as spreadsheets"
)]
pub struct Cli {
    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct RuntimeArgs {
    #[arg(long, global = true, value_name = "PATH")]
    pub home_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub cwd: Option<PathBuf>,

    /// Debug-level diagnostics on stderr (`RUST_LOG` takes precedence).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write the export's threads into one workbook.
    Render(RenderArgs),
    /// Summarize the export's fragments without writing anything.
    Inspect(InspectArgs),
}
