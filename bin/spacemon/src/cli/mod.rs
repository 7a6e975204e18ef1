//! This module contains all CLI-specific code for the spacemon binary.

use clap::{
    builder::styling::{AnsiColor, Color, Style},
    ArgAction, Args, Parser, Subcommand,
};
use spacemon_store::RepairPolicy;
use std::path::PathBuf;

mod tracing_util;
pub use tracing_util::init_tracing_subscriber;

const ABOUT: &str = "
spacemon ingests Filecoin builtin actor events from a Lotus node into an epoch-partitioned store,
and compiles sector onboarding (DDO) data from the stored events.
";

/// The spacemon CLI application arguments.
#[derive(Parser, Clone, Debug)]
#[command(about = ABOUT, version, styles = cli_styles())]
pub struct Cli {
    /// Verbosity level (0-4)
    #[arg(long, short, help = "Verbosity level (0-4)", action = ArgAction::Count)]
    pub v: u8,
    /// Path to the JSON configuration file.
    #[arg(long, short, env = "SPACEMON_CONFIG", default_value = "./config.json")]
    pub config: PathBuf,
    /// The command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// The spacemon commands.
#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Follow the chain and store builtin actor events.
    Ingest(IngestArgs),
    /// Compile stored sector events into `compiled-ddo.json`.
    Compile,
}

/// Arguments of the `ingest` command.
#[derive(Args, Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestArgs {
    /// Resume after the last stored event instead of fetching the latest stored partition again.
    /// Events of a height that was only partially saved are then lost.
    #[arg(long)]
    pub resume: bool,
}

impl IngestArgs {
    /// The repair policy to open the store with.
    pub const fn repair_policy(&self) -> RepairPolicy {
        if self.resume {
            RepairPolicy::Resume
        } else {
            RepairPolicy::TruncateLatest
        }
    }
}

/// Styles for the CLI application.
const fn cli_styles() -> clap::builder::Styles {
    clap::builder::Styles::styled()
        .usage(Style::new().bold().underline().fg_color(Some(Color::Ansi(AnsiColor::Yellow))))
        .header(Style::new().bold().underline().fg_color(Some(Color::Ansi(AnsiColor::Yellow))))
        .literal(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green))))
        .invalid(Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Red))))
        .error(Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Red))))
        .valid(Style::new().bold().underline().fg_color(Some(Color::Ansi(AnsiColor::Green))))
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::White))))
}
