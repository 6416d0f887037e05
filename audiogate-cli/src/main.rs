//! Audiogate CLI - Command-line interface
//!
//! Inspects gated pages, simulates playback failures offline and maintains
//! the podcast episode cards of the site's section pages.

mod commands;

use std::path::PathBuf;

use audiogate_core::tracing_setup::{CliLogLevel, init_tracing};
use clap::Parser;

#[derive(Parser)]
#[command(name = "audiogate")]
#[command(about = "Login gate for podcast audio hosted behind a learning platform")]
struct Cli {
    /// Console log level (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value_t = CliLogLevel::Warn)]
    log_level: CliLogLevel,

    /// Also write a full trace of the run into this directory
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,

    /// Protected host, overriding AUDIOGATE_PROTECTED_HOST (empty disables gating)
    #[arg(long, global = true)]
    protected_host: Option<String>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(log_file) = init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())? {
        tracing::info!(path = %log_file.display(), "Writing run log");
    }

    let config = commands::resolve_config(cli.protected_host.as_deref());
    commands::handle_command(cli.command, &config).await
}
