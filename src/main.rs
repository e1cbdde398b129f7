//! Jujutsu Log Viewer - entry point.

use clap::Parser;
use jjlv::exec::JjCommand;
use std::path::PathBuf;
use tracing::info;

/// TUI viewer for the Jujutsu (jj) revision graph
#[derive(Parser, Debug)]
#[command(name = "jjlv")]
#[command(version)]
#[command(about = "TUI viewer for the Jujutsu (jj) revision graph")]
pub struct Args {
    /// Repository path (defaults to the current directory)
    pub repo: Option<PathBuf>,

    /// Revset to log (defaults to jj's configured default)
    #[arg(short, long)]
    pub revset: Option<String>,

    /// Rows per streamed parser batch (must be positive)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub batch_size: Option<u32>,

    /// Disable colors
    #[arg(long)]
    pub no_color: bool,

    /// Path to configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.no_color {
        // Propagate to everything that checks the conventional variable.
        std::env::set_var("NO_COLOR", "1");
    }

    // Precedence: defaults -> config file -> env vars -> CLI args.
    let config = {
        let file = jjlv::config::load_config(args.config.clone())?;
        let merged = jjlv::config::merge_config(file);
        let with_env = jjlv::config::apply_env_overrides(merged);
        jjlv::config::apply_cli_overrides(
            with_env,
            args.revset.clone(),
            args.batch_size.map(|b| b as usize),
        )
    };

    jjlv::logging::init(&config.log_file_path)?;
    info!(config = ?config, "configuration resolved");

    let cmd = JjCommand::new(args.repo.clone());
    jjlv::view::run(cmd, config)?;

    Ok(())
}
