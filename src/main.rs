use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use scope_bridge::app;
use scope_bridge::cli::{Cli, Commands};
use scope_bridge::config::BridgeConfig;
use scope_bridge::util::setup_tracing;

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("scope-bridge error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<u8> {
    setup_tracing();
    let cli = Cli::parse();
    let config = BridgeConfig::load_or_init()?;

    match cli.command {
        Some(Commands::Replay { file, follow }) => {
            app::run_replay(&config, file, follow)?;
            Ok(0)
        }
        Some(Commands::Doctor) => app::doctor(&config),
        None => {
            app::run_replay(&config, None, false)?;
            Ok(0)
        }
    }
}
