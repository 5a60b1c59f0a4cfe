use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "scope-bridge",
    version,
    about = "Replay host editing events through the pipeline scope/session bridge"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a JSONL host event log (or stdin) through the bridge.
    Replay {
        #[arg(
            value_name = "EVENT_LOG",
            help = "Path to a JSONL event log; stdin when omitted"
        )]
        file: Option<PathBuf>,
        /// Keep tailing the log for appended events.
        #[arg(long)]
        follow: bool,
    },
    /// Run health diagnostics for configuration and environment.
    Doctor,
}
