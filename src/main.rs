// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Analyze {
            layout,
            driver,
            redo,
            work_dir,
            command_lib,
            output,
        }) => commands::cmd_analyze(
            &layout,
            &driver,
            redo,
            work_dir.as_deref(),
            command_lib.as_deref(),
            output.as_deref(),
        ),
        Some(Commands::Commands {
            layout,
            command_lib,
        }) => commands::cmd_commands(&layout, command_lib.as_deref()),
        None => {
            println!("No command specified. Try 'strata --help'.");
            Ok(())
        }
    }
}
