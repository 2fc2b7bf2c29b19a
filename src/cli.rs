// src/cli.rs
//! CLI definitions for strata
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "strata")]
#[command(version)]
#[command(about = "Layer-by-layer package inventory for container images", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze an image layout and report its package inventory
    Analyze {
        /// Image layout directory (contains image.json and the layer tars)
        layout: PathBuf,

        /// Filesystem strategy: "default" applies diffs manually, any other
        /// name union-mounts via that storage driver
        #[arg(long, default_value = "default")]
        driver: String,

        /// Force fresh analysis of every layer, ignoring cached results
        #[arg(long)]
        redo: bool,

        /// Keep working files here instead of a temporary directory
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Command knowledge base TOML (defaults to the built-in table)
        #[arg(long)]
        command_lib: Option<PathBuf>,

        /// Write the inventory as JSON to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the commands resolved from each layer's metadata
    Commands {
        /// Image layout directory (contains image.json and the layer tars)
        layout: PathBuf,

        /// Command knowledge base TOML (defaults to the built-in table)
        #[arg(long)]
        command_lib: Option<PathBuf>,
    },
}
