// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Stately CLI
//!
//! Command-line interface for running process-backed states from a manifest.

use clap::{Parser, Subcommand};

mod commands;

/// Stately - lifecycle orchestration for named stateful components
#[derive(Parser)]
#[command(name = "stately")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the states of a manifest and keep them running until Ctrl+C
    Up {
        /// Path to the manifest file
        #[arg(default_value = "stately.yaml")]
        manifest: String,

        /// Start only these states (comma separated)
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,

        /// Leave these states out (comma separated)
        #[arg(long, value_delimiter = ',')]
        except: Vec<String>,

        /// Arguments made available to states
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Validate a manifest file
    Validate {
        /// Path to the manifest file
        manifest: String,
    },

    /// List declared states in start order
    List {
        /// Path to the manifest file
        #[arg(default_value = "stately.yaml")]
        manifest: String,
    },

    /// Show the dependency report and ordering conflicts
    Graph {
        /// Path to the manifest file
        #[arg(default_value = "stately.yaml")]
        manifest: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    // Dispatch to command handlers
    match cli.command {
        Commands::Up {
            manifest,
            only,
            except,
            args,
        } => commands::up::execute(&manifest, only, except, args).await,
        Commands::Validate { manifest } => commands::validate::execute(&manifest).await,
        Commands::List { manifest } => commands::list::execute(&manifest).await,
        Commands::Graph { manifest, json } => commands::graph::execute(&manifest, json).await,
    }
}
