//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Daily active-time tracker.
///
/// Samples session idle state on each scheduler tick, accrues active time
/// into a per-day counter, and optionally republishes it over MQTT.
#[derive(Debug, Parser)]
#[command(name = "wt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sample session state and accrue active time (scheduler tick).
    Update,

    /// Show current tracking status.
    Status,

    /// Show recent daily totals.
    Report {
        /// Number of days to list.
        #[arg(long, default_value_t = 7)]
        days: usize,
    },

    /// MQTT publisher commands.
    Mqtt {
        #[command(subcommand)]
        command: MqttCommand,
    },
}

/// MQTT publisher subcommands.
#[derive(Debug, Subcommand)]
pub enum MqttCommand {
    /// Run the publisher daemon until interrupted.
    Start,

    /// Connect, publish one snapshot, disconnect.
    Publish,

    /// Show the publisher configuration without connecting.
    Status,
}
