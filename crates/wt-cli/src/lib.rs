//! Work tracker CLI library.
//!
//! This crate provides the `wt` command-line interface.

mod cli;
pub mod commands;
mod config;
pub mod logind;

pub use cli::{Cli, Commands, MqttCommand};
pub use config::Config;
