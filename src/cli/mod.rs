//! Command-line interface definitions and helpers.
//!
//! This module contains all CLI argument parsing and subcommand handlers.

mod args;
mod commands;

pub use args::{Args, Command};
pub use commands::{
    convert, handle_config_action, list_cameras, run, select_size, simulated_platform,
    CommandError,
};
