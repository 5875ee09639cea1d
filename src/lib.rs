//! camera-preview library crate.
//!
//! Camera lifecycle control and frame delivery over a pluggable platform
//! camera service, plus the configuration used by the command-line host.

pub mod camera;
pub mod config;
