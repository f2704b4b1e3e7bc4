//! Command-line surface: arguments, configuration file, rendering

pub mod args;
pub mod config;
pub mod display;
