//! Application layer for the `websecscan` binary

pub mod cli;
pub mod progress;
pub mod scan;
pub mod startup;
