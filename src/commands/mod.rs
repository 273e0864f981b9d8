//! Command-line interface definitions and handlers for the reclass CLI.

pub mod analyze;
pub mod args;

pub use analyze::{run_analyze, AnalyzeArgs};
pub use args::{Cli, Commands};
