//! Output module for reporting pipeline state
//!
//! This module handles:
//! - Loading lifecycle statistics from storage
//! - Printing them for the `status` command

pub mod stats;

pub use stats::{load_statistics, print_statistics, PipelineStatistics};
