//! ui
//!
//! Everything the user sees.
//!
//! # Modules
//!
//! - [`logging`] - Tracing subscriber setup
//! - [`report`] - Final summary lines and exit codes
//!
//! # Design
//!
//! All output is log lines; there is no interactive mode. Library code logs
//! through `tracing` and never prints directly.

pub mod logging;
pub mod report;
