//! engine
//!
//! Drives a scan from creation to a terminal outcome.
//!
//! # Architecture
//!
//! ```text
//! runner::run -> lifecycle (create, upload, start, poll) -> ScaApi
//!                    |
//!                    +-> retry (counted attempts per call)
//! ```
//!
//! The engine owns every remote call of a run and every decision about
//! retrying, patching the scan, and giving up. It never touches the
//! process: exit codes and log setup belong to the CLI layer.
//!
//! # Modules
//!
//! - [`retry`] - Counted retries with per-call retry predicates
//! - [`lifecycle`] - The scan state machine
//! - [`runner`] - Mode dispatch (`run_and_wait`, `async_init`, `async_result`)

pub mod lifecycle;
pub mod retry;
pub mod runner;

pub use lifecycle::{LifecycleConfig, LifecycleError, LifecycleState, ScanLifecycle};
pub use runner::{run, Outcome, RunError};
