//! soos-sca - upload dependency manifests to SOOS SCA and gate CI builds
//!
//! A single-binary client that finds package manifests in a source tree,
//! uploads them to the SOOS software composition analysis service, starts an
//! analysis and waits for its verdict.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Drives a scan: create, upload, start, poll
//! - [`manifest`] - Manifest discovery and exclusion rules
//! - [`api`] - Abstraction over the remote SOOS service
//! - [`core`] - Domain types, run configuration, async state file
//! - [`ui`] - Logging setup, final summary, exit codes
//!
//! # Correctness Invariants
//!
//! 1. At most 50 manifests are uploaded per scan
//! 2. The poll loop never outlives its wall-clock limit by more than one interval
//! 3. A scan the client gives up on is patched `Incomplete` or `Error` first
//! 4. The API key is never logged

pub mod api;
pub mod cli;
pub mod core;
pub mod engine;
pub mod manifest;
pub mod ui;
