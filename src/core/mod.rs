//! core
//!
//! Core domain types and run configuration.
//!
//! # Modules
//!
//! - [`types`] - Scan records, statuses, manifest candidates, modes
//! - [`config`] - The resolved run [`config::Context`]
//! - [`state`] - The `async_init` -> `async_result` state file
//!
//! # Design Principles
//!
//! - Raw server strings are interpreted once, into enums
//! - Configuration is validated before any network call

pub mod config;
pub mod state;
pub mod types;
