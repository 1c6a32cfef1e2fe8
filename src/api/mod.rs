//! api
//!
//! Abstraction over the remote SOOS SCA service.
//!
//! # Architecture
//!
//! The [`ScaApi`] trait defines every call the scan lifecycle makes. The
//! lifecycle never names a concrete client, so production code runs against
//! [`http::HttpScaApi`] and tests against [`mock::MockScaApi`].
//!
//! # Modules
//!
//! - `traits`: `ScaApi` trait, `ApiError`, request/response records
//! - [`http`]: reqwest implementation against the SOOS REST API
//! - [`mock`]: scripted implementation for deterministic testing
//! - [`release`]: latest-release lookup for the version check

pub mod http;
pub mod mock;
pub mod release;
mod traits;

pub use http::HttpScaApi;
pub use traits::*;
