//! engine::retry
//!
//! Counted retries for API calls.
//!
//! # Design
//!
//! An operation reports each attempt as an [`Attempt`]: success, a failure
//! worth another try, or a failure that ends the loop at once. [`retry`]
//! runs the operation until it succeeds, fails fatally, or uses up
//! `max_attempts`. Nothing here sleeps or exits the process; the HTTP call
//! itself is the only delay between attempts.
//!
//! # Example
//!
//! ```
//! use soos_sca::api::ApiError;
//! use soos_sca::engine::retry::{retry, Attempt, RetryError};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let result: Result<u32, RetryError> = retry("demo", 3, |attempt| async move {
//!     if attempt < 3 {
//!         Attempt::Retryable(ApiError::Network("reset".into()))
//!     } else {
//!         Attempt::Success(attempt)
//!     }
//! })
//! .await;
//! assert_eq!(result.unwrap(), 3);
//! # });
//! ```

use std::future::Future;

use thiserror::Error;
use tracing::{error, warn};

use crate::api::ApiError;

/// Number of attempts for every retry-bearing call.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Outcome of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    /// The call succeeded
    Success(T),
    /// The call failed and may be tried again
    Retryable(ApiError),
    /// The call failed in a way another attempt cannot fix
    Fatal(ApiError),
}

impl<T> Attempt<T> {
    /// Classify a call result; `retry_on` decides which errors are retryable.
    pub fn classify(result: Result<T, ApiError>, retry_on: impl Fn(&ApiError) -> bool) -> Self {
        match result {
            Ok(value) => Attempt::Success(value),
            Err(e) if retry_on(&e) => Attempt::Retryable(e),
            Err(e) => Attempt::Fatal(e),
        }
    }
}

/// Final failure of a retried operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError {
    /// Every attempt failed with a retryable error.
    #[error("{operation}: max retries exceeded after {attempts} attempts: {last}")]
    Exhausted {
        operation: String,
        attempts: u32,
        last: ApiError,
    },

    /// An attempt failed with a non-retryable error.
    #[error("{operation}: {error}")]
    Fatal { operation: String, error: ApiError },
}

impl RetryError {
    /// The API error that ended the loop.
    pub fn api_error(&self) -> &ApiError {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Fatal { error, .. } => error,
        }
    }
}

/// Run `op` up to `max_attempts` times.
///
/// The closure receives the 1-based attempt number. Application errors are
/// logged with their code and message as they happen.
pub async fn retry<T, F, Fut>(
    operation: &str,
    max_attempts: u32,
    mut op: F,
) -> Result<T, RetryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut last = None;

    for attempt in 1..=max_attempts {
        match op(attempt).await {
            Attempt::Success(value) => return Ok(value),
            Attempt::Retryable(e) => {
                log_failure(operation, attempt, max_attempts, &e);
                last = Some(e);
            }
            Attempt::Fatal(e) => {
                error!("{} failed: {}", operation, e);
                return Err(RetryError::Fatal {
                    operation: operation.to_string(),
                    error: e,
                });
            }
        }
    }

    Err(RetryError::Exhausted {
        operation: operation.to_string(),
        attempts: max_attempts,
        last: last.unwrap_or_else(|| ApiError::Network("no attempt was made".into())),
    })
}

fn log_failure(operation: &str, attempt: u32, max_attempts: u32, e: &ApiError) {
    match e {
        ApiError::Application { code, message, .. } => warn!(
            "{} attempt {}/{} rejected: {} - {}",
            operation, attempt, max_attempts, code, message
        ),
        other => warn!(
            "{} attempt {}/{} failed: {}",
            operation, attempt, max_attempts, other
        ),
    }
}
