//! core::state
//!
//! The state file that carries a scan from `async_init` to `async_result`.
//!
//! # Format
//!
//! `<working_directory>/soos_async.json`:
//!
//! ```json
//! { "report_status_url": "https://api.soos.io/api/clients/.../analysis/..." }
//! ```
//!
//! # Invariants
//!
//! - Writes are atomic (write to temp file, then rename)
//! - A missing or malformed file is an error, never an empty state

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name of the async state file.
pub const ASYNC_STATE_FILE: &str = "soos_async.json";

/// Errors reading or writing the state file.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("cannot read state file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid state file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("cannot write state file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What `async_init` leaves behind for `async_result`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncState {
    /// URL polled for the analysis result
    pub report_status_url: String,
}

impl AsyncState {
    pub fn new(report_status_url: impl Into<String>) -> Self {
        Self {
            report_status_url: report_status_url.into(),
        }
    }

    /// Path of the state file inside `working_directory`.
    pub fn path_in(working_directory: &Path) -> PathBuf {
        working_directory.join(ASYNC_STATE_FILE)
    }

    /// Load the state from `path`.
    pub fn load(path: &Path) -> Result<Self, StateError> {
        let contents = fs::read_to_string(path).map_err(|source| StateError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let state: AsyncState =
            serde_json::from_str(&contents).map_err(|e| StateError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        if state.report_status_url.trim().is_empty() {
            return Err(StateError::Parse {
                path: path.to_path_buf(),
                message: "report_status_url is empty".into(),
            });
        }

        Ok(state)
    }

    /// Save the state to `path`, replacing any previous file.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let write_err = |source| StateError::Write {
            path: path.to_path_buf(),
            source,
        };

        let json = serde_json::to_string(self).map_err(|e| StateError::Write {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, json).map_err(write_err)?;
        fs::rename(&temp_path, path).map_err(write_err)?;
        Ok(())
    }
}
