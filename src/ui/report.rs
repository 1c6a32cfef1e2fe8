//! ui::report
//!
//! Final summary lines and the process exit code.
//!
//! # Exit codes
//!
//! | Verdict | fail_the_build | continue_on_failure |
//! |---------|----------------|---------------------|
//! | Success | 0 | 0 |
//! | ReportedFailure | 1 | 0 |
//! | Fatal | 1 | 1 |
//!
//! A reported failure is one the service or the client recorded on the
//! scan: a `failed*` analysis, an `Incomplete`/`Error` patch, or a
//! configuration error. Everything that aborted the run is fatal.

use tracing::{error, info, warn};

use crate::core::config::ConfigError;
use crate::core::types::{AnalysisResult, OnFailure};
use crate::engine::{Outcome, RunError};

/// Classification of how a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Success,
    ReportedFailure,
    Fatal,
}

impl Verdict {
    pub fn of(result: &Result<Outcome, RunError>) -> Self {
        match result {
            Ok(Outcome::Finished(_)) | Ok(Outcome::AsyncStarted { .. }) => Verdict::Success,
            Ok(Outcome::AnalysisFailed(_)) | Ok(Outcome::ScanReported { .. }) => {
                Verdict::ReportedFailure
            }
            Err(_) => Verdict::Fatal,
        }
    }

    /// Exit code under `on_failure`.
    pub fn exit_code(self, on_failure: OnFailure) -> u8 {
        match (self, on_failure) {
            (Verdict::Success, _) => 0,
            (Verdict::ReportedFailure, OnFailure::FailTheBuild) => 1,
            (Verdict::ReportedFailure, OnFailure::ContinueOnFailure) => 0,
            (Verdict::Fatal, _) => 1,
        }
    }
}

/// Log the end of a run and return the exit code.
pub fn finish(result: &Result<Outcome, RunError>, on_failure: OnFailure) -> u8 {
    match result {
        Ok(Outcome::Finished(analysis)) => {
            log_counts(analysis);
            info!("Analysis Completed Successfully");
        }
        Ok(Outcome::AnalysisFailed(analysis)) => {
            log_counts(analysis);
            info!("Analysis complete - Failures reported.");
            log_policy(on_failure);
        }
        Ok(Outcome::ScanReported { status, message }) => {
            warn!("Scan marked {}: {}", status, message);
            log_policy(on_failure);
        }
        Ok(Outcome::AsyncStarted { state_file, .. }) => {
            info!("Async scan started, state saved to {}", state_file.display());
        }
        Err(e) => {
            error!("{}", e);
        }
    }

    Verdict::of(result).exit_code(on_failure)
}

/// Log a configuration error and return the exit code.
pub fn finish_config_error(err: &ConfigError, on_failure: OnFailure) -> u8 {
    error!("{}", err);
    log_policy(on_failure);
    Verdict::ReportedFailure.exit_code(on_failure)
}

fn log_counts(analysis: &AnalysisResult) {
    let vulnerabilities = analysis.vulnerability_count();
    let violations = analysis.violation_count();
    if vulnerabilities > 0 {
        info!("Vulnerabilities: {}", vulnerabilities);
    }
    if violations > 0 {
        info!("Violations: {}", violations);
    }
}

fn log_policy(on_failure: OnFailure) {
    match on_failure {
        OnFailure::FailTheBuild => error!("Failing the build."),
        OnFailure::ContinueOnFailure => warn!("Continuing on failure."),
    }
}
