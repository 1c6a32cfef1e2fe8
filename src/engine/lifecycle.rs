//! engine::lifecycle
//!
//! The scan state machine: create, upload, start, poll.
//!
//! # States
//!
//! ```text
//! Initial -> Created -> ManifestsUploaded -> AnalysisStarted -> Polling
//!    |          |              |                   |               |
//!    |          +--> FailedReported (status patched on the scan)   +--> Finished
//!    |                                                             +--> Failed
//!    +-------------------------------------------------------------+--> ErrorFatal
//! ```
//!
//! `FailedReported`, `Finished`, `Failed` and `ErrorFatal` are terminal.
//! [`ScanLifecycle`] only records its current state; the runner drives the
//! steps in order and stops at the first error or reported outcome.
//!
//! # Retry budget
//!
//! | Step | Retried on | Attempts |
//! |------|-----------|----------|
//! | create | everything except parse/config errors | 3 |
//! | upload | everything except parse/config errors | 3 |
//! | start | network errors only | 3 |
//! | poll | network errors in a row, reset by any response | 3 |
//!
//! # Invariants
//!
//! - Every patch is best-effort: a failed `PATCH` is logged, never raised
//! - The poll loop never runs longer than `max_wait`: a slow request is cut
//!   off at the limit and the last sleep is shortened to fit
//! - The API key never appears in anything logged here

use std::fmt;
use std::fs;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, warn};

use super::retry::{retry, Attempt, RetryError, DEFAULT_RETRY_ATTEMPTS};
use crate::api::{ApiError, CreateScanRequest, ManifestFile, ManifestUpload, ScaApi, UploadSummary};
use crate::core::types::{
    AnalysisResult, AnalysisStatus, ManifestCandidate, PackageManagerManifests, ScanSession,
    ScanStatus,
};

/// Smallest polling interval the service accepts.
pub const MIN_POLLING_INTERVAL: Duration = Duration::from_secs(10);

/// Default wall-clock limit for the poll loop.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(300);

/// Message patched onto a scan that received no valid manifests.
pub const NO_MANIFESTS_MESSAGE: &str = "No valid manifests found, cannot continue";

/// Message patched onto a scan whose upload failed.
pub const UPLOAD_ERROR_MESSAGE: &str = "Error uploading manifests";

/// Message patched onto a scan whose analysis could not be started.
pub const START_ERROR_MESSAGE: &str = "Error starting analysis";

/// Timing and retry knobs of one lifecycle run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Attempts per retry-bearing call
    pub retry_attempts: u32,
    /// Delay between two status polls
    pub polling_interval: Duration,
    /// Wall-clock limit for the poll loop
    pub max_wait: Duration,
}

impl LifecycleConfig {
    /// Build a config; the polling interval is clamped to
    /// [`MIN_POLLING_INTERVAL`].
    pub fn new(max_wait: Duration, polling_interval: Duration) -> Self {
        Self {
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            polling_interval: polling_interval.max(MIN_POLLING_INTERVAL),
            max_wait,
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WAIT, MIN_POLLING_INTERVAL)
    }
}

/// Where a scan is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Initial,
    Created,
    ManifestsUploaded,
    AnalysisStarted,
    Polling,
    Finished,
    Failed,
    FailedReported,
    ErrorFatal,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Initial => "initial",
            LifecycleState::Created => "created",
            LifecycleState::ManifestsUploaded => "manifests-uploaded",
            LifecycleState::AnalysisStarted => "analysis-started",
            LifecycleState::Polling => "polling",
            LifecycleState::Finished => "finished",
            LifecycleState::Failed => "failed",
            LifecycleState::FailedReported => "failed-reported",
            LifecycleState::ErrorFatal => "error-fatal",
        };
        write!(f, "{}", name)
    }
}

/// Errors that end a lifecycle run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("failed to fetch manifest patterns: {0}")]
    ManifestPatterns(RetryError),

    #[error("failed to create scan: {0}")]
    CreateScan(RetryError),

    #[error("failed to upload manifests: {0}")]
    Upload(RetryError),

    #[error("failed to start analysis: {0}")]
    StartAnalysis(RetryError),

    #[error("failed to fetch analysis result: {0}")]
    AnalysisResult(ApiError),

    #[error("failed to fetch analysis result: {0}")]
    AnalysisResultRetries(RetryError),

    #[error("analysis result not available after {waited_secs}s (max wait {max_wait_secs}s)")]
    Timeout { waited_secs: u64, max_wait_secs: u64 },
}

impl LifecycleError {
    /// Whether the error came from exhausting a retry budget.
    pub fn is_max_retries(&self) -> bool {
        matches!(
            self,
            LifecycleError::ManifestPatterns(RetryError::Exhausted { .. })
                | LifecycleError::CreateScan(RetryError::Exhausted { .. })
                | LifecycleError::Upload(RetryError::Exhausted { .. })
                | LifecycleError::StartAnalysis(RetryError::Exhausted { .. })
                | LifecycleError::AnalysisResultRetries(RetryError::Exhausted { .. })
        )
    }
}

/// Result of the upload step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// At least one manifest was accepted
    Uploaded(UploadSummary),
    /// The scan was patched with `status`; the run ends here
    Reported { status: ScanStatus, message: String },
}

/// Terminal result of the poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Finished(AnalysisResult),
    Failed(AnalysisResult),
}

impl PollOutcome {
    pub fn result(&self) -> &AnalysisResult {
        match self {
            PollOutcome::Finished(r) | PollOutcome::Failed(r) => r,
        }
    }
}

/// Drives one scan through the remote service.
pub struct ScanLifecycle<'a> {
    api: &'a dyn ScaApi,
    config: LifecycleConfig,
    state: LifecycleState,
}

impl fmt::Debug for ScanLifecycle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanLifecycle")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

fn not_parse_or_config(e: &ApiError) -> bool {
    !matches!(e, ApiError::Parse(_) | ApiError::Config(_))
}

impl<'a> ScanLifecycle<'a> {
    pub fn new(api: &'a dyn ScaApi, config: LifecycleConfig) -> Self {
        Self {
            api,
            config,
            state: LifecycleState::Initial,
        }
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    fn transition(&mut self, next: LifecycleState) {
        debug!("Scan lifecycle: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Fetch the manifest pattern catalogue.
    pub async fn manifest_patterns(
        &mut self,
    ) -> Result<Vec<PackageManagerManifests>, LifecycleError> {
        let api = self.api;
        let result = retry(
            "Get manifest patterns",
            self.config.retry_attempts,
            |_| async move { Attempt::classify(api.manifest_patterns().await, not_parse_or_config) },
        )
        .await;

        result.map_err(|e| {
            self.transition(LifecycleState::ErrorFatal);
            LifecycleError::ManifestPatterns(e)
        })
    }

    /// Create the scan record.
    pub async fn create_scan(
        &mut self,
        request: &CreateScanRequest,
    ) -> Result<ScanSession, LifecycleError> {
        let api = self.api;
        let result = retry("Create scan", self.config.retry_attempts, |_| async move {
            Attempt::classify(api.create_scan(request).await, not_parse_or_config)
        })
        .await;

        match result {
            Ok(session) => {
                info!("Project Hash: {}", session.project_id);
                info!("Branch Hash: {}", session.branch_id);
                info!("Scan Id: {}", session.analysis_id);
                self.transition(LifecycleState::Created);
                Ok(session)
            }
            Err(e) => {
                self.transition(LifecycleState::ErrorFatal);
                Err(LifecycleError::CreateScan(e))
            }
        }
    }

    /// Read the candidates and upload them in one batch.
    ///
    /// Unreadable files are logged and left out. If nothing survives, or
    /// the service accepts none of the manifests, the scan is patched
    /// `Incomplete`. A response that cannot be parsed patches it `Error`.
    /// Running out of retries also patches `Error` and then fails.
    pub async fn upload_manifests(
        &mut self,
        session: &ScanSession,
        candidates: &[ManifestCandidate],
        has_more_than_maximum: bool,
    ) -> Result<UploadOutcome, LifecycleError> {
        let upload = ManifestUpload {
            files: read_manifests(candidates),
            has_more_than_maximum,
        };

        if upload.files.is_empty() {
            return Ok(self
                .report(session, ScanStatus::Incomplete, NO_MANIFESTS_MESSAGE)
                .await);
        }

        info!("Uploading {} manifest files", upload.files.len());
        let api = self.api;
        let upload_ref = &upload;
        let result = retry("Upload manifests", self.config.retry_attempts, |_| async move {
            Attempt::classify(
                api.upload_manifests(session, upload_ref).await,
                not_parse_or_config,
            )
        })
        .await;

        match result {
            Ok(summary) => {
                log_summary(&summary);
                if summary.valid_manifest_count == 0 {
                    Ok(self
                        .report(session, ScanStatus::Incomplete, NO_MANIFESTS_MESSAGE)
                        .await)
                } else {
                    self.transition(LifecycleState::ManifestsUploaded);
                    Ok(UploadOutcome::Uploaded(summary))
                }
            }
            Err(RetryError::Fatal { .. }) => Ok(self
                .report(session, ScanStatus::Error, UPLOAD_ERROR_MESSAGE)
                .await),
            Err(e) => {
                self.patch(session, ScanStatus::Error, UPLOAD_ERROR_MESSAGE)
                    .await;
                self.transition(LifecycleState::ErrorFatal);
                Err(LifecycleError::Upload(e))
            }
        }
    }

    /// Start the analysis.
    ///
    /// Only network failures are retried. A 5xx answer patches the scan
    /// `Error` before failing; any other rejection fails as is.
    pub async fn start_analysis(&mut self, session: &ScanSession) -> Result<(), LifecycleError> {
        let api = self.api;
        let result = retry("Start analysis", self.config.retry_attempts, |_| async move {
            Attempt::classify(api.start_analysis(session).await, ApiError::is_network)
        })
        .await;

        match result {
            Ok(()) => {
                info!("Analysis started");
                self.transition(LifecycleState::AnalysisStarted);
                Ok(())
            }
            Err(e) => {
                if e.api_error().is_server_error() {
                    self.patch(session, ScanStatus::Error, START_ERROR_MESSAGE)
                        .await;
                }
                self.transition(LifecycleState::ErrorFatal);
                Err(LifecycleError::StartAnalysis(e))
            }
        }
    }

    /// Poll `status_url` until the analysis reaches a terminal status.
    ///
    /// Network failures are logged and polling continues, until
    /// `retry_attempts` of them happen in a row. Any HTTP error ends the
    /// loop. So does `max_wait` elapsing, measured from the first poll,
    /// even in the middle of a request.
    pub async fn poll(&mut self, status_url: &str) -> Result<PollOutcome, LifecycleError> {
        self.transition(LifecycleState::Polling);
        let started = Instant::now();
        let interval = self.config.polling_interval;
        let max_attempts = self.config.retry_attempts.max(1);
        let mut network_failures = 0u32;

        loop {
            let remaining = self.config.max_wait.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return Err(self.timed_out(started));
            }

            let response = match timeout(remaining, self.api.analysis_result(status_url)).await {
                Ok(response) => response,
                Err(_) => return Err(self.timed_out(started)),
            };

            match response {
                Ok(result) => {
                    network_failures = 0;
                    match result.analysis_status() {
                        AnalysisStatus::Finished => {
                            self.transition(LifecycleState::Finished);
                            return Ok(PollOutcome::Finished(result));
                        }
                        AnalysisStatus::Failed => {
                            self.transition(LifecycleState::Failed);
                            return Ok(PollOutcome::Failed(result));
                        }
                        AnalysisStatus::Error => {
                            warn!(
                                "Analysis reported an error, checking again in {}s",
                                interval.as_secs()
                            );
                        }
                        AnalysisStatus::Running | AnalysisStatus::Unknown => {
                            info!(
                                "Analysis status: {}. Waiting {}s before checking again",
                                result.status.as_deref().unwrap_or("unknown"),
                                interval.as_secs()
                            );
                        }
                    }
                }
                Err(e) if e.is_network() => {
                    network_failures += 1;
                    if network_failures >= max_attempts {
                        error!(
                            "Get analysis result failed {} times in a row: {}",
                            network_failures, e
                        );
                        self.transition(LifecycleState::ErrorFatal);
                        return Err(LifecycleError::AnalysisResultRetries(
                            RetryError::Exhausted {
                                operation: "Get analysis result".to_string(),
                                attempts: network_failures,
                                last: e,
                            },
                        ));
                    }
                    warn!(
                        "Get analysis result attempt {}/{} failed: {}",
                        network_failures, max_attempts, e
                    );
                }
                Err(e) => {
                    error!("Analysis result request failed: {}", e);
                    self.transition(LifecycleState::ErrorFatal);
                    return Err(LifecycleError::AnalysisResult(e));
                }
            }

            let remaining = self.config.max_wait.saturating_sub(started.elapsed());
            sleep(interval.min(remaining)).await;
        }
    }

    fn timed_out(&mut self, started: Instant) -> LifecycleError {
        error!(
            "Analysis result max wait time ({}s) exceeded",
            self.config.max_wait.as_secs()
        );
        self.transition(LifecycleState::ErrorFatal);
        LifecycleError::Timeout {
            waited_secs: started.elapsed().as_secs(),
            max_wait_secs: self.config.max_wait.as_secs(),
        }
    }

    /// Patch `status` onto the scan and end the run as reported.
    async fn report(
        &mut self,
        session: &ScanSession,
        status: ScanStatus,
        message: &str,
    ) -> UploadOutcome {
        self.patch(session, status, message).await;
        self.transition(LifecycleState::FailedReported);
        UploadOutcome::Reported {
            status,
            message: message.to_string(),
        }
    }

    async fn patch(&self, session: &ScanSession, status: ScanStatus, message: &str) {
        info!("Updating scan status to {}: {}", status, message);
        if let Err(e) = self.api.patch_scan_status(session, status, message).await {
            warn!("Could not update scan status to {}: {}", status, e);
        }
    }
}

/// Read every candidate, leaving out the ones that cannot be read.
fn read_manifests(candidates: &[ManifestCandidate]) -> Vec<ManifestFile> {
    candidates
        .iter()
        .filter_map(|candidate| match fs::read_to_string(&candidate.file_path) {
            Ok(contents) => Some(ManifestFile {
                file_name: candidate.file_name(),
                parent_folder: candidate.parent_folder.clone(),
                contents,
            }),
            Err(e) => {
                warn!(
                    "Could not read manifest {}: {}",
                    candidate.file_path.display(),
                    e
                );
                None
            }
        })
        .collect()
}

fn log_summary(summary: &UploadSummary) {
    if let Some(message) = &summary.message {
        info!("{}", message);
    }
    for manifest in &summary.manifests {
        let name = manifest
            .filename
            .as_deref()
            .or(manifest.name.as_deref())
            .unwrap_or("<unnamed>");
        let status = manifest.status.as_deref().unwrap_or("unknown");
        let detail = manifest.status_message.as_deref().unwrap_or("");
        if status.eq_ignore_ascii_case("valid") {
            info!("Manifest {}: {} {}", name, status, detail);
        } else {
            warn!("Manifest {}: {} {}", name, status, detail);
        }
    }
    info!(
        "Valid manifests: {}, invalid manifests: {}",
        summary.valid_manifest_count, summary.invalid_manifest_count
    );
}
