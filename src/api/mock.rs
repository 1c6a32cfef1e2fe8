//! api::mock
//!
//! Scripted in-memory [`ScaApi`] for deterministic lifecycle tests.
//!
//! # Design
//!
//! Each operation has a queue of scripted responses. A call pops the next
//! response; when only one is left it is returned for every further call,
//! so a single `push_poll` acts as a steady state. With nothing scripted the
//! mock behaves like a healthy service. Every call is recorded.
//!
//! # Example
//!
//! ```
//! use soos_sca::api::mock::{MockOperation, MockScaApi};
//! use soos_sca::api::{ApiError, ScaApi};
//!
//! # tokio_test_block_on(async {
//! let api = MockScaApi::new()
//!     .push_start(Err(ApiError::Network("reset".into())))
//!     .push_start(Ok(()));
//!
//! let session = MockScaApi::session();
//! assert!(api.start_analysis(&session).await.is_err());
//! assert!(api.start_analysis(&session).await.is_ok());
//! assert_eq!(api.count(|op| matches!(op, MockOperation::StartAnalysis)), 2);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::traits::{ApiError, CreateScanRequest, ManifestUpload, ScaApi, UploadSummary};
use crate::core::types::{
    AnalysisResult, IssueCount, ManifestPattern, PackageManagerManifests, ScanSession, ScanStatus,
};

/// Mock SOOS service.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Debug, Clone, Default)]
pub struct MockScaApi {
    inner: Arc<Mutex<MockInner>>,
}

#[derive(Debug, Default)]
struct MockInner {
    catalogue: Option<Vec<PackageManagerManifests>>,
    create: VecDeque<Result<ScanSession, ApiError>>,
    upload: VecDeque<Result<UploadSummary, ApiError>>,
    start: VecDeque<Result<(), ApiError>>,
    poll: VecDeque<Result<AnalysisResult, ApiError>>,
    poll_delay: Option<Duration>,
    operations: Vec<MockOperation>,
}

/// Recorded call for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    ManifestPatterns,
    CreateScan {
        project_name: String,
    },
    UploadManifests {
        file_names: Vec<String>,
        has_more_than_maximum: bool,
    },
    StartAnalysis,
    AnalysisResult {
        status_url: String,
    },
    PatchScanStatus {
        status: ScanStatus,
        message: String,
    },
    SarifReport,
}

/// Pop the next scripted response, keeping the last one sticky.
fn next<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

impl MockScaApi {
    /// Create a mock that behaves like a healthy service.
    pub fn new() -> Self {
        Self::default()
    }

    /// The session returned when no create response is scripted.
    pub fn session() -> ScanSession {
        ScanSession {
            client_id: "client-1".into(),
            project_id: "project-1".into(),
            branch_id: "branch-1".into(),
            analysis_id: "analysis-1".into(),
            scan_status_url: "https://api.example.test/status/analysis-1".into(),
            scan_report_url: Some("https://app.example.test/scan/analysis-1".into()),
        }
    }

    /// Build an analysis result with the given status and counts.
    pub fn result(status: &str, vulnerabilities: u64, violations: u64) -> AnalysisResult {
        AnalysisResult {
            status: Some(status.to_string()),
            vulnerabilities: Some(IssueCount {
                count: vulnerabilities,
            }),
            violations: Some(IssueCount { count: violations }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockInner> {
        // A poisoned lock only happens after a test already panicked.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the manifest pattern catalogue.
    pub fn with_catalogue(self, catalogue: Vec<PackageManagerManifests>) -> Self {
        self.lock().catalogue = Some(catalogue);
        self
    }

    pub fn push_create(self, response: Result<ScanSession, ApiError>) -> Self {
        self.lock().create.push_back(response);
        self
    }

    pub fn push_upload(self, response: Result<UploadSummary, ApiError>) -> Self {
        self.lock().upload.push_back(response);
        self
    }

    pub fn push_start(self, response: Result<(), ApiError>) -> Self {
        self.lock().start.push_back(response);
        self
    }

    pub fn push_poll(self, response: Result<AnalysisResult, ApiError>) -> Self {
        self.lock().poll.push_back(response);
        self
    }

    /// Make every status poll take `delay` before it answers.
    pub fn with_poll_delay(self, delay: Duration) -> Self {
        self.lock().poll_delay = Some(delay);
        self
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.lock().operations.clone()
    }

    /// Count recorded operations matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&MockOperation) -> bool) -> usize {
        self.lock().operations.iter().filter(|&op| predicate(op)).count()
    }

    fn record(&self, op: MockOperation) {
        self.lock().operations.push(op);
    }
}

fn default_catalogue() -> Vec<PackageManagerManifests> {
    let pm = |name: &str, patterns: &[&str]| PackageManagerManifests {
        package_manager: name.to_string(),
        manifests: patterns
            .iter()
            .map(|p| ManifestPattern {
                pattern: p.to_string(),
                is_lock_file: p.ends_with(".lock"),
            })
            .collect(),
    };
    vec![
        pm("NPM", &["package.json", "package-lock.json"]),
        pm("Cargo", &["Cargo.toml", "Cargo.lock"]),
        pm("Dart", &["pubspec.yaml", "pubspec.lock"]),
        pm("PHP", &["composer.json", "composer.lock"]),
    ]
}

#[async_trait]
impl ScaApi for MockScaApi {
    async fn manifest_patterns(&self) -> Result<Vec<PackageManagerManifests>, ApiError> {
        self.record(MockOperation::ManifestPatterns);
        Ok(self.lock().catalogue.clone().unwrap_or_else(default_catalogue))
    }

    async fn create_scan(&self, request: &CreateScanRequest) -> Result<ScanSession, ApiError> {
        self.record(MockOperation::CreateScan {
            project_name: request.project_name.clone(),
        });
        next(&mut self.lock().create).unwrap_or_else(|| Ok(Self::session()))
    }

    async fn upload_manifests(
        &self,
        _session: &ScanSession,
        upload: &ManifestUpload,
    ) -> Result<UploadSummary, ApiError> {
        self.record(MockOperation::UploadManifests {
            file_names: upload.files.iter().map(|f| f.file_name.clone()).collect(),
            has_more_than_maximum: upload.has_more_than_maximum,
        });
        next(&mut self.lock().upload).unwrap_or_else(|| {
            Ok(UploadSummary {
                valid_manifest_count: upload.files.len() as u64,
                ..Default::default()
            })
        })
    }

    async fn start_analysis(&self, _session: &ScanSession) -> Result<(), ApiError> {
        self.record(MockOperation::StartAnalysis);
        next(&mut self.lock().start).unwrap_or(Ok(()))
    }

    async fn analysis_result(&self, status_url: &str) -> Result<AnalysisResult, ApiError> {
        self.record(MockOperation::AnalysisResult {
            status_url: status_url.to_string(),
        });
        let delay = self.lock().poll_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        next(&mut self.lock().poll).unwrap_or_else(|| Ok(Self::result("Finished", 0, 0)))
    }

    async fn patch_scan_status(
        &self,
        _session: &ScanSession,
        status: ScanStatus,
        message: &str,
    ) -> Result<(), ApiError> {
        self.record(MockOperation::PatchScanStatus {
            status,
            message: message.to_string(),
        });
        Ok(())
    }

    async fn sarif_report(&self, _session: &ScanSession) -> Result<serde_json::Value, ApiError> {
        self.record(MockOperation::SarifReport);
        Ok(serde_json::json!({ "version": "2.1.0", "runs": [] }))
    }
}
