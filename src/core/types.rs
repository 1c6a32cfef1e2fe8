//! core::types
//!
//! Domain types shared by discovery, the scan lifecycle and reporting.
//!
//! # Types
//!
//! - [`ManifestCandidate`] - A manifest file found on disk, ready for upload
//! - [`PackageManagerManifests`] - Manifest patterns published per package manager
//! - [`ScanSession`] - Identifiers returned when a scan is created
//! - [`AnalysisResult`] - Latest fetched state of a running analysis
//! - [`AnalysisStatus`] - Interpreted server status string
//! - [`ScanStatus`] - Status values we patch back onto a scan
//! - [`Mode`] / [`OnFailure`] - Run mode and failure policy selected on the CLI
//!
//! # Examples
//!
//! ```
//! use soos_sca::core::types::AnalysisStatus;
//!
//! assert_eq!(AnalysisStatus::parse("Finished"), AnalysisStatus::Finished);
//! assert_eq!(AnalysisStatus::parse("FailedWithIssues"), AnalysisStatus::Failed);
//! assert_eq!(AnalysisStatus::parse("error"), AnalysisStatus::Error);
//! assert!(AnalysisStatus::parse("Queued").is_pending());
//! ```

use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Maximum number of manifests uploaded in one scan.
pub const MAX_MANIFESTS: usize = 50;

/// A manifest file discovered under the source root.
///
/// Immutable once created. The label is the base name of the directory
/// that contains the file and is sent alongside the upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestCandidate {
    /// Absolute or root-joined path to the file
    pub file_path: PathBuf,
    /// Package manager whose pattern matched this file
    pub package_manager: String,
    /// Base name of the containing directory
    pub parent_folder: String,
}

impl ManifestCandidate {
    /// File name component of the manifest path.
    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A manifest pattern published by the service for one package manager.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestPattern {
    /// Glob pattern, usually a bare file name such as `package.json`
    pub pattern: String,
    #[serde(default)]
    pub is_lock_file: bool,
}

/// The manifest patterns of one package manager.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManagerManifests {
    /// Package manager name, e.g. `NPM` or `Cargo`
    pub package_manager: String,
    #[serde(default)]
    pub manifests: Vec<ManifestPattern>,
}

/// Identifiers of one server-side scan.
///
/// Created by the create-scan call and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSession {
    /// Client (tenant) identifier
    #[serde(rename = "clientHash")]
    pub client_id: String,
    /// Project identifier, a.k.a. project hash
    #[serde(rename = "projectHash")]
    pub project_id: String,
    /// Branch identifier
    #[serde(rename = "branchHash")]
    pub branch_id: String,
    /// Analysis (scan) identifier
    pub analysis_id: String,
    /// URL polled for the analysis status
    pub scan_status_url: String,
    /// Web URL of the scan report
    #[serde(rename = "scanUrl", default)]
    pub scan_report_url: Option<String>,
}

/// Interpreted analysis status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStatus {
    /// The analysis is queued or still being processed
    Running,
    /// The analysis finished without a failing policy
    Finished,
    /// The analysis finished and reported failures (`failed*`)
    Failed,
    /// The server reported a transient error; keep polling
    Error,
    /// Status missing or not recognised; treated as still running
    Unknown,
}

impl AnalysisStatus {
    /// Interpret a raw status string (case-insensitive).
    pub fn parse(raw: &str) -> Self {
        let status = raw.trim().to_ascii_lowercase();
        match status.as_str() {
            "finished" => AnalysisStatus::Finished,
            "error" => AnalysisStatus::Error,
            "queued" | "running" | "manifest" => AnalysisStatus::Running,
            s if s.starts_with("failed") => AnalysisStatus::Failed,
            _ => AnalysisStatus::Unknown,
        }
    }

    /// Whether the poll loop must keep waiting on this status.
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            AnalysisStatus::Running | AnalysisStatus::Error | AnalysisStatus::Unknown
        )
    }
}

/// Issue counter as returned by the analysis endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct IssueCount {
    #[serde(default)]
    pub count: u64,
}

/// Latest analysis state fetched from the status URL.
///
/// Only the recognised fields are kept; everything else in the response
/// body is discarded during deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnalysisResult {
    /// Raw status string as sent by the server
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub vulnerabilities: Option<IssueCount>,
    #[serde(default)]
    pub violations: Option<IssueCount>,
}

impl AnalysisResult {
    /// Interpreted status; a missing status counts as unknown.
    pub fn analysis_status(&self) -> AnalysisStatus {
        self.status
            .as_deref()
            .map(AnalysisStatus::parse)
            .unwrap_or(AnalysisStatus::Unknown)
    }

    pub fn vulnerability_count(&self) -> u64 {
        self.vulnerabilities.map(|v| v.count).unwrap_or(0)
    }

    pub fn violation_count(&self) -> u64 {
        self.violations.map(|v| v.count).unwrap_or(0)
    }
}

/// Status values written back onto a scan when the client gives up on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScanStatus {
    /// No valid manifests reached the server
    Incomplete,
    /// The client hit an error it could not recover from
    Error,
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanStatus::Incomplete => write!(f, "Incomplete"),
            ScanStatus::Error => write!(f, "Error"),
        }
    }
}

/// How the pipeline is split across process invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Mode {
    /// Start the scan and wait for its result in one process
    #[default]
    #[value(name = "run_and_wait")]
    RunAndWait,
    /// Start the scan and persist the status URL for a later invocation
    #[value(name = "async_init")]
    AsyncInit,
    /// Resume polling from the persisted status URL
    #[value(name = "async_result")]
    AsyncResult,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::RunAndWait => write!(f, "run_and_wait"),
            Mode::AsyncInit => write!(f, "async_init"),
            Mode::AsyncResult => write!(f, "async_result"),
        }
    }
}

/// What a reported failure does to the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OnFailure {
    /// Exit non-zero when the analysis reports failures
    #[value(name = "fail_the_build")]
    FailTheBuild,
    /// Log the failure and exit zero
    #[default]
    #[value(name = "continue_on_failure")]
    ContinueOnFailure,
}

impl fmt::Display for OnFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OnFailure::FailTheBuild => write!(f, "fail_the_build"),
            OnFailure::ContinueOnFailure => write!(f, "continue_on_failure"),
        }
    }
}
