//! api::traits
//!
//! The `ScaApi` trait and the wire records exchanged with the SOOS service.
//!
//! # Design
//!
//! The trait is async because every call is network I/O. The scan
//! lifecycle only talks to `&dyn ScaApi`, so the HTTP implementation and
//! the in-memory mock are interchangeable.
//!
//! Response records keep only the fields the client reads. Unknown fields
//! are dropped by serde; a body that does not parse becomes
//! [`ApiError::Parse`] instead of a silently empty value.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{AnalysisResult, PackageManagerManifests, ScanSession, ScanStatus};

/// Errors from SOOS API calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Network, DNS, TLS or timeout failure before a response arrived.
    #[error("network error: {0}")]
    Network(String),

    /// The service answered with a structured error body.
    #[error("API error {status}: {code} - {message}")]
    Application {
        /// HTTP status code
        status: u16,
        /// Error code from the body
        code: String,
        /// Error message from the body
        message: String,
    },

    /// 5xx response without a structured error body.
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Any other non-success response.
    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body was missing or could not be parsed.
    #[error("invalid response: {0}")]
    Parse(String),

    /// The client could not be built (bad API key characters, TLS setup).
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl ApiError {
    /// HTTP status carried by the error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Application { status, .. }
            | ApiError::Server { status, .. }
            | ApiError::Status { status, .. } => Some(*status),
            ApiError::Network(_) | ApiError::Parse(_) | ApiError::Config(_) => None,
        }
    }

    /// Whether the failure happened at the transport level.
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }

    /// Whether the service answered with a 5xx status.
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| s >= 500)
    }
}

/// Metadata sent when creating a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScanRequest {
    pub project_name: String,
    pub name: String,
    pub integration_name: String,
    pub integration_type: String,
    pub script_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operating_environment: Option<String>,
}

/// One manifest prepared for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestFile {
    /// File name sent with the part
    pub file_name: String,
    /// Base name of the containing directory
    pub parent_folder: String,
    /// File contents
    pub contents: String,
}

/// The batch of manifests sent in one upload request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestUpload {
    pub files: Vec<ManifestFile>,
    /// More manifests were found than the per-scan limit
    pub has_more_than_maximum: bool,
}

/// Per-manifest verdict in the upload response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadedManifest {
    pub name: Option<String>,
    pub filename: Option<String>,
    pub package_manager: Option<String>,
    pub status: Option<String>,
    pub status_message: Option<String>,
}

/// Body of the upload response.
///
/// The service may return this body with a 400 status when none of the
/// manifests were valid; it is still a summary, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub manifests: Vec<UploadedManifest>,
    pub valid_manifest_count: u64,
    #[serde(default)]
    pub invalid_manifest_count: u64,
}

/// The remote SCA service.
///
/// # Error Handling
///
/// Implementations map transport failures to [`ApiError::Network`] and
/// non-success responses to the status-bearing variants. Retry decisions
/// are left to the caller.
#[async_trait]
pub trait ScaApi: Send + Sync {
    /// Manifest patterns for every supported package manager.
    async fn manifest_patterns(&self) -> Result<Vec<PackageManagerManifests>, ApiError>;

    /// Create a scan record and return its identifiers.
    async fn create_scan(&self, request: &CreateScanRequest) -> Result<ScanSession, ApiError>;

    /// Upload a batch of manifests in one request.
    async fn upload_manifests(
        &self,
        session: &ScanSession,
        upload: &ManifestUpload,
    ) -> Result<UploadSummary, ApiError>;

    /// Start the analysis of the uploaded manifests.
    async fn start_analysis(&self, session: &ScanSession) -> Result<(), ApiError>;

    /// Fetch the current analysis state from a status URL.
    async fn analysis_result(&self, status_url: &str) -> Result<AnalysisResult, ApiError>;

    /// Record a terminal client-side status on the scan.
    async fn patch_scan_status(
        &self,
        session: &ScanSession,
        status: ScanStatus,
        message: &str,
    ) -> Result<(), ApiError>;

    /// Fetch the SARIF document for a finished scan.
    async fn sarif_report(&self, session: &ScanSession) -> Result<serde_json::Value, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        let server = ApiError::Server {
            status: 502,
            message: "bad gateway".into(),
        };
        assert_eq!(server.status(), Some(502));
        assert!(server.is_server_error());
        assert!(!server.is_network());

        let app = ApiError::Application {
            status: 400,
            code: "InvalidProject".into(),
            message: "bad".into(),
        };
        assert!(!app.is_server_error());

        assert!(ApiError::Network("reset".into()).is_network());
        assert_eq!(ApiError::Parse("empty".into()).status(), None);
    }

    #[test]
    fn create_scan_request_omits_missing_metadata() {
        let request = CreateScanRequest {
            project_name: "demo".into(),
            name: "build-1".into(),
            integration_name: "Script".into(),
            integration_type: "Script".into(),
            script_version: "0.3.0".into(),
            branch: Some("main".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["projectName"], "demo");
        assert_eq!(json["branch"], "main");
        assert!(json.get("commitHash").is_none());
    }

    #[test]
    fn upload_summary_requires_valid_count() {
        let ok: Result<UploadSummary, _> =
            serde_json::from_str(r#"{"validManifestCount": 2, "manifests": []}"#);
        assert_eq!(ok.unwrap().valid_manifest_count, 2);

        let missing: Result<UploadSummary, _> = serde_json::from_str(r#"{"message": "x"}"#);
        assert!(missing.is_err());
    }
}
