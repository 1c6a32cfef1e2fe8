//! api::http
//!
//! SOOS REST implementation of [`ScaApi`].
//!
//! # Endpoints
//!
//! All paths are relative to the configured base URL (default
//! `https://api.soos.io/api/`):
//!
//! | Call | Method | Path |
//! |---|---|---|
//! | manifest patterns | GET | `clients/{client}/manifests` |
//! | create scan | POST | `clients/{client}/scan-types/sca/scans` |
//! | upload manifests | POST (multipart) | `clients/{client}/projects/{project}/analysis/{analysis}/manifests` |
//! | start analysis | PUT | `clients/{client}/projects/{project}/analysis/{analysis}` |
//! | analysis result | GET | status URL returned by create scan |
//! | patch status | PATCH | `clients/{client}/projects/{project}/branches/{branch}/scan-types/sca/scans/{analysis}` |
//! | SARIF report | GET | same as patch status, plus `/formats/sarif` |
//!
//! # Authentication
//!
//! Every request carries the `x-soos-apikey` header. The key is installed
//! once as a default header and is never logged.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{ApiError, CreateScanRequest, ManifestUpload, ScaApi, UploadSummary};
use crate::core::types::{AnalysisResult, PackageManagerManifests, ScanSession, ScanStatus};

/// Default SOOS API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.soos.io/api/";

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-soos-apikey";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = concat!("soos-sca/", env!("CARGO_PKG_VERSION"));

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Structured error body returned by the service.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct PatchStatusBody<'a> {
    status: ScanStatus,
    message: &'a str,
}

/// reqwest-backed SOOS client.
pub struct HttpScaApi {
    /// HTTP client with the API key installed as a default header
    client: Client,
    /// Base URL, always ending in `/`
    base_url: String,
    /// Client (tenant) identifier
    client_id: String,
}

// Custom Debug: the API key lives inside the client's default headers.
impl std::fmt::Debug for HttpScaApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpScaApi")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl HttpScaApi {
    /// Create a client for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if the API key is not a valid header
    /// value or the underlying HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        api_key: &str,
    ) -> Result<Self, ApiError> {
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|_| ApiError::Config("API key contains invalid characters".into()))?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: normalize_base_url(&base_url.into()),
            client_id: client_id.into(),
        })
    }

    /// Build URL for a client-scoped endpoint.
    fn client_url(&self, path: &str) -> String {
        format!("{}clients/{}/{}", self.base_url, self.client_id, path)
    }

    fn analysis_url(&self, session: &ScanSession) -> String {
        self.client_url(&format!(
            "projects/{}/analysis/{}",
            session.project_id, session.analysis_id
        ))
    }

    fn scan_url(&self, session: &ScanSession) -> String {
        self.client_url(&format!(
            "projects/{}/branches/{}/scan-types/sca/scans/{}",
            session.project_id, session.branch_id, session.analysis_id
        ))
    }

    /// Handle API response, mapping errors appropriately.
    async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let status = response.status();
        let body = read_body(response).await?;

        if status.is_success() {
            parse_body(&body)
        } else {
            Err(error_from_body(status, &body))
        }
    }

    /// Handle a response whose body is not needed on success.
    async fn handle_empty_response(response: Response) -> Result<(), ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = read_body(response).await?;
        Err(error_from_body(status, &body))
    }
}

#[async_trait]
impl ScaApi for HttpScaApi {
    async fn manifest_patterns(&self) -> Result<Vec<PackageManagerManifests>, ApiError> {
        let url = self.client_url("manifests");
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await.map_err(network)?;
        Self::handle_response(response).await
    }

    async fn create_scan(&self, request: &CreateScanRequest) -> Result<ScanSession, ApiError> {
        let url = self.client_url("scan-types/sca/scans");
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(network)?;
        Self::handle_response(response).await
    }

    async fn upload_manifests(
        &self,
        session: &ScanSession,
        upload: &ManifestUpload,
    ) -> Result<UploadSummary, ApiError> {
        let url = format!("{}/manifests", self.analysis_url(session));
        debug!("POST {} ({} files)", url, upload.files.len());

        let mut form = Form::new().text(
            "hasMoreThanMaximumManifests",
            upload.has_more_than_maximum.to_string(),
        );
        for (index, file) in upload.files.iter().enumerate() {
            form = form
                .part(
                    format!("file{}", index),
                    Part::text(file.contents.clone()).file_name(file.file_name.clone()),
                )
                .text(format!("parentFolder{}", index), file.parent_folder.clone());
        }

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(network)?;

        let status = response.status();
        let body = read_body(response).await?;

        // A body with validManifestCount is a summary even on a 4xx status.
        match serde_json::from_str::<UploadSummary>(&body) {
            Ok(summary) => Ok(summary),
            Err(e) if status.is_success() => Err(ApiError::Parse(format!(
                "upload response without manifest summary: {}",
                e
            ))),
            Err(_) => Err(error_from_body(status, &body)),
        }
    }

    async fn start_analysis(&self, session: &ScanSession) -> Result<(), ApiError> {
        let url = self.analysis_url(session);
        debug!("PUT {}", url);

        let response = self
            .client
            .put(&url)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(network)?;
        Self::handle_empty_response(response).await
    }

    async fn analysis_result(&self, status_url: &str) -> Result<AnalysisResult, ApiError> {
        debug!("GET {}", status_url);

        let response = self.client.get(status_url).send().await.map_err(network)?;
        let status = response.status();
        let body = read_body(response).await?;

        if status.as_u16() >= 299 {
            return Err(error_from_body(status, &body));
        }
        parse_body(&body)
    }

    async fn patch_scan_status(
        &self,
        session: &ScanSession,
        status: ScanStatus,
        message: &str,
    ) -> Result<(), ApiError> {
        let url = self.scan_url(session);
        debug!("PATCH {} status={}", url, status);

        let response = self
            .client
            .patch(&url)
            .json(&PatchStatusBody { status, message })
            .send()
            .await
            .map_err(network)?;
        Self::handle_empty_response(response).await
    }

    async fn sarif_report(&self, session: &ScanSession) -> Result<serde_json::Value, ApiError> {
        let url = format!("{}/formats/sarif", self.scan_url(session));
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await.map_err(network)?;
        Self::handle_response(response).await
    }
}

/// Ensure the base URL ends with exactly one `/`.
pub fn normalize_base_url(raw: &str) -> String {
    format!("{}/", raw.trim().trim_end_matches('/'))
}

fn network(e: reqwest::Error) -> ApiError {
    ApiError::Network(e.to_string())
}

async fn read_body(response: Response) -> Result<String, ApiError> {
    response.text().await.map_err(network)
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    if body.trim().is_empty() {
        return Err(ApiError::Parse("empty response body".into()));
    }
    serde_json::from_str(body).map_err(|e| ApiError::Parse(e.to_string()))
}

/// Map a non-success response to an [`ApiError`].
fn error_from_body(status: StatusCode, body: &str) -> ApiError {
    let code = status.as_u16();

    if let Ok(ErrorBody {
        code: error_code,
        message,
    }) = serde_json::from_str::<ErrorBody>(body)
    {
        if error_code.is_some() || message.is_some() {
            return ApiError::Application {
                status: code,
                code: error_code.unwrap_or_else(|| status.as_str().to_string()),
                message: message.unwrap_or_default(),
            };
        }
    }

    let message = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        body.trim().chars().take(500).collect()
    };

    if status.is_server_error() {
        ApiError::Server {
            status: code,
            message,
        }
    } else {
        ApiError::Status {
            status: code,
            message,
        }
    }
}
