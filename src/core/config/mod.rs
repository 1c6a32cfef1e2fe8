//! core::config
//!
//! The resolved run configuration.
//!
//! # Precedence
//!
//! Values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. `SOOS_*` environment variables
//! 3. CLI flags
//!
//! clap applies all three while parsing [`Cli`]. [`Context::resolve`] then
//! checks the required values, splits the comma-separated lists and
//! normalises the rest.
//!
//! # Example
//!
//! ```
//! use clap::Parser;
//! use soos_sca::cli::Cli;
//! use soos_sca::core::config::Context;
//!
//! let cli = Cli::try_parse_from([
//!     "soos-sca",
//!     "--project-name", "demo",
//!     "--client-id", "client",
//!     "--api-key", "secret",
//!     "--files-to-exclude", " *.lock, ,composer.json ",
//! ])
//! .unwrap();
//!
//! let ctx = Context::resolve(&cli).unwrap();
//! assert_eq!(ctx.files_to_exclude, vec!["*.lock", "composer.json"]);
//! assert!(!format!("{:?}", ctx).contains("secret"));
//! ```

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::api::http::normalize_base_url;
use crate::api::CreateScanRequest;
use crate::cli::Cli;
use crate::core::state::AsyncState;
use crate::core::types::{Mode, OnFailure};
use crate::engine::lifecycle::LifecycleConfig;

/// File name of the SARIF report.
pub const SARIF_REPORT_FILE: &str = "soos.sarif.json";

/// Errors from configuration resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// One or more required values are missing.
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Optional metadata attached to the scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanMetadata {
    pub branch_name: Option<String>,
    pub branch_uri: Option<String>,
    pub commit_hash: Option<String>,
    pub build_version: Option<String>,
    pub build_uri: Option<String>,
    pub operating_environment: Option<String>,
    pub app_version: Option<String>,
    pub integration_name: String,
    pub integration_type: String,
}

/// Everything one run needs, validated.
#[derive(Clone)]
pub struct Context {
    pub mode: Mode,
    pub on_failure: OnFailure,
    /// Base URL, always ending with `/`
    pub api_base_url: String,
    pub client_id: String,
    api_key: String,
    pub project_name: String,
    /// Where the state file and the SARIF report are written
    pub working_directory: PathBuf,
    /// Where manifests are searched
    pub source_code_path: PathBuf,
    pub dirs_to_exclude: Vec<String>,
    pub files_to_exclude: Vec<String>,
    pub package_managers: Vec<String>,
    pub max_wait: Duration,
    /// Already clamped to the minimum interval
    pub polling_interval: Duration,
    pub metadata: ScanMetadata,
    pub generate_sarif_report: bool,
    pub check_version: bool,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("mode", &self.mode)
            .field("on_failure", &self.on_failure)
            .field("api_base_url", &self.api_base_url)
            .field("client_id", &self.client_id)
            .field("api_key", &"[REDACTED]")
            .field("project_name", &self.project_name)
            .field("working_directory", &self.working_directory)
            .field("source_code_path", &self.source_code_path)
            .field("dirs_to_exclude", &self.dirs_to_exclude)
            .field("files_to_exclude", &self.files_to_exclude)
            .field("package_managers", &self.package_managers)
            .field("max_wait", &self.max_wait)
            .field("polling_interval", &self.polling_interval)
            .field("metadata", &self.metadata)
            .field("generate_sarif_report", &self.generate_sarif_report)
            .field("check_version", &self.check_version)
            .finish()
    }
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl Context {
    /// Validate parsed arguments into a context.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Missing`] lists every required value that is absent
    /// or blank, by environment variable name.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let client_id = non_blank(&cli.client_id);
        let api_key = non_blank(&cli.api_key);
        let project_name = non_blank(&cli.project_name);

        let missing: Vec<String> = [
            ("SOOS_CLIENT_ID", client_id.is_none()),
            ("SOOS_API_KEY", api_key.is_none()),
            ("SOOS_PROJECT_NAME", project_name.is_none()),
        ]
        .iter()
        .filter(|(_, absent)| *absent)
        .map(|(name, _)| name.to_string())
        .collect();

        let (Some(client_id), Some(api_key), Some(project_name)) =
            (client_id, api_key, project_name)
        else {
            return Err(ConfigError::Missing(missing));
        };

        if cli.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue("API base URL is empty".into()));
        }

        let lifecycle = LifecycleConfig::new(
            Duration::from_secs(cli.analysis_result_max_wait),
            Duration::from_secs(cli.analysis_result_polling_interval),
        );

        Ok(Self {
            mode: cli.mode,
            on_failure: cli.on_failure,
            api_base_url: normalize_base_url(cli.api_base_url.trim()),
            client_id,
            api_key,
            project_name,
            working_directory: cli.working_directory.clone(),
            source_code_path: cli
                .source_code_path
                .clone()
                .unwrap_or_else(|| cli.working_directory.clone()),
            dirs_to_exclude: split_list(&cli.dirs_to_exclude),
            files_to_exclude: split_list(&cli.files_to_exclude),
            package_managers: split_list(&cli.package_managers),
            max_wait: lifecycle.max_wait,
            polling_interval: lifecycle.polling_interval,
            metadata: ScanMetadata {
                branch_name: non_blank(&cli.branch_name),
                branch_uri: non_blank(&cli.branch_uri),
                commit_hash: non_blank(&cli.commit_hash),
                build_version: non_blank(&cli.build_version),
                build_uri: non_blank(&cli.build_uri),
                operating_environment: non_blank(&cli.operating_environment),
                app_version: non_blank(&cli.app_version),
                integration_name: cli.integration_name.clone(),
                integration_type: cli.integration_type.clone(),
            },
            generate_sarif_report: cli.generate_sarif_report,
            check_version: cli.check_version,
        })
    }

    /// The API key. Never log the returned value.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Timing and retry knobs for the scan lifecycle.
    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig::new(self.max_wait, self.polling_interval)
    }

    /// Path of the async state file.
    pub fn state_file(&self) -> PathBuf {
        AsyncState::path_in(&self.working_directory)
    }

    /// Path of the SARIF report.
    pub fn sarif_file(&self) -> PathBuf {
        self.working_directory.join(SARIF_REPORT_FILE)
    }

    /// Request body for creating the scan.
    pub fn create_scan_request(&self) -> CreateScanRequest {
        let m = &self.metadata;
        CreateScanRequest {
            project_name: self.project_name.clone(),
            name: m
                .build_version
                .clone()
                .unwrap_or_else(|| chrono::Utc::now().format("%Y%m%d%H%M%S").to_string()),
            integration_name: m.integration_name.clone(),
            integration_type: m.integration_type.clone(),
            script_version: env!("CARGO_PKG_VERSION").to_string(),
            app_version: m.app_version.clone(),
            branch: m.branch_name.clone(),
            branch_uri: m.branch_uri.clone(),
            commit_hash: m.commit_hash.clone(),
            build_version: m.build_version.clone(),
            build_uri: m.build_uri.clone(),
            operating_environment: m.operating_environment.clone(),
        }
    }

    /// Log the effective settings. The API key is left out.
    pub fn log_summary(&self) {
        info!("Mode: {}", self.mode);
        info!("On failure: {}", self.on_failure);
        info!("API base URL: {}", self.api_base_url);
        info!("Project name: {}", self.project_name);
        info!("Source code path: {}", self.source_code_path.display());
        info!("DIRS_TO_EXCLUDE: {}", self.dirs_to_exclude.join(", "));
        info!("FILES_TO_EXCLUDE: {}", self.files_to_exclude.join(", "));
        if !self.package_managers.is_empty() {
            info!("PACKAGE_MANAGERS: {}", self.package_managers.join(", "));
        }
        info!(
            "Analysis result max wait: {}s, polling interval: {}s",
            self.max_wait.as_secs(),
            self.polling_interval.as_secs()
        );
    }
}
