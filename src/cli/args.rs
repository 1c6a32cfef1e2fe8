//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Sources
//!
//! Every flag has a fixed `SOOS_*` environment variable. clap resolves each
//! value as: command line, then environment, then the default below. The
//! camelCase spellings accepted by earlier releases of the script
//! (`--clientId`, `--dirsToExclude`, ...) are kept as aliases.
//!
//! Required values (`--project-name`, `--client-id`, `--api-key`) are
//! optional here so that [`crate::core::config::Context::resolve`] can
//! report every missing one at once.

use clap::Parser;
use std::path::PathBuf;

use crate::core::types::{Mode, OnFailure};

/// SOOS SCA - upload dependency manifests and gate the build on the result
#[derive(Parser, Debug, Clone)]
#[command(name = "soos-sca")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Pipeline mode
    #[arg(long, env = "SOOS_MODE", value_enum, default_value_t = Mode::RunAndWait)]
    pub mode: Mode,

    /// What a reported failure does to the exit code
    #[arg(
        long,
        alias = "onFailure",
        env = "SOOS_ON_FAILURE",
        value_enum,
        default_value_t = OnFailure::ContinueOnFailure
    )]
    pub on_failure: OnFailure,

    /// Comma-separated directory names to exclude
    #[arg(
        long,
        alias = "dirsToExclude",
        env = "SOOS_DIRS_TO_EXCLUDE",
        default_value = "soos"
    )]
    pub dirs_to_exclude: String,

    /// Comma-separated file names or wildcard patterns to exclude
    #[arg(
        long,
        alias = "filesToExclude",
        env = "SOOS_FILES_TO_EXCLUDE",
        default_value = ""
    )]
    pub files_to_exclude: String,

    /// Comma-separated package managers to search for (default: all)
    #[arg(
        long,
        alias = "packageManagers",
        env = "SOOS_PACKAGE_MANAGERS",
        default_value = ""
    )]
    pub package_managers: String,

    /// Directory for the async state file and the SARIF report
    #[arg(
        long,
        alias = "workingDirectory",
        env = "SOOS_WORKING_DIRECTORY",
        default_value = "."
    )]
    pub working_directory: PathBuf,

    /// Directory searched for manifests (default: working directory)
    #[arg(long, alias = "sourceCodePath", env = "SOOS_SOURCE_CODE_PATH")]
    pub source_code_path: Option<PathBuf>,

    /// Maximum seconds to wait for the analysis result
    #[arg(
        long,
        alias = "analysisResultMaxWait",
        env = "SOOS_ANALYSIS_RESULT_MAX_WAIT",
        default_value_t = 300
    )]
    pub analysis_result_max_wait: u64,

    /// Seconds between two result polls (at least 10)
    #[arg(
        long,
        alias = "analysisResultPollingInterval",
        env = "SOOS_ANALYSIS_RESULT_POLLING_INTERVAL",
        default_value_t = 10
    )]
    pub analysis_result_polling_interval: u64,

    /// SOOS API base URL
    #[arg(
        long,
        alias = "apiURL",
        env = "SOOS_API_BASE_URL",
        default_value = "https://api.soos.io/api/"
    )]
    pub api_base_url: String,

    /// Project name shown in the SOOS app
    #[arg(long, alias = "projectName", env = "SOOS_PROJECT_NAME")]
    pub project_name: Option<String>,

    /// SOOS client id
    #[arg(long, alias = "clientId", env = "SOOS_CLIENT_ID")]
    pub client_id: Option<String>,

    /// SOOS API key
    #[arg(long, alias = "apiKey", env = "SOOS_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Branch the scan belongs to
    #[arg(long, alias = "branchName", env = "SOOS_BRANCH_NAME")]
    pub branch_name: Option<String>,

    /// Link to the branch
    #[arg(long, alias = "branchUri", env = "SOOS_BRANCH_URI")]
    pub branch_uri: Option<String>,

    /// Commit the scan was run on
    #[arg(long, alias = "commitHash", env = "SOOS_COMMIT_HASH")]
    pub commit_hash: Option<String>,

    /// Build version
    #[arg(long, alias = "buildVersion", env = "SOOS_BUILD_VERSION")]
    pub build_version: Option<String>,

    /// Link to the build
    #[arg(long, alias = "buildUri", env = "SOOS_BUILD_URI")]
    pub build_uri: Option<String>,

    /// Operating environment of the build
    #[arg(long, alias = "operatingEnvironment", env = "SOOS_OPERATING_ENVIRONMENT")]
    pub operating_environment: Option<String>,

    /// Version of the calling application
    #[arg(long, alias = "appVersion", env = "SOOS_APP_VERSION")]
    pub app_version: Option<String>,

    /// Integration name reported with the scan
    #[arg(
        long,
        alias = "integrationName",
        env = "SOOS_INTEGRATION_NAME",
        default_value = "Script"
    )]
    pub integration_name: String,

    /// Integration type reported with the scan
    #[arg(
        long,
        alias = "integrationType",
        env = "SOOS_INTEGRATION_TYPE",
        default_value = "Script"
    )]
    pub integration_type: String,

    /// Fetch the SARIF report after the analysis and write soos.sarif.json
    #[arg(long, alias = "generateSarifReport", env = "SOOS_GENERATE_SARIF_REPORT")]
    pub generate_sarif_report: bool,

    /// Warn when a newer release is available
    #[arg(long, env = "SOOS_CHECK_VERSION")]
    pub check_version: bool,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, alias = "logLevel", env = "SOOS_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["soos-sca"]).unwrap();
        assert_eq!(cli.mode, Mode::RunAndWait);
        assert_eq!(cli.on_failure, OnFailure::ContinueOnFailure);
        assert_eq!(cli.dirs_to_exclude, "soos");
        assert_eq!(cli.analysis_result_max_wait, 300);
        assert_eq!(cli.analysis_result_polling_interval, 10);
        assert_eq!(cli.integration_type, "Script");
        assert!(!cli.generate_sarif_report);
    }

    #[test]
    fn parses_modes_and_legacy_aliases() {
        let cli = Cli::try_parse_from([
            "soos-sca",
            "--mode",
            "async_init",
            "--onFailure",
            "fail_the_build",
            "--clientId",
            "abc",
        ])
        .unwrap();
        assert_eq!(cli.mode, Mode::AsyncInit);
        assert_eq!(cli.on_failure, OnFailure::FailTheBuild);
        assert_eq!(cli.client_id.as_deref(), Some("abc"));
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["soos-sca", "--mode", "later"]).is_err());
    }
}
