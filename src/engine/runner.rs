//! engine::runner
//!
//! The single entry point for a run: dispatch on [`Mode`] and drive the
//! scan lifecycle to an [`Outcome`].
//!
//! # Modes
//!
//! ```text
//! run_and_wait: create -> patterns -> discover -> upload -> start -> poll [-> sarif]
//! async_init:   create -> patterns -> discover -> upload -> start -> save state
//! async_result: load state -> poll
//! ```
//!
//! # Invariants
//!
//! - The runner never exits the process; it returns an outcome or an error
//!   and leaves the exit code to the caller
//! - A scan that was patched `Incomplete` or `Error` ends as
//!   [`Outcome::ScanReported`], never as an error
//! - The state file is written only after the analysis has started

use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use super::lifecycle::{LifecycleError, PollOutcome, ScanLifecycle, UploadOutcome};
use crate::api::ScaApi;
use crate::core::config::Context;
use crate::core::state::{AsyncState, StateError};
use crate::core::types::{AnalysisResult, Mode, ScanSession, ScanStatus};
use crate::manifest::{find_manifests, ExclusionRules, SearchOptions};

/// How a run ended, when it did not end in an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The analysis finished
    Finished(AnalysisResult),
    /// The analysis finished with failures (`failed*` status)
    AnalysisFailed(AnalysisResult),
    /// The client patched the scan and stopped
    ScanReported { status: ScanStatus, message: String },
    /// `async_init` started the scan and saved its status URL
    AsyncStarted { status_url: String, state_file: PathBuf },
}

/// Errors from a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// The scan has been started, or reported and stopped.
enum Started {
    Running(ScanSession),
    Reported(Outcome),
}

/// Run the mode selected in `ctx` against `api`.
pub async fn run(ctx: &Context, api: &dyn ScaApi) -> Result<Outcome, RunError> {
    let mut lifecycle = ScanLifecycle::new(api, ctx.lifecycle_config());

    match ctx.mode {
        Mode::RunAndWait => run_and_wait(ctx, api, &mut lifecycle).await,
        Mode::AsyncInit => async_init(ctx, &mut lifecycle).await,
        Mode::AsyncResult => async_result(ctx, &mut lifecycle).await,
    }
}

async fn run_and_wait(
    ctx: &Context,
    api: &dyn ScaApi,
    lifecycle: &mut ScanLifecycle<'_>,
) -> Result<Outcome, RunError> {
    let session = match start_scan(ctx, lifecycle).await? {
        Started::Running(session) => session,
        Started::Reported(outcome) => return Ok(outcome),
    };

    let outcome = lifecycle.poll(&session.scan_status_url).await?;

    if let Some(url) = &session.scan_report_url {
        info!("Scan results: {}", url);
    }

    if ctx.generate_sarif_report {
        write_sarif(ctx, api, &session).await;
    }

    Ok(into_outcome(outcome))
}

async fn async_init(
    ctx: &Context,
    lifecycle: &mut ScanLifecycle<'_>,
) -> Result<Outcome, RunError> {
    let session = match start_scan(ctx, lifecycle).await? {
        Started::Running(session) => session,
        Started::Reported(outcome) => return Ok(outcome),
    };

    let state_file = ctx.state_file();
    AsyncState::new(session.scan_status_url.clone()).save(&state_file)?;
    info!("Analysis request is running, status saved to {}", state_file.display());
    info!("Run again with --mode async_result to fetch the result");

    Ok(Outcome::AsyncStarted {
        status_url: session.scan_status_url,
        state_file,
    })
}

async fn async_result(
    ctx: &Context,
    lifecycle: &mut ScanLifecycle<'_>,
) -> Result<Outcome, RunError> {
    let state_file = ctx.state_file();
    let state = AsyncState::load(&state_file)?;
    info!("Checking analysis status at {}", state.report_status_url);

    let outcome = lifecycle.poll(&state.report_status_url).await?;
    Ok(into_outcome(outcome))
}

/// Create the scan, discover and upload manifests, start the analysis.
async fn start_scan(
    ctx: &Context,
    lifecycle: &mut ScanLifecycle<'_>,
) -> Result<Started, RunError> {
    let session = lifecycle.create_scan(&ctx.create_scan_request()).await?;
    let catalogue = lifecycle.manifest_patterns().await?;

    let exclusions = ExclusionRules::new(&ctx.dirs_to_exclude, &ctx.files_to_exclude);
    let search = find_manifests(
        &catalogue,
        &SearchOptions {
            source_root: &ctx.source_code_path,
            exclusions: &exclusions,
            package_managers: &ctx.package_managers,
        },
    );
    info!("{} manifest files found", search.candidates.len());

    // An empty search is reported `Incomplete` by the upload step.
    match lifecycle
        .upload_manifests(&session, &search.candidates, search.truncated)
        .await?
    {
        UploadOutcome::Uploaded(_) => {}
        UploadOutcome::Reported { status, message } => {
            return Ok(Started::Reported(Outcome::ScanReported { status, message }));
        }
    }

    lifecycle.start_analysis(&session).await?;
    Ok(Started::Running(session))
}

fn into_outcome(outcome: PollOutcome) -> Outcome {
    match outcome {
        PollOutcome::Finished(result) => Outcome::Finished(result),
        PollOutcome::Failed(result) => Outcome::AnalysisFailed(result),
    }
}

/// Fetch the SARIF report and write it next to the state file.
///
/// Failures are logged; they never change the outcome of the run.
async fn write_sarif(ctx: &Context, api: &dyn ScaApi, session: &ScanSession) {
    let report = match api.sarif_report(session).await {
        Ok(report) => report,
        Err(e) => {
            warn!("Could not fetch SARIF report: {}", e);
            return;
        }
    };

    let path = ctx.sarif_file();
    let written = serde_json::to_string_pretty(&report)
        .map_err(|e| e.to_string())
        .and_then(|json| fs::write(&path, json).map_err(|e| e.to_string()));

    match written {
        Ok(()) => info!("SARIF report written to {}", path.display()),
        Err(e) => warn!("Could not write SARIF report to {}: {}", path.display(), e),
    }
}
