//! cli
//!
//! Command-line interface layer.
//!
//! # Responsibilities
//!
//! - Parse arguments and set up logging
//! - Resolve the run [`Context`] and build the HTTP client
//! - Run the engine on a single-threaded tokio runtime
//! - Turn the outcome into the process exit code
//!
//! # Architecture
//!
//! The CLI layer is thin. Every decision about the scan itself is made in
//! [`crate::engine`]; this layer only wires the pieces together.

pub mod args;

pub use args::Cli;

use std::process::ExitCode;

use anyhow::{Context as _, Result};
use tracing::{debug, error, info, warn};

use crate::api::release::{latest_release, LATEST_RELEASE_URL};
use crate::api::HttpScaApi;
use crate::core::config::Context;
use crate::engine;
use crate::ui::{logging, report};

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse_args();
    logging::init_tracing(&cli.log_level)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    Ok(ExitCode::from(runtime.block_on(execute(cli))))
}

/// Run with already parsed arguments and return the exit code.
pub async fn execute(cli: Cli) -> u8 {
    info!("Starting SOOS SCA analysis (version {})", env!("CARGO_PKG_VERSION"));

    let ctx = match Context::resolve(&cli) {
        Ok(ctx) => ctx,
        Err(e) => return report::finish_config_error(&e, cli.on_failure),
    };
    ctx.log_summary();
    debug!("Resolved context: {:?}", ctx);

    if ctx.check_version {
        check_version().await;
    }

    let api = match HttpScaApi::new(&ctx.api_base_url, &ctx.client_id, ctx.api_key()) {
        Ok(api) => api,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };

    let result = engine::run(&ctx, &api).await;
    report::finish(&result, ctx.on_failure)
}

async fn check_version() {
    let client = reqwest::Client::new();
    match latest_release(&client, LATEST_RELEASE_URL).await {
        Some(release) if release.differs_from(env!("CARGO_PKG_VERSION")) => warn!(
            "A newer release is available: {} ({})",
            release.tag_name,
            release.html_url.as_deref().unwrap_or(LATEST_RELEASE_URL)
        ),
        Some(_) => debug!("Running the latest release"),
        None => debug!("Version check skipped"),
    }
}
