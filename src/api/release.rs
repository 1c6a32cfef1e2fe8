//! api::release
//!
//! Latest-release lookup for the optional version check.
//!
//! Failures never surface to the caller: a missing release simply means
//! the check is skipped.

use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// GitHub endpoint for the latest published release of the scanner.
pub const LATEST_RELEASE_URL: &str =
    "https://api.github.com/repos/soos-io/soos-ci-analysis-python/releases/latest";

/// The fields of a GitHub release the version check needs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    /// Tag of the release, e.g. `v1.4.2`
    pub tag_name: String,
    /// Web page of the release
    #[serde(default)]
    pub html_url: Option<String>,
}

impl Release {
    /// Whether this release is newer than (or simply differs from) `current`.
    ///
    /// Tags are compared after stripping a leading `v`.
    pub fn differs_from(&self, current: &str) -> bool {
        self.tag_name.trim_start_matches('v') != current.trim_start_matches('v')
    }
}

/// Fetch the latest release from `url`, or `None` on any failure.
pub async fn latest_release(client: &Client, url: &str) -> Option<Release> {
    let response = client
        .get(url)
        .header(ACCEPT, "application/vnd.github.v3+json")
        .header(USER_AGENT, "soos-sca")
        .send()
        .await
        .map_err(|e| debug!("Version check request failed: {}", e))
        .ok()?;

    if !response.status().is_success() {
        debug!("Version check returned {}", response.status());
        return None;
    }

    response
        .json::<Release>()
        .await
        .map_err(|e| debug!("Version check response unreadable: {}", e))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compares_without_v_prefix() {
        let release = Release {
            tag_name: "v0.3.0".into(),
            html_url: None,
        };
        assert!(!release.differs_from("0.3.0"));
        assert!(release.differs_from("0.2.9"));
    }
}
