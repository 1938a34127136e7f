//! GitHub release lookup
//!
//! Finds the newest release of each ReVanced tool and the asset to download.

use crate::error::{AppError, AppResult};
use crate::storage::Artifact;
use crate::version::strip_prefix;
use serde::Deserialize;

const GITHUB_API: &str = "https://api.github.com";

/// A tool published as GitHub release assets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSource {
    pub artifact: Artifact,
    /// `owner/repo`
    pub repo: &'static str,
    /// Asset file extension to look for
    pub extension: &'static str,
}

pub const CLI: ToolSource = ToolSource {
    artifact: Artifact::Cli,
    repo: "revanced/revanced-cli",
    extension: "jar",
};

pub const PATCHES: ToolSource = ToolSource {
    artifact: Artifact::Patches,
    repo: "revanced/revanced-patches",
    extension: "rvp",
};

pub const INTEGRATIONS: ToolSource = ToolSource {
    artifact: Artifact::Integrations,
    repo: "revanced/revanced-integrations",
    extension: "apk",
};

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
}

/// The newest downloadable build of a tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestRelease {
    pub version: String,
    pub name: String,
    pub url: String,
}

/// Pick the release to use from a newest-first list.
///
/// Without `include_beta` the first stable release wins; if there is none the
/// newest pre-release is used anyway.
pub fn select_release(releases: &[Release], include_beta: bool) -> Option<&Release> {
    if include_beta {
        return releases.first();
    }
    releases
        .iter()
        .find(|r| !r.prerelease)
        .or_else(|| releases.first())
}

/// First asset whose name ends with `extension`, case-insensitively
pub fn find_asset<'a>(release: &'a Release, extension: &str) -> Option<&'a Asset> {
    let extension = extension.to_lowercase();
    release
        .assets
        .iter()
        .find(|a| a.name.to_lowercase().ends_with(&extension))
}

/// Resolve the newest release and its matching asset.
///
/// Returns `None` (with a warning) when there is nothing to download.
pub fn latest_from(
    source: &ToolSource,
    releases: &[Release],
    include_beta: bool,
) -> Option<LatestRelease> {
    let release = match select_release(releases, include_beta) {
        Some(r) => r,
        None => {
            tracing::warn!("No releases found for \"{}\"", source.artifact);
            return None;
        }
    };

    if release.assets.is_empty() {
        tracing::warn!("No assets found for \"{}\"", source.artifact);
        return None;
    }

    match find_asset(release, source.extension) {
        Some(asset) => Some(LatestRelease {
            version: strip_prefix(&release.tag_name).to_string(),
            name: asset.name.clone(),
            url: asset.browser_download_url.clone(),
        }),
        None => {
            tracing::warn!(
                "No matching assets found for \"{}\" [expected extension: {}]",
                source.artifact,
                source.extension
            );
            None
        }
    }
}

/// Queries the GitHub releases API
pub struct ReleaseClient {
    client: reqwest::Client,
    api_base: String,
}

impl ReleaseClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_api_base(client, GITHUB_API)
    }

    pub fn with_api_base(client: reqwest::Client, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the release list of a tool, newest first
    pub async fn releases(&self, source: &ToolSource) -> AppResult<Vec<Release>> {
        let url = format!("{}/repos/{}/releases", self.api_base, source.repo);
        tracing::debug!("Fetching releases from {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::error!(
                "There was an error fetching the latest version for \"{}\": {}",
                source.artifact,
                response.status()
            );
            return Err(AppError::HttpStatus {
                url,
                status: response.status().as_u16(),
            });
        }

        Ok(response.json().await?)
    }

    /// Newest downloadable build of a tool
    pub async fn latest(
        &self,
        source: &ToolSource,
        include_beta: bool,
    ) -> AppResult<Option<LatestRelease>> {
        let releases = self.releases(source).await?;
        Ok(latest_from(source, &releases, include_beta))
    }
}
