//! Config storage
//!
//! The JSON record that remembers where things live and which versions were
//! last downloaded and patched.

use crate::error::{AppError, AppResult};
use crate::storage::download::sanitize_name;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Package id of the app being patched
pub const TARGET_PACKAGE: &str = "com.google.android.youtube";

/// Every file the config tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Cli,
    Patches,
    Integrations,
    OriginalApk,
}

impl Artifact {
    /// The key used for this artifact in the JSON record
    pub fn key(&self) -> &'static str {
        match self {
            Artifact::Cli => "CLI",
            Artifact::Patches => "Patches",
            Artifact::Integrations => "Integrations",
            Artifact::OriginalApk => "Original_APK",
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One string per artifact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerArtifact {
    #[serde(rename = "CLI")]
    pub cli: String,
    #[serde(rename = "Patches")]
    pub patches: String,
    /// Missing from configs written before integrations were tracked
    #[serde(rename = "Integrations", default)]
    pub integrations: String,
    #[serde(rename = "Original_APK")]
    pub original_apk: String,
}

impl PerArtifact {
    pub fn get(&self, artifact: Artifact) -> &str {
        match artifact {
            Artifact::Cli => &self.cli,
            Artifact::Patches => &self.patches,
            Artifact::Integrations => &self.integrations,
            Artifact::OriginalApk => &self.original_apk,
        }
    }

    pub fn set(&mut self, artifact: Artifact, value: String) {
        match artifact {
            Artifact::Cli => self.cli = value,
            Artifact::Patches => self.patches = value,
            Artifact::Integrations => self.integrations = value,
            Artifact::OriginalApk => self.original_apk = value,
        }
    }
}

/// The persisted config record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory where the patched APK goes
    #[serde(rename = "Output")]
    pub output: PathBuf,
    /// Directory holding the CLI, patches, integrations and original APK
    #[serde(rename = "Store_Path")]
    pub store_path: PathBuf,
    /// Last downloaded version of each artifact
    #[serde(rename = "Versions")]
    pub versions: PerArtifact,
    /// File name of each artifact inside `store_path`
    #[serde(rename = "Names")]
    pub names: PerArtifact,
}

impl Config {
    /// A fresh record with nothing downloaded yet
    pub fn new(output: impl Into<PathBuf>, store_path: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            store_path: store_path.into(),
            versions: PerArtifact::default(),
            names: PerArtifact::default(),
        }
    }

    /// Create (or reset) the config file at `path`
    pub fn init(path: &Path, output: &Path, store_path: &Path) -> AppResult<Self> {
        let config = Self::new(output, store_path);
        config.save(path)?;
        tracing::info!("Initialized config at {}", path.display());
        Ok(config)
    }

    /// Load the config from disk
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::ConfigMissing(path.to_path_buf()));
        }
        if !path.is_file() {
            return Err(AppError::ConfigNotAFile(path.to_path_buf()));
        }

        let json = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&json)?;

        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Write the config to disk
    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;

        tracing::debug!("Saved config to {}", path.display());
        Ok(())
    }

    pub fn version(&self, artifact: Artifact) -> &str {
        self.versions.get(artifact)
    }

    pub fn name(&self, artifact: Artifact) -> &str {
        self.names.get(artifact)
    }

    /// Remember a freshly downloaded artifact. The name is sanitized the same
    /// way the downloader sanitizes file names.
    pub fn record(&mut self, artifact: Artifact, version: &str, name: &str) {
        self.versions.set(artifact, version.to_string());
        self.names.set(artifact, sanitize_name(name));
    }

    /// Location of an artifact on disk, if one has been recorded
    pub fn artifact_path(&self, artifact: Artifact) -> Option<PathBuf> {
        let name = self.name(artifact);
        if name.is_empty() {
            None
        } else {
            Some(self.store_path.join(name))
        }
    }

    /// Like [`Config::artifact_path`] but an error when nothing is recorded
    pub fn require_artifact(&self, artifact: Artifact) -> AppResult<PathBuf> {
        self.artifact_path(artifact)
            .ok_or(AppError::ArtifactMissing(artifact.key()))
    }

    /// File name used for a downloaded original APK
    pub fn original_apk_name(version: &str) -> String {
        format!("{}.{}.apk", TARGET_PACKAGE, version)
    }

    /// Where the patched APK for the recorded original version goes
    pub fn patched_apk_path(&self) -> PathBuf {
        self.output.join(format!(
            "app.revanced.android.youtube.{}.apk",
            self.version(Artifact::OriginalApk)
        ))
    }
}
