//! ReVanced CLI invocation
//!
//! Thin wrapper over `java -jar revanced-cli.jar ...`.

use crate::error::{AppError, AppResult};
use crate::version;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Everything `revanced-cli patch` needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRequest {
    pub patches: PathBuf,
    pub integrations: Option<PathBuf>,
    pub input: PathBuf,
    pub output: PathBuf,
}

impl PatchRequest {
    /// Arguments following `-jar <cli>`
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "patch".into(),
            "--purge".into(),
            "--patches".into(),
            self.patches.clone().into(),
        ];
        if let Some(integrations) = &self.integrations {
            args.push("--merge".into());
            args.push(integrations.clone().into());
        }
        args.push("--out".into());
        args.push(self.output.clone().into());
        args.push(self.input.clone().into());
        args
    }
}

pub struct Patcher {
    java: OsString,
    cli_jar: PathBuf,
}

impl Patcher {
    pub fn new(cli_jar: impl Into<PathBuf>) -> Self {
        Self::with_java("java", cli_jar)
    }

    pub fn with_java(java: impl Into<OsString>, cli_jar: impl Into<PathBuf>) -> Self {
        Self {
            java: java.into(),
            cli_jar: cli_jar.into(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.java);
        cmd.arg("-jar").arg(&self.cli_jar);
        cmd.stdin(Stdio::null());
        cmd
    }

    /// Versions of `package` the patch bundle supports, in output order
    pub async fn list_versions(&self, patches: &Path, package: &str) -> AppResult<Vec<String>> {
        let mut cmd = self.command();
        cmd.arg("list-versions").arg(patches).arg("-f").arg(package);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let output = cmd
            .output()
            .await
            .map_err(|e| AppError::Patcher(format!("couldn't run {:?}: {}", self.java, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Patcher(format!(
                "couldn't get supported versions (exit code {}): {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let versions = version::extract_versions(&stdout);
        if versions.is_empty() {
            return Err(AppError::NoSupportedVersion);
        }
        tracing::debug!("Supported versions: {}", versions.join(", "));
        Ok(versions)
    }

    /// Newest version of `package` the patch bundle supports
    pub async fn latest_supported(&self, patches: &Path, package: &str) -> AppResult<String> {
        let versions = self.list_versions(patches, package).await?;
        version::newest(&versions)
            .map(str::to_string)
            .ok_or(AppError::NoSupportedVersion)
    }

    /// Run the patcher. Any previous output file is replaced.
    pub async fn patch(&self, request: &PatchRequest) -> AppResult<()> {
        tracing::info!(target: "progress", "Patching latest YouTube APK...");

        if let Some(parent) = request.output.parent() {
            fs::create_dir_all(parent)?;
        }
        match fs::remove_file(&request.output) {
            Ok(()) => tracing::debug!("Removed previous output {:?}", request.output),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let mut cmd = self.command();
        cmd.args(request.args());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());

        let output = cmd
            .output()
            .await
            .map_err(|e| AppError::Patcher(format!("couldn't run {:?}: {}", self.java, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Patcher(format!(
                "error patching APK (exit code {}): {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        tracing::info!(target: "progress", "Patching finished.");
        Ok(())
    }
}
