use crate::browser::{ApkFetcher, GeckoDriver};
use crate::cli::Cli;
use crate::error::AppResult;
use crate::patcher::{PatchRequest, Patcher};
use crate::releases::{self, ReleaseClient, ToolSource};
use crate::storage::config::TARGET_PACKAGE;
use crate::storage::download::remove_stale;
use crate::storage::{Artifact, Config, Downloader};
use crate::version;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Options that shape a run, taken from the command line
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config_path: PathBuf,
    pub include_beta: bool,
    pub force_patch: bool,
    pub skip_integrations: bool,
    /// Pass the integrations to the patcher with `--merge`
    pub merge_integrations: bool,
    pub webdriver: Option<String>,
    /// Java executable used to run the ReVanced CLI
    pub java: OsString,
}

impl RunOptions {
    pub fn from_cli(cli: &Cli, config_path: PathBuf) -> Self {
        Self {
            config_path,
            include_beta: cli.include_beta,
            force_patch: cli.force_patch,
            skip_integrations: cli.skip_integrations,
            merge_integrations: cli.merge_integrations && !cli.skip_integrations,
            webdriver: cli.webdriver.clone(),
            java: OsString::from("java"),
        }
    }

    /// Tools to keep up to date, in download order
    pub fn tools(&self) -> Vec<ToolSource> {
        let mut tools = vec![releases::CLI, releases::PATCHES];
        if !self.skip_integrations {
            tools.push(releases::INTEGRATIONS);
        }
        tools
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A patched APK was written
    Patched(PathBuf),
    /// The newest supported version was already patched
    UpToDate,
}

pub async fn run_patch(options: RunOptions) -> AppResult<RunOutcome> {
    let mut config = Config::load(&options.config_path)?;
    let downloader = Downloader::new()?;
    let releases = ReleaseClient::new(downloader.client().clone());

    for tool in options.tools() {
        update_tool(
            &releases,
            &downloader,
            &tool,
            options.include_beta,
            &mut config,
            &options.config_path,
        )
        .await?;
    }

    patch_latest(&options, &mut config, &downloader).await
}

/// Pick the newest supported YouTube version, fetch it if needed and patch it
pub async fn patch_latest(
    options: &RunOptions,
    config: &mut Config,
    downloader: &Downloader,
) -> AppResult<RunOutcome> {
    let patcher = Patcher::with_java(&options.java, config.require_artifact(Artifact::Cli)?);
    let patches = config.require_artifact(Artifact::Patches)?;
    let latest_apk = patcher.latest_supported(&patches, TARGET_PACKAGE).await?;

    if version::is_newer(&latest_apk, config.version(Artifact::OriginalApk)) {
        tracing::info!(target: "progress", "New YouTube version supported: {}", latest_apk);
        let previous = config.artifact_path(Artifact::OriginalApk);

        let saved = download_apk(options, downloader, &latest_apk, &config.store_path).await?;
        record_download(config, Artifact::OriginalApk, &latest_apk, &saved, previous);
        config.save(&options.config_path)?;
    } else if !options.force_patch {
        tracing::info!(
            target: "progress",
            "No new YouTube version is supported, {} has already been patched.",
            config.version(Artifact::OriginalApk)
        );
        return Ok(RunOutcome::UpToDate);
    } else {
        tracing::info!(
            target: "progress",
            "No new YouTube version is supported but --force-patch was used."
        );
    }

    let request = patch_request(options, config)?;
    patcher.patch(&request).await?;

    tracing::info!(target: "progress", "All done.");
    Ok(RunOutcome::Patched(request.output))
}

/// Arguments for the patcher from the recorded artifacts
pub fn patch_request(options: &RunOptions, config: &Config) -> AppResult<PatchRequest> {
    let integrations = if options.merge_integrations && !options.skip_integrations {
        config.artifact_path(Artifact::Integrations)
    } else {
        None
    };

    Ok(PatchRequest {
        patches: config.require_artifact(Artifact::Patches)?,
        integrations,
        input: config.require_artifact(Artifact::OriginalApk)?,
        output: config.patched_apk_path(),
    })
}

/// Download a newer release of `tool` if there is one.
///
/// Returns whether the config changed. The config is saved right after the
/// download so a later failure doesn't lose track of the file.
pub async fn update_tool(
    releases: &ReleaseClient,
    downloader: &Downloader,
    tool: &ToolSource,
    include_beta: bool,
    config: &mut Config,
    config_path: &Path,
) -> AppResult<bool> {
    let latest = match releases.latest(tool, include_beta).await? {
        Some(latest) => latest,
        None => return Ok(false),
    };

    if latest.version == config.version(tool.artifact) {
        tracing::info!(
            target: "progress",
            "{} is already updated to the latest version.",
            tool.artifact
        );
        return Ok(false);
    }

    tracing::info!(
        target: "progress",
        "New version found for {}: {}.",
        tool.artifact,
        latest.version
    );

    let previous = config.artifact_path(tool.artifact);
    let saved = downloader
        .fetch(&latest.url, &config.store_path, &latest.name)
        .await?;

    record_download(config, tool.artifact, &latest.version, &saved, previous);
    config.save(config_path)?;
    Ok(true)
}

/// Record a finished download and drop the file it replaces
fn record_download(
    config: &mut Config,
    artifact: Artifact,
    version: &str,
    saved: &Path,
    previous: Option<PathBuf>,
) {
    let name = saved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    config.record(artifact, version, &name);

    if let Some(old) = previous {
        if old != saved {
            tracing::info!("Removing old version of {}...", artifact);
            remove_stale(&old);
        }
    }
}

async fn download_apk(
    options: &RunOptions,
    downloader: &Downloader,
    version: &str,
    store_path: &Path,
) -> AppResult<PathBuf> {
    match &options.webdriver {
        Some(url) => {
            ApkFetcher::new(url.clone(), downloader.clone())
                .fetch(version, store_path)
                .await
        }
        None => {
            let driver = GeckoDriver::spawn().await?;
            let result = ApkFetcher::new(driver.url(), downloader.clone())
                .fetch(version, store_path)
                .await;
            driver.shutdown().await;
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::download::tests::{local_downloader, serve_once};
    use clap::Parser;
    use std::fs;
    use tempfile::tempdir;

    fn options(skip_integrations: bool) -> RunOptions {
        RunOptions {
            config_path: PathBuf::from("auto-path.json"),
            include_beta: false,
            force_patch: false,
            skip_integrations,
            merge_integrations: false,
            webdriver: None,
            java: OsString::from("java"),
        }
    }

    /// Shell script standing in for `java`: logs its arguments and answers
    /// `list-versions` with a fixed version list
    #[cfg(unix)]
    fn fake_java(dir: &Path, versions: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("java");
        let log = dir.join("java.log");
        fs::write(
            &script,
            format!(
                "#!/bin/sh\necho \"$@\" >> '{}'\nif [ \"$3\" = list-versions ]; then printf '{}\\n'; fi\n",
                log.display(),
                versions
            ),
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    /// Config with the CLI and patches in place and `apk_version` recorded
    fn config_with_tools(dir: &Path, apk_version: &str, apk_name: &str) -> Config {
        let store = dir.join("store");
        fs::create_dir_all(&store).unwrap();
        let mut config = Config::new(dir.join("out"), &store);
        config.record(Artifact::Cli, "5.0.0", "cli.jar");
        config.record(Artifact::Patches, "5.0.1", "patches.rvp");
        config.record(Artifact::Integrations, "1.16.0", "integrations.apk");
        config.versions.set(Artifact::OriginalApk, apk_version.to_string());
        config.names.set(Artifact::OriginalApk, apk_name.to_string());
        config
    }

    fn feed(version: &str, name: &str, url: &str) -> String {
        serde_json::json!([
            {
                "tag_name": format!("v{}", version),
                "prerelease": false,
                "assets": [{ "name": name, "browser_download_url": url }]
            }
        ])
        .to_string()
    }

    fn local_releases(base: String) -> ReleaseClient {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        ReleaseClient::with_api_base(client, base)
    }

    #[test]
    fn test_tools_order() {
        let tools = options(false).tools();
        let artifacts: Vec<Artifact> = tools.iter().map(|t| t.artifact).collect();
        assert_eq!(
            artifacts,
            vec![Artifact::Cli, Artifact::Patches, Artifact::Integrations]
        );
    }

    #[test]
    fn test_skip_integrations() {
        let tools = options(true).tools();
        assert!(tools.iter().all(|t| t.artifact != Artifact::Integrations));
        assert_eq!(tools.len(), 2);
    }

    #[test]
    fn test_options_from_cli() {
        let cli = Cli::parse_from(["revanced-auto-patcher", "--force-patch", "--include-beta"]);
        let options = RunOptions::from_cli(&cli, PathBuf::from("/conf.json"));
        assert!(options.force_patch);
        assert!(options.include_beta);
        assert!(!options.skip_integrations);
        assert_eq!(options.config_path, PathBuf::from("/conf.json"));
    }

    #[test]
    fn test_default_request_does_not_merge_integrations() {
        let dir = tempdir().unwrap();
        let config = config_with_tools(dir.path(), "19.16.39", "yt.apk");
        let cli = Cli::parse_from(["revanced-auto-patcher"]);
        let options = RunOptions::from_cli(&cli, PathBuf::from("/conf.json"));

        let request = patch_request(&options, &config).unwrap();
        assert!(request.integrations.is_none());
        assert_eq!(request.input, dir.path().join("store").join("yt.apk"));
    }

    #[test]
    fn test_merge_integrations_opt_in() {
        let dir = tempdir().unwrap();
        let config = config_with_tools(dir.path(), "19.16.39", "yt.apk");
        let cli = Cli::parse_from(["revanced-auto-patcher", "--merge-integrations"]);
        let options = RunOptions::from_cli(&cli, PathBuf::from("/conf.json"));

        let request = patch_request(&options, &config).unwrap();
        assert_eq!(
            request.integrations,
            Some(dir.path().join("store").join("integrations.apk"))
        );
    }

    #[test]
    fn test_skip_wins_over_merge() {
        let cli = Cli::parse_from([
            "revanced-auto-patcher",
            "--merge-integrations",
            "--skip-integrations",
        ]);
        let options = RunOptions::from_cli(&cli, PathBuf::from("/conf.json"));
        assert!(!options.merge_integrations);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_already_patched_is_up_to_date() {
        let dir = tempdir().unwrap();
        let mut opts = options(false);
        opts.java = fake_java(dir.path(), "\\t19.16.39 (3 patches)").into();
        opts.config_path = dir.path().join("auto-path.json");

        let mut config = config_with_tools(dir.path(), "19.16.39", "yt.apk");
        let outcome = patch_latest(&opts, &mut config, &local_downloader())
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::UpToDate);
        let log = fs::read_to_string(dir.path().join("java.log")).unwrap();
        assert!(log.contains("list-versions"));
        assert!(!log.contains("patch --purge"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_force_patch_uses_recorded_apk() {
        let dir = tempdir().unwrap();
        let mut opts = options(false);
        opts.force_patch = true;
        opts.java = fake_java(dir.path(), "\\t19.16.39 (3 patches)").into();
        opts.config_path = dir.path().join("auto-path.json");

        let mut config = config_with_tools(dir.path(), "19.16.39", "yt.apk");
        let outcome = patch_latest(&opts, &mut config, &local_downloader())
            .await
            .unwrap();

        let expected = dir
            .path()
            .join("out")
            .join("app.revanced.android.youtube.19.16.39.apk");
        assert_eq!(outcome, RunOutcome::Patched(expected.clone()));

        let log = fs::read_to_string(dir.path().join("java.log")).unwrap();
        let patch_line = log
            .lines()
            .find(|l| l.contains("patch --purge"))
            .expect("patcher was invoked");
        assert!(patch_line.contains(&dir.path().join("store").join("yt.apk").display().to_string()));
        assert!(patch_line.contains(&expected.display().to_string()));
        assert!(!patch_line.contains("--merge"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_force_patch_without_apk() {
        let dir = tempdir().unwrap();
        let mut opts = options(false);
        opts.force_patch = true;
        opts.java = fake_java(dir.path(), "\\t19.16.39 (3 patches)").into();
        opts.config_path = dir.path().join("auto-path.json");

        let mut config = config_with_tools(dir.path(), "19.16.39", "");
        let err = patch_latest(&opts, &mut config, &local_downloader())
            .await
            .unwrap_err();

        assert!(matches!(err, crate::AppError::ArtifactMissing("Original_APK")));
        let log = fs::read_to_string(dir.path().join("java.log")).unwrap();
        assert!(!log.contains("patch --purge"));
    }

    #[test]
    fn test_record_download_replaces_old_file() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("cli-4.6.0.jar");
        let new = dir.path().join("cli-5.0.0.jar");
        fs::write(&old, b"old").unwrap();
        fs::write(&new, b"new").unwrap();

        let mut config = Config::new(dir.path().join("out"), dir.path());
        config.record(Artifact::Cli, "4.6.0", "cli-4.6.0.jar");
        let previous = config.artifact_path(Artifact::Cli);

        record_download(&mut config, Artifact::Cli, "5.0.0", &new, previous);

        assert_eq!(config.version(Artifact::Cli), "5.0.0");
        assert_eq!(config.name(Artifact::Cli), "cli-5.0.0.jar");
        assert!(!old.exists());
        assert!(new.exists());
    }

    #[test]
    fn test_record_download_keeps_same_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("patches.rvp");
        fs::write(&path, b"patches").unwrap();

        let mut config = Config::new(dir.path().join("out"), dir.path());
        config.record(Artifact::Patches, "5.0.0", "patches.rvp");
        let previous = config.artifact_path(Artifact::Patches);

        record_download(&mut config, Artifact::Patches, "5.0.1", &path, previous);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_update_tool_downloads_new_release() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("auto-path.json");
        let store = dir.path().join("store");

        let asset_base = serve_once("200 OK", "cli jar").await;
        let asset_url = format!("{}/revanced-cli-5.0.0-all.jar", asset_base);
        let api_base = serve_once(
            "200 OK",
            feed("5.0.0", "revanced-cli-5.0.0-all.jar", &asset_url),
        )
        .await;

        let mut config = Config::init(&config_path, &dir.path().join("out"), &store).unwrap();
        let changed = update_tool(
            &local_releases(api_base),
            &local_downloader(),
            &releases::CLI,
            false,
            &mut config,
            &config_path,
        )
        .await
        .unwrap();

        assert!(changed);
        let saved = Config::load(&config_path).unwrap();
        assert_eq!(saved.version(Artifact::Cli), "5.0.0");
        assert_eq!(saved.name(Artifact::Cli), "revanced-cli-5.0.0-all.jar");
        assert_eq!(
            fs::read(store.join("revanced-cli-5.0.0-all.jar")).unwrap(),
            b"cli jar"
        );
    }

    #[tokio::test]
    async fn test_update_tool_skips_current_version() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("auto-path.json");

        let api_base = serve_once(
            "200 OK",
            feed("5.0.1", "patches-5.0.1.rvp", "http://127.0.0.1:9/unused"),
        )
        .await;

        let mut config = Config::new(dir.path().join("out"), dir.path().join("store"));
        config.record(Artifact::Patches, "5.0.1", "patches-5.0.1.rvp");
        config.save(&config_path).unwrap();

        let changed = update_tool(
            &local_releases(api_base),
            &local_downloader(),
            &releases::PATCHES,
            false,
            &mut config,
            &config_path,
        )
        .await
        .unwrap();

        assert!(!changed);
        assert_eq!(config.version(Artifact::Patches), "5.0.1");
    }

    #[tokio::test]
    async fn test_run_without_config() {
        let dir = tempdir().unwrap();
        let mut opts = options(false);
        opts.config_path = dir.path().join("missing.json");

        let err = run_patch(opts).await.unwrap_err();
        assert!(matches!(err, crate::AppError::ConfigMissing(_)));
    }
}
