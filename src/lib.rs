//! ReVanced auto patcher
//!
//! Keeps the ReVanced CLI, patches and integrations up to date, fetches the
//! newest YouTube APK the patches support and patches it.

pub mod browser;
pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod patcher;
pub mod releases;
pub mod storage;
pub mod version;

pub use cli::Cli;
pub use commands::run::{RunOptions, RunOutcome};
pub use error::{AppError, AppResult};

use std::path::Path;
use storage::Config;

/// Main library entry point
pub async fn run(cli: Cli, cwd: &Path) -> AppResult<RunOutcome> {
    let paths = cli.resolve_paths(cwd);

    if cli.init {
        tracing::info!("Initializing configuration...");
        Config::init(&paths.config, &paths.output, &paths.store_path)?;
    }

    let options = RunOptions::from_cli(&cli, paths.config);
    commands::run::run_patch(options).await
}
