use clap::{ArgAction, Parser, ValueEnum};
use std::path::{Path, PathBuf};

/// Default config file name, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "auto-path.json";
/// Default directory for downloaded artifacts
pub const DEFAULT_STORE_DIR: &str = "tmp";
/// Default directory for the patched APK
pub const DEFAULT_OUTPUT_DIR: &str = "patched";

#[derive(Parser, Debug)]
#[command(name = "revanced-auto-patcher")]
#[command(about = "Automatically download and patch the latest supported YouTube Android app with ReVanced")]
#[command(version, disable_version_flag = true)]
pub struct Cli {
    /// Print version
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    #[allow(dead_code)]
    version: Option<bool>,

    /// Prepare the config file. Resets every field, so only do this once and
    /// edit the JSON file by hand afterwards.
    #[arg(long)]
    pub init: bool,

    /// Path to the configuration file [default: ./auto-path.json]
    #[arg(long, value_name = "PATH")]
    pub conf: Option<PathBuf>,

    /// Where to store the ReVanced CLI, patches, integrations and the original
    /// APK [default: ./tmp]. Only used with --init.
    #[arg(long, value_name = "DIR")]
    pub store_path: Option<PathBuf>,

    /// Directory where the patched APK is written [default: ./patched].
    /// Only used with --init.
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Include pre-releases when looking for tool updates
    #[arg(long)]
    pub include_beta: bool,

    /// Patch even if no newer supported YouTube version was found
    #[arg(long)]
    pub force_patch: bool,

    /// Don't download the ReVanced integrations package
    #[arg(long)]
    pub skip_integrations: bool,

    /// Merge the integrations into the APK (`--merge`). Only older CLI
    /// releases accept this.
    #[arg(long)]
    pub merge_integrations: bool,

    /// URL of a running WebDriver server. When absent, geckodriver is spawned.
    #[arg(long, value_name = "URL")]
    pub webdriver: Option<String>,

    /// How much is logged
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    #[value(alias = "warning")]
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Paths after defaults have been applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub config: PathBuf,
    pub store_path: PathBuf,
    pub output: PathBuf,
}

impl Cli {
    /// Fill in unset path flags with their defaults under `cwd`
    pub fn resolve_paths(&self, cwd: &Path) -> ResolvedPaths {
        ResolvedPaths {
            config: self
                .conf
                .clone()
                .unwrap_or_else(|| cwd.join(DEFAULT_CONFIG_FILE)),
            store_path: self
                .store_path
                .clone()
                .unwrap_or_else(|| cwd.join(DEFAULT_STORE_DIR)),
            output: self
                .output
                .clone()
                .unwrap_or_else(|| cwd.join(DEFAULT_OUTPUT_DIR)),
        }
    }
}
