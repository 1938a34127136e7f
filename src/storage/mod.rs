//! Persistent storage
//!
//! The config record on disk and the artifacts downloaded next to it.

pub mod config;
pub mod download;

pub use config::{Artifact, Config};
pub use download::{sanitize_name, Downloader};
