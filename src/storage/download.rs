//! Artifact downloader
//!
//! Streams release assets and APKs to disk.

use crate::error::{AppError, AppResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use reqwest::header::HeaderMap;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// User-Agent sent with every request and by the automated browser
pub const USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 14_5 like Mac OS X) AppleWebKit/605.1.15 \
     (KHTML, like Gecko) FxiOS/127.0 Mobile/15E148 Safari/605.1.15";

/// Make a file name safe for the local filesystem.
///
/// Reserved characters are swapped for their full-width look-alikes so the
/// name stays readable.
pub fn sanitize_name(name: &str) -> String {
    let replace: &[(char, char)] = if cfg!(windows) {
        &[
            ('<', '\u{FE64}'),
            ('>', '\u{FE65}'),
            (':', '\u{FE55}'),
            ('"', '\u{FF02}'),
            ('/', '\u{FF0F}'),
            ('\\', '\u{FF3C}'),
            ('|', '\u{FF5C}'),
            ('?', '\u{FF1F}'),
            ('*', '\u{FF0A}'),
        ]
    } else {
        &[('/', '\u{FF0F}')]
    };

    name.chars()
        .map(|ch| {
            replace
                .iter()
                .find(|(from, _)| *from == ch)
                .map(|(_, to)| *to)
                .unwrap_or(ch)
        })
        .collect()
}

/// Delete a previously downloaded file. Missing files are fine.
pub fn remove_stale(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::info!("Removed old file {:?}", path),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("There was an error removing the file {:?}: {}", path, e),
    }
}

/// HTTP downloader shared by every step
#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    pub fn new() -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    /// The underlying client, for JSON API calls
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Download `url` into `dir` under the sanitized `name`.
    ///
    /// The body is written to `<name>.tmp` first and renamed once complete.
    pub async fn fetch(&self, url: &str, dir: &Path, name: &str) -> AppResult<PathBuf> {
        self.fetch_with(url, dir, name, HeaderMap::new()).await
    }

    /// Like [`Downloader::fetch`] with extra request headers
    pub async fn fetch_with(
        &self,
        url: &str,
        dir: &Path,
        name: &str,
        headers: HeaderMap,
    ) -> AppResult<PathBuf> {
        tracing::info!(target: "progress", "Downloading {}...", name);

        let safe_name = sanitize_name(name);
        fs::create_dir_all(dir)?;

        let output_path = dir.join(&safe_name);
        let temp_path = dir.join(format!("{}.tmp", safe_name));

        tracing::debug!("Downloading from: {}", url);
        let response = self.client.get(url).headers(headers).send().await?;

        if !response.status().is_success() {
            return Err(AppError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        if let Err(e) = write_body(response, &temp_path, &safe_name).await {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        fs::rename(&temp_path, &output_path)?;

        tracing::info!(target: "progress", "Finished downloading.");
        Ok(output_path)
    }
}

/// Stream a response body into `path`
async fn write_body(mut response: reqwest::Response, path: &Path, name: &str) -> AppResult<()> {
    let total_size = response.content_length();
    if let Some(size) = total_size {
        tracing::debug!("File size: {} bytes ({} MB)", size, size / 1024 / 1024);
    }

    let mut file = File::create(path).await?;
    let mut downloaded: u64 = 0;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
    }
    file.flush().await?;

    if let Some(expected) = total_size {
        if downloaded != expected {
            return Err(AppError::Download(format!(
                "{}: got {} bytes, expected {}",
                name, downloaded, expected
            )));
        }
    }
    Ok(())
}
