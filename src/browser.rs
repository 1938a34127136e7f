//! Target APK download through browser automation
//!
//! The store page only exposes its download link after scripts run, so the
//! page is opened in a headless Firefox driven over WebDriver. Once the link
//! is found the file itself is streamed with the regular downloader.

use crate::error::{AppError, AppResult};
use crate::storage::config::TARGET_PACKAGE;
use crate::storage::download::USER_AGENT;
use crate::storage::{Config, Downloader};
use fantoccini::{Client, ClientBuilder, Locator};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, REFERER};
use reqwest::Url;
use serde_json::{json, Map, Value};
use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::time::{sleep, Duration, Instant};

const STORE_PAGE: &str = "https://apkpure.com/youtube";
const DOWNLOAD_LINK: &str = "a.jump-downloading-btn";
const LINK_TIMEOUT: Duration = Duration::from_secs(180);
const DRIVER_STARTUP: Duration = Duration::from_secs(15);

/// Store page for a specific app version
pub fn store_page_url(version: &str) -> String {
    format!("{}/{}/download/{}", STORE_PAGE, TARGET_PACKAGE, version)
}

/// Headless Firefox with the tool's User-Agent
pub fn firefox_capabilities() -> Map<String, Value> {
    let mut caps = Map::new();
    caps.insert("browserName".to_string(), json!("firefox"));
    caps.insert(
        "moz:firefoxOptions".to_string(),
        json!({
            "args": ["-headless"],
            "prefs": {
                "general.useragent.override": USER_AGENT,
            }
        }),
    );
    caps
}

/// Turn a possibly relative `href` into an absolute URL
pub fn resolve_link(page: &str, href: &str) -> AppResult<String> {
    let base = Url::parse(page).map_err(|e| AppError::Browser(format!("bad page URL: {}", e)))?;
    base.join(href)
        .map(|u| u.to_string())
        .map_err(|e| AppError::Browser(format!("bad download link {:?}: {}", href, e)))
}

/// A locally spawned `geckodriver`, killed when dropped
pub struct GeckoDriver {
    child: Child,
    url: String,
}

impl GeckoDriver {
    /// Start geckodriver on a free local port and wait until it accepts connections
    pub async fn spawn() -> AppResult<Self> {
        let port = free_port()?;
        tracing::info!("Starting geckodriver on port {}", port);

        let child = Command::new("geckodriver")
            .arg("--port")
            .arg(port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::DriverSetup(format!("couldn't launch geckodriver: {}", e)))?;

        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let deadline = Instant::now() + DRIVER_STARTUP;
        loop {
            if TcpStream::connect(addr).await.is_ok() {
                break;
            }
            if Instant::now() >= deadline {
                return Err(AppError::DriverSetup(format!(
                    "geckodriver didn't listen on port {} within {}s",
                    port,
                    DRIVER_STARTUP.as_secs()
                )));
            }
            sleep(Duration::from_millis(100)).await;
        }

        Ok(Self {
            child,
            url: format!("http://{}", addr),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn shutdown(mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::warn!("Failed to stop geckodriver: {}", e);
        }
    }
}

fn free_port() -> AppResult<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    Ok(listener.local_addr()?.port())
}

/// Downloads the original APK from the store
pub struct ApkFetcher {
    webdriver_url: String,
    downloader: Downloader,
}

impl ApkFetcher {
    pub fn new(webdriver_url: impl Into<String>, downloader: Downloader) -> Self {
        Self {
            webdriver_url: webdriver_url.into(),
            downloader,
        }
    }

    /// Fetch `version` into `dir`, returning the saved path
    pub async fn fetch(&self, version: &str, dir: &Path) -> AppResult<PathBuf> {
        tracing::info!(target: "progress", "Downloading latest YouTube APK...");

        let page = store_page_url(version);
        let found = self.find_download_link(&page).await?;
        tracing::debug!("Found download link: {}", found.url);

        let headers = download_headers(&page, found.cookies.as_deref())?;
        self.downloader
            .fetch_with(&found.url, dir, &Config::original_apk_name(version), headers)
            .await
    }

    async fn find_download_link(&self, page: &str) -> AppResult<DownloadLink> {
        let client = ClientBuilder::native()
            .capabilities(firefox_capabilities())
            .connect(&self.webdriver_url)
            .await?;

        let result = locate_link(&client, page).await;

        if let Err(e) = client.close().await {
            tracing::warn!("Failed to close browser session: {}", e);
        }

        result
    }
}

/// Download link plus the browser session it was found in
struct DownloadLink {
    url: String,
    cookies: Option<String>,
}

/// `Cookie` header value for a set of name/value pairs
pub fn cookie_header<'a, I>(cookies: I) -> Option<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let joined = cookies
        .into_iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("; ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

/// Headers that make the APK request look like it came from the store page
pub fn download_headers(page: &str, cookies: Option<&str>) -> AppResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    let referer = HeaderValue::from_str(page)
        .map_err(|e| AppError::Browser(format!("bad page URL {:?}: {}", page, e)))?;
    headers.insert(REFERER, referer);

    if let Some(cookies) = cookies {
        let value = HeaderValue::from_str(cookies)
            .map_err(|e| AppError::Browser(format!("unusable session cookies: {}", e)))?;
        headers.insert(COOKIE, value);
    }
    Ok(headers)
}

async fn locate_link(client: &Client, page: &str) -> AppResult<DownloadLink> {
    tracing::debug!("Opening {}", page);
    client.goto(page).await?;

    let element = client
        .wait()
        .at_most(LINK_TIMEOUT)
        .for_element(Locator::Css(DOWNLOAD_LINK))
        .await?;

    let href = element
        .attr("href")
        .await?
        .filter(|h| !h.trim().is_empty())
        .ok_or_else(|| AppError::Browser(format!("{} has no href on {}", DOWNLOAD_LINK, page)))?;

    let session_cookies = client.get_all_cookies().await?;
    let cookies = cookie_header(session_cookies.iter().map(|c| (c.name(), c.value())));

    Ok(DownloadLink {
        url: resolve_link(page, &href)?,
        cookies,
    })
}
