// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Browser process launch and remote discovery

use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::async_process::Child;
use chromiumoxide::browser::BrowserConfig;
use futures::io::{AsyncBufReadExt, BufReader};
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, info};

use super::transport::ChromiumTransport;
use crate::config::BrowserSettings;
use crate::error::{Error, Result};

/// Environment variable overriding executable discovery
pub const CHROME_ENV: &str = "BROWSERK_CHROME";

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const WS_URL_TIMEOUT: Duration = Duration::from_secs(20);

#[cfg(target_os = "macos")]
const CANDIDATES: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "google-chrome",
    "chromium",
];

#[cfg(target_os = "windows")]
const CANDIDATES: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    "chrome.exe",
    "msedge.exe",
];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const CANDIDATES: &[&str] = &[
    "google-chrome-stable",
    "google-chrome",
    "chromium",
    "chromium-browser",
    "chrome",
];

#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

/// Starts browsers or attaches to a remote one
#[derive(Debug, Clone)]
pub struct Launcher {
    settings: BrowserSettings,
}

impl Launcher {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    pub fn is_remote(&self) -> bool {
        self.settings.remote_debugging_url.is_some()
    }

    /// Open a transport: a fresh connection to the remote browser, or a new
    /// local process with its own temporary profile
    pub async fn start(&self) -> Result<ChromiumTransport> {
        if let Some(endpoint) = &self.settings.remote_debugging_url {
            let ws_url = if endpoint.starts_with("ws") {
                endpoint.clone()
            } else {
                discover_ws_url(endpoint).await?
            };
            return ChromiumTransport::connect(&ws_url, None, None, COMMAND_TIMEOUT).await;
        }

        let executable = find_executable(&self.settings)?;
        let profile = tempfile::Builder::new().prefix("browserk-profile-").tempdir()?;
        let config = self.browser_config(executable, profile.path().to_path_buf())?;

        let mut child = config
            .launch()
            .map_err(|e| Error::BrowserLaunch(format!("failed to launch chromium: {}", e)))?;
        let ws_url = extract_ws_url(&mut child).await?;
        debug!(profile = %profile.path().display(), "browser launched");

        ChromiumTransport::connect(&ws_url, Some(child), Some(profile), COMMAND_TIMEOUT).await
    }

    fn browser_config(&self, executable: PathBuf, profile: PathBuf) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .user_data_dir(profile)
            .request_timeout(COMMAND_TIMEOUT)
            .launch_timeout(WS_URL_TIMEOUT)
            .window_size(self.settings.window_width, self.settings.window_height);

        if !self.settings.headless {
            builder = builder.with_head();
        }

        let mut args: Vec<String> = [
            "--disable-background-networking",
            "--disable-background-timer-throttling",
            "--disable-breakpad",
            "--disable-component-update",
            "--disable-default-apps",
            "--disable-dev-shm-usage",
            "--disable-extensions",
            "--disable-popup-blocking",
            "--disable-sync",
            "--no-first-run",
            "--no-default-browser-check",
            "--password-store=basic",
            "--remote-allow-origins=*",
            "--use-mock-keychain",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        if self.settings.ignore_certificate_errors {
            args.push("--ignore-certificate-errors".to_string());
        }
        if let Some(ua) = &self.settings.user_agent {
            args.push(format!("--user-agent={}", ua));
        }
        args.extend(self.settings.extra_args.iter().cloned());
        builder = builder.args(args);

        builder
            .build()
            .map_err(|e| Error::BrowserLaunch(format!("browser config error: {}", e)))
    }
}

/// Resolve the Chromium executable: env override, configured path, then PATH
pub fn find_executable(settings: &BrowserSettings) -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CHROME_ENV) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    if let Some(path) = &settings.executable {
        if path.exists() {
            return Ok(path.clone());
        }
        return Err(Error::BrowserLaunch(format!(
            "chrome executable not found at {}",
            path.display()
        )));
    }
    for candidate in CANDIDATES {
        let p = PathBuf::from(candidate);
        if p.is_absolute() && p.exists() {
            return Ok(p);
        }
        if let Ok(found) = which::which(candidate) {
            return Ok(found);
        }
    }
    Err(Error::BrowserLaunch(format!(
        "no chromium executable found; set {} or browser.executable",
        CHROME_ENV
    )))
}

/// Ask a DevTools HTTP endpoint for its browser websocket URL
pub async fn discover_ws_url(endpoint: &str) -> Result<String> {
    let url = format!("{}/json/version", endpoint.trim_end_matches('/'));
    let info: VersionInfo = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    info!(endpoint = %endpoint, "discovered remote browser");
    Ok(info.web_socket_debugger_url)
}

/// Read the DevTools websocket URL from the browser's stderr
async fn extract_ws_url(child: &mut Child) -> Result<String> {
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::BrowserLaunch("browser process has no stderr".into()))?;
    tokio::time::timeout(WS_URL_TIMEOUT, read_ws_url(BufReader::new(stderr)))
        .await
        .map_err(|_| Error::timeout("waiting for devtools url", WS_URL_TIMEOUT.as_millis() as u64))?
}

async fn read_ws_url<R>(reader: BufReader<R>) -> Result<String>
where
    R: futures::io::AsyncRead + Unpin,
{
    let mut lines = reader.lines();
    let mut captured = Vec::new();
    while let Some(line) = lines.next().await {
        let line = line?;
        if let Some(ws) = parse_ws_line(&line) {
            return Ok(ws);
        }
        captured.push(line);
    }
    Err(Error::BrowserLaunch(format!(
        "browser exited before exposing a devtools url: {}",
        captured.iter().take(8).cloned().collect::<Vec<_>>().join(" | ")
    )))
}

fn parse_ws_line(line: &str) -> Option<String> {
    let (_, ws) = line.rsplit_once("listening on ")?;
    let ws = ws.trim();
    if ws.starts_with("ws") && ws.contains("devtools/browser") {
        Some(ws.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_ws_line() {
        let line = "DevTools listening on ws://127.0.0.1:9222/devtools/browser/abc-123";
        assert_eq!(
            parse_ws_line(line).as_deref(),
            Some("ws://127.0.0.1:9222/devtools/browser/abc-123")
        );
        assert!(parse_ws_line("[WARNING] something else").is_none());
    }

    #[test]
    fn test_configured_executable_must_exist() {
        let settings = BrowserSettings {
            executable: Some(PathBuf::from("/definitely/not/here/chrome")),
            ..Default::default()
        };
        if std::env::var(CHROME_ENV).is_err() {
            assert!(find_executable(&settings).is_err());
        }
    }

    #[tokio::test]
    async fn test_remote_discovery() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Browser": "HeadlessChrome/120.0",
                "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/browser/xyz"
            })))
            .mount(&server)
            .await;

        let ws = discover_ws_url(&format!("{}/", server.uri())).await.unwrap();
        assert_eq!(ws, "ws://127.0.0.1:9222/devtools/browser/xyz");
    }

    #[tokio::test]
    async fn test_remote_discovery_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/version"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        assert!(discover_ws_url(&server.uri()).await.is_err());
    }
}
