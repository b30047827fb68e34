// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Scanner configuration
//!
//! Loaded from TOML; every field has a default so a file only needs the
//! target URL. Command line flags are applied on top by the binary.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Target URL (the crawl seed)
    pub url: String,
    /// Hosts considered in scope. The target host is added when empty
    pub allowed_hosts: Vec<String>,
    /// Hosts that are silently out of scope
    pub ignored_hosts: Vec<String>,
    /// Hosts that must never be touched
    pub excluded_hosts: Vec<String>,
    /// Paths (or absolute URLs reduced to their path) that must never be touched
    pub excluded_uris: Vec<String>,
    /// Directory holding the crawl and plugin stores
    pub data_path: PathBuf,
    /// Number of concurrent browsers
    pub num_browsers: usize,
    /// Maximum navigation distance from the seed
    pub max_depth: usize,
    /// Browser launch settings
    pub browser: BrowserSettings,
    /// Authentication applied to every tab
    pub auth: AuthConfig,
    /// Form field name -> value
    pub form_data: HashMap<String, String>,
    /// Timeouts
    pub timeouts: Timeouts,
    /// Plugin selection
    pub plugins: PluginSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: String::new(),
            allowed_hosts: Vec::new(),
            ignored_hosts: Vec::new(),
            excluded_hosts: Vec::new(),
            excluded_uris: Vec::new(),
            data_path: PathBuf::from("browserk_data"),
            num_browsers: 3,
            max_depth: 10,
            browser: BrowserSettings::default(),
            auth: AuthConfig::default(),
            form_data: HashMap::new(),
            timeouts: Timeouts::default(),
            plugins: PluginSettings::default(),
        }
    }
}

/// Browser launch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Explicit Chromium executable
    pub executable: Option<PathBuf>,
    /// Run headless
    pub headless: bool,
    /// Attach to `http://host:port` instead of launching
    pub remote_debugging_url: Option<String>,
    /// Window width
    pub window_width: u32,
    /// Window height
    pub window_height: u32,
    /// User agent override
    pub user_agent: Option<String>,
    /// Extra headers sent with every request
    pub extra_headers: HashMap<String, String>,
    /// Auto-continue certificate errors
    pub ignore_certificate_errors: bool,
    /// Additional command line switches
    pub extra_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            remote_debugging_url: None,
            window_width: 1024,
            window_height: 768,
            user_agent: None,
            extra_headers: HashMap::new(),
            ignore_certificate_errors: true,
            extra_args: Vec::new(),
        }
    }
}

/// Authentication kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthKind {
    #[default]
    None,
    Basic,
    Header,
}

/// A cookie installed in every tab before the first navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
}

/// Authentication settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub kind: AuthKind,
    pub username: String,
    pub password: String,
    /// Static headers for `kind = "header"`
    pub headers: HashMap<String, String>,
    pub cookies: Vec<AuthCookie>,
}

impl AuthConfig {
    /// Headers this auth configuration adds to every request
    pub fn request_headers(&self) -> Vec<(String, String)> {
        match self.kind {
            AuthKind::None => Vec::new(),
            AuthKind::Basic => {
                let encoded = base64::Engine::encode(
                    &base64::engine::general_purpose::STANDARD,
                    format!("{}:{}", self.username, self.password),
                );
                vec![("Authorization".to_string(), format!("Basic {}", encoded))]
            }
            AuthKind::Header => {
                let mut headers: Vec<(String, String)> = self
                    .headers
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                headers.sort();
                headers
            }
        }
    }
}

/// Timeouts, all in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub navigation_ms: u64,
    pub stability_ms: u64,
    pub quiescence_ms: u64,
    pub response_body_ms: u64,
    pub injection_response_ms: u64,
    pub state_monitor_ms: u64,
    pub shutdown_grace_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_ms: 45_000,
            stability_ms: 2_000,
            quiescence_ms: 300,
            response_body_ms: 10_000,
            injection_response_ms: 5_000,
            state_monitor_ms: 10_000,
            shutdown_grace_ms: 10_000,
        }
    }
}

impl Timeouts {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn stability(&self) -> Duration {
        Duration::from_millis(self.stability_ms)
    }

    pub fn quiescence(&self) -> Duration {
        Duration::from_millis(self.quiescence_ms)
    }

    pub fn response_body(&self) -> Duration {
        Duration::from_millis(self.response_body_ms)
    }

    pub fn injection_response(&self) -> Duration {
        Duration::from_millis(self.injection_response_ms)
    }

    pub fn state_monitor(&self) -> Duration {
        Duration::from_millis(self.state_monitor_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Plugin selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSettings {
    /// Plugin ids to enable; empty enables all built-ins
    pub enabled: Vec<String>,
    /// Run active (injection) plugins after each navigation
    pub active: bool,
    /// Per-plugin string parameters keyed by plugin id
    pub params: HashMap<String, HashMap<String, String>>,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            enabled: Vec::new(),
            active: true,
            params: HashMap::new(),
        }
    }
}

impl PluginSettings {
    pub fn is_enabled(&self, id: &str) -> bool {
        self.enabled.is_empty() || self.enabled.iter().any(|e| e == id)
    }
}

impl Config {
    /// Create a config for a target
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Parse TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("reading {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Set number of browsers
    pub fn num_browsers(mut self, n: usize) -> Self {
        self.num_browsers = n;
        self
    }

    /// Set maximum depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set data directory
    pub fn data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }

    /// Add an allowed host
    pub fn allow_host(mut self, host: impl Into<String>) -> Self {
        self.allowed_hosts.push(host.into());
        self
    }

    /// Parsed target URL
    pub fn target(&self) -> Result<Url> {
        if self.url.trim().is_empty() {
            return Err(Error::config("target url is empty"));
        }
        let url = Url::parse(&self.url)
            .map_err(|e| Error::config(format!("invalid target url {}: {}", self.url, e)))?;
        if url.host_str().is_none() {
            return Err(Error::config(format!("target url {} has no host", self.url)));
        }
        Ok(url)
    }

    /// Validate and fill derived defaults
    pub fn finalize(mut self) -> Result<Self> {
        let target = self.target()?;
        if self.num_browsers == 0 {
            return Err(Error::config("num_browsers must be at least 1"));
        }
        if self.allowed_hosts.is_empty() {
            if let Some(host) = target.host_str() {
                self.allowed_hosts.push(host.to_string());
            }
        }
        Ok(self)
    }

    /// Path of the crawl graph database
    pub fn crawl_db_path(&self) -> PathBuf {
        self.data_path.join("crawl")
    }

    /// Path of the plugin database
    pub fn plugin_db_path(&self) -> PathBuf {
        self.data_path.join("plugin")
    }
}
