// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Per-tab configuration

use std::time::Duration;

use crate::config::{AuthCookie, Config};

/// Settings applied to every tab at init
#[derive(Debug, Clone)]
pub struct TabConfig {
    /// Page load bound for `load-url` and navigate
    pub navigation_timeout: Duration,
    /// Stability bound for every other action
    pub stability_timeout: Duration,
    /// A DOM change within this window means the page is still moving
    pub quiescence: Duration,
    /// Poll interval of the stability waiter
    pub tick: Duration,
    /// `Fetch.getResponseBody` bound
    pub response_body_timeout: Duration,
    /// Injected request to response delivery bound
    pub injection_timeout: Duration,
    /// Extra headers sent with every request (auth included)
    pub extra_headers: Vec<(String, String)>,
    /// Cookies set before the first navigation
    pub cookies: Vec<AuthCookie>,
    pub user_agent: Option<String>,
    /// Accept invalid TLS certificates
    pub ignore_certificate_errors: bool,
    /// Upper bound on elements inspected for event listeners
    pub max_interactables: usize,
}

impl Default for TabConfig {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(45),
            stability_timeout: Duration::from_secs(2),
            quiescence: Duration::from_millis(300),
            tick: Duration::from_millis(150),
            response_body_timeout: Duration::from_secs(10),
            injection_timeout: Duration::from_secs(5),
            extra_headers: Vec::new(),
            cookies: Vec::new(),
            user_agent: None,
            ignore_certificate_errors: true,
            max_interactables: 1000,
        }
    }
}

impl TabConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive from the scan config
    pub fn from_config(config: &Config) -> Self {
        let t = &config.timeouts;
        let mut extra_headers: Vec<(String, String)> = config
            .browser
            .extra_headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        extra_headers.sort();
        extra_headers.extend(config.auth.request_headers());

        Self {
            navigation_timeout: t.navigation(),
            stability_timeout: t.stability(),
            quiescence: t.quiescence(),
            response_body_timeout: t.response_body(),
            injection_timeout: t.injection_response(),
            extra_headers,
            cookies: config.auth.cookies.clone(),
            user_agent: config.browser.user_agent.clone(),
            ignore_certificate_errors: config.browser.ignore_certificate_errors,
            ..Self::default()
        }
    }

    /// Set a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    pub fn stability_timeout(mut self, timeout: Duration) -> Self {
        self.stability_timeout = timeout;
        self
    }

    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    pub fn quiescence(mut self, window: Duration) -> Self {
        self.quiescence = window;
        self
    }

    pub fn injection_timeout(mut self, timeout: Duration) -> Self {
        self.injection_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthKind;

    #[test]
    fn test_from_config_merges_auth_headers() {
        let mut config = Config::new("http://host/");
        config
            .browser
            .extra_headers
            .insert("X-Scan".into(), "browserk".into());
        config.auth.kind = AuthKind::Basic;
        config.auth.username = "u".into();
        config.auth.password = "p".into();
        config.timeouts.stability_ms = 500;

        let tab = TabConfig::from_config(&config);
        assert_eq!(tab.stability_timeout, Duration::from_millis(500));
        assert_eq!(tab.extra_headers[0], ("X-Scan".into(), "browserk".into()));
        assert_eq!(tab.extra_headers[1].0, "Authorization");
        assert_eq!(tab.tick, Duration::from_millis(150));
    }
}
