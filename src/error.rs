// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Error types for browserk
//!
//! A single error enum covers the browser adapter, the crawl graph, the
//! plugin layer and configuration. Browser-side errors carry enough context
//! (CDP method, URL, timing) to be stored verbatim on a navigation result.

use thiserror::Error;

/// Result type alias for browserk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for browserk
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed (remote DevTools discovery)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage engine error
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A CDP command returned an error or could not be delivered
    #[error("CDP error in {method}: {message}")]
    Cdp { method: String, message: String },

    /// The tab crashed or the inspector detached
    #[error("Tab crashed: {0}")]
    TabCrashed(String),

    /// Operation attempted while the tab is being torn down
    #[error("Tab is closing")]
    TabClosing,

    /// Target element could not be resolved in the current document
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Navigation failed with context
    #[error("Navigation failed to {url}: {reason}")]
    NavigationFailed { url: String, reason: String },

    /// Navigation record is unusable (bad origin, unsupported action)
    #[error("Invalid navigation: {0}")]
    InvalidNavigation(String),

    /// Timeout error
    #[error("Operation timed out after {duration_ms}ms: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
        url: Option<String>,
    },

    /// No response was delivered for an injected request
    #[error("Injection response timed out")]
    InjectionTimeout,

    /// Injected request produced an empty body
    #[error("Injection response was empty")]
    EmptyInjectionResponse,

    /// Origin walk exceeded the hop bound
    #[error("Path for {id} exceeds {hops} hops")]
    PathTooLong { id: String, hops: usize },

    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Root context was cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// Browser process could not be started or attached
    #[error("Browser launch failed: {0}")]
    BrowserLaunch(String),

    /// The browser pool has been shut down
    #[error("Browser pool is closed")]
    PoolClosed,

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a CDP error
    pub fn cdp(method: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Cdp {
            method: method.into(),
            message: message.into(),
        }
    }

    /// Create a navigation error with full context
    pub fn navigation_failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::NavigationFailed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration_ms,
            url: None,
        }
    }

    /// Create a timeout error with URL
    pub fn timeout_with_url(
        operation: impl Into<String>,
        duration_ms: u64,
        url: impl Into<String>,
    ) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration_ms,
            url: Some(url.into()),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::InjectionTimeout)
    }

    /// Check if the tab is gone and the lease should be dropped
    pub fn is_crash(&self) -> bool {
        matches!(self, Error::TabCrashed(_) | Error::TabClosing)
    }

    /// Check if this is recoverable (the navigation may be retried)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. }
                | Error::TabCrashed(_)
                | Error::Http(_)
                | Error::Cdp { .. }
        )
    }

    /// Get URL if available
    pub fn url(&self) -> Option<&str> {
        match self {
            Error::NavigationFailed { url, .. } => Some(url),
            Error::Timeout { url: Some(u), .. } => Some(u),
            _ => None,
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add URL context to error
    fn with_url(self, url: &str) -> Result<T>;

    /// Add operation context to error
    fn context(self, msg: &str) -> Result<T>;
}

impl<T, E: Into<Error>> ErrorContext<T> for std::result::Result<T, E> {
    fn with_url(self, url: &str) -> Result<T> {
        self.map_err(|e| match e.into() {
            Error::Timeout {
                operation,
                duration_ms,
                ..
            } => Error::Timeout {
                operation,
                duration_ms,
                url: Some(url.to_string()),
            },
            Error::Other(reason) => Error::NavigationFailed {
                url: url.to_string(),
                reason,
            },
            other => other,
        })
    }

    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            Error::Other(format!("{}: {}", msg, err))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_error() {
        let err = Error::timeout_with_url("navigation", 45_000, "https://example.com");

        assert!(err.is_timeout());
        assert!(err.is_recoverable());
        assert_eq!(err.url(), Some("https://example.com"));
    }

    #[test]
    fn test_crash_classification() {
        assert!(Error::TabCrashed("oom".into()).is_crash());
        assert!(Error::TabClosing.is_crash());
        assert!(!Error::InjectionTimeout.is_crash());
    }

    #[test]
    fn test_with_url_context() {
        let res: std::result::Result<(), &str> = Err("blocked");
        let err = res.with_url("http://host/").unwrap_err();

        match err {
            Error::NavigationFailed { url, reason } => {
                assert_eq!(url, "http://host/");
                assert_eq!(reason, "blocked");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
