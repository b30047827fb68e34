// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Browser-side observations: cookies, storage, console and scripts

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// SameSite cookie attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "strict" => Some(SameSite::Strict),
            "lax" => Some(SameSite::Lax),
            "none" => Some(SameSite::None),
            _ => None,
        }
    }
}

/// A browser cookie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Domain the cookie belongs to
    pub domain: String,
    /// Path the cookie is valid for
    pub path: String,
    /// Expiration (seconds since epoch, `None` for session cookies)
    pub expires: Option<f64>,
    /// Secure flag (HTTPS only)
    pub secure: bool,
    /// HttpOnly flag (not accessible via JavaScript)
    pub http_only: bool,
    /// Session cookie
    pub session: bool,
    /// SameSite attribute, `None` when not set
    pub same_site: Option<SameSite>,
    /// CDP cookie priority (Low/Medium/High)
    pub priority: String,
    /// When the crawler saw it
    pub observed: DateTime<Utc>,
}

impl Cookie {
    /// Create a new cookie
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            path: "/".to_string(),
            expires: None,
            secure: false,
            http_only: false,
            session: true,
            same_site: None,
            priority: "Medium".to_string(),
            observed: Utc::now(),
        }
    }

    /// Set the domain
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Set the path
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set secure flag
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set http_only flag
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Set same_site attribute
    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Identity of the cookie jar slot (name, domain, path)
    pub fn slot(&self) -> (String, String, String) {
        (
            self.name.clone(),
            self.domain.trim_start_matches('.').to_ascii_lowercase(),
            self.path.clone(),
        )
    }

    /// Parse a Set-Cookie header value
    pub fn parse(header: &str, url: &Url) -> Option<Self> {
        let mut parts = header.split(';');
        let first = parts.next()?.trim();

        let (name, value) = first.split_once('=')?;
        let mut cookie = Cookie::new(name.trim(), value.trim());

        // Default domain to request host
        cookie.domain = url.host_str().unwrap_or("").to_string();

        for part in parts {
            let part = part.trim();
            if let Some((attr, val)) = part.split_once('=') {
                let attr = attr.trim().to_lowercase();
                let val = val.trim();
                match attr.as_str() {
                    "domain" => cookie.domain = val.trim_start_matches('.').to_string(),
                    "path" => cookie.path = val.to_string(),
                    "expires" => {
                        if let Ok(dt) = DateTime::parse_from_rfc2822(val) {
                            cookie.expires = Some(dt.timestamp() as f64);
                            cookie.session = false;
                        }
                    }
                    "max-age" => {
                        if let Ok(secs) = val.parse::<i64>() {
                            cookie.expires = Some((Utc::now().timestamp() + secs) as f64);
                            cookie.session = false;
                        }
                    }
                    "samesite" => cookie.same_site = SameSite::parse(val),
                    "priority" => cookie.priority = val.to_string(),
                    _ => {}
                }
            } else {
                match part.to_lowercase().as_str() {
                    "secure" => cookie.secure = true,
                    "httponly" => cookie.http_only = true,
                    _ => {}
                }
            }
        }

        Some(cookie)
    }

    /// Build from a CDP `Network.Cookie` object
    pub fn from_cdp(value: &serde_json::Value) -> Option<Self> {
        let name = value.get("name")?.as_str()?;
        let mut cookie = Cookie::new(name, value.get("value")?.as_str().unwrap_or(""));
        cookie.domain = str_field(value, "domain");
        cookie.path = str_field(value, "path");
        cookie.secure = value.get("secure").and_then(|v| v.as_bool()).unwrap_or(false);
        cookie.http_only = value.get("httpOnly").and_then(|v| v.as_bool()).unwrap_or(false);
        cookie.session = value.get("session").and_then(|v| v.as_bool()).unwrap_or(true);
        cookie.expires = value
            .get("expires")
            .and_then(|v| v.as_f64())
            .filter(|e| *e > 0.0);
        cookie.same_site = value
            .get("sameSite")
            .and_then(|v| v.as_str())
            .and_then(SameSite::parse);
        if let Some(p) = value.get("priority").and_then(|v| v.as_str()) {
            cookie.priority = p.to_string();
        }
        Some(cookie)
    }

    /// Expiration as a timestamp
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires
            .and_then(|e| Utc.timestamp_opt(e as i64, 0).single())
    }
}

fn str_field(value: &serde_json::Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

/// Web storage mutation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageEventKind {
    Cleared,
    Removed,
    Added,
    Updated,
}

/// A localStorage / sessionStorage mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageEvent {
    pub kind: StorageEventKind,
    pub is_local_storage: bool,
    pub security_origin: String,
    pub key: String,
    pub new_value: String,
    pub old_value: String,
    pub observed: DateTime<Utc>,
}

impl StorageEvent {
    /// Build from a `DOMStorage.*` event
    pub fn from_cdp(method: &str, params: &serde_json::Value) -> Option<Self> {
        let kind = match method {
            "DOMStorage.domStorageItemsCleared" => StorageEventKind::Cleared,
            "DOMStorage.domStorageItemRemoved" => StorageEventKind::Removed,
            "DOMStorage.domStorageItemAdded" => StorageEventKind::Added,
            "DOMStorage.domStorageItemUpdated" => StorageEventKind::Updated,
            _ => return None,
        };
        let storage_id = params.get("storageId")?;
        Some(Self {
            kind,
            is_local_storage: storage_id
                .get("isLocalStorage")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            security_origin: str_field(storage_id, "securityOrigin"),
            key: str_field(params, "key"),
            new_value: str_field(params, "newValue"),
            old_value: str_field(params, "oldValue"),
            observed: Utc::now(),
        })
    }
}

/// A console message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleEvent {
    pub source: String,
    pub level: String,
    pub text: String,
    pub url: String,
    pub line: i64,
    pub column: i64,
    pub observed: DateTime<Utc>,
}

impl ConsoleEvent {
    /// Build from `Runtime.consoleAPICalled`
    pub fn from_cdp(params: &serde_json::Value) -> Self {
        let text = params
            .get("args")
            .and_then(|a| a.as_array())
            .map(|args| {
                args.iter()
                    .map(|arg| match arg.get("value") {
                        Some(serde_json::Value::String(s)) => s.clone(),
                        Some(v) => v.to_string(),
                        None => arg
                            .get("description")
                            .and_then(|d| d.as_str())
                            .unwrap_or("")
                            .to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        let frame = params
            .get("stackTrace")
            .and_then(|s| s.get("callFrames"))
            .and_then(|f| f.as_array())
            .and_then(|f| f.first());

        Self {
            source: "console-api".to_string(),
            level: str_field(params, "type"),
            text,
            url: frame.map(|f| str_field(f, "url")).unwrap_or_default(),
            line: frame
                .and_then(|f| f.get("lineNumber"))
                .and_then(|v| v.as_i64())
                .unwrap_or(0),
            column: frame
                .and_then(|f| f.get("columnNumber"))
                .and_then(|v| v.as_i64())
                .unwrap_or(0),
            observed: Utc::now(),
        }
    }
}

/// A parsed script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsEvent {
    pub script_id: String,
    pub url: String,
    pub hash: String,
    pub length: i64,
    pub observed: DateTime<Utc>,
}

impl JsEvent {
    /// Build from `Debugger.scriptParsed`
    pub fn from_cdp(params: &serde_json::Value) -> Self {
        Self {
            script_id: str_field(params, "scriptId"),
            url: str_field(params, "url"),
            hash: str_field(params, "hash"),
            length: params.get("length").and_then(|v| v.as_i64()).unwrap_or(0),
            observed: Utc::now(),
        }
    }
}
