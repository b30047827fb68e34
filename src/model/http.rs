// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Captured HTTP traffic

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{hash_bytes, Id, IdHasher};

/// Header value as delivered by the browser wire format
///
/// CDP header objects mix plain strings, arrays and nulls. The adapter
/// converts them into [`Headers`] right away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Single(String),
    Many(Vec<String>),
    Empty,
}

impl HeaderValue {
    /// Flatten to individual values
    pub fn values(&self) -> Vec<String> {
        match self {
            HeaderValue::Single(s) => s.split('\n').map(str::to_string).collect(),
            HeaderValue::Many(v) => v.clone(),
            HeaderValue::Empty => vec![String::new()],
        }
    }
}

/// Ordered header list; names compare case-insensitively
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a CDP header object
    pub fn from_cdp(value: &serde_json::Value) -> Self {
        let map: BTreeMap<String, HeaderValue> =
            serde_json::from_value(value.clone()).unwrap_or_default();
        let mut headers = Headers::new();
        for (name, value) in map {
            for v in value.values() {
                headers.0.push((name.clone(), v));
            }
        }
        headers
    }

    /// CDP `HeaderEntry` list (Fetch domain)
    pub fn from_entries(value: &serde_json::Value) -> Self {
        let mut headers = Headers::new();
        if let Some(entries) = value.as_array() {
            for entry in entries {
                let name = entry.get("name").and_then(|v| v.as_str()).unwrap_or("");
                let value = entry.get("value").and_then(|v| v.as_str()).unwrap_or("");
                if !name.is_empty() {
                    headers.0.push((name.to_string(), value.to_string()));
                }
            }
        }
        headers
    }

    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        Headers(pairs)
    }

    /// First value of a header
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values of a header
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Replace all values of a header
    pub fn set(&mut self, name: &str, value: &str) {
        self.remove(name);
        self.0.push((name.to_string(), value.to_string()));
    }

    pub fn add(&mut self, name: &str, value: &str) {
        self.0.push((name.to_string(), value.to_string()));
    }

    pub fn remove(&mut self, name: &str) {
        self.0.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, String)> {
        self.0.iter()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// CDP `HeaderEntry` list
    pub fn to_entries(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.0
                .iter()
                .map(|(n, v)| serde_json::json!({ "name": n, "value": v }))
                .collect(),
        )
    }

    /// CDP header object (duplicate names are joined with newlines)
    pub fn to_object(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (n, v) in &self.0 {
            match map.get_mut(n) {
                Some(serde_json::Value::String(existing)) => {
                    existing.push('\n');
                    existing.push_str(v);
                }
                _ => {
                    map.insert(n.clone(), serde_json::Value::String(v.clone()));
                }
            }
        }
        serde_json::Value::Object(map)
    }
}

/// scheme ‖ host ‖ path ‖ sorted query names
pub fn canonical_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(u) => {
            let mut names: Vec<String> = u.query_pairs().map(|(k, _)| k.to_string()).collect();
            names.sort();
            format!(
                "{}{}{}{}",
                u.scheme(),
                u.host_str().unwrap_or(""),
                u.path(),
                names.join("&")
            )
        }
        Err(_) => url.to_string(),
    }
}

/// A request observed in the browser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub id: Id,
    /// CDP network request id
    pub request_id: String,
    pub document_url: String,
    pub method: String,
    pub url: String,
    pub fragment: String,
    pub resource_type: String,
    pub headers: Headers,
    pub post_data: Option<String>,
    pub initiator: Option<String>,
    pub redirect_response: Option<Box<HttpResponse>>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        let mut req = Self {
            id: Id::root(),
            request_id: String::new(),
            document_url: String::new(),
            method: method.into(),
            url: url.into(),
            fragment: String::new(),
            resource_type: "Document".to_string(),
            headers: Headers::new(),
            post_data: None,
            initiator: None,
            redirect_response: None,
        };
        req.compute_id();
        req
    }

    /// Recompute the id after mutation
    pub fn compute_id(&mut self) {
        self.id = IdHasher::new()
            .str(&self.method)
            .str(&canonical_url(&self.url))
            .str(&self.fragment)
            .str(&self.resource_type)
            .finish();
    }

    /// Build from `Network.requestWillBeSent` params
    pub fn from_cdp(params: &serde_json::Value) -> Option<Self> {
        let request = params.get("request")?;
        let mut req = Self {
            id: Id::root(),
            request_id: s(params, "requestId"),
            document_url: s(params, "documentURL"),
            method: s(request, "method"),
            url: s(request, "url"),
            fragment: s(request, "urlFragment").trim_start_matches('#').to_string(),
            resource_type: params
                .get("type")
                .and_then(|v| v.as_str())
                .unwrap_or("Other")
                .to_string(),
            headers: Headers::from_cdp(request.get("headers").unwrap_or(&serde_json::Value::Null)),
            post_data: request
                .get("postData")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            initiator: params
                .get("initiator")
                .and_then(|i| i.get("url").or_else(|| i.get("type")))
                .and_then(|v| v.as_str())
                .map(str::to_string),
            redirect_response: params
                .get("redirectResponse")
                .and_then(HttpResponse::from_cdp)
                .map(Box::new),
        };
        req.compute_id();
        Some(req)
    }

    /// URL with the fragment re-attached
    pub fn full_url(&self) -> String {
        if self.fragment.is_empty() {
            self.url.clone()
        } else {
            format!("{}#{}", self.url, self.fragment)
        }
    }
}

/// Response timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseTiming {
    /// Request start (CDP monotonic seconds)
    pub request_time: f64,
    /// Headers received, relative to start (ms)
    pub receive_headers_end: f64,
}

/// A response observed in the browser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub id: Id,
    pub url: String,
    pub status: i64,
    pub status_text: String,
    pub headers: Headers,
    pub mime_type: String,
    pub body: Option<String>,
    pub body_hash: Id,
    pub timing: Option<ResponseTiming>,
    pub remote_ip: String,
    pub protocol: String,
    pub from_cache: bool,
}

impl HttpResponse {
    pub fn new(url: impl Into<String>, status: i64) -> Self {
        let mut resp = Self {
            id: Id::root(),
            url: url.into(),
            status,
            status_text: String::new(),
            headers: Headers::new(),
            mime_type: String::new(),
            body: None,
            body_hash: Id::root(),
            timing: None,
            remote_ip: String::new(),
            protocol: String::new(),
            from_cache: false,
        };
        resp.compute_id();
        resp
    }

    pub fn compute_id(&mut self) {
        self.id = IdHasher::new()
            .str(&self.mime_type)
            .str(&canonical_url(&self.url))
            .bytes(self.body_hash.as_bytes())
            .finish();
    }

    /// Attach the body and refresh the id
    pub fn set_body(&mut self, body: String) {
        self.body_hash = Id::from_bytes(hash_bytes(body.as_bytes()));
        self.body = Some(body);
        self.compute_id();
    }

    /// Build from a CDP `Network.Response` object
    pub fn from_cdp(response: &serde_json::Value) -> Option<Self> {
        let mut resp = Self {
            id: Id::root(),
            url: s(response, "url"),
            status: response.get("status")?.as_i64().unwrap_or(0),
            status_text: s(response, "statusText"),
            headers: Headers::from_cdp(response.get("headers").unwrap_or(&serde_json::Value::Null)),
            mime_type: s(response, "mimeType"),
            body: None,
            body_hash: Id::root(),
            timing: response.get("timing").map(|t| ResponseTiming {
                request_time: t.get("requestTime").and_then(|v| v.as_f64()).unwrap_or(0.0),
                receive_headers_end: t
                    .get("receiveHeadersEnd")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.0),
            }),
            remote_ip: s(response, "remoteIPAddress"),
            protocol: s(response, "protocol"),
            from_cache: response
                .get("fromDiskCache")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        };
        resp.compute_id();
        Some(resp)
    }

    pub fn is_https(&self) -> bool {
        self.url.starts_with("https://")
    }
}

fn s(value: &serde_json::Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

/// Request modifications collected from the handler chain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpModifiedRequest {
    pub url: Option<String>,
    pub method: Option<String>,
    pub headers: Option<Headers>,
    pub post_data: Option<String>,
}

impl HttpModifiedRequest {
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.method.is_none()
            && self.headers.is_none()
            && self.post_data.is_none()
    }

    /// Later handlers override earlier ones field by field
    pub fn merge(&mut self, other: HttpModifiedRequest) {
        if other.url.is_some() {
            self.url = other.url;
        }
        if other.method.is_some() {
            self.method = other.method;
        }
        if other.headers.is_some() {
            self.headers = other.headers;
        }
        if other.post_data.is_some() {
            self.post_data = other.post_data;
        }
    }
}

/// Response modifications collected from the handler chain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpModifiedResponse {
    pub status: Option<i64>,
    pub headers: Option<Headers>,
    pub body: Option<String>,
    pub reason: Option<String>,
}

impl HttpModifiedResponse {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.headers.is_none() && self.body.is_none() && self.reason.is_none()
    }

    pub fn merge(&mut self, other: HttpModifiedResponse) {
        if other.status.is_some() {
            self.status = other.status;
        }
        if other.headers.is_some() {
            self.headers = other.headers;
        }
        if other.body.is_some() {
            self.body = other.body;
        }
        if other.reason.is_some() {
            self.reason = other.reason;
        }
    }
}

/// One request/response exchange captured during an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpMessage {
    pub request_time: DateTime<Utc>,
    pub request: HttpRequest,
    pub modified_request: Option<HttpModifiedRequest>,
    pub response_time: Option<DateTime<Utc>>,
    pub response: Option<HttpResponse>,
    pub modified_response: Option<HttpModifiedResponse>,
}

impl HttpMessage {
    pub fn new(request: HttpRequest) -> Self {
        Self {
            request_time: Utc::now(),
            request,
            modified_request: None,
            response_time: None,
            response: None,
            modified_response: None,
        }
    }
}
