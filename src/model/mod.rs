// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Crawl data model
//!
//! Navigations, their results, captured HTTP traffic, browser-side events
//! and plugin reports. All identifiers are SHA-256 digests over stable
//! content, so the same action discovered twice maps to the same node.

pub mod action;
pub mod element;
pub mod events;
pub mod http;
pub mod navigation;
pub mod report;

pub use action::{Action, ActionType};
pub use element::{ElementType, HtmlElement, HtmlForm};
pub use events::{ConsoleEvent, Cookie, JsEvent, SameSite, StorageEvent, StorageEventKind};
pub use http::{
    HeaderValue, Headers, HttpMessage, HttpModifiedRequest, HttpModifiedResponse, HttpRequest,
    HttpResponse,
};
pub use navigation::{Navigation, NavigationResult, NavigationState, TriggeredBy};
pub use report::{Evidence, Report, Severity};

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Content-derived identifier. The empty id denotes the graph root
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Id(Vec<u8>);

impl Id {
    /// The root (no predecessor)
    pub fn root() -> Self {
        Id(Vec::new())
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Id(bytes.into())
    }

    /// Parse a hex string
    pub fn from_hex(s: &str) -> crate::error::Result<Self> {
        hex::decode(s.trim())
            .map(Id)
            .map_err(|e| crate::error::Error::other(format!("invalid id {}: {}", s, e)))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// First 8 hex characters, for logs
    pub fn short(&self) -> String {
        let hex = self.to_hex();
        hex.chars().take(8).collect()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.short())
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map(Id).map_err(serde::de::Error::custom)
    }
}

/// Incremental SHA-256 over length-prefixed fields
///
/// Each field is prefixed with its length so `("ab", "c")` and `("a", "bc")`
/// never collide.
#[derive(Default)]
pub struct IdHasher {
    inner: Sha256,
}

impl IdHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.inner.update((data.len() as u64).to_be_bytes());
        self.inner.update(data);
        self
    }

    pub fn str(self, data: &str) -> Self {
        self.bytes(data.as_bytes())
    }

    pub fn u8(mut self, v: u8) -> Self {
        self.inner.update([v]);
        self
    }

    pub fn finish(self) -> Id {
        Id(self.inner.finalize().to_vec())
    }
}

/// SHA-256 of raw bytes
pub fn hash_bytes(data: &[u8]) -> Vec<u8> {
    Sha256::digest(data).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_hex_roundtrip() {
        let id = IdHasher::new().str("x").finish();
        assert_eq!(id.as_bytes().len(), 32);
        assert_eq!(Id::from_hex(&id.to_hex()).unwrap(), id);
        assert!(Id::root().is_root());
        assert_eq!(Id::root().to_hex(), "");
    }

    #[test]
    fn test_length_prefix_separates_fields() {
        let a = IdHasher::new().str("ab").str("c").finish();
        let b = IdHasher::new().str("a").str("bc").finish();
        assert_ne!(a, b);
    }

    #[test]
    fn test_id_serde() {
        let id = Id::from_bytes(vec![0xde, 0xad]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"dead\"");
        let back: Id = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
