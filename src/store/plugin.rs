// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Plugin state: reports, uniqueness markers and attacked sites

use std::path::Path;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::kv::KvStore;
use crate::error::Result;
use crate::model::{hash_bytes, Report};

const REPORT_PREFIX: &[u8] = b"report:";
const UNIQ_PREFIX: &str = "uniq";
const ACTIVE_PREFIX: &str = "active";

bitflags! {
    /// Dimensions of an event that have not been observed before
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Uniqueness: u8 {
        const HOST = 1 << 0;
        const PATH = 1 << 1;
        const FILE = 1 << 2;
        const QUERY = 1 << 3;
        const FRAGMENT = 1 << 4;
        const PAGE = 1 << 5;
        const REQUEST = 1 << 6;
        const RESPONSE = 1 << 7;
    }
}

/// Per-dimension identity of one event
#[derive(Debug, Clone)]
pub struct UniqueKeys {
    keys: Vec<(Uniqueness, Vec<u8>)>,
}

impl UniqueKeys {
    /// Derive keys from the event URL; `payload` identifies the request or
    /// response the event carries, if any
    pub fn new(url: &Url, request: Option<&[u8]>, response: Option<&[u8]>) -> Self {
        let host = format!("{}://{}", url.scheme(), url.host_str().unwrap_or(""));
        let host = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host,
        };
        let path = url.path();
        let dir = match path.rfind('/') {
            Some(i) => &path[..=i],
            None => "/",
        };

        let mut keys = vec![
            (Uniqueness::HOST, host.clone().into_bytes()),
            (Uniqueness::PATH, format!("{}{}", host, dir).into_bytes()),
            (Uniqueness::FILE, format!("{}{}", host, path).into_bytes()),
        ];
        if let Some(q) = url.query() {
            keys.push((Uniqueness::QUERY, format!("{}{}?{}", host, path, q).into_bytes()));
        }
        if let Some(f) = url.fragment() {
            keys.push((Uniqueness::FRAGMENT, format!("{}{}#{}", host, path, f).into_bytes()));
        }
        keys.push((Uniqueness::PAGE, url.as_str().as_bytes().to_vec()));
        if let Some(r) = request {
            keys.push((Uniqueness::REQUEST, r.to_vec()));
        }
        if let Some(r) = response {
            keys.push((Uniqueness::RESPONSE, r.to_vec()));
        }
        Self { keys }
    }
}

/// Storage for plugin output and bookkeeping
pub struct PluginStore {
    kv: KvStore,
}

impl PluginStore {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            kv: KvStore::open(path)?,
        })
    }

    pub fn open_read_only(path: &Path) -> Result<Self> {
        Ok(Self {
            kv: KvStore::open_read_only(path)?,
        })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            kv: KvStore::in_memory()?,
        })
    }

    /// Store a report unless one with the same id exists; true when new
    pub fn add_report(&self, report: &Report) -> Result<bool> {
        let mut key = REPORT_PREFIX.to_vec();
        key.extend_from_slice(report.id.as_bytes());
        let value = serde_json::to_vec(report)?;
        let added = self.kv.update(|txn| txn.put_if_absent(&key, &value))?;
        if !added {
            debug!(report = %report.id.short(), check = %report.check_id, "duplicate report suppressed");
        }
        Ok(added)
    }

    pub fn reports(&self) -> Result<Vec<Report>> {
        self.kv
            .scan_prefix(REPORT_PREFIX)?
            .into_iter()
            .map(|(_, v)| Ok(serde_json::from_slice(&v)?))
            .collect()
    }

    /// Record the event's keys for `event_type` and return the dimensions
    /// that were seen for the first time
    pub fn uniqueness(&self, event_type: &str, keys: &UniqueKeys) -> Result<Uniqueness> {
        self.kv.update(|txn| {
            let mut unique = Uniqueness::empty();
            for (bit, value) in &keys.keys {
                let key = uniq_key(event_type, *bit, value);
                if txn.put_if_absent(&key, &[1])? {
                    unique |= *bit;
                }
            }
            Ok(unique)
        })
    }

    /// Mark an injection site as attacked by a plugin; false if it already was
    pub fn mark_attacked(&self, plugin_id: &str, site: &[u8]) -> Result<bool> {
        let mut key = format!("{}:{}:", ACTIVE_PREFIX, plugin_id).into_bytes();
        key.extend_from_slice(&hash_bytes(site));
        self.kv.update(|txn| txn.put_if_absent(&key, &[1]))
    }
}

fn uniq_key(event_type: &str, bit: Uniqueness, value: &[u8]) -> Vec<u8> {
    let mut key = format!("{}:{}:{}:", UNIQ_PREFIX, event_type, bit.bits()).into_bytes();
    key.extend_from_slice(&hash_bytes(value));
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Evidence, Severity};

    #[test]
    fn test_reports_insert_once() {
        let store = PluginStore::in_memory().unwrap();
        let report = Report::new("cookies", "secure-flag", 614)
            .severity(Severity::Low)
            .evidence(Evidence::new("SID").unique("SID|a.com|/"))
            .hash();
        assert!(store.add_report(&report).unwrap());
        assert!(!store.add_report(&report).unwrap());
        assert_eq!(store.reports().unwrap().len(), 1);
    }

    #[test]
    fn test_uniqueness_bits() {
        let store = PluginStore::in_memory().unwrap();
        let a = Url::parse("https://a.com/x/y?q=1").unwrap();
        let first = store
            .uniqueness("response", &UniqueKeys::new(&a, None, Some(b"r1")))
            .unwrap();
        assert!(first.contains(Uniqueness::HOST | Uniqueness::PATH | Uniqueness::QUERY));
        assert!(!first.contains(Uniqueness::FRAGMENT));

        let b = Url::parse("https://a.com/x/z").unwrap();
        let second = store
            .uniqueness("response", &UniqueKeys::new(&b, None, Some(b"r1")))
            .unwrap();
        assert!(!second.contains(Uniqueness::HOST));
        assert!(!second.contains(Uniqueness::PATH));
        assert!(second.contains(Uniqueness::FILE));
        assert!(!second.contains(Uniqueness::RESPONSE));

        // event types are tracked separately
        let other = store
            .uniqueness("cookie", &UniqueKeys::new(&b, None, None))
            .unwrap();
        assert!(other.contains(Uniqueness::HOST));
    }

    #[test]
    fn test_mark_attacked() {
        let store = PluginStore::in_memory().unwrap();
        assert!(store.mark_attacked("xss", b"GET http://h/?q=").unwrap());
        assert!(!store.mark_attacked("xss", b"GET http://h/?q=").unwrap());
        assert!(store.mark_attacked("sqli", b"GET http://h/?q=").unwrap());
    }
}
