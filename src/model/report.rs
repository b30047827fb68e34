// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Plugin findings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{hash_bytes, Id, IdHasher};

/// Finding severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Evidence attached to a finding
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// Human readable evidence
    pub text: String,
    /// When set, this alone (with the check id) decides report identity
    pub uniqueness: Option<Vec<u8>>,
}

impl Evidence {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            uniqueness: None,
        }
    }

    pub fn unique(mut self, key: impl AsRef<[u8]>) -> Self {
        self.uniqueness = Some(key.as_ref().to_vec());
        self
    }
}

/// A stored plugin finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: Id,
    pub plugin: String,
    pub check_id: String,
    pub cwe: u32,
    pub description: String,
    pub remediation: String,
    pub severity: Severity,
    pub url: String,
    pub nav_id: Id,
    pub nav_result_id: Id,
    pub evidence: Evidence,
    pub reported: DateTime<Utc>,
}

impl Report {
    pub fn new(plugin: impl Into<String>, check_id: impl Into<String>, cwe: u32) -> Self {
        Self {
            id: Id::root(),
            plugin: plugin.into(),
            check_id: check_id.into(),
            cwe,
            description: String::new(),
            remediation: String::new(),
            severity: Severity::Info,
            url: String::new(),
            nav_id: Id::root(),
            nav_result_id: Id::root(),
            evidence: Evidence::default(),
            reported: Utc::now(),
        }
    }

    pub fn description(mut self, d: impl Into<String>) -> Self {
        self.description = d.into();
        self
    }

    pub fn remediation(mut self, r: impl Into<String>) -> Self {
        self.remediation = r.into();
        self
    }

    pub fn severity(mut self, s: Severity) -> Self {
        self.severity = s;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn navigation(mut self, nav_id: Id, result_id: Id) -> Self {
        self.nav_id = nav_id;
        self.nav_result_id = result_id;
        self
    }

    pub fn evidence(mut self, evidence: Evidence) -> Self {
        self.evidence = evidence;
        self
    }

    /// Compute and assign the report id
    pub fn hash(mut self) -> Self {
        let h = IdHasher::new()
            .str(&self.check_id)
            .str(&self.cwe.to_string());
        self.id = match &self.evidence.uniqueness {
            Some(unique) => h.bytes(unique).finish(),
            None => h
                .bytes(self.nav_id.as_bytes())
                .str(&self.url)
                .bytes(self.nav_result_id.as_bytes())
                .bytes(&hash_bytes(self.evidence.text.as_bytes()))
                .finish(),
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniqueness_overrides_location() {
        let a = Report::new("cookies", "secure-flag", 614)
            .url("https://a.com/x")
            .evidence(Evidence::new("SID").unique("SID|a.com|/"))
            .hash();
        let b = Report::new("cookies", "secure-flag", 614)
            .url("https://a.com/y")
            .evidence(Evidence::new("SID").unique("SID|a.com|/"))
            .hash();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_location_based_ids() {
        let a = Report::new("xss", "reflected", 79).url("http://h/a").hash();
        let b = Report::new("xss", "reflected", 79).url("http://h/b").hash();
        assert_ne!(a.id, b.id);
        assert!(Severity::High > Severity::Low);
    }
}
