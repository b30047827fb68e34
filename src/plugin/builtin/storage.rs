// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Secrets written to web storage

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use super::submit;
use crate::model::{Evidence, Id, Report, Severity, StorageEventKind};
use crate::plugin::{EventData, ExecutionType, Plugin, PluginEvent, PluginOpts};
use crate::report::Reporter;

pub(super) const ID: &str = "storage";

lazy_static! {
    static ref SECRET_KEY: Regex =
        Regex::new(r"(?i)(token|secret|passw(or)?d|session|auth|jwt|api[_-]?key|credential)")
            .expect("valid regex");
    static ref JWT: Regex =
        Regex::new(r"eyJ[A-Za-z0-9_-]{5,}\.[A-Za-z0-9_-]{5,}\.[A-Za-z0-9_-]*").expect("valid regex");
}

/// Reports tokens and credentials persisted in localStorage
pub struct StoragePlugin {
    reporter: Arc<dyn Reporter>,
}

impl StoragePlugin {
    pub fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self { reporter }
    }
}

impl Plugin for StoragePlugin {
    fn name(&self) -> &str {
        "Storage secrets"
    }

    fn id(&self) -> &str {
        ID
    }

    fn options(&self) -> PluginOpts {
        PluginOpts {
            listen_storage: true,
            execution_type: ExecutionType::PerRequest,
            ..PluginOpts::default()
        }
    }

    fn on_event(&self, event: &PluginEvent) {
        let EventData::Storage(s) = &event.data else {
            return;
        };
        if !s.is_local_storage || !matches!(s.kind, StorageEventKind::Added | StorageEventKind::Updated) {
            return;
        }
        if s.new_value.is_empty() {
            return;
        }
        let reason = if JWT.is_match(&s.new_value) {
            "JSON web token"
        } else if SECRET_KEY.is_match(&s.key) {
            "credential-like key"
        } else {
            return;
        };

        let report = Report::new(ID, "storage-secret", 922)
            .description(format!("{} stored in localStorage under {}", reason, s.key))
            .remediation("Keep session tokens in HttpOnly cookies; localStorage is readable by any script on the origin")
            .severity(Severity::Medium)
            .url(event.url.as_str())
            .navigation(event.nav_id.clone(), Id::root())
            .evidence(
                Evidence::new(format!("{} {}={}", s.security_origin, s.key, truncate(&s.new_value)))
                    .unique(format!("{}|{}", s.security_origin, s.key)),
            );
        submit(self.reporter.as_ref(), report);
    }
}

fn truncate(value: &str) -> String {
    if value.chars().count() > 64 {
        format!("{}...", value.chars().take(64).collect::<String>())
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StorageEvent;
    use crate::report::MemoryReporter;
    use chrono::Utc;
    use url::Url;

    fn stored(key: &str, value: &str, local: bool) -> PluginEvent {
        let ev = StorageEvent {
            kind: StorageEventKind::Added,
            is_local_storage: local,
            security_origin: "https://host".into(),
            key: key.into(),
            new_value: value.into(),
            old_value: String::new(),
            observed: Utc::now(),
        };
        PluginEvent::storage(Url::parse("https://host/").unwrap(), Id::root(), ev)
    }

    #[test]
    fn test_tokens_in_local_storage() {
        let reporter = Arc::new(MemoryReporter::new());
        let plugin = StoragePlugin::new(reporter.clone());
        plugin.on_event(&stored("access_token", "abc", true));
        plugin.on_event(&stored("profile", "eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiIxIn0.sig", true));
        plugin.on_event(&stored("theme", "dark", true));
        plugin.on_event(&stored("session", "abc", false));

        let reports = reporter.reports().unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.cwe == 922));
    }
}
