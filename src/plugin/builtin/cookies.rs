// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Cookie attribute checks

use std::sync::Arc;

use super::submit;
use crate::model::{Cookie, Evidence, Id, Report, SameSite, Severity};
use crate::plugin::{EventData, ExecutionType, Plugin, PluginEvent, PluginOpts};
use crate::report::Reporter;

pub(super) const ID: &str = "cookies";

struct Check {
    id: &'static str,
    cwe: u32,
    severity: Severity,
    description: &'static str,
    remediation: &'static str,
    fails: fn(&Cookie) -> bool,
}

const CHECKS: &[Check] = &[
    Check {
        id: "cookie-secure",
        cwe: 614,
        severity: Severity::Low,
        description: "Cookie set over HTTPS without the Secure attribute",
        remediation: "Set the Secure attribute so the cookie is never sent over plain HTTP",
        fails: |c| !c.secure,
    },
    Check {
        id: "cookie-httponly",
        cwe: 1004,
        severity: Severity::Low,
        description: "Cookie readable from script (no HttpOnly attribute)",
        remediation: "Set the HttpOnly attribute unless client script must read the cookie",
        fails: |c| !c.http_only,
    },
    Check {
        id: "cookie-samesite",
        cwe: 1275,
        severity: Severity::Low,
        description: "Cookie without a restrictive SameSite attribute",
        remediation: "Set SameSite=Lax or SameSite=Strict",
        fails: |c| matches!(c.same_site, None | Some(SameSite::None)),
    },
];

/// Flags cookies set on HTTPS pages without Secure, HttpOnly or SameSite
pub struct CookiePlugin {
    reporter: Arc<dyn Reporter>,
}

impl CookiePlugin {
    pub fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self { reporter }
    }
}

impl Plugin for CookiePlugin {
    fn name(&self) -> &str {
        "Cookie attributes"
    }

    fn id(&self) -> &str {
        ID
    }

    fn options(&self) -> PluginOpts {
        PluginOpts {
            listen_cookies: true,
            execution_type: ExecutionType::PerRequest,
            ..PluginOpts::default()
        }
    }

    fn on_event(&self, event: &PluginEvent) {
        let EventData::Cookie(cookie) = &event.data else {
            return;
        };
        if event.url.scheme() != "https" {
            return;
        }
        for check in CHECKS.iter().filter(|c| (c.fails)(cookie)) {
            let evidence = format!(
                "{}={}; Domain={}; Path={}; Secure={}; HttpOnly={}; SameSite={:?}",
                cookie.name,
                cookie.value,
                cookie.domain,
                cookie.path,
                cookie.secure,
                cookie.http_only,
                cookie.same_site
            );
            let unique = format!("{}|{}|{}", cookie.name, cookie.domain, cookie.path);
            let report = Report::new(ID, check.id, check.cwe)
                .description(format!("{}: {}", check.description, cookie.name))
                .remediation(check.remediation)
                .severity(check.severity)
                .url(event.url.as_str())
                .navigation(event.nav_id.clone(), Id::root())
                .evidence(Evidence::new(evidence).unique(unique));
            submit(self.reporter.as_ref(), report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemoryReporter;
    use url::Url;

    fn event(url: &str, cookie: Cookie) -> PluginEvent {
        PluginEvent::cookie(Url::parse(url).unwrap(), Id::root(), cookie)
    }

    #[test]
    fn test_bare_cookie_on_https_fails_every_check() {
        let reporter = Arc::new(MemoryReporter::new());
        let plugin = CookiePlugin::new(reporter.clone());
        plugin.on_event(&event("https://host/", Cookie::new("SID", "x").domain("host").path("/")));

        let reports = reporter.reports().unwrap();
        let mut cwes: Vec<u32> = reports.iter().map(|r| r.cwe).collect();
        cwes.sort_unstable();
        assert_eq!(cwes, vec![614, 1004, 1275]);
    }

    #[test]
    fn test_hardened_cookie_and_plain_http_are_quiet() {
        let reporter = Arc::new(MemoryReporter::new());
        let plugin = CookiePlugin::new(reporter.clone());
        let hardened = Cookie::new("SID", "x")
            .secure(true)
            .http_only(true)
            .same_site(SameSite::Strict);
        plugin.on_event(&event("https://host/", hardened));
        plugin.on_event(&event("http://host/", Cookie::new("SID", "x")));
        assert!(reporter.reports().unwrap().is_empty());
    }

    #[test]
    fn test_same_cookie_reported_once() {
        let reporter = Arc::new(MemoryReporter::new());
        let plugin = CookiePlugin::new(reporter.clone());
        let c = Cookie::new("SID", "x").secure(true).http_only(true).same_site(SameSite::Lax);
        plugin.on_event(&event("https://host/a", Cookie::new("t", "1")));
        plugin.on_event(&event("https://host/b", Cookie::new("t", "2")));
        plugin.on_event(&event("https://host/b", c));
        assert_eq!(reporter.reports().unwrap().len(), 3);
    }
}
