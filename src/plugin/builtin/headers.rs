// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Response header hygiene

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use super::submit;
use crate::model::{Evidence, HttpResponse, Report, Severity};
use crate::plugin::{EventData, ExecutionType, Plugin, PluginEvent, PluginOpts};
use crate::report::Reporter;

pub(super) const ID: &str = "headers";

lazy_static! {
    static ref VERSION: Regex = Regex::new(r"\d+(\.\d+)+").expect("valid regex");
}

/// Checks HTML documents for missing hardening headers and version
/// disclosure. Runs once per file
pub struct HeadersPlugin {
    reporter: Arc<dyn Reporter>,
}

impl HeadersPlugin {
    pub fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self { reporter }
    }

    fn report(&self, event: &PluginEvent, check: &str, cwe: u32, severity: Severity, description: String, evidence: String) {
        let origin = event.url.origin().ascii_serialization();
        let report = Report::new(ID, check, cwe)
            .description(description)
            .remediation(remediation(check))
            .severity(severity)
            .url(event.url.as_str())
            .navigation(event.nav_id.clone(), crate::model::Id::root())
            .evidence(Evidence::new(evidence).unique(origin));
        submit(self.reporter.as_ref(), report);
    }

    fn check(&self, event: &PluginEvent, response: &HttpResponse) {
        let headers = &response.headers;
        if headers.get("content-security-policy").is_none() {
            self.report(
                event,
                "missing-csp",
                693,
                Severity::Low,
                "Document served without a Content-Security-Policy".to_string(),
                format!("{} {}", response.status, response.url),
            );
        }
        let nosniff = headers
            .get("x-content-type-options")
            .map(|v| v.trim().eq_ignore_ascii_case("nosniff"))
            .unwrap_or(false);
        if !nosniff {
            self.report(
                event,
                "missing-nosniff",
                693,
                Severity::Low,
                "Document served without X-Content-Type-Options: nosniff".to_string(),
                format!("{} {}", response.status, response.url),
            );
        }
        for name in ["server", "x-powered-by", "x-aspnet-version"] {
            if let Some(value) = headers.get(name).filter(|v| VERSION.is_match(v)) {
                self.report(
                    event,
                    "server-disclosure",
                    200,
                    Severity::Info,
                    format!("Software version disclosed in the {} header", name),
                    format!("{}: {}", name, value),
                );
            }
        }
    }
}

fn remediation(check: &str) -> &'static str {
    match check {
        "missing-csp" => "Send a Content-Security-Policy restricting script sources",
        "missing-nosniff" => "Send X-Content-Type-Options: nosniff",
        _ => "Remove version numbers from server banners",
    }
}

impl Plugin for HeadersPlugin {
    fn name(&self) -> &str {
        "Response headers"
    }

    fn id(&self) -> &str {
        ID
    }

    fn options(&self) -> PluginOpts {
        PluginOpts {
            listen_responses: true,
            execution_type: ExecutionType::OncePerFile,
            ..PluginOpts::default()
        }
    }

    fn on_event(&self, event: &PluginEvent) {
        let EventData::Response { request, response } = &event.data else {
            return;
        };
        if request.resource_type != "Document" || (300..400).contains(&response.status) {
            return;
        }
        if !response.mime_type.is_empty() && !response.mime_type.contains("html") {
            return;
        }
        self.check(event, response);
    }
}
