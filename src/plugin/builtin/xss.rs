// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Reflected XSS by marker injection

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::{param, submit};
use crate::error::{Error, Result};
use crate::injast::{InjectKind, InjectionLocation};
use crate::model::{Evidence, Report, Severity};
use crate::plugin::{ExecutionType, Injector, Plugin, PluginOpts};
use crate::report::Reporter;

pub(super) const ID: &str = "xss";

/// Where a payload is meant to break out of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadContext {
    HtmlContent,
    AttributeDouble,
    AttributeSingle,
    JsString,
}

/// A probe carrying the per-attack marker
#[derive(Debug, Clone)]
pub struct XssPayload {
    pub payload: String,
    pub context: PayloadContext,
    pub description: &'static str,
}

impl XssPayload {
    /// Probes for `marker`, most generic first
    pub fn for_marker(marker: &str) -> Vec<XssPayload> {
        vec![
            XssPayload {
                payload: format!("<script>alert('{}')</script>", marker),
                context: PayloadContext::HtmlContent,
                description: "script tag",
            },
            XssPayload {
                payload: format!("<img src=x onerror=alert('{}')>", marker),
                context: PayloadContext::HtmlContent,
                description: "img onerror handler",
            },
            XssPayload {
                payload: format!("\"><svg onload=alert('{}')>", marker),
                context: PayloadContext::AttributeDouble,
                description: "double quoted attribute breakout",
            },
            XssPayload {
                payload: format!("'><svg onload=alert('{}')>", marker),
                context: PayloadContext::AttributeSingle,
                description: "single quoted attribute breakout",
            },
            XssPayload {
                payload: format!("';alert('{}');//", marker),
                context: PayloadContext::JsString,
                description: "script string breakout",
            },
        ]
    }
}

pub struct XssPlugin {
    reporter: Arc<dyn Reporter>,
    max_payloads: usize,
    render: bool,
}

impl XssPlugin {
    pub fn new(reporter: Arc<dyn Reporter>, params: &HashMap<String, String>) -> Self {
        Self {
            reporter,
            max_payloads: param(params, "max_payloads", "5").parse().unwrap_or(5),
            render: param(params, "render", "false") == "true",
        }
    }
}

#[async_trait]
impl Plugin for XssPlugin {
    fn name(&self) -> &str {
        "Reflected XSS"
    }

    fn id(&self) -> &str {
        ID
    }

    fn config(&self) -> HashMap<String, String> {
        HashMap::from([
            ("max_payloads".to_string(), self.max_payloads.to_string()),
            ("render".to_string(), self.render.to_string()),
        ])
    }

    fn options(&self) -> PluginOpts {
        PluginOpts {
            write_requests: true,
            execution_type: ExecutionType::PerRequest,
            injections: InjectionLocation::INJECT_COMMON,
            ..PluginOpts::default()
        }
    }

    async fn ready(&self, injector: &mut dyn Injector) -> Result<bool> {
        let marker = format!("bk{}", &Uuid::new_v4().simple().to_string()[..8]);
        let location = injector.locations();

        for probe in XssPayload::for_marker(&marker).into_iter().take(self.max_payloads) {
            injector.reset();
            if !injector.inject(&probe.payload, InjectKind::Value) {
                return Ok(false);
            }
            let ctx = injector.context().clone();
            let response = match injector.send(&ctx, self.render).await {
                Ok(r) => r,
                Err(Error::InjectionTimeout) | Err(Error::EmptyInjectionResponse) => {
                    debug!(site = %location, "no response to probe");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let reflected = response
                .body()
                .map(|b| b.contains(&probe.payload))
                .unwrap_or(false)
                || response
                    .dom
                    .as_deref()
                    .map(|d| d.contains(&probe.payload))
                    .unwrap_or(false);
            if !reflected {
                continue;
            }

            let (nav_id, result_id) = injector.navigation();
            let url = injector.request().url();
            let original = injector.original();
            let report = Report::new(ID, "reflected-xss", 79)
                .description(format!(
                    "Input at {} is reflected unencoded ({})",
                    location, probe.description
                ))
                .remediation("Encode untrusted data for the HTML context it is written into")
                .severity(Severity::High)
                .url(url.clone())
                .navigation(nav_id, result_id)
                .evidence(
                    Evidence::new(format!("{} {} payload: {}", injector.request().method(), url, probe.payload))
                        .unique(format!("{}|{}|{}", injector.message().request.id, location.bits(), original)),
                );
            submit(self.reporter.as_ref(), report);
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakeBrowser;
    use crate::context::test_support::test_context;
    use crate::injast::InjectionRequest;
    use crate::model::{HttpMessage, HttpRequest};
    use crate::plugin::BrowserInjector;
    use crate::report::MemoryReporter;
    use url::Url;

    fn injector(browser: FakeBrowser) -> BrowserInjector {
        let raw = "http://host/search?q=shoes";
        let req = InjectionRequest::new("GET", raw, &[], None);
        let site = req
            .sites()
            .into_iter()
            .find(|s| req.original(s) == "shoes")
            .unwrap();
        let msg = HttpMessage::new(HttpRequest::new("GET", raw));
        BrowserInjector::new(Arc::new(browser), test_context(), msg, req, site)
    }

    fn query_q(req: &InjectionRequest) -> Option<String> {
        let url = Url::parse(&req.url()).ok()?;
        url.query_pairs()
            .find(|(k, _)| k == "q")
            .map(|(_, v)| v.to_string())
    }

    #[tokio::test]
    async fn test_reflection_is_reported() {
        let reporter = Arc::new(MemoryReporter::new());
        let plugin = XssPlugin::new(reporter.clone(), &HashMap::new());
        let browser = FakeBrowser::new(vec![])
            .on_inject(|req| query_q(req).map(|q| format!("<p>Results for {}</p>", q)));
        let mut inj = injector(browser);

        assert!(plugin.ready(&mut inj).await.unwrap());
        let reports = reporter.reports().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].cwe, 79);
        assert_eq!(reports[0].severity, Severity::High);
    }

    #[tokio::test]
    async fn test_encoded_output_is_clean() {
        let reporter = Arc::new(MemoryReporter::new());
        let plugin = XssPlugin::new(reporter.clone(), &HashMap::new());
        let browser = FakeBrowser::new(vec![]).on_inject(|req| {
            query_q(req).map(|q| q.replace('<', "&lt;").replace('>', "&gt;").replace('\'', "&#39;"))
        });
        let mut inj = injector(browser);

        assert!(!plugin.ready(&mut inj).await.unwrap());
        assert!(reporter.reports().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timeouts_are_tolerated() {
        let reporter = Arc::new(MemoryReporter::new());
        let mut params = HashMap::new();
        params.insert("max_payloads".to_string(), "2".to_string());
        let plugin = XssPlugin::new(reporter.clone(), &params);
        let browser = FakeBrowser::new(vec![]);
        let mut inj = injector(browser);
        assert!(!plugin.ready(&mut inj).await.unwrap());
    }
}
