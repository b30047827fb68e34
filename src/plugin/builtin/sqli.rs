// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Error based SQL injection

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use super::{param, submit};
use crate::error::{Error, Result};
use crate::injast::{InjectKind, InjectionLocation};
use crate::model::{Evidence, Report, Severity};
use crate::plugin::{ExecutionType, Injector, Plugin, PluginOpts};
use crate::report::Reporter;

pub(super) const ID: &str = "sqli";

const PROBES: &[&str] = &["'", "\"", "')", "1'\"", "\\"];

lazy_static! {
    /// Database error signatures, by engine
    static ref DB_ERRORS: Vec<(&'static str, Regex)> = [
        ("MySQL", r"(?i)you have an error in your sql syntax|warning: mysql|mysqli?_"),
        ("PostgreSQL", r"(?i)pg_query\(|postgresql.*error|unterminated quoted string at or near"),
        ("SQLite", r#"(?i)sqlite3?\.(operational)?error|unrecognized token: "|sqlite_error"#),
        ("MSSQL", r"(?i)unclosed quotation mark after the character string|microsoft ole db provider for sql server"),
        ("Oracle", r"(?i)\bora-\d{5}\b|quoted string not properly terminated"),
        ("Generic", r"(?i)sql syntax.*error|syntax error at or near"),
    ]
    .into_iter()
    .filter_map(|(engine, pattern)| Regex::new(pattern).ok().map(|re| (engine, re)))
    .collect();
}

/// First engine whose error signature appears in `body`
fn db_error(body: &str) -> Option<(&'static str, String)> {
    DB_ERRORS
        .iter()
        .find_map(|(engine, re)| re.find(body).map(|m| (*engine, m.as_str().to_string())))
}

pub struct SqliPlugin {
    reporter: Arc<dyn Reporter>,
    max_probes: usize,
}

impl SqliPlugin {
    pub fn new(reporter: Arc<dyn Reporter>, params: &HashMap<String, String>) -> Self {
        Self {
            reporter,
            max_probes: param(params, "max_probes", "5").parse().unwrap_or(PROBES.len()),
        }
    }
}

#[async_trait]
impl Plugin for SqliPlugin {
    fn name(&self) -> &str {
        "SQL injection (error based)"
    }

    fn id(&self) -> &str {
        ID
    }

    fn config(&self) -> HashMap<String, String> {
        HashMap::from([("max_probes".to_string(), self.max_probes.to_string())])
    }

    fn options(&self) -> PluginOpts {
        PluginOpts {
            write_requests: true,
            execution_type: ExecutionType::PerRequest,
            injections: InjectionLocation::INJECT_VALUES
                | InjectionLocation::PATH
                | InjectionLocation::FILE,
            ..PluginOpts::default()
        }
    }

    async fn ready(&self, injector: &mut dyn Injector) -> Result<bool> {
        // errors already on the captured page prove nothing
        let baseline = injector
            .message()
            .response
            .as_ref()
            .and_then(|r| r.body.as_deref())
            .and_then(db_error);
        if baseline.is_some() {
            debug!(url = %injector.request().url(), "baseline already shows database errors");
            return Ok(true);
        }

        let original = injector.original();
        let location = injector.locations();
        for probe in PROBES.iter().take(self.max_probes) {
            injector.reset();
            let value = format!("{}{}", original, probe);
            if !injector.inject(&value, InjectKind::Value) {
                return Ok(false);
            }
            let ctx = injector.context().clone();
            let response = match injector.send(&ctx, false).await {
                Ok(r) => r,
                Err(Error::InjectionTimeout) | Err(Error::EmptyInjectionResponse) => continue,
                Err(e) => return Err(e),
            };
            let Some((engine, matched)) = response.body().and_then(db_error) else {
                continue;
            };

            let (nav_id, result_id) = injector.navigation();
            let url = injector.request().url();
            let report = Report::new(ID, "sqli-error", 89)
                .description(format!(
                    "{} error returned after injecting {} into {}",
                    engine, probe, location
                ))
                .remediation("Use parameterised queries; never build SQL from request input")
                .severity(Severity::High)
                .url(url.clone())
                .navigation(nav_id, result_id)
                .evidence(
                    Evidence::new(format!("{} {} -> {}", injector.request().method(), url, matched))
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
    use crate::model::{HttpMessage, HttpRequest, HttpResponse};
    use crate::plugin::BrowserInjector;
    use crate::report::MemoryReporter;

    fn injector(browser: FakeBrowser, baseline: &str) -> BrowserInjector {
        let raw = "http://host/item?id=7";
        let req = InjectionRequest::new("GET", raw, &[], None);
        let site = req
            .sites()
            .into_iter()
            .find(|s| req.original(s) == "7")
            .unwrap();
        let mut msg = HttpMessage::new(HttpRequest::new("GET", raw));
        let mut resp = HttpResponse::new(raw, 200);
        resp.set_body(baseline.to_string());
        msg.response = Some(resp);
        BrowserInjector::new(Arc::new(browser), test_context(), msg, req, site)
    }

    #[test]
    fn test_signatures() {
        assert_eq!(
            db_error("You have an error in your SQL syntax; check the manual").map(|(e, _)| e),
            Some("MySQL")
        );
        assert_eq!(db_error("ORA-01756: quoted string").map(|(e, _)| e), Some("Oracle"));
        assert!(db_error("<html>fine</html>").is_none());
    }

    #[tokio::test]
    async fn test_quote_breaks_query() {
        let reporter = Arc::new(MemoryReporter::new());
        let plugin = SqliPlugin::new(reporter.clone(), &HashMap::new());
        let browser = FakeBrowser::new(vec![]).on_inject(|req| {
            if req.url().contains("%27") || req.url().contains('\'') {
                Some("sqlite3.OperationalError: unrecognized token".to_string())
            } else {
                Some("ok".to_string())
            }
        });
        let mut inj = injector(browser, "item 7");
        assert!(plugin.ready(&mut inj).await.unwrap());
        let reports = reporter.reports().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].cwe, 89);
    }

    #[tokio::test]
    async fn test_noisy_baseline_is_skipped() {
        let reporter = Arc::new(MemoryReporter::new());
        let plugin = SqliPlugin::new(reporter.clone(), &HashMap::new());
        let browser = FakeBrowser::new(vec![]).on_inject(|_| Some("warning: mysql".to_string()));
        let mut inj = injector(browser, "Warning: mysql_fetch_array()");
        assert!(plugin.ready(&mut inj).await.unwrap());
        assert!(reporter.reports().unwrap().is_empty());
    }
}
