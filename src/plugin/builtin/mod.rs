// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Plugins shipped with the scanner

mod cookies;
mod headers;
mod sqli;
mod storage;
mod xss;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

pub use cookies::CookiePlugin;
pub use headers::HeadersPlugin;
pub use sqli::SqliPlugin;
pub use storage::StoragePlugin;
pub use xss::{XssPayload, XssPlugin};

use super::Plugin;
use crate::config::Config;
use crate::model::Report;
use crate::report::Reporter;

/// Every built-in plugin, configured from `[plugins.params]`
pub fn all(reporter: Arc<dyn Reporter>, config: &Config) -> Vec<Arc<dyn Plugin>> {
    let params = |id: &str| config.plugins.params.get(id).cloned().unwrap_or_default();
    vec![
        Arc::new(CookiePlugin::new(Arc::clone(&reporter))),
        Arc::new(HeadersPlugin::new(Arc::clone(&reporter))),
        Arc::new(StoragePlugin::new(Arc::clone(&reporter))),
        Arc::new(XssPlugin::new(Arc::clone(&reporter), &params(xss::ID))),
        Arc::new(SqliPlugin::new(reporter, &params(sqli::ID))),
    ]
}

/// Store a finding, logging storage failures
pub(crate) fn submit(reporter: &dyn Reporter, report: Report) {
    let check = report.check_id.clone();
    if let Err(e) = reporter.add(report.hash()) {
        warn!(check = %check, error = %e, "failed to store report");
    }
}

pub(crate) fn param<'a>(params: &'a HashMap<String, String>, key: &str, default: &'a str) -> &'a str {
    params.get(key).map(String::as_str).unwrap_or(default)
}
