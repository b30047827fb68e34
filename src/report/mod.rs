// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Finding collection and scan reports

mod json;

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::error::Result;
use crate::model::{Report, Severity};
use crate::store::PluginStore;

pub use json::ScanReport;

/// Sink for plugin findings
pub trait Reporter: Send + Sync {
    /// Store a finding; false when an identical report already exists
    fn add(&self, report: Report) -> Result<bool>;

    /// All stored findings
    fn reports(&self) -> Result<Vec<Report>>;
}

impl Reporter for PluginStore {
    fn add(&self, report: Report) -> Result<bool> {
        let report = if report.id.is_root() { report.hash() } else { report };
        self.add_report(&report)
    }

    fn reports(&self) -> Result<Vec<Report>> {
        PluginStore::reports(self)
    }
}

/// In-memory reporter used by replays and tests
#[derive(Default)]
pub struct MemoryReporter {
    reports: Mutex<Vec<Report>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for MemoryReporter {
    fn add(&self, report: Report) -> Result<bool> {
        let report = if report.id.is_root() { report.hash() } else { report };
        let mut reports = self.reports.lock();
        if reports.iter().any(|r| r.id == report.id) {
            return Ok(false);
        }
        reports.push(report);
        Ok(true)
    }

    fn reports(&self) -> Result<Vec<Report>> {
        Ok(self.reports.lock().clone())
    }
}

/// Count of findings per severity, highest first
pub fn severity_counts(reports: &[Report]) -> Vec<(Severity, usize)> {
    let mut counts: BTreeMap<Severity, usize> = BTreeMap::new();
    for r in reports {
        *counts.entry(r.severity).or_insert(0) += 1;
    }
    counts.into_iter().rev().collect()
}

/// Console summary of findings
pub fn render_console_summary(reports: &[Report]) -> String {
    if reports.is_empty() {
        return "No findings\n".to_string();
    }
    let mut out = format!("{} findings\n", reports.len());
    for (severity, n) in severity_counts(reports) {
        out.push_str(&format!("  {:<8} {}\n", severity.to_string(), n));
    }
    let mut sorted: Vec<&Report> = reports.iter().collect();
    sorted.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.check_id.cmp(&b.check_id)));
    for r in sorted {
        out.push_str(&format!(
            "[{}] {} (CWE-{}) {}\n",
            r.severity, r.check_id, r.cwe, r.url
        ));
    }
    out
}
