// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! JSON scan report

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::model::{NavigationState, Report};
use crate::store::CrawlGraph;

/// Report written by `run --report`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub target: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub findings: Vec<Report>,
    pub audited_urls: Vec<String>,
    pub failed_nav_count: usize,
    pub audited_nav_count: usize,
}

impl ScanReport {
    /// Assemble the report from both stores
    pub fn build(
        target: &str,
        start_time: DateTime<Utc>,
        graph: &CrawlGraph,
        findings: Vec<Report>,
    ) -> Result<Self> {
        let counts = graph.state_counts()?;
        let mut audited_urls: Vec<String> = graph
            .get_navigation_results()?
            .into_iter()
            .filter(|r| !r.end_url.is_empty())
            .map(|r| r.end_url)
            .collect();
        audited_urls.sort();
        audited_urls.dedup();

        Ok(Self {
            target: target.to_string(),
            start_time,
            end_time: Utc::now(),
            findings,
            audited_urls,
            failed_nav_count: counts.get(&NavigationState::Failed).copied().unwrap_or(0),
            audited_nav_count: counts.get(&NavigationState::Audited).copied().unwrap_or(0),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), findings = self.findings.len(), "report written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, Navigation, NavigationResult, TriggeredBy};

    #[test]
    fn test_report_shape() {
        let graph = CrawlGraph::in_memory(2).unwrap();
        let nav = Navigation::new(None, TriggeredBy::Initial, Action::load_url("http://h/"));
        graph.add_navigation(&nav).unwrap();
        let mut result = NavigationResult::new(nav.id.clone(), "about:blank");
        result.end_url = "http://h/".into();
        result.hash();
        graph.add_result(&result).unwrap();
        graph
            .set_navigation_state(&nav.id, NavigationState::Audited)
            .unwrap();

        let report = ScanReport::build("http://h/", Utc::now(), &graph, Vec::new()).unwrap();
        assert_eq!(report.audited_nav_count, 1);
        assert_eq!(report.failed_nav_count, 0);
        assert_eq!(report.audited_urls, vec!["http://h/".to_string()]);

        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        for key in [
            "target",
            "start_time",
            "end_time",
            "findings",
            "audited_urls",
            "failed_nav_count",
            "audited_nav_count",
        ] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
    }
}
