// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Replay a recorded path
//!
//! Replays run against a fresh lease and never write to the crawl graph,
//! so a finished crawl can be inspected step by step.

use std::fmt::Write;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::browser::BrowserPool;
use crate::context::Context;
use crate::crawler::Crawler;
use crate::error::Result;
use crate::model::{Id, Navigation, NavigationResult};
use crate::store::CrawlGraph;

/// One replayed step
#[derive(Debug)]
pub struct ReplayStep {
    pub navigation: Navigation,
    pub result: NavigationResult,
    /// Candidates found after the last step
    pub discovered: Vec<Navigation>,
}

pub struct Replayer {
    ctx: Context,
    pool: Arc<dyn BrowserPool>,
    crawler: Crawler,
}

impl Replayer {
    pub fn new(ctx: Context, pool: Arc<dyn BrowserPool>) -> Self {
        let crawler = Crawler::new(&ctx.config);
        Self { ctx, pool, crawler }
    }

    pub fn with_crawler(mut self, crawler: Crawler) -> Self {
        self.crawler = crawler;
        self
    }

    /// Replay the path ending at `nav_id`
    ///
    /// Stops at the first failed step; the failed step is still returned.
    #[instrument(skip(self), fields(nav = %nav_id.short()))]
    pub async fn replay(&self, nav_id: &Id) -> Result<Vec<ReplayStep>> {
        let path = self.ctx.crawl.find_path_by_nav_id(nav_id)?;
        info!(hops = path.len(), "replaying path");

        let (browser, token) = self.pool.take(&self.ctx).await?;
        let steps = self.walk(browser.as_ref(), path).await;
        if let Err(e) = self.pool.return_browser(&self.ctx, token).await {
            warn!(lease = %token, error = %e, "failed to return browser");
        }
        steps
    }

    async fn walk(&self, browser: &dyn crate::browser::Browser, path: Vec<Navigation>) -> Result<Vec<ReplayStep>> {
        let last = path.len().saturating_sub(1);
        let mut steps = Vec::with_capacity(path.len());
        for (i, nav) in path.into_iter().enumerate() {
            let out = self.crawler.process(&self.ctx, browser, &nav, i == last).await?;
            let failed = out.result.was_error;
            info!(
                step = i + 1,
                what = %nav.describe(),
                end_url = %out.result.end_url,
                errors = out.result.errors.len(),
                "replayed"
            );
            steps.push(ReplayStep {
                navigation: nav,
                result: out.result,
                discovered: out.navs,
            });
            if failed {
                break;
            }
        }
        Ok(steps)
    }
}

/// One line per navigation: id, state, distance and a description
pub fn render_navigations(graph: &CrawlGraph) -> Result<String> {
    let mut navs = graph.navigations()?;
    navs.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.id.cmp(&b.id)));
    let mut out = String::new();
    for nav in navs {
        let _ = writeln!(
            out,
            "{} {:<10} {:>2} {}",
            nav.id,
            nav.state.to_string(),
            nav.distance,
            nav.describe()
        );
    }
    Ok(out)
}
