// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! One browser worker: replay a path, record what the last step found

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::browser::BrowserPool;
use crate::context::Context;
use crate::crawler::Crawler;
use crate::error::{Error, Result};
use crate::model::{Navigation, NavigationState};

/// What happened to the last navigation of a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathOutcome {
    Visited { new_navs: usize },
    Audited { new_navs: usize, attacks: usize },
    Failed,
}

pub struct Worker {
    ctx: Context,
    pool: Arc<dyn BrowserPool>,
    crawler: Crawler,
    attack: bool,
}

impl Worker {
    pub fn new(ctx: Context, pool: Arc<dyn BrowserPool>, attack: bool) -> Self {
        let crawler = Crawler::new(&ctx.config);
        Self {
            ctx,
            pool,
            crawler,
            attack,
        }
    }

    pub fn with_crawler(mut self, crawler: Crawler) -> Self {
        self.crawler = crawler;
        self
    }

    /// Run `path`, recording the outcome in the crawl graph
    #[instrument(skip_all, fields(nav = tracing::field::Empty, hops = path.len()))]
    pub async fn run(&self, path: Vec<Navigation>) -> PathOutcome {
        let Some(entry) = path.last().cloned() else {
            return PathOutcome::Failed;
        };
        tracing::Span::current().record("nav", entry.id.short().as_str());

        match self.execute(&path, &entry).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if matches!(e, Error::Cancelled) {
                    debug!("path cancelled");
                } else {
                    warn!(error = %e, what = %entry.describe(), "path failed");
                }
                if let Err(e) = self.ctx.crawl.fail_navigation(&entry.id) {
                    warn!(error = %e, "unable to mark navigation failed");
                }
                PathOutcome::Failed
            }
        }
    }

    async fn execute(&self, path: &[Navigation], entry: &Navigation) -> Result<PathOutcome> {
        let mut ctx = self.ctx.child();
        if let Some(plugins) = self.ctx.plugins.clone() {
            plugins.install(&mut ctx);
        }

        let (browser, token) = self.pool.take(&ctx).await?;
        let outcome = self.walk(&ctx, &browser, path, entry).await;
        if let Err(e) = self.pool.return_browser(&self.ctx, token).await {
            warn!(lease = %token, error = %e, "failed to return browser");
        }
        outcome
    }

    async fn walk(
        &self,
        ctx: &Context,
        browser: &Arc<dyn crate::browser::Browser>,
        path: &[Navigation],
        entry: &Navigation,
    ) -> Result<PathOutcome> {
        let last = path.len() - 1;
        for (i, nav) in path.iter().enumerate() {
            let is_final = i == last;
            let step = self.crawler.process(ctx, browser.as_ref(), nav, is_final).await?;
            if !is_final {
                if step.result.was_error {
                    return Err(Error::InvalidNavigation(format!(
                        "step {} of {} failed: {}",
                        i + 1,
                        path.len(),
                        step.result.errors.join("; ")
                    )));
                }
                continue;
            }

            let new_navs = ctx.crawl.add_navigations(&step.navs)?;
            ctx.crawl.add_result(&step.result)?;
            if step.result.was_error {
                warn!(
                    errors = %step.result.errors.join("; "),
                    what = %entry.describe(),
                    "final step failed"
                );
                return Ok(PathOutcome::Failed);
            }
            info!(
                end_url = %step.result.end_url,
                found = step.navs.len(),
                new = new_navs,
                errors = step.result.errors.len(),
                "navigation visited"
            );

            let plugins = match ctx.plugins.clone() {
                Some(p) if self.attack && ctx.config.plugins.active && p.has_active() => p,
                _ => return Ok(PathOutcome::Visited { new_navs }),
            };
            let attacks = plugins
                .run_active(ctx, Arc::clone(browser), &step.result)
                .await?;
            ctx.crawl
                .set_navigation_state(&entry.id, NavigationState::Audited)?;
            debug!(attacks, "navigation audited");
            return Ok(PathOutcome::Audited { new_navs, attacks });
        }
        Err(Error::InvalidNavigation("empty path".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeBrowser, FakePage, FakePool};
    use crate::context::test_support::test_context;
    use crate::model::{Action, ActionType, HtmlElement, TriggeredBy};
    use std::time::Duration;

    fn site() -> Arc<FakeBrowser> {
        Arc::new(FakeBrowser::new(vec![
            (
                "http://host/",
                FakePage::new("<a href=\"/b\">B</a>")
                    .element("a", HtmlElement::new("a").attr("href", "/b").with_text("B")),
            ),
            ("http://host/b", FakePage::new("<p>b</p>")),
        ]))
    }

    fn seed() -> Navigation {
        Navigation::new(None, TriggeredBy::Initial, Action::load_url("http://host/"))
    }

    fn worker(ctx: &Context, pool: Arc<FakePool>) -> Worker {
        Worker::new(ctx.clone(), pool, false).with_crawler(Crawler::with_timeout(Duration::from_secs(5)))
    }

    #[tokio::test]
    async fn test_seed_visit_records_candidates() {
        let ctx = test_context();
        let root = seed();
        ctx.crawl.add_navigation(&root).unwrap();
        let pool = Arc::new(FakePool::new(site));

        let outcome = worker(&ctx, pool.clone()).run(vec![root.clone()]).await;
        assert_eq!(outcome, PathOutcome::Visited { new_navs: 1 });
        assert_eq!(pool.leased(), 0);

        let stored = ctx.crawl.get_navigation(&root.id).unwrap().unwrap();
        assert_eq!(stored.state, NavigationState::Visited);
        assert!(ctx.crawl.get_navigation_result(&root.id).unwrap().is_some());
        let counts = ctx.crawl.state_counts().unwrap();
        assert_eq!(counts.get(&NavigationState::Unvisited), Some(&1));
    }

    #[tokio::test]
    async fn test_path_replays_every_step() {
        let ctx = test_context();
        let root = seed();
        ctx.crawl.add_navigation(&root).unwrap();
        let pool = Arc::new(FakePool::new(site));
        worker(&ctx, pool.clone()).run(vec![root.clone()]).await;

        let paths = ctx
            .crawl
            .find(NavigationState::Unvisited, NavigationState::InProcess, 1)
            .unwrap();
        assert_eq!(paths[0].len(), 2);
        let click = paths[0][1].clone();
        let outcome = worker(&ctx, pool.clone()).run(paths[0].clone()).await;
        assert_eq!(outcome, PathOutcome::Visited { new_navs: 0 });

        let tab = pool.issued.lock()[1].clone();
        let kinds: Vec<ActionType> = tab.executed().iter().map(|n| n.action.kind).collect();
        assert_eq!(kinds, vec![ActionType::LoadUrl, ActionType::LeftClick]);
        let result = ctx.crawl.get_navigation_result(&click.id).unwrap().unwrap();
        assert_eq!(result.end_url, "http://host/b");
    }

    #[tokio::test]
    async fn test_broken_intermediate_step_fails_path() {
        let ctx = test_context();
        let root = seed();
        ctx.crawl.add_navigation(&root).unwrap();
        let ghost = Navigation::new(
            Some(&root),
            TriggeredBy::Crawler,
            Action::with_element(ActionType::LeftClick, HtmlElement::new("button").with_text("gone")),
        );
        ctx.crawl.add_navigation(&ghost).unwrap();
        let next = Navigation::new(Some(&ghost), TriggeredBy::Crawler, Action::load_url("http://host/b"));
        ctx.crawl.add_navigation(&next).unwrap();

        let pool = Arc::new(FakePool::new(site));
        let outcome = worker(&ctx, pool.clone())
            .run(vec![root, ghost, next.clone()])
            .await;
        assert_eq!(outcome, PathOutcome::Failed);
        let stored = ctx.crawl.get_navigation(&next.id).unwrap().unwrap();
        assert_eq!(stored.state, NavigationState::Failed);
        assert_eq!(pool.leased(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_worker_fails_navigation() {
        let ctx = test_context();
        let root = seed();
        ctx.crawl.add_navigation(&root).unwrap();
        ctx.cancel.cancel();
        let outcome = worker(&ctx, Arc::new(FakePool::new(site))).run(vec![root.clone()]).await;
        assert_eq!(outcome, PathOutcome::Failed);
        let stored = ctx.crawl.get_navigation(&root.id).unwrap().unwrap();
        assert_eq!(stored.state, NavigationState::Failed);
    }

    #[tokio::test]
    async fn test_failed_final_action_fails_navigation() {
        let ctx = test_context();
        let root = seed();
        ctx.crawl.add_navigation(&root).unwrap();
        let ghost = Navigation::new(
            Some(&root),
            TriggeredBy::Crawler,
            Action::with_element(ActionType::LeftClick, HtmlElement::new("button").with_text("gone")),
        );
        ctx.crawl.add_navigation(&ghost).unwrap();

        let pool = Arc::new(FakePool::new(site));
        let outcome = worker(&ctx, pool.clone()).run(vec![root, ghost.clone()]).await;
        assert_eq!(outcome, PathOutcome::Failed);
        let stored = ctx.crawl.get_navigation(&ghost.id).unwrap().unwrap();
        assert_eq!(stored.state, NavigationState::Failed);
        let result = ctx.crawl.get_navigation_result(&ghost.id).unwrap().unwrap();
        assert!(result.was_error);
        assert!(!result.errors.is_empty());
        assert_eq!(pool.leased(), 0);
    }
}
