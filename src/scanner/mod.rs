// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Scan orchestration
//!
//! The scanner seeds the crawl graph, hands unvisited paths to a bounded
//! set of workers in batches of `num_browsers`, and stops once a batch
//! comes back empty with no browser leased.

mod worker;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use worker::{PathOutcome, Worker};

use crate::browser::{BrowserPool, ChromePool, Launcher, TabConfig};
use crate::config::Config;
use crate::context::Context;
use crate::crawler::Crawler;
use crate::error::Result;
use crate::model::{Action, Navigation, NavigationState, TriggeredBy};
use crate::plugin::{builtin, PluginManager};
use crate::report::Reporter;
use crate::store::{CrawlGraph, PluginStore};

/// How long the driver waits for outstanding leases before selecting again
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Totals for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub paths: usize,
    pub visited: usize,
    pub audited: usize,
    pub failed: usize,
    pub new_navs: usize,
    pub attacks: usize,
    pub batches: usize,
}

impl ScanSummary {
    fn record(&mut self, outcome: &PathOutcome) {
        self.paths += 1;
        match outcome {
            PathOutcome::Visited { new_navs } => {
                self.visited += 1;
                self.new_navs += new_navs;
            }
            PathOutcome::Audited { new_navs, attacks } => {
                self.audited += 1;
                self.new_navs += new_navs;
                self.attacks += attacks;
            }
            PathOutcome::Failed => self.failed += 1,
        }
    }
}

pub struct Scanner {
    ctx: Context,
    pool: Arc<dyn BrowserPool>,
    plugin_store: Option<Arc<PluginStore>>,
    attack: bool,
    crawler_timeout: Option<Duration>,
}

impl Scanner {
    pub fn new(ctx: Context, pool: Arc<dyn BrowserPool>, attack: bool) -> Self {
        Self {
            ctx,
            pool,
            plugin_store: None,
            attack,
            crawler_timeout: None,
        }
    }

    /// Open the stores under the data directory, load the enabled
    /// plugins and prepare a Chromium pool
    pub fn from_config(config: Config, attack: bool) -> Result<Self> {
        let config = config.finalize()?;
        let crawl = Arc::new(CrawlGraph::open(&config.crawl_db_path(), config.max_depth)?);
        let store = Arc::new(PluginStore::open(&config.plugin_db_path())?);
        let reporter: Arc<dyn Reporter> = store.clone();
        let plugins = Arc::new(PluginManager::from_config(
            Arc::clone(&store),
            &config,
            builtin::all(Arc::clone(&reporter), &config),
        ));
        let launcher = Arc::new(Launcher::new(config.browser.clone()));
        let pool = Arc::new(ChromePool::new(
            launcher,
            TabConfig::from_config(&config),
            config.num_browsers,
        ));
        let ctx = Context::new(config, reporter, crawl)?.with_plugins(plugins);

        let mut scanner = Self::new(ctx, pool, attack);
        scanner.plugin_store = Some(store);
        Ok(scanner)
    }

    /// Override the per-action timeout of every worker
    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.crawler_timeout = Some(timeout);
        self
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn plugin_store(&self) -> Option<&Arc<PluginStore>> {
        self.plugin_store.as_ref()
    }

    /// Ask the run loop and every worker to stop
    pub fn stop(&self) {
        self.ctx.cancel.cancel();
    }

    /// Seed the graph and recover rows left in process by a previous run
    pub fn init(&self) -> Result<()> {
        let seed = Navigation::new(
            None,
            TriggeredBy::Initial,
            Action::load_url(&self.ctx.config.url),
        );
        if self.ctx.crawl.add_navigation(&seed)? {
            info!(url = %self.ctx.config.url, nav = %seed.id.short(), "seeded crawl");
        } else {
            debug!(nav = %seed.id.short(), "seed already present");
        }
        let reset = self.ctx.crawl.reset_stale(Duration::ZERO)?;
        if reset > 0 {
            info!(reset, "recovered in-process navigations");
        }
        Ok(())
    }

    /// Longest a path may stay in process before it is considered lost
    pub fn stale_budget(config: &Config) -> Duration {
        config.timeouts.navigation() * (config.max_depth as u32 + 1) + Duration::from_secs(60)
    }

    fn spawn_monitor(&self) -> JoinHandle<()> {
        let ctx = self.ctx.clone();
        let every = ctx.config.timeouts.state_monitor();
        let budget = Self::stale_budget(&ctx.config);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = ctx.cancel.cancelled() => return,
                }
                match ctx.crawl.reset_stale(budget) {
                    Ok(0) => {}
                    Ok(n) => warn!(reset = n, "reset stuck navigations"),
                    Err(e) => warn!(error = %e, "state monitor failed"),
                }
            }
        })
    }

    fn spawn_workers(
        &self,
        paths: mpsc::Receiver<Vec<Navigation>>,
        done: mpsc::Sender<PathOutcome>,
    ) -> Vec<JoinHandle<()>> {
        let paths = Arc::new(Mutex::new(paths));
        (0..self.ctx.config.num_browsers)
            .map(|_| {
                let mut worker = Worker::new(self.ctx.clone(), Arc::clone(&self.pool), self.attack);
                if let Some(timeout) = self.crawler_timeout {
                    worker = worker.with_crawler(Crawler::with_timeout(timeout));
                }
                let paths = Arc::clone(&paths);
                let done = done.clone();
                tokio::spawn(async move {
                    loop {
                        let next = paths.lock().await.recv().await;
                        let Some(path) = next else {
                            return;
                        };
                        let outcome = worker.run(path).await;
                        if done.send(outcome).await.is_err() {
                            return;
                        }
                    }
                })
            })
            .collect()
    }

    /// Crawl until no unvisited navigation is left or the scan is stopped
    pub async fn run(&self) -> Result<ScanSummary> {
        self.init()?;
        let started = Instant::now();
        let limit = self.ctx.config.num_browsers;
        let (path_tx, path_rx) = mpsc::channel::<Vec<Navigation>>(limit);
        let (done_tx, mut done_rx) = mpsc::channel::<PathOutcome>(limit);
        let workers = self.spawn_workers(path_rx, done_tx);
        let monitor = self.spawn_monitor();

        let mut summary = ScanSummary::default();
        let result = self.drive(&path_tx, &mut done_rx, &mut summary).await;

        drop(path_tx);
        monitor.abort();
        for handle in workers {
            if let Err(e) = handle.await {
                warn!(error = %e, "worker task ended abnormally");
            }
        }
        // late completions from a stopped batch
        while let Ok(outcome) = done_rx.try_recv() {
            summary.record(&outcome);
        }

        info!(
            paths = summary.paths,
            visited = summary.visited,
            audited = summary.audited,
            failed = summary.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scan finished"
        );
        result.map(|_| summary)
    }

    async fn drive(
        &self,
        path_tx: &mpsc::Sender<Vec<Navigation>>,
        done_rx: &mut mpsc::Receiver<PathOutcome>,
        summary: &mut ScanSummary,
    ) -> Result<()> {
        let limit = self.ctx.config.num_browsers;
        loop {
            if self.ctx.is_cancelled() {
                info!("scan stopped");
                return Ok(());
            }
            let paths = self
                .ctx
                .crawl
                .find(NavigationState::Unvisited, NavigationState::InProcess, limit)?;
            if paths.is_empty() {
                let unvisited = self
                    .ctx
                    .crawl
                    .state_counts()?
                    .get(&NavigationState::Unvisited)
                    .copied()
                    .unwrap_or(0);
                if unvisited > 0 {
                    debug!(unvisited, "no path rebuilt from batch, selecting again");
                    continue;
                }
                if self.pool.leased() == 0 {
                    return Ok(());
                }
                tokio::select! {
                    _ = tokio::time::sleep(IDLE_POLL) => continue,
                    _ = self.ctx.cancel.cancelled() => return Ok(()),
                }
            }
            summary.batches += 1;
            debug!(batch = summary.batches, paths = paths.len(), "dispatching batch");

            let mut pending = 0;
            for path in paths {
                tokio::select! {
                    sent = path_tx.send(path) => {
                        if sent.is_err() {
                            return Ok(());
                        }
                        pending += 1;
                    }
                    _ = self.ctx.cancel.cancelled() => return Ok(()),
                }
            }
            while pending > 0 {
                tokio::select! {
                    outcome = done_rx.recv() => match outcome {
                        Some(outcome) => {
                            summary.record(&outcome);
                            pending -= 1;
                        }
                        None => return Ok(()),
                    },
                    _ = self.ctx.cancel.cancelled() => return Ok(()),
                }
            }
        }
    }

    /// Close every leased browser
    pub async fn shutdown(&self) -> Result<()> {
        self.ctx.cancel.cancel();
        self.pool.shutdown().await
    }
}
