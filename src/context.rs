// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Per-scan context bundle
//!
//! Passed explicitly to every layer. Cloning is cheap: shared services are
//! behind `Arc`, and the handler chains are copied so a worker or plugin can
//! add transient handlers without touching the orchestrator's copy.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{AuthConfig, Config};
use crate::crawler::FormFiller;
use crate::error::{Error, Result};
use crate::network::Handlers;
use crate::plugin::PluginManager;
use crate::report::Reporter;
use crate::scope::ScopeService;
use crate::store::CrawlGraph;

#[derive(Clone)]
pub struct Context {
    pub cancel: CancellationToken,
    pub config: Arc<Config>,
    pub scope: Arc<ScopeService>,
    pub reporter: Arc<dyn Reporter>,
    pub crawl: Arc<CrawlGraph>,
    pub plugins: Option<Arc<PluginManager>>,
    pub auth: Arc<AuthConfig>,
    pub form_filler: Arc<FormFiller>,
    pub handlers: Handlers,
}

impl Context {
    /// Root context for a validated config
    pub fn new(config: Config, reporter: Arc<dyn Reporter>, crawl: Arc<CrawlGraph>) -> Result<Self> {
        let scope = ScopeService::from_config(&config)?;
        Ok(Self {
            cancel: CancellationToken::new(),
            auth: Arc::new(config.auth.clone()),
            form_filler: Arc::new(FormFiller::new(&config.form_data)),
            scope: Arc::new(scope),
            config: Arc::new(config),
            reporter,
            crawl,
            plugins: None,
            handlers: Handlers::new(),
        })
    }

    pub fn with_plugins(mut self, plugins: Arc<PluginManager>) -> Self {
        self.plugins = Some(plugins);
        self
    }

    /// Copy whose cancellation is also triggered by the parent
    pub fn child(&self) -> Self {
        let mut ctx = self.clone();
        ctx.cancel = self.cancel.child_token();
        ctx
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail with `Cancelled` if the context is done
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Run `fut` until it completes or the context is cancelled
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            res = fut => res,
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
        }
    }

    /// Like [`run`](Self::run) with a deadline
    pub async fn run_with_timeout<T, F>(&self, operation: &str, limit: Duration, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(limit, self.run(fut)).await {
            Ok(res) => res,
            Err(_) => Err(Error::timeout(operation, limit.as_millis() as u64)),
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("target", &self.config.url)
            .field("cancelled", &self.is_cancelled())
            .field("handlers", &self.handlers)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::report::MemoryReporter;

    /// Context over in-memory stores for `http://host/`
    pub fn test_context() -> Context {
        let config = Config::new("http://host/").finalize().unwrap();
        let crawl = Arc::new(CrawlGraph::in_memory(config.max_depth).unwrap());
        Context::new(config, Arc::new(MemoryReporter::new()), crawl).unwrap()
    }
}
