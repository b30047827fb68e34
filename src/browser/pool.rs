// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Browser pool for parallel workers
//!
//! Every lease gets a fresh tab in its own browser context; returning the
//! lease closes the tab and frees the slot for the next worker.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use super::config::TabConfig;
use super::launcher::Launcher;
use super::tab::ChromeTab;
use super::transport::CdpTransport;
use super::{Browser, BrowserPool, LeaseToken};
use crate::context::Context;
use crate::error::{Error, Result};

/// Opens a DevTools connection for a new lease
#[async_trait]
pub trait TabFactory: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn CdpTransport>>;
}

#[async_trait]
impl TabFactory for Launcher {
    async fn open(&self) -> Result<Arc<dyn CdpTransport>> {
        let transport = self.start().await?;
        Ok(Arc::new(transport))
    }
}

/// Pool statistics
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    pub leases_taken: u64,
    pub leases_returned: u64,
    pub active: u64,
    pub peak_concurrent: u64,
    /// Time spent waiting for a free slot (ms)
    pub total_wait_ms: u64,
    /// Tabs that failed to open or init
    pub failed: u64,
}

struct Lease {
    tab: Arc<ChromeTab>,
    _permit: OwnedSemaphorePermit,
}

pub struct ChromePool {
    factory: Arc<dyn TabFactory>,
    tab_config: TabConfig,
    semaphore: Arc<Semaphore>,
    leases: DashMap<u64, Lease>,
    next_lease: AtomicU64,
    stats: RwLock<PoolStats>,
    closed: AtomicBool,
}

impl ChromePool {
    pub fn new(factory: Arc<dyn TabFactory>, tab_config: TabConfig, size: usize) -> Self {
        Self {
            factory,
            tab_config,
            semaphore: Arc::new(Semaphore::new(size.max(1))),
            leases: DashMap::new(),
            next_lease: AtomicU64::new(1),
            stats: RwLock::new(PoolStats::default()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn stats(&self) -> PoolStats {
        self.stats.read().clone()
    }

    async fn open_tab(&self, ctx: &Context) -> Result<Arc<ChromeTab>> {
        let transport = self.factory.open().await?;
        let tab = Arc::new(ChromeTab::open(transport, self.tab_config.clone()).await?);
        if let Err(e) = tab.init(ctx).await {
            let _ = tab.close().await;
            return Err(e);
        }
        Ok(tab)
    }
}

#[async_trait]
impl BrowserPool for ChromePool {
    async fn take(&self, ctx: &Context) -> Result<(Arc<dyn Browser>, LeaseToken)> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::PoolClosed);
        }
        let start = Instant::now();
        let permit = tokio::select! {
            permit = Arc::clone(&self.semaphore).acquire_owned() => {
                permit.map_err(|_| Error::PoolClosed)?
            }
            _ = ctx.cancel.cancelled() => return Err(Error::Cancelled),
        };
        self.stats.write().total_wait_ms += start.elapsed().as_millis() as u64;

        let tab = match ctx.run(self.open_tab(ctx)).await {
            Ok(tab) => tab,
            Err(e) => {
                self.stats.write().failed += 1;
                warn!(error = %e, "failed to open tab");
                return Err(e);
            }
        };

        let token = LeaseToken(self.next_lease.fetch_add(1, Ordering::Relaxed));
        self.leases.insert(
            token.0,
            Lease {
                tab: Arc::clone(&tab),
                _permit: permit,
            },
        );
        {
            let mut stats = self.stats.write();
            stats.leases_taken += 1;
            stats.active += 1;
            if stats.active > stats.peak_concurrent {
                stats.peak_concurrent = stats.active;
            }
        }
        debug!(lease = %token, tab = tab.id(), "tab leased");
        Ok((tab as Arc<dyn Browser>, token))
    }

    async fn return_browser(&self, _ctx: &Context, token: LeaseToken) -> Result<()> {
        let Some((_, lease)) = self.leases.remove(&token.0) else {
            return Err(Error::NotFound(token.to_string()));
        };
        let res = lease.tab.close().await;
        {
            let mut stats = self.stats.write();
            stats.leases_returned += 1;
            stats.active = stats.active.saturating_sub(1);
        }
        debug!(lease = %token, "tab returned");
        // the permit drops with the lease
        res
    }

    fn leased(&self) -> usize {
        self.leases.len()
    }

    async fn shutdown(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.semaphore.close();
        let tokens: Vec<u64> = self.leases.iter().map(|e| *e.key()).collect();
        for token in tokens {
            if let Some((_, lease)) = self.leases.remove(&token) {
                if let Err(e) = lease.tab.close().await {
                    debug!(lease = token, error = %e, "close during shutdown failed");
                }
            }
        }
        let stats = self.stats();
        info!(
            taken = stats.leases_taken,
            returned = stats.leases_returned,
            peak = stats.peak_concurrent,
            wait_ms = stats.total_wait_ms,
            failed = stats.failed,
            "browser pool shut down"
        );
        Ok(())
    }
}
