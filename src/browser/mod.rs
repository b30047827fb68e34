// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Browser adapter
//!
//! A [`Browser`] is one controlled tab: it executes navigations, reports
//! what the page did and issues injected requests. A [`BrowserPool`] leases
//! tabs to workers. The Chromium implementation speaks CDP through a
//! [`CdpTransport`](transport::CdpTransport).

mod config;
pub mod dom;
#[cfg(test)]
pub(crate) mod fake;
mod launcher;
mod pool;
pub mod scripts;
mod tab;
pub mod transport;

use std::sync::Arc;

use async_trait::async_trait;

pub use config::TabConfig;
pub use launcher::{discover_ws_url, find_executable, Launcher, CHROME_ENV};
pub use pool::{ChromePool, PoolStats, TabFactory};
pub use tab::{ChromeTab, DocState, NavState};
pub use transport::{CdpTransport, ChromiumTransport, TransportEvent};

use crate::context::Context;
use crate::error::Result;
use crate::injast::InjectionRequest;
use crate::model::{ConsoleEvent, Cookie, HtmlElement, HtmlForm, HttpMessage, Navigation, StorageEvent};
use crate::network::InterceptedHttpResponse;

/// Outcome of executing one navigation's action
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Action return value (script result)
    pub result: Option<Vec<u8>>,
    /// The document was replaced while the action ran
    pub caused_load: bool,
}

/// Identifies one lease from a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeaseToken(pub(crate) u64);

impl std::fmt::Display for LeaseToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lease-{}", self.0)
    }
}

#[async_trait]
pub trait Browser: Send + Sync {
    fn id(&self) -> &str;

    /// Enable domains, install auth headers and cookies
    async fn init(&self, ctx: &Context) -> Result<()>;

    async fn close(&self) -> Result<()>;

    /// Load `url` and wait for the page to settle
    async fn navigate(&self, ctx: &Context, url: &str) -> Result<()>;

    async fn get_url(&self) -> Result<String>;

    async fn get_dom(&self) -> Result<String>;

    async fn get_base_href(&self) -> Result<String>;

    /// Rebuild the top document node and drop cached elements
    async fn refresh_document(&self) -> Result<()>;

    /// PNG bytes of the viewport
    async fn screenshot(&self) -> Result<Vec<u8>>;

    async fn find_elements(
        &self,
        ctx: &Context,
        selector: &str,
        may_refresh: bool,
    ) -> Result<Vec<HtmlElement>>;

    async fn find_forms(&self, ctx: &Context) -> Result<Vec<HtmlForm>>;

    /// Elements with at least one attached event listener
    async fn find_interactables(&self, ctx: &Context) -> Result<Vec<HtmlElement>>;

    async fn execute_action(&self, ctx: &Context, nav: &Navigation) -> Result<ActionOutcome>;

    async fn get_cookies(&self) -> Result<Vec<Cookie>>;

    /// Drain storage events seen since the last call
    fn get_storage_events(&self) -> Vec<StorageEvent>;

    /// Drain console events seen since the last call
    fn get_console_events(&self) -> Vec<ConsoleEvent>;

    /// Every exchange captured on this tab so far
    fn get_messages(&self) -> Vec<HttpMessage>;

    /// Issue `req` from the page (or load it as the top document when
    /// `render` is set) and wait for its intercepted response
    async fn inject_request(
        &self,
        ctx: &Context,
        req: &InjectionRequest,
        render: bool,
    ) -> Result<InterceptedHttpResponse>;
}

#[async_trait]
pub trait BrowserPool: Send + Sync {
    /// Lease a ready tab; waits while the pool is at capacity
    async fn take(&self, ctx: &Context) -> Result<(Arc<dyn Browser>, LeaseToken)>;

    /// Close the lease's tab and free its slot
    async fn return_browser(&self, ctx: &Context, token: LeaseToken) -> Result<()>;

    /// Outstanding leases
    fn leased(&self) -> usize;

    async fn shutdown(&self) -> Result<()>;
}
