// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Plugin interface
//!
//! Passive plugins observe [`PluginEvent`]s raised while the crawler drives
//! a tab. Active plugins are handed an [`Injector`] per injection site of
//! every captured request and decide what to send.

pub mod builtin;
mod events;
mod injector;
mod manager;

use std::collections::HashMap;

use async_trait::async_trait;

pub use events::{EventData, EventType, PluginEvent};
pub use injector::{BrowserInjector, Injector};
pub use manager::{Bucket, PluginManager};
pub use crate::store::Uniqueness;

use crate::context::Context;
use crate::error::Result;
use crate::injast::InjectionLocation;

/// How often a plugin wants to act
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecutionType {
    /// Once per host
    Once,
    OncePerPath,
    OncePerFile,
    OncePerUrl,
    OncePerNavPath,
    #[default]
    PerRequest,
    Always,
}

/// What a plugin listens to and may change
#[derive(Debug, Clone, Default)]
pub struct PluginOpts {
    /// Send injections from an isolated world
    pub isolated_requests: bool,
    pub write_responses: bool,
    pub write_requests: bool,
    pub write_js: bool,
    pub listen_responses: bool,
    pub listen_requests: bool,
    pub listen_storage: bool,
    pub listen_cookies: bool,
    pub listen_console: bool,
    pub listen_url: bool,
    pub listen_js: bool,
    pub execution_type: ExecutionType,
    /// Sites an active plugin wants; empty means every site
    pub injections: InjectionLocation,
}

impl PluginOpts {
    pub fn listens(&self, event_type: EventType) -> bool {
        match event_type {
            EventType::Cookie => self.listen_cookies,
            EventType::Storage => self.listen_storage,
            EventType::Console => self.listen_console,
            EventType::Request => self.listen_requests,
            EventType::Response => self.listen_responses,
            EventType::Url => self.listen_url,
            EventType::Js => self.listen_js,
        }
    }

    /// Listens to anything at all
    pub fn is_passive(&self) -> bool {
        self.listen_cookies
            || self.listen_storage
            || self.listen_console
            || self.listen_requests
            || self.listen_responses
            || self.listen_url
            || self.listen_js
    }

    /// Takes part in active dispatch
    pub fn is_active(&self) -> bool {
        self.write_requests || self.write_responses || self.write_js
    }

    /// Listens to responses and nothing else
    pub fn responses_only(&self) -> bool {
        self.listen_responses
            && !(self.listen_cookies
                || self.listen_storage
                || self.listen_console
                || self.listen_requests
                || self.listen_url
                || self.listen_js)
    }

    /// True if the plugin wants sites at `location`
    pub fn wants(&self, location: InjectionLocation) -> bool {
        self.injections.is_empty() || location.wanted_by(self.injections)
    }
}

#[async_trait]
pub trait Plugin: Send + Sync {
    /// Human readable name
    fn name(&self) -> &str;

    /// Stable id, used for enabling and attack bookkeeping
    fn id(&self) -> &str;

    /// Effective parameters
    fn config(&self) -> HashMap<String, String> {
        HashMap::new()
    }

    /// Install handlers on the worker context before a navigation runs
    fn init_context(&self, _ctx: &mut Context) {}

    fn options(&self) -> PluginOpts;

    /// Attack the site the injector addresses
    ///
    /// Returns true once the plugin has nothing more to try for this
    /// request.
    async fn ready(&self, _injector: &mut dyn Injector) -> Result<bool> {
        Ok(true)
    }

    /// Observe a passive event. Must not block
    fn on_event(&self, _event: &PluginEvent) {}
}
