// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Plugin registry, passive event routing and active dispatch

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use url::Url;

use super::injector::{BrowserInjector, Injector};
use super::{ExecutionType, Plugin, PluginEvent, PluginOpts, Uniqueness};
use crate::browser::Browser;
use crate::config::Config;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::injast::{InjectionLocation, InjectionRequest};
use crate::model::{HttpRequest, NavigationResult};
use crate::scope::Scope;
use crate::store::PluginStore;

/// Resource types never attacked
const SKIPPED_RESOURCES: &[&str] = &["Image", "Stylesheet", "Font", "Media", "Script", "Manifest"];

/// Container a plugin lives in, derived from its cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Host,
    Path,
    File,
    Page,
    Request,
    Response,
    Always,
}

impl Bucket {
    pub const ALL: [Bucket; 7] = [
        Bucket::Host,
        Bucket::Path,
        Bucket::File,
        Bucket::Page,
        Bucket::Request,
        Bucket::Response,
        Bucket::Always,
    ];

    pub fn for_opts(opts: &PluginOpts) -> Self {
        match opts.execution_type {
            ExecutionType::Once => Bucket::Host,
            ExecutionType::OncePerPath => Bucket::Path,
            ExecutionType::OncePerFile => Bucket::File,
            ExecutionType::OncePerUrl | ExecutionType::OncePerNavPath => Bucket::Page,
            ExecutionType::PerRequest if opts.responses_only() => Bucket::Response,
            ExecutionType::PerRequest => Bucket::Request,
            ExecutionType::Always => Bucket::Always,
        }
    }

    /// Uniqueness bit an event needs to reach this bucket
    pub fn gate(&self) -> Option<Uniqueness> {
        match self {
            Bucket::Host => Some(Uniqueness::HOST),
            Bucket::Path => Some(Uniqueness::PATH),
            Bucket::File => Some(Uniqueness::FILE),
            Bucket::Page => Some(Uniqueness::PAGE),
            Bucket::Request => Some(Uniqueness::REQUEST),
            Bucket::Response => Some(Uniqueness::RESPONSE),
            Bucket::Always => None,
        }
    }

    /// Key identifying an attack on `site` in this bucket's scope; `None`
    /// means the attack is never deduplicated
    fn attack_key(&self, request: &HttpRequest, url: &Url, location: InjectionLocation, site: &str) -> Option<Vec<u8>> {
        let host = format!("{}://{}", url.scheme(), url.host_str().unwrap_or(""));
        let path = url.path();
        let scope = match self {
            Bucket::Host => host,
            Bucket::Path => {
                let dir = path.rfind('/').map(|i| &path[..=i]).unwrap_or("/");
                format!("{}{}", host, dir)
            }
            Bucket::File => format!("{}{}", host, path),
            Bucket::Page => url.as_str().to_string(),
            Bucket::Request | Bucket::Response => request.id.to_string(),
            Bucket::Always => return None,
        };
        Some(format!("{}|{}|{}|{}", scope, request.method, location.bits(), site).into_bytes())
    }
}

struct Registered {
    plugin: Arc<dyn Plugin>,
    opts: PluginOpts,
}

/// Owns every plugin of a scan
pub struct PluginManager {
    store: Arc<PluginStore>,
    buckets: HashMap<Bucket, Vec<Registered>>,
}

impl PluginManager {
    pub fn new(store: Arc<PluginStore>) -> Self {
        Self {
            store,
            buckets: HashMap::new(),
        }
    }

    /// Manager with the plugins enabled by `config`
    pub fn from_config(store: Arc<PluginStore>, config: &Config, plugins: Vec<Arc<dyn Plugin>>) -> Self {
        let mut manager = Self::new(store);
        for plugin in plugins {
            if config.plugins.is_enabled(plugin.id()) {
                manager.register(plugin);
            } else {
                debug!(plugin = plugin.id(), "plugin disabled");
            }
        }
        info!(plugins = ?manager.ids(), "plugins loaded");
        manager
    }

    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        let opts = plugin.options();
        let bucket = Bucket::for_opts(&opts);
        debug!(plugin = plugin.id(), ?bucket, "registered plugin");
        self.buckets
            .entry(bucket)
            .or_default()
            .push(Registered { plugin, opts });
    }

    pub fn store(&self) -> &Arc<PluginStore> {
        &self.store
    }

    /// Plugins in bucket order
    fn registered(&self) -> impl Iterator<Item = (Bucket, &Registered)> {
        Bucket::ALL.into_iter().flat_map(move |bucket| {
            self.buckets
                .get(&bucket)
                .into_iter()
                .flatten()
                .map(move |r| (bucket, r))
        })
    }

    pub fn ids(&self) -> Vec<String> {
        self.registered().map(|(_, r)| r.plugin.id().to_string()).collect()
    }

    pub fn bucket_of(&self, id: &str) -> Option<Bucket> {
        self.registered()
            .find(|(_, r)| r.plugin.id() == id)
            .map(|(bucket, _)| bucket)
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_active(&self) -> bool {
        self.registered().any(|(_, r)| r.opts.is_active())
    }

    /// Prepare a worker context: plugin handlers plus event forwarding
    pub fn install(self: &Arc<Self>, ctx: &mut Context) {
        for (_, r) in self.registered() {
            r.plugin.init_context(ctx);
        }
        let manager = Arc::clone(self);
        ctx.handlers.add_event_handler(move |event| manager.dispatch(event));
    }

    /// Route a passive event to every plugin whose options and bucket
    /// uniqueness allow it
    pub fn dispatch(&self, event: &PluginEvent) {
        if !self.registered().any(|(_, r)| r.opts.listens(event.event_type)) {
            return;
        }
        let uniqueness = match self
            .store
            .uniqueness(event.event_type.as_str(), &event.unique_keys())
        {
            Ok(u) => u,
            Err(e) => {
                warn!(error = %e, event = event.event_type.as_str(), "uniqueness lookup failed");
                return;
            }
        };
        let mut event = event.clone();
        event.uniqueness = uniqueness;

        for (bucket, r) in self.registered() {
            if !r.opts.listens(event.event_type) {
                continue;
            }
            if let Some(bit) = bucket.gate() {
                if !uniqueness.contains(bit) {
                    continue;
                }
            }
            r.plugin.on_event(&event);
        }
    }

    /// Hand every injection site of every captured request to the active
    /// plugins. Returns the number of plugin invocations
    #[instrument(skip_all, fields(nav = %result.navigation_id.short()))]
    pub async fn run_active(
        &self,
        ctx: &Context,
        browser: Arc<dyn Browser>,
        result: &NavigationResult,
    ) -> Result<usize> {
        let active: Vec<(Bucket, &Registered)> = self
            .registered()
            .filter(|(_, r)| r.opts.is_active())
            .collect();
        if active.is_empty() {
            return Ok(0);
        }

        let mut invocations = 0;
        for msg in &result.messages {
            ctx.check()?;
            let request = &msg.request;
            if SKIPPED_RESOURCES.contains(&request.resource_type.as_str()) {
                continue;
            }
            let full_url = request.full_url();
            let Ok(url) = Url::parse(&full_url) else {
                continue;
            };
            if ctx.scope.check(&url) != Scope::InScope {
                continue;
            }

            let headers: Vec<(String, String)> = request.headers.iter().cloned().collect();
            let parsed = InjectionRequest::new(
                &request.method,
                &full_url,
                &headers,
                request.post_data.as_deref(),
            );
            let sites = parsed.sites();
            let Some(first) = sites.first().cloned() else {
                debug!(url = %full_url, "no injection sites");
                continue;
            };
            let mut injector = BrowserInjector::new(
                Arc::clone(&browser),
                ctx.clone(),
                msg.clone(),
                parsed,
                first,
            )
            .with_navigation(result.navigation_id.clone(), result.id.clone());
            let mut exhausted: HashSet<usize> = HashSet::new();

            for site in sites {
                injector.retarget(site);
                let location = injector.locations();
                let original = injector.original();
                for (i, (bucket, r)) in active.iter().enumerate() {
                    if exhausted.contains(&i) || !r.opts.wants(location) {
                        continue;
                    }
                    if let Some(key) = bucket.attack_key(request, &url, location, &original) {
                        match self.store.mark_attacked(r.plugin.id(), &key) {
                            Ok(true) => {}
                            Ok(false) => continue,
                            Err(e) => {
                                warn!(plugin = r.plugin.id(), error = %e, "attack bookkeeping failed");
                                continue;
                            }
                        }
                    }

                    let outcome = r.plugin.ready(&mut injector).await;
                    invocations += 1;
                    injector.reset();
                    // plugins only get transient handlers
                    injector.context_mut().handlers = ctx.handlers.clone();

                    match outcome {
                        Ok(true) => {
                            exhausted.insert(i);
                        }
                        Ok(false) => {}
                        Err(e) if e.is_crash() || matches!(e, Error::Cancelled) => return Err(e),
                        Err(e) => {
                            warn!(plugin = r.plugin.id(), site = %location, error = %e, "plugin failed")
                        }
                    }
                }
            }
        }
        debug!(invocations, "active plugins done");
        Ok(invocations)
    }
}
