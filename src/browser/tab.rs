// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Chromium tab driven over CDP
//!
//! One event loop task per tab consumes transport events and keeps three
//! pieces of state current: navigation state, document state (with the
//! element map) and the in-flight request count. Operations read that state
//! and never hold a lock across an await.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use super::config::TabConfig;
use super::dom::{element_from_info, DomChange, ElementMap};
use super::scripts;
use super::transport::{CdpTransport, TransportEvent};
use super::{ActionOutcome, Browser};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::injast::InjectionRequest;
use crate::model::{
    ActionType, ConsoleEvent, Cookie, Headers, HtmlElement, HtmlForm, HttpMessage, HttpRequest,
    HttpResponse, Id, JsEvent, Navigation, StorageEvent,
};
use crate::network::{Handlers, InterceptedHttpRequest, InterceptedHttpResponse};
use crate::plugin::PluginEvent;

/// Tags never worth probing for listeners
const SKIP_TAGS: &[&str] = &["html", "head", "script", "style", "meta", "link", "noscript", "title"];

/// Keys typed when an action carries no explicit input
const DEFAULT_KEYS: &str = "browserk";

const MAX_TYPED_KEYS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    Idle,
    Navigating,
    Transitioning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocState {
    Fresh,
    Updating,
    Stable,
}

struct TabShared {
    transport: Arc<dyn CdpTransport>,
    session: String,
    target_id: String,
    config: TabConfig,
    elements: ElementMap,
    nav_state: watch::Sender<NavState>,
    loads: watch::Sender<u64>,
    doc_state: Mutex<DocState>,
    doc_updated: AtomicBool,
    last_change: Mutex<Instant>,
    in_flight: AtomicI64,
    open_requests: Mutex<HashSet<String>>,
    messages: Mutex<Vec<HttpMessage>>,
    message_index: Mutex<HashMap<String, usize>>,
    storage_events: Mutex<Vec<StorageEvent>>,
    console_events: Mutex<Vec<ConsoleEvent>>,
    crashed: watch::Sender<Option<String>>,
    closing: AtomicBool,
    handlers: RwLock<Handlers>,
    current_nav: RwLock<Id>,
    current_url: RwLock<String>,
    main_frame: RwLock<Option<String>>,
    /// injection marker -> response receiver
    responders: Mutex<HashMap<String, oneshot::Sender<InterceptedHttpResponse>>>,
    /// network request id -> injection marker
    injected: Mutex<HashMap<String, String>>,
    /// (url, marker) of a rendered injection awaiting its document request
    pending_render: Mutex<Option<(String, String)>>,
}

impl TabShared {
    fn check_alive(&self) -> Result<()> {
        if self.closing.load(Ordering::Relaxed) {
            return Err(Error::TabClosing);
        }
        if let Some(reason) = self.crashed.borrow().clone() {
            return Err(Error::TabCrashed(reason));
        }
        Ok(())
    }

    async fn command(&self, method: &str, params: Value) -> Result<Value> {
        self.check_alive()?;
        self.transport
            .send_command(Some(&self.session), method, params)
            .await
    }

    fn touch(&self) {
        *self.last_change.lock() = Instant::now();
    }

    fn mark_crashed(&self, reason: &str) {
        if self.closing.load(Ordering::Relaxed) {
            return;
        }
        warn!(target_id = %self.target_id, reason, "tab lost");
        self.crashed.send_replace(Some(reason.to_string()));
        // receivers waiting on injected responses observe a closed channel
        self.responders.lock().clear();
    }

    fn page_url(&self) -> Option<Url> {
        let current = self.current_url.read().clone();
        Url::parse(&current)
            .or_else(|_| Url::parse("about:blank"))
            .ok()
    }

    fn dispatch(&self, build: impl FnOnce(Url, Id) -> PluginEvent) {
        let Some(url) = self.page_url() else {
            return;
        };
        let nav = self.current_nav.read().clone();
        let handlers = self.handlers.read().clone();
        handlers.on_event(&build(url, nav));
    }

    fn is_main_frame(&self, frame_id: Option<&str>) -> bool {
        match (frame_id, self.main_frame.read().as_deref()) {
            (Some(f), Some(main)) => f == main,
            (Some(_), None) => true,
            _ => false,
        }
    }

    fn owns(&self, ev: &TransportEvent) -> bool {
        match ev.session_id.as_deref() {
            Some(s) => s == self.session,
            None => {
                let param = |k: &str| ev.params.get(k).and_then(|v| v.as_str());
                param("sessionId") == Some(self.session.as_str())
                    || param("targetId") == Some(self.target_id.as_str())
            }
        }
    }

    fn handle_event(self: &Arc<Self>, ev: TransportEvent) {
        let params = &ev.params;
        let str_param = |k: &str| params.get(k).and_then(|v| v.as_str());
        match ev.method.as_str() {
            "Target.targetCrashed" | "Inspector.targetCrashed" => self.mark_crashed("target crashed"),
            "Inspector.detached" => self.mark_crashed(str_param("reason").unwrap_or("inspector detached")),
            "Target.detachedFromTarget" => self.mark_crashed("detached from target"),
            "Page.javascriptDialogOpening" => {
                debug!(message = str_param("message").unwrap_or(""), "dismissing dialog");
                self.spawn_command("Page.handleJavaScriptDialog", json!({ "accept": false }));
            }
            "Page.fileChooserOpened" => {
                info!(mode = str_param("mode").unwrap_or(""), "file chooser opened");
            }
            "Security.certificateError" => {
                if let Some(event_id) = params.get("eventId").and_then(|v| v.as_i64()) {
                    self.spawn_command(
                        "Security.handleCertificateError",
                        json!({ "eventId": event_id, "action": "continue" }),
                    );
                }
            }
            "Page.frameStartedLoading" => {
                if self.is_main_frame(str_param("frameId")) {
                    self.nav_state.send_replace(NavState::Navigating);
                }
            }
            "Page.frameNavigated" => {
                let frame = params.get("frame").unwrap_or(&Value::Null);
                if frame.get("parentId").is_none() {
                    if let Some(id) = frame.get("id").and_then(|v| v.as_str()) {
                        *self.main_frame.write() = Some(id.to_string());
                    }
                    if let Some(url) = frame.get("url").and_then(|v| v.as_str()) {
                        self.url_changed(url);
                    }
                    self.nav_state.send_replace(NavState::Transitioning);
                }
            }
            "Page.navigatedWithinDocument" => {
                if self.is_main_frame(str_param("frameId")) {
                    if let Some(url) = str_param("url") {
                        self.url_changed(url);
                    }
                }
            }
            "Page.frameStoppedLoading" => {
                if self.is_main_frame(str_param("frameId")) {
                    self.nav_state.send_replace(NavState::Idle);
                }
            }
            "Page.loadEventFired" => {
                self.nav_state.send_replace(NavState::Idle);
                self.loads.send_modify(|n| *n += 1);
            }
            m if m.starts_with("DOM.") => match self.elements.apply_event(m, params) {
                DomChange::None => {}
                DomChange::Node => self.touch(),
                DomChange::Document => {
                    self.touch();
                    self.doc_updated.store(true, Ordering::SeqCst);
                    *self.doc_state.lock() = DocState::Updating;
                    let shared = Arc::clone(self);
                    tokio::spawn(async move {
                        if let Err(e) = shared.refresh_root().await {
                            debug!(error = %e, "document rebuild failed");
                        }
                    });
                }
            },
            "Network.requestWillBeSent" => self.request_started(params),
            "Network.responseReceived" => self.response_received(params),
            "Network.loadingFinished" | "Network.loadingFailed" => {
                if let Some(id) = str_param("requestId") {
                    self.request_finished(id);
                }
            }
            m if m.starts_with("DOMStorage.") => {
                if let Some(event) = StorageEvent::from_cdp(m, params) {
                    self.storage_events.lock().push(event.clone());
                    self.dispatch(|url, nav| PluginEvent::storage(url, nav, event));
                }
            }
            "Runtime.consoleAPICalled" => {
                let event = ConsoleEvent::from_cdp(params);
                self.console_events.lock().push(event.clone());
                self.dispatch(|url, nav| PluginEvent::console(url, nav, event));
            }
            "Debugger.scriptParsed" => {
                let event = JsEvent::from_cdp(params);
                self.dispatch(|url, nav| PluginEvent::js(url, nav, event));
            }
            "Fetch.requestPaused" => {
                let shared = Arc::clone(self);
                let params = params.clone();
                tokio::spawn(async move {
                    if let Err(e) = shared.handle_paused(params).await {
                        debug!(error = %e, "paused request handling failed");
                    }
                });
            }
            _ => {}
        }
    }

    fn spawn_command(self: &Arc<Self>, method: &'static str, params: Value) {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = shared.command(method, params).await {
                debug!(method, error = %e, "background command failed");
            }
        });
    }

    fn url_changed(&self, url: &str) {
        let changed = {
            let mut current = self.current_url.write();
            let changed = *current != url;
            *current = url.to_string();
            changed
        };
        if changed {
            self.dispatch(PluginEvent::url_changed);
        }
    }

    fn request_started(&self, params: &Value) {
        let Some(request) = HttpRequest::from_cdp(params) else {
            return;
        };
        let id = request.request_id.clone();
        {
            let mut index = self.message_index.lock();
            let mut messages = self.messages.lock();
            messages.push(HttpMessage::new(request));
            index.insert(id.clone(), messages.len() - 1);
        }
        // redirects reuse the request id and stay one in-flight request
        if self.open_requests.lock().insert(id) {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn response_received(&self, params: &Value) {
        let Some(id) = params.get("requestId").and_then(|v| v.as_str()) else {
            return;
        };
        let Some(mut response) = params.get("response").and_then(HttpResponse::from_cdp) else {
            return;
        };
        let index = self.message_index.lock();
        let mut messages = self.messages.lock();
        if let Some(msg) = index.get(id).and_then(|i| messages.get_mut(*i)) {
            if let Some(body) = msg.response.take().and_then(|r| r.body) {
                response.set_body(body);
            }
            msg.response = Some(response);
            msg.response_time = Some(Utc::now());
        }
    }

    fn request_finished(&self, id: &str) {
        if self.open_requests.lock().remove(id) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn with_message(&self, network_id: &str, f: impl FnOnce(&mut HttpMessage)) {
        let index = self.message_index.lock();
        let mut messages = self.messages.lock();
        if let Some(msg) = index.get(network_id).and_then(|i| messages.get_mut(*i)) {
            f(msg);
        }
    }

    async fn refresh_root(&self) -> Result<i64> {
        let doc = self.command("DOM.getDocument", json!({ "depth": 0 })).await?;
        let root = doc
            .get("root")
            .and_then(|r| r.get("nodeId"))
            .and_then(|v| v.as_i64())
            .ok_or_else(|| Error::cdp("DOM.getDocument", "document has no root node"))?;
        self.elements.reset(Some(root));
        *self.doc_state.lock() = DocState::Fresh;
        Ok(root)
    }

    async fn handle_paused(&self, params: Value) -> Result<()> {
        let fetch_id = params
            .get("requestId")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let network_id = params
            .get("networkId")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let request = HttpRequest::from_cdp(&json!({
            "requestId": network_id,
            "documentURL": self.current_url.read().clone(),
            "type": params.get("resourceType").cloned().unwrap_or(Value::Null),
            "request": params.get("request").cloned().unwrap_or(Value::Null),
        }))
        .ok_or_else(|| Error::cdp("Fetch.requestPaused", "paused event without request"))?;

        if params.get("responseStatusCode").is_some() {
            self.paused_response(fetch_id, network_id, request, &params).await
        } else if params.get("responseErrorReason").is_some() {
            if let Some(marker) = self.injected.lock().remove(&network_id) {
                self.responders.lock().remove(&marker);
            }
            self.command("Fetch.continueRequest", json!({ "requestId": fetch_id }))
                .await
                .map(|_| ())
        } else {
            self.paused_request(fetch_id, network_id, request).await
        }
    }

    async fn paused_request(&self, fetch_id: String, network_id: String, request: HttpRequest) -> Result<()> {
        let mut view = InterceptedHttpRequest::new(fetch_id.clone(), request);
        let marker = view.request.headers.get(scripts::MARKER_HEADER).map(str::to_string);
        let marker = match marker {
            Some(m) => {
                view.remove_header(scripts::MARKER_HEADER);
                Some(m)
            }
            None => {
                let mut pending = self.pending_render.lock();
                match pending.as_ref() {
                    Some((url, _)) if same_url(url, &view.request.url) => pending.take().map(|(_, m)| m),
                    _ => None,
                }
            }
        };

        let handlers = self.handlers.read().clone();
        handlers.on_request(&mut view);
        match &marker {
            Some(m) => {
                self.injected.lock().insert(network_id.clone(), m.clone());
            }
            None => self.dispatch(|url, nav| PluginEvent::request(url, nav, view.request.clone())),
        }

        if !view.is_modified() {
            return self
                .command("Fetch.continueRequest", json!({ "requestId": fetch_id }))
                .await
                .map(|_| ());
        }

        let modified = view.modified().clone();
        let mut params = json!({ "requestId": fetch_id });
        if let Some(url) = &modified.url {
            params["url"] = json!(url);
        }
        if let Some(method) = &modified.method {
            params["method"] = json!(method);
        }
        if let Some(headers) = &modified.headers {
            params["headers"] = headers.to_entries();
        }
        if let Some(body) = &modified.post_data {
            params["postData"] = json!(base64::engine::general_purpose::STANDARD.encode(body));
        }
        if marker.is_none() {
            self.with_message(&network_id, |msg| {
                msg.modified_request
                    .get_or_insert_with(Default::default)
                    .merge(modified)
            });
        }
        self.command("Fetch.continueRequest", params).await.map(|_| ())
    }

    async fn paused_response(
        &self,
        fetch_id: String,
        network_id: String,
        request: HttpRequest,
        params: &Value,
    ) -> Result<()> {
        let status = params
            .get("responseStatusCode")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        let mut response = HttpResponse::new(request.url.clone(), status);
        response.status_text = params
            .get("responseStatusText")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        response.headers = Headers::from_entries(params.get("responseHeaders").unwrap_or(&Value::Null));
        response.mime_type = response
            .headers
            .get("content-type")
            .and_then(|ct| ct.split(';').next())
            .unwrap_or("")
            .trim()
            .to_string();
        response.compute_id();

        let marker = self.injected.lock().remove(&network_id);
        let handlers = self.handlers.read().clone();
        let redirect = (300..400).contains(&status);
        if !redirect && (marker.is_some() || handlers.has_response_handlers()) {
            if let Some(body) = self.response_body(&fetch_id).await {
                response.set_body(body);
            }
        }

        if marker.is_none() {
            let observed = response.clone();
            self.with_message(&network_id, |msg| match msg.response.as_mut() {
                Some(r) => {
                    if let (None, Some(body)) = (&r.body, observed.body) {
                        r.set_body(body);
                    }
                }
                None => msg.response = Some(observed),
            });
        }

        let mut view = InterceptedHttpResponse::new(fetch_id.clone(), request.clone(), response);
        handlers.on_response(&mut view);
        if marker.is_none() {
            let (req, resp) = (request, view.response.clone());
            self.dispatch(|url, nav| PluginEvent::response(url, nav, req, resp));
        }

        if view.is_modified() {
            if view.body().is_none() && !redirect {
                if let Some(body) = self.response_body(&fetch_id).await {
                    view.response.set_body(body);
                }
            }
            let mut fulfill = json!({
                "requestId": fetch_id,
                "responseCode": view.status(),
                "responseHeaders": view.headers().to_entries(),
                "body": base64::engine::general_purpose::STANDARD.encode(view.body().unwrap_or("")),
            });
            if !view.reason().is_empty() {
                fulfill["responsePhrase"] = json!(view.reason());
            }
            let modified = view.modified().clone();
            self.with_message(&network_id, |msg| {
                msg.modified_response
                    .get_or_insert_with(Default::default)
                    .merge(modified)
            });
            self.command("Fetch.fulfillRequest", fulfill).await?;
        } else {
            self.command("Fetch.continueRequest", json!({ "requestId": fetch_id }))
                .await?;
        }

        if let Some(marker) = marker {
            if let Some(tx) = self.responders.lock().remove(&marker) {
                let _ = tx.send(view);
            }
        }
        Ok(())
    }

    async fn response_body(&self, fetch_id: &str) -> Option<String> {
        let fut = self.command("Fetch.getResponseBody", json!({ "requestId": fetch_id }));
        match tokio::time::timeout(self.config.response_body_timeout, fut).await {
            Ok(Ok(v)) => decode_body(&v),
            Ok(Err(e)) => {
                debug!(error = %e, "response body unavailable");
                None
            }
            Err(_) => {
                warn!(fetch_id, "response body fetch timed out");
                None
            }
        }
    }
}

fn decode_body(v: &Value) -> Option<String> {
    let body = v.get("body")?.as_str()?;
    if v.get("base64Encoded").and_then(|b| b.as_bool()).unwrap_or(false) {
        let bytes = base64::engine::general_purpose::STANDARD.decode(body).ok()?;
        Some(String::from_utf8_lossy(&bytes).into_owned())
    } else {
        Some(body.to_string())
    }
}

fn same_url(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(|s| s.as_str()).map(str::to_string)
}

async fn event_loop(shared: Arc<TabShared>) {
    while let Some(ev) = shared.transport.next_event().await {
        if shared.closing.load(Ordering::Relaxed) {
            break;
        }
        if shared.owns(&ev) {
            shared.handle_event(ev);
        }
    }
    if !shared.closing.load(Ordering::Relaxed) {
        shared.mark_crashed("devtools connection closed");
    }
}

async fn wait_crash(rx: &mut watch::Receiver<Option<String>>) -> String {
    loop {
        if rx.changed().await.is_err() {
            return std::future::pending::<String>().await;
        }
        let reason = rx.borrow().clone();
        if let Some(reason) = reason {
            return reason;
        }
    }
}

/// A leased Chromium tab
pub struct ChromeTab {
    id: String,
    browser_context_id: Option<String>,
    shared: Arc<TabShared>,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl ChromeTab {
    /// Create a fresh browser context and target and attach to it
    pub async fn open(transport: Arc<dyn CdpTransport>, config: TabConfig) -> Result<Self> {
        let browser_context_id = match transport
            .send_command(None, "Target.createBrowserContext", json!({ "disposeOnDetach": true }))
            .await
        {
            Ok(v) => str_field(&v, "browserContextId"),
            Err(e) => {
                debug!(error = %e, "using default browser context");
                None
            }
        };

        let mut target_params = json!({ "url": "about:blank" });
        if let Some(id) = &browser_context_id {
            target_params["browserContextId"] = json!(id);
        }
        let target = transport
            .send_command(None, "Target.createTarget", target_params)
            .await?;
        let target_id = str_field(&target, "targetId")
            .ok_or_else(|| Error::cdp("Target.createTarget", "no target id"))?;
        let attached = transport
            .send_command(
                None,
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        let session = str_field(&attached, "sessionId")
            .ok_or_else(|| Error::cdp("Target.attachToTarget", "no session id"))?;

        let (nav_state, _) = watch::channel(NavState::Idle);
        let (loads, _) = watch::channel(0u64);
        let (crashed, _) = watch::channel(None);
        let shared = Arc::new(TabShared {
            transport,
            session,
            target_id: target_id.clone(),
            config,
            elements: ElementMap::new(),
            nav_state,
            loads,
            doc_state: Mutex::new(DocState::Fresh),
            doc_updated: AtomicBool::new(false),
            last_change: Mutex::new(Instant::now()),
            in_flight: AtomicI64::new(0),
            open_requests: Mutex::new(HashSet::new()),
            messages: Mutex::new(Vec::new()),
            message_index: Mutex::new(HashMap::new()),
            storage_events: Mutex::new(Vec::new()),
            console_events: Mutex::new(Vec::new()),
            crashed,
            closing: AtomicBool::new(false),
            handlers: RwLock::new(Handlers::new()),
            current_nav: RwLock::new(Id::root()),
            current_url: RwLock::new("about:blank".to_string()),
            main_frame: RwLock::new(None),
            responders: Mutex::new(HashMap::new()),
            injected: Mutex::new(HashMap::new()),
            pending_render: Mutex::new(None),
        });
        let task = tokio::spawn(event_loop(Arc::clone(&shared)));
        debug!(target_id = %target_id, "tab attached");

        Ok(Self {
            id: target_id,
            browser_context_id,
            shared,
            event_task: Mutex::new(Some(task)),
        })
    }

    pub fn nav_state(&self) -> NavState {
        *self.shared.nav_state.borrow()
    }

    pub fn doc_state(&self) -> DocState {
        *self.shared.doc_state.lock()
    }

    pub fn in_flight(&self) -> i64 {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    /// Stash a one-shot sender for the response to the request tagged
    /// with `marker`; the response intercept path consumes it
    pub fn register_for_response(&self, marker: &str, tx: oneshot::Sender<InterceptedHttpResponse>) {
        self.shared.responders.lock().insert(marker.to_string(), tx);
    }

    fn use_context(&self, ctx: &Context) {
        *self.shared.handlers.write() = ctx.handlers.clone();
    }

    async fn guarded<T, F>(&self, ctx: &Context, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.shared.check_alive()?;
        let mut crash = self.shared.crashed.subscribe();
        tokio::select! {
            res = fut => res,
            _ = ctx.cancel.cancelled() => Err(Error::Cancelled),
            reason = wait_crash(&mut crash) => Err(Error::TabCrashed(reason)),
        }
    }

    /// Wait until no DOM change for the quiescence window and no request in
    /// flight. On timeout the page load is stopped; returns whether the page
    /// settled
    async fn wait_stable(&self, bound: Duration) -> Result<bool> {
        let shared = &self.shared;
        let quiet = shared.config.quiescence.min(bound);
        let deadline = Instant::now() + bound;
        loop {
            tokio::time::sleep(shared.config.tick).await;
            shared.check_alive()?;
            let settled = shared.last_change.lock().elapsed() >= quiet
                && shared.in_flight.load(Ordering::SeqCst) <= 0
                && *shared.nav_state.borrow() != NavState::Navigating;
            if settled {
                let mut doc = shared.doc_state.lock();
                if *doc != DocState::Updating {
                    *doc = DocState::Stable;
                }
                return Ok(true);
            }
            if Instant::now() >= deadline {
                debug!(bound_ms = bound.as_millis() as u64, "page did not settle, stopping load");
                if let Err(e) = shared.command("Page.stopLoading", json!({})).await {
                    debug!(error = %e, "stopLoading failed");
                }
                return Ok(false);
            }
        }
    }

    async fn navigate_inner(&self, url: &str) -> Result<()> {
        let shared = &self.shared;
        let before = *shared.loads.borrow();
        let res = shared.command("Page.navigate", json!({ "url": url })).await?;
        if let Some(err) = res.get("errorText").and_then(|v| v.as_str()) {
            if !err.is_empty() {
                return Err(Error::navigation_failed(url, err));
            }
        }
        if res.get("loaderId").is_some() {
            let mut rx = shared.loads.subscribe();
            let loaded = tokio::time::timeout(
                shared.config.navigation_timeout,
                rx.wait_for(|n| *n > before),
            )
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false);
            if !loaded {
                warn!(url, "load event not seen in time, stopping load");
                if let Err(e) = shared.command("Page.stopLoading", json!({})).await {
                    debug!(error = %e, "stopLoading failed");
                }
            }
        }
        self.wait_stable(shared.config.stability_timeout).await?;
        Ok(())
    }

    async fn evaluate(&self, expression: &str, context_id: Option<i64>) -> Result<Value> {
        let mut params = json!({
            "expression": expression,
            "returnByValue": true,
            "awaitPromise": true,
        });
        if let Some(id) = context_id {
            params["contextId"] = json!(id);
        }
        let res = self.shared.command("Runtime.evaluate", params).await?;
        script_value("Runtime.evaluate", res)
    }

    async fn resolve_object(&self, node_id: i64) -> Result<String> {
        let res = self
            .shared
            .command("DOM.resolveNode", json!({ "nodeId": node_id }))
            .await?;
        res.get("object")
            .and_then(|o| o.get("objectId"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::ElementNotFound(format!("node {}", node_id)))
    }

    async fn call_on_object(&self, object_id: &str, function: &str, args: Option<Value>) -> Result<Value> {
        let mut params = json!({
            "objectId": object_id,
            "functionDeclaration": function,
            "returnByValue": true,
            "awaitPromise": true,
        });
        if let Some(args) = args {
            params["arguments"] = json!([{ "value": args }]);
        }
        let res = self.shared.command("Runtime.callFunctionOn", params).await?;
        script_value("Runtime.callFunctionOn", res)
    }

    async fn call_on(&self, node_id: i64, function: &str, args: Option<Value>) -> Result<Value> {
        let object_id = self.resolve_object(node_id).await?;
        let res = self.call_on_object(&object_id, function, args).await;
        self.release(&object_id).await;
        res
    }

    async fn release(&self, object_id: &str) {
        let _ = self
            .shared
            .command("Runtime.releaseObject", json!({ "objectId": object_id }))
            .await;
    }

    async fn listeners(&self, object_id: &str) -> Vec<String> {
        let res = self
            .shared
            .command(
                "DOMDebugger.getEventListeners",
                json!({ "objectId": object_id, "depth": 0 }),
            )
            .await;
        let mut types: Vec<String> = match res {
            Ok(v) => v
                .get("listeners")
                .and_then(|l| l.as_array())
                .map(|l| {
                    l.iter()
                        .filter_map(|e| e.get("type").and_then(|t| t.as_str()))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            Err(e) => {
                debug!(error = %e, "listener lookup failed");
                Vec::new()
            }
        };
        types.sort();
        types.dedup();
        types
    }

    async fn root(&self) -> Result<i64> {
        match self.shared.elements.root() {
            Some(root) => Ok(root),
            None => self.shared.refresh_root().await,
        }
    }

    async fn query(&self, selector: &str) -> Result<Vec<i64>> {
        let mut root = self.root().await?;
        for attempt in 0..2 {
            let res = self
                .shared
                .command(
                    "DOM.querySelectorAll",
                    json!({ "nodeId": root, "selector": selector }),
                )
                .await;
            match res {
                Ok(v) => {
                    return Ok(v
                        .get("nodeIds")
                        .and_then(|ids| ids.as_array())
                        .map(|ids| ids.iter().filter_map(|i| i.as_i64()).collect())
                        .unwrap_or_default())
                }
                Err(e) if attempt == 0 => {
                    debug!(selector, error = %e, "query failed, rebuilding document");
                    root = self.shared.refresh_root().await?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Vec::new())
    }

    /// Snapshot of a node, from the cache when the map still holds it
    async fn describe(&self, node_id: i64, with_listeners: bool) -> Option<HtmlElement> {
        if !with_listeners {
            if let Some(el) = self.shared.elements.get(node_id) {
                return Some(el);
            }
        }
        let object_id = match self.resolve_object(node_id).await {
            Ok(id) => id,
            Err(e) => {
                debug!(node_id, error = %e, "node vanished");
                return None;
            }
        };
        let info = self.call_on_object(&object_id, scripts::ELEMENT_INFO, None).await;
        let mut el = match info.ok().and_then(|info| element_from_info(node_id, &info)) {
            Some(el) => el,
            None => {
                self.release(&object_id).await;
                return None;
            }
        };
        if with_listeners {
            el.events = self.listeners(&object_id).await;
        }
        self.release(&object_id).await;
        self.shared.elements.insert(el.clone());
        Some(el)
    }

    async fn describe_form(&self, node_id: i64) -> Option<HtmlForm> {
        let object_id = self.resolve_object(node_id).await.ok()?;
        let info = self.call_on_object(&object_id, scripts::FORM_INFO, None).await;
        let events = self.listeners(&object_id).await;
        self.release(&object_id).await;
        let info = info.ok()?;

        let mut form = HtmlForm::new();
        if let Some(attrs) = info.get("attributes").and_then(|a| a.as_object()) {
            for (k, v) in attrs {
                form.attributes
                    .insert(k.clone(), v.as_str().unwrap_or("").to_string());
            }
        }
        if let Some(fields) = info.get("fields").and_then(|f| f.as_array()) {
            form.fields = fields.iter().filter_map(|f| element_from_info(0, f)).collect();
        }
        form.submit = info.get("submit").and_then(|s| element_from_info(0, s));
        form.hidden = info.get("hidden").and_then(|h| h.as_bool()).unwrap_or(false);
        form.events = events;
        form.node_id = node_id;
        Some(form)
    }

    /// Locate the live node for an element snapshot by hash equality,
    /// rebuilding the document once if nothing matches
    async fn resolve_element(&self, target: &HtmlElement) -> Result<i64> {
        let want = target.hash();
        for attempt in 0..2 {
            if attempt == 1 {
                self.shared.refresh_root().await?;
            }
            for node_id in self.query(&target.tag).await? {
                if let Some(el) = self.describe(node_id, false).await {
                    if el.hash() == want {
                        return Ok(node_id);
                    }
                }
            }
        }
        Err(Error::ElementNotFound(format!(
            "<{}> {}",
            target.tag,
            want.short()
        )))
    }

    async fn resolve_form(&self, target: &HtmlForm) -> Result<i64> {
        let want = target.hash();
        for attempt in 0..2 {
            if attempt == 1 {
                self.shared.refresh_root().await?;
            }
            for node_id in self.query("form").await? {
                if let Some(form) = self.describe_form(node_id).await {
                    if form.hash() == want {
                        return Ok(node_id);
                    }
                }
            }
        }
        Err(Error::ElementNotFound(format!("<form> {}", want.short())))
    }

    async fn center(&self, node_id: i64) -> Option<(f64, f64)> {
        let _ = self
            .shared
            .command("DOM.scrollIntoViewIfNeeded", json!({ "nodeId": node_id }))
            .await;
        let model = self
            .shared
            .command("DOM.getBoxModel", json!({ "nodeId": node_id }))
            .await
            .ok()?;
        let quad: Vec<f64> = model
            .get("model")?
            .get("content")?
            .as_array()?
            .iter()
            .filter_map(|v| v.as_f64())
            .collect();
        if quad.len() < 8 {
            return None;
        }
        let x = (quad[0] + quad[2] + quad[4] + quad[6]) / 4.0;
        let y = (quad[1] + quad[3] + quad[5] + quad[7]) / 4.0;
        Some((x, y))
    }

    async fn mouse(&self, kind: &str, x: f64, y: f64, button: &str, click_count: u32) -> Result<()> {
        self.shared
            .command(
                "Input.dispatchMouseEvent",
                json!({ "type": kind, "x": x, "y": y, "button": button, "clickCount": click_count }),
            )
            .await
            .map(|_| ())
    }

    async fn click(&self, node_id: i64, button: &str, count: u32) -> Result<()> {
        match self.center(node_id).await {
            Some((x, y)) => {
                self.mouse("mouseMoved", x, y, "none", 0).await?;
                for n in 1..=count {
                    self.mouse("mousePressed", x, y, button, n).await?;
                    self.mouse("mouseReleased", x, y, button, n).await?;
                }
                Ok(())
            }
            // no layout box: fall back to a synthetic click
            None => self.call_on(node_id, scripts::CLICK, None).await.map(|_| ()),
        }
    }

    async fn hover(&self, node_id: i64, leave: bool) -> Result<()> {
        let Some((x, y)) = self.center(node_id).await else {
            return Err(Error::ElementNotFound(format!("node {} has no layout", node_id)));
        };
        self.mouse("mouseMoved", x, y, "none", 0).await?;
        if leave {
            self.mouse("mouseMoved", 0.0, 0.0, "none", 0).await?;
        }
        Ok(())
    }

    async fn type_keys(&self, node_id: i64, keys: &str) -> Result<()> {
        self.shared
            .command("DOM.focus", json!({ "nodeId": node_id }))
            .await?;
        for ch in keys.chars().take(MAX_TYPED_KEYS) {
            let text = ch.to_string();
            self.shared
                .command(
                    "Input.dispatchKeyEvent",
                    json!({ "type": "keyDown", "key": text, "text": text }),
                )
                .await?;
            self.shared
                .command("Input.dispatchKeyEvent", json!({ "type": "keyUp", "key": text }))
                .await?;
        }
        Ok(())
    }

    async fn isolated_context(&self) -> Result<i64> {
        let frame_id = match self.shared.main_frame.read().clone() {
            Some(id) => id,
            None => String::new(),
        };
        let frame_id = if frame_id.is_empty() {
            self.load_main_frame().await?
        } else {
            frame_id
        };
        let res = self
            .shared
            .command(
                "Page.createIsolatedWorld",
                json!({ "frameId": frame_id, "worldName": scripts::ISOLATED_WORLD }),
            )
            .await?;
        res.get("executionContextId")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| Error::cdp("Page.createIsolatedWorld", "no execution context"))
    }

    async fn load_main_frame(&self) -> Result<String> {
        let tree = self.shared.command("Page.getFrameTree", json!({})).await?;
        let id = tree
            .get("frameTree")
            .and_then(|t| t.get("frame"))
            .and_then(|f| f.get("id"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::cdp("Page.getFrameTree", "no main frame"))?;
        *self.shared.main_frame.write() = Some(id.clone());
        Ok(id)
    }

    async fn dispatch_action(&self, ctx: &Context, nav: &Navigation) -> Result<Option<Vec<u8>>> {
        let action = &nav.action;
        let element_node = match (&action.element, action.kind.needs_element()) {
            (Some(el), true) => Some(self.resolve_element(el).await?),
            (None, true) if action.kind != ActionType::Scroll => {
                return Err(Error::InvalidNavigation(format!(
                    "{} without a target element",
                    action.kind
                )))
            }
            _ => None,
        };

        match (action.kind, element_node) {
            (ActionType::LoadUrl, _) => {
                self.navigate_inner(&action.input_str()).await?;
            }
            (ActionType::ExecuteJs, _) => {
                let value = self.evaluate(&action.input_str(), None).await?;
                return Ok(Some(serde_json::to_vec(&value)?));
            }
            (ActionType::Wait, _) => {
                let ms = action.input_str().trim().parse::<u64>().unwrap_or(1000);
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            (ActionType::FillForm, _) => {
                let form = action
                    .form
                    .as_ref()
                    .ok_or_else(|| Error::InvalidNavigation("fill-form without a form".into()))?;
                let node = self.resolve_form(form).await?;
                let values = ctx.form_filler.values(form);
                self.call_on(node, scripts::FILL_FORM, Some(serde_json::to_value(values)?))
                    .await?;
            }
            (ActionType::LeftClick, Some(node)) => self.click(node, "left", 1).await?,
            (ActionType::DoubleClick, Some(node)) => self.click(node, "left", 2).await?,
            (ActionType::RightClick, Some(node)) => self.click(node, "right", 1).await?,
            (ActionType::Hover, Some(node)) => self.hover(node, false).await?,
            (ActionType::MouseOverAndOut, Some(node)) => self.hover(node, true).await?,
            (ActionType::MouseWheel, Some(node)) => {
                let (x, y) = self.center(node).await.unwrap_or((0.0, 0.0));
                self.shared
                    .command(
                        "Input.dispatchMouseEvent",
                        json!({ "type": "mouseWheel", "x": x, "y": y, "deltaX": 0, "deltaY": 100 }),
                    )
                    .await?;
            }
            (ActionType::Focus, Some(node)) => {
                self.shared
                    .command("DOM.focus", json!({ "nodeId": node }))
                    .await?;
            }
            (ActionType::Blur, Some(node)) => {
                self.call_on(node, scripts::BLUR, None).await?;
            }
            (ActionType::Scroll, Some(node)) => {
                self.shared
                    .command("DOM.scrollIntoViewIfNeeded", json!({ "nodeId": node }))
                    .await?;
            }
            (ActionType::Scroll, None) => {
                self.evaluate(scripts::SCROLL_PAGE, None).await?;
            }
            (ActionType::SendKeys, Some(node)) => {
                let explicit = action
                    .element
                    .as_ref()
                    .map(|el| el.hash().as_bytes() != action.input.as_slice())
                    .unwrap_or(true);
                let keys = if explicit && !action.input.is_empty() {
                    action.input_str()
                } else {
                    DEFAULT_KEYS.to_string()
                };
                self.type_keys(node, &keys).await?;
            }
            (kind, _) => {
                return Err(Error::InvalidNavigation(format!(
                    "{} cannot be executed in a tab",
                    kind
                )))
            }
        }
        Ok(None)
    }
}

fn script_value(method: &str, res: Value) -> Result<Value> {
    if let Some(details) = res.get("exceptionDetails") {
        let text = details
            .get("exception")
            .and_then(|e| e.get("description"))
            .or_else(|| details.get("text"))
            .and_then(|v| v.as_str())
            .unwrap_or("script exception");
        return Err(Error::cdp(method, text));
    }
    Ok(res
        .get("result")
        .and_then(|r| r.get("value"))
        .cloned()
        .unwrap_or(Value::Null))
}

#[async_trait]
impl Browser for ChromeTab {
    fn id(&self) -> &str {
        &self.id
    }

    async fn init(&self, ctx: &Context) -> Result<()> {
        self.use_context(ctx);
        let shared = &self.shared;
        for domain in ["Page", "DOM", "Network", "Runtime"] {
            shared
                .command(&format!("{}.enable", domain), json!({}))
                .await?;
        }
        for domain in ["Inspector", "Security", "Console", "DOMStorage", "Debugger"] {
            if let Err(e) = shared.command(&format!("{}.enable", domain), json!({})).await {
                debug!(domain, error = %e, "optional domain unavailable");
            }
        }
        if shared.config.ignore_certificate_errors {
            if let Err(e) = shared
                .command("Security.setIgnoreCertificateErrors", json!({ "ignore": true }))
                .await
            {
                debug!(error = %e, "cannot ignore certificate errors");
            }
        }
        if let Err(e) = shared
            .command("Page.setInterceptFileChooserDialog", json!({ "enabled": true }))
            .await
        {
            debug!(error = %e, "file chooser interception unavailable");
        }
        if !shared.config.extra_headers.is_empty() {
            let headers = Headers::from_pairs(shared.config.extra_headers.clone());
            shared
                .command(
                    "Network.setExtraHTTPHeaders",
                    json!({ "headers": headers.to_object() }),
                )
                .await?;
        }
        if let Some(ua) = &shared.config.user_agent {
            shared
                .command("Network.setUserAgentOverride", json!({ "userAgent": ua }))
                .await?;
        }
        for cookie in &shared.config.cookies {
            shared
                .command(
                    "Network.setCookie",
                    json!({ "name": cookie.name, "value": cookie.value, "domain": cookie.domain, "path": "/" }),
                )
                .await?;
        }
        shared
            .command(
                "Fetch.enable",
                json!({ "patterns": [
                    { "urlPattern": "*", "requestStage": "Request" },
                    { "urlPattern": "*", "requestStage": "Response" },
                ] }),
            )
            .await?;
        if let Err(e) = self.load_main_frame().await {
            debug!(error = %e, "main frame unknown until first navigation");
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.shared.closing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let transport = &self.shared.transport;
        let _ = transport
            .send_command(None, "Target.closeTarget", json!({ "targetId": self.id }))
            .await;
        if let Some(ctx_id) = &self.browser_context_id {
            let _ = transport
                .send_command(
                    None,
                    "Target.disposeBrowserContext",
                    json!({ "browserContextId": ctx_id }),
                )
                .await;
        }
        if let Some(task) = self.event_task.lock().take() {
            task.abort();
        }
        self.shared.responders.lock().clear();
        transport.shutdown().await?;
        debug!(target_id = %self.id, "tab closed");
        Ok(())
    }

    #[instrument(skip(self, ctx), fields(tab = %self.id))]
    async fn navigate(&self, ctx: &Context, url: &str) -> Result<()> {
        self.use_context(ctx);
        self.guarded(ctx, self.navigate_inner(url)).await
    }

    async fn get_url(&self) -> Result<String> {
        match self.evaluate(scripts::LOCATION, None).await {
            Ok(Value::String(url)) => Ok(url),
            _ => {
                self.shared.check_alive()?;
                Ok(self.shared.current_url.read().clone())
            }
        }
    }

    async fn get_dom(&self) -> Result<String> {
        let root = self.root().await?;
        let res = self
            .shared
            .command("DOM.getOuterHTML", json!({ "nodeId": root }))
            .await;
        let res = match res {
            Ok(v) => v,
            Err(_) => {
                let root = self.shared.refresh_root().await?;
                self.shared
                    .command("DOM.getOuterHTML", json!({ "nodeId": root }))
                    .await?
            }
        };
        Ok(res
            .get("outerHTML")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string())
    }

    async fn get_base_href(&self) -> Result<String> {
        match self.evaluate(scripts::BASE_URI, None).await? {
            Value::String(s) => Ok(s),
            _ => self.get_url().await,
        }
    }

    async fn refresh_document(&self) -> Result<()> {
        self.shared.refresh_root().await.map(|_| ())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let res = self
            .shared
            .command("Page.captureScreenshot", json!({ "format": "png" }))
            .await?;
        let data = res
            .get("data")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::cdp("Page.captureScreenshot", "no image data"))?;
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| Error::cdp("Page.captureScreenshot", e.to_string()))
    }

    async fn find_elements(
        &self,
        ctx: &Context,
        selector: &str,
        may_refresh: bool,
    ) -> Result<Vec<HtmlElement>> {
        self.guarded(ctx, async {
            if may_refresh {
                self.shared.refresh_root().await?;
            }
            let mut out = Vec::new();
            for node_id in self.query(selector).await? {
                if let Some(el) = self.describe(node_id, false).await {
                    out.push(el);
                }
            }
            Ok(out)
        })
        .await
    }

    async fn find_forms(&self, ctx: &Context) -> Result<Vec<HtmlForm>> {
        self.guarded(ctx, async {
            let mut out = Vec::new();
            for node_id in self.query("form").await? {
                if let Some(form) = self.describe_form(node_id).await {
                    out.push(form);
                }
            }
            Ok(out)
        })
        .await
    }

    async fn find_interactables(&self, ctx: &Context) -> Result<Vec<HtmlElement>> {
        self.guarded(ctx, async {
            let mut out = Vec::new();
            let nodes = self.query("body *").await?;
            for node_id in nodes.into_iter().take(self.shared.config.max_interactables) {
                if let Some(cached) = self.shared.elements.get(node_id) {
                    if SKIP_TAGS.contains(&cached.tag.as_str()) {
                        continue;
                    }
                }
                let Some(el) = self.describe(node_id, true).await else {
                    continue;
                };
                if SKIP_TAGS.contains(&el.tag.as_str()) || el.events.is_empty() {
                    continue;
                }
                out.push(el);
            }
            Ok(out)
        })
        .await
    }

    #[instrument(skip(self, ctx, nav), fields(tab = %self.id, nav = %nav.id.short(), kind = %nav.action.kind))]
    async fn execute_action(&self, ctx: &Context, nav: &Navigation) -> Result<ActionOutcome> {
        self.use_context(ctx);
        *self.shared.current_nav.write() = nav.id.clone();

        self.guarded(ctx, async {
            for script in ctx.handlers.js_before(nav) {
                if let Err(e) = self.evaluate(&script, None).await {
                    debug!(error = %e, "js-before script failed");
                }
            }

            self.shared.doc_updated.store(false, Ordering::SeqCst);
            let result = self.dispatch_action(ctx, nav).await?;

            // load-url already waited inside navigate
            if nav.action.kind != ActionType::LoadUrl {
                self.wait_stable(self.shared.config.stability_timeout).await?;
            }

            for script in ctx.handlers.js_after(nav) {
                if let Err(e) = self.evaluate(&script, None).await {
                    debug!(error = %e, "js-after script failed");
                }
            }

            Ok(ActionOutcome {
                result,
                caused_load: self.shared.doc_updated.load(Ordering::SeqCst),
            })
        })
        .await
    }

    async fn get_cookies(&self) -> Result<Vec<Cookie>> {
        let res = self.shared.command("Network.getCookies", json!({})).await?;
        Ok(res
            .get("cookies")
            .and_then(|c| c.as_array())
            .map(|c| c.iter().filter_map(Cookie::from_cdp).collect())
            .unwrap_or_default())
    }

    fn get_storage_events(&self) -> Vec<StorageEvent> {
        std::mem::take(&mut *self.shared.storage_events.lock())
    }

    fn get_console_events(&self) -> Vec<ConsoleEvent> {
        std::mem::take(&mut *self.shared.console_events.lock())
    }

    fn get_messages(&self) -> Vec<HttpMessage> {
        self.shared.messages.lock().clone()
    }

    #[instrument(skip(self, ctx, req), fields(tab = %self.id, method = %req.method()))]
    async fn inject_request(
        &self,
        ctx: &Context,
        req: &InjectionRequest,
        render: bool,
    ) -> Result<InterceptedHttpResponse> {
        self.use_context(ctx);
        let marker = Uuid::new_v4().simple().to_string();
        let (tx, rx) = oneshot::channel();
        self.register_for_response(&marker, tx);

        let method = req.method();
        let url = req.url();
        let rendered = render && method.eq_ignore_ascii_case("GET");
        let sent = if rendered {
            *self.shared.pending_render.lock() = Some((url.clone(), marker.clone()));
            self.guarded(ctx, self.navigate_inner(&url)).await
        } else {
            let expr =
                scripts::fetch_expression(&method, &url, &req.headers(), req.body().as_deref(), &marker);
            self.guarded(ctx, async {
                let context_id = self.isolated_context().await?;
                self.evaluate(&expr, Some(context_id)).await.map(|_| ())
            })
            .await
        };
        if let Err(e) = sent {
            self.shared.responders.lock().remove(&marker);
            *self.shared.pending_render.lock() = None;
            return Err(e);
        }

        let mut resp = match tokio::time::timeout(self.shared.config.injection_timeout, rx).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(_)) => return Err(Error::EmptyInjectionResponse),
            Err(_) => {
                self.shared.responders.lock().remove(&marker);
                *self.shared.pending_render.lock() = None;
                return Err(Error::InjectionTimeout);
            }
        };
        if resp.body().map(str::is_empty).unwrap_or(true) {
            return Err(Error::EmptyInjectionResponse);
        }
        if rendered {
            resp.dom = Some(self.get_dom().await?);
        }
        Ok(resp)
    }
}

impl Drop for ChromeTab {
    fn drop(&mut self) {
        self.shared.closing.store(true, Ordering::SeqCst);
        if let Some(task) = self.event_task.lock().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::transport::scripted::ScriptedTransport;
    use crate::context::test_support::test_context;
    use crate::model::{Action, TriggeredBy};

    fn base_responses(method: &str, params: &Value) -> Option<Result<Value>> {
        match method {
            "Target.createBrowserContext" => Some(Ok(json!({ "browserContextId": "C1" }))),
            "Target.createTarget" => Some(Ok(json!({ "targetId": "T1" }))),
            "Target.attachToTarget" => Some(Ok(json!({ "sessionId": "S1" }))),
            "Page.getFrameTree" => Some(Ok(json!({ "frameTree": { "frame": { "id": "F1" } } }))),
            "DOM.getDocument" => Some(Ok(json!({ "root": { "nodeId": 1 } }))),
            "DOM.resolveNode" => {
                let id = params["nodeId"].as_i64().unwrap_or(0);
                Some(Ok(json!({ "object": { "objectId": format!("obj-{}", id) } })))
            }
            _ => None,
        }
    }

    fn fast_config() -> TabConfig {
        let mut config = TabConfig::new()
            .quiescence(Duration::from_millis(20))
            .stability_timeout(Duration::from_millis(400))
            .navigation_timeout(Duration::from_millis(400))
            .injection_timeout(Duration::from_millis(300));
        config.tick = Duration::from_millis(10);
        config
    }

    async fn open(transport: Arc<ScriptedTransport>) -> ChromeTab {
        ChromeTab::open(transport, fast_config()).await.unwrap()
    }

    #[tokio::test]
    async fn test_init_enables_domains_and_auth() {
        let transport = ScriptedTransport::new(base_responses);
        let config = fast_config().header("Authorization", "Basic dTpw");
        let tab = ChromeTab::open(transport.clone(), config).await.unwrap();
        tab.init(&test_context()).await.unwrap();

        let methods: Vec<String> = transport.commands().into_iter().map(|(m, _)| m).collect();
        for m in ["Page.enable", "DOM.enable", "Network.enable", "DOMStorage.enable", "Debugger.enable"] {
            assert!(methods.iter().any(|x| x == m), "missing {}", m);
        }
        let headers = transport.sent("Network.setExtraHTTPHeaders");
        assert_eq!(headers[0]["headers"]["Authorization"], "Basic dTpw");
        let fetch = transport.sent("Fetch.enable");
        assert_eq!(fetch[0]["patterns"].as_array().unwrap().len(), 2);
        assert_eq!(tab.id(), "T1");
    }

    #[tokio::test]
    async fn test_crash_fails_operations() {
        let transport = ScriptedTransport::new(base_responses);
        let tab = open(transport.clone()).await;
        transport.push_event("Inspector.targetCrashed", json!({})).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = tab.navigate(&test_context(), "http://host/").await.unwrap_err();
        assert!(err.is_crash());
    }

    #[tokio::test]
    async fn test_closed_tab_rejects_operations() {
        let transport = ScriptedTransport::new(base_responses);
        let tab = open(transport.clone()).await;
        tab.close().await.unwrap();
        let err = tab.get_dom().await.unwrap_err();
        assert!(matches!(err, Error::TabClosing));
    }

    #[tokio::test]
    async fn test_navigate_error_text() {
        let transport = ScriptedTransport::new(|method, params| match method {
            "Page.navigate" => Some(Ok(json!({ "frameId": "F1", "errorText": "net::ERR_CONNECTION_REFUSED" }))),
            _ => base_responses(method, params),
        });
        let tab = open(transport).await;
        let err = tab.navigate(&test_context(), "http://host/").await.unwrap_err();
        assert!(matches!(err, Error::NavigationFailed { .. }));
    }

    #[tokio::test]
    async fn test_navigate_waits_for_load_and_requests() {
        let transport = ScriptedTransport::new(|method, params| match method {
            "Page.navigate" => Some(Ok(json!({ "frameId": "F1", "loaderId": "L1" }))),
            _ => base_responses(method, params),
        });
        let tab = Arc::new(open(transport.clone()).await);

        let pusher = transport.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            pusher
                .push_event(
                    "Network.requestWillBeSent",
                    json!({ "requestId": "R1", "documentURL": "http://host/", "type": "Document",
                            "request": { "url": "http://host/", "method": "GET", "headers": {} } }),
                )
                .await;
            pusher
                .push_event("Page.frameNavigated", json!({ "frame": { "id": "F1", "url": "http://host/" } }))
                .await;
            pusher.push_event("Page.loadEventFired", json!({})).await;
            tokio::time::sleep(Duration::from_millis(60)).await;
            pusher
                .push_event("Network.loadingFinished", json!({ "requestId": "R1" }))
                .await;
        });

        let start = Instant::now();
        tab.navigate(&test_context(), "http://host/").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(80));
        assert_eq!(tab.in_flight(), 0);
        let messages = tab.get_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].request.url, "http://host/");
    }

    #[tokio::test]
    async fn test_find_elements_uses_element_info() {
        let transport = ScriptedTransport::new(|method, params| match method {
            "DOM.querySelectorAll" => Some(Ok(json!({ "nodeIds": [5, 6] }))),
            "Runtime.callFunctionOn" => {
                let value = if params["objectId"] == "obj-5" {
                    json!({ "tag": "a", "attributes": { "href": "/b" }, "text": "B", "hidden": false })
                } else {
                    json!({ "tag": "a", "attributes": { "href": "/c", "style": "display:none" }, "text": "", "hidden": false })
                };
                Some(Ok(json!({ "result": { "value": value } })))
            }
            _ => base_responses(method, params),
        });
        let tab = open(transport.clone()).await;
        let elements = tab.find_elements(&test_context(), "a", false).await.unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].href(), Some("/b"));
        assert!(elements[1].hidden);

        // second lookup is served from the element map
        let before = transport.sent("Runtime.callFunctionOn").len();
        tab.find_elements(&test_context(), "a", false).await.unwrap();
        assert_eq!(transport.sent("Runtime.callFunctionOn").len(), before);
    }

    #[tokio::test]
    async fn test_click_resolves_by_hash_and_reports_load() {
        let transport = ScriptedTransport::new(|method, params| match method {
            "DOM.querySelectorAll" => Some(Ok(json!({ "nodeIds": [8] }))),
            "Runtime.callFunctionOn" => Some(Ok(json!({ "result": { "value":
                { "tag": "a", "attributes": { "href": "/b" }, "text": "B", "hidden": false } } }))),
            "DOM.getBoxModel" => Some(Ok(json!({ "model": { "content": [0, 0, 10, 0, 10, 10, 0, 10] } }))),
            _ => base_responses(method, params),
        });
        let tab = open(transport.clone()).await;

        // an open request holds the page unstable until the document swap
        transport
            .push_event(
                "Network.requestWillBeSent",
                json!({ "requestId": "R7", "type": "Document",
                        "request": { "url": "http://host/b", "method": "GET", "headers": {} } }),
            )
            .await;
        let pusher = transport.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            pusher.push_event("DOM.documentUpdated", json!({})).await;
            pusher
                .push_event("Network.loadingFinished", json!({ "requestId": "R7" }))
                .await;
        });

        let el = HtmlElement::new("a").attr("href", "/b").with_text("B");
        let nav = Navigation::new(None, TriggeredBy::Crawler, Action::with_element(ActionType::LeftClick, el));
        let outcome = tab.execute_action(&test_context(), &nav).await.unwrap();
        assert!(outcome.caused_load);

        let mouse = transport.sent("Input.dispatchMouseEvent");
        assert_eq!(mouse.len(), 3);
        assert_eq!(mouse[1]["type"], "mousePressed");
        assert_eq!(mouse[1]["x"], 5.0);
    }

    #[tokio::test]
    async fn test_missing_element_fails_after_refresh() {
        let transport = ScriptedTransport::new(|method, params| match method {
            "DOM.querySelectorAll" => Some(Ok(json!({ "nodeIds": [] }))),
            _ => base_responses(method, params),
        });
        let tab = open(transport.clone()).await;
        let nav = Navigation::new(
            None,
            TriggeredBy::Crawler,
            Action::with_element(ActionType::LeftClick, HtmlElement::new("button")),
        );
        let err = tab.execute_action(&test_context(), &nav).await.unwrap_err();
        assert!(matches!(err, Error::ElementNotFound(_)));
        assert!(transport.sent("DOM.getDocument").len() >= 2);
    }

    #[tokio::test]
    async fn test_paused_request_strips_marker_and_delivers_response() {
        let transport = ScriptedTransport::new(|method, params| match method {
            "Fetch.getResponseBody" => Some(Ok(json!({ "body": "aGVsbG8=", "base64Encoded": true }))),
            _ => base_responses(method, params),
        });
        let tab = open(transport.clone()).await;
        let (tx, rx) = oneshot::channel();
        tab.register_for_response("m1", tx);

        transport
            .push_event(
                "Fetch.requestPaused",
                json!({ "requestId": "f1", "networkId": "n1", "resourceType": "Fetch",
                        "request": { "url": "http://host/q?a=1", "method": "GET",
                                     "headers": { "x-browserk-req": "m1", "Accept": "*/*" } } }),
            )
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let continued = transport.sent("Fetch.continueRequest");
        assert_eq!(continued.len(), 1);
        let headers = continued[0]["headers"].as_array().unwrap();
        assert!(headers.iter().all(|h| h["name"] != "x-browserk-req"));

        transport
            .push_event(
                "Fetch.requestPaused",
                json!({ "requestId": "f2", "networkId": "n1", "resourceType": "Fetch",
                        "responseStatusCode": 200,
                        "responseHeaders": [{ "name": "Content-Type", "value": "text/html" }],
                        "request": { "url": "http://host/q?a=1", "method": "GET", "headers": {} } }),
            )
            .await;
        let resp = tokio::time::timeout(Duration::from_secs(1), rx).await.unwrap().unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.body(), Some("hello"));
        assert_eq!(resp.response.mime_type, "text/html");
    }

    #[tokio::test]
    async fn test_response_handlers_modify_and_fulfill() {
        let transport = ScriptedTransport::new(|method, params| match method {
            "Fetch.getResponseBody" => Some(Ok(json!({ "body": "<html></html>", "base64Encoded": false }))),
            _ => base_responses(method, params),
        });
        let tab = open(transport.clone()).await;
        let mut ctx = test_context();
        ctx.handlers.add_response_handler(|resp| resp.set_header("X-Frame-Options", "DENY"));
        tab.init(&ctx).await.unwrap();

        transport
            .push_event(
                "Fetch.requestPaused",
                json!({ "requestId": "f9", "networkId": "n9", "resourceType": "Document",
                        "responseStatusCode": 200, "responseHeaders": [],
                        "request": { "url": "http://host/", "method": "GET", "headers": {} } }),
            )
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let fulfilled = transport.sent("Fetch.fulfillRequest");
        assert_eq!(fulfilled.len(), 1);
        assert_eq!(fulfilled[0]["responseHeaders"][0]["name"], "X-Frame-Options");
    }

    #[tokio::test]
    async fn test_injection_times_out_without_response() {
        let transport = ScriptedTransport::new(|method, params| match method {
            "Page.createIsolatedWorld" => Some(Ok(json!({ "executionContextId": 3 }))),
            "Runtime.evaluate" => Some(Ok(json!({ "result": { "value": 200 } }))),
            _ => base_responses(method, params),
        });
        let tab = open(transport.clone()).await;
        let req = InjectionRequest::new("GET", "http://host/?q=1", &[], None);
        let err = tab.inject_request(&test_context(), &req, false).await.unwrap_err();
        assert!(matches!(err, Error::InjectionTimeout));

        let eval = transport.sent("Runtime.evaluate");
        assert_eq!(eval[0]["contextId"], 3);
        assert!(eval[0]["expression"].as_str().unwrap().contains("x-browserk-req"));
    }

    #[tokio::test]
    async fn test_storage_and_console_events_drain() {
        let transport = ScriptedTransport::new(base_responses);
        let tab = open(transport.clone()).await;
        transport
            .push_event(
                "DOMStorage.domStorageItemAdded",
                json!({ "storageId": { "securityOrigin": "http://host", "isLocalStorage": true },
                        "key": "token", "newValue": "abc" }),
            )
            .await;
        transport
            .push_event(
                "Runtime.consoleAPICalled",
                json!({ "type": "log", "args": [{ "type": "string", "value": "hi" }] }),
            )
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(tab.get_storage_events().len(), 1);
        assert!(tab.get_storage_events().is_empty());
        assert_eq!(tab.get_console_events().len(), 1);
    }
}
