// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Scriptable in-memory site for crawler, plugin and scanner tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use url::Url;

use super::{ActionOutcome, Browser, BrowserPool, LeaseToken};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::injast::InjectionRequest;
use crate::model::{
    ActionType, ConsoleEvent, Cookie, HtmlElement, HtmlForm, HttpMessage, HttpRequest,
    HttpResponse, Navigation, StorageEvent,
};
use crate::network::InterceptedHttpResponse;
use crate::plugin::PluginEvent;

/// What the fake serves for one URL
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub dom: String,
    /// selector -> matching elements
    pub elements: HashMap<String, Vec<HtmlElement>>,
    pub forms: Vec<HtmlForm>,
    pub interactables: Vec<HtmlElement>,
    pub cookies: Vec<Cookie>,
    pub response_headers: Vec<(String, String)>,
}

impl FakePage {
    pub fn new(dom: &str) -> Self {
        Self {
            dom: dom.to_string(),
            ..Self::default()
        }
    }

    pub fn element(mut self, selector: &str, el: HtmlElement) -> Self {
        self.elements.entry(selector.to_string()).or_default().push(el);
        self
    }

    pub fn form(mut self, form: HtmlForm) -> Self {
        self.forms.push(form);
        self
    }

    pub fn cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.response_headers.push((name.to_string(), value.to_string()));
        self
    }
}

type InjectFn = Box<dyn Fn(&InjectionRequest) -> Option<String> + Send + Sync>;

#[derive(Default)]
struct State {
    url: String,
    messages: Vec<HttpMessage>,
    cookies: Vec<Cookie>,
    executed: Vec<Navigation>,
    injected: Vec<(String, String, Option<String>)>,
}

/// A tab over a fixed set of pages
pub struct FakeBrowser {
    id: String,
    pages: HashMap<String, FakePage>,
    state: Mutex<State>,
    inject: Option<InjectFn>,
}

impl FakeBrowser {
    pub fn new(pages: Vec<(&str, FakePage)>) -> Self {
        Self {
            id: "fake".to_string(),
            pages: pages
                .into_iter()
                .map(|(url, page)| (url.to_string(), page))
                .collect(),
            state: Mutex::new(State {
                url: "about:blank".to_string(),
                ..State::default()
            }),
            inject: None,
        }
    }

    /// Answer injected requests with the returned body
    pub fn on_inject<F>(mut self, f: F) -> Self
    where
        F: Fn(&InjectionRequest) -> Option<String> + Send + Sync + 'static,
    {
        self.inject = Some(Box::new(f));
        self
    }

    pub fn executed(&self) -> Vec<Navigation> {
        self.state.lock().executed.clone()
    }

    pub fn injected(&self) -> Vec<(String, String, Option<String>)> {
        self.state.lock().injected.clone()
    }

    fn page(&self) -> FakePage {
        let url = self.state.lock().url.clone();
        self.pages.get(&url).cloned().unwrap_or_default()
    }

    fn load(&self, ctx: &Context, nav: &Navigation, method: &str, url: &str, body: Option<String>) -> Result<()> {
        let page = self
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| Error::navigation_failed(url, "net::ERR_NAME_NOT_RESOLVED"))?;
        let mut request = HttpRequest::new(method, url);
        request.document_url = url.to_string();
        request.post_data = body;
        let mut response = HttpResponse::new(url, 200);
        for (name, value) in &page.response_headers {
            response.headers.add(name, value);
        }
        response.mime_type = "text/html".to_string();
        response.set_body(page.dom.clone());

        let mut msg = HttpMessage::new(request.clone());
        msg.response = Some(response.clone());
        {
            let mut state = self.state.lock();
            state.url = url.to_string();
            state.messages.push(msg);
            state.cookies.extend(page.cookies.iter().cloned());
        }
        if let Ok(page_url) = Url::parse(url) {
            ctx.handlers.on_event(&PluginEvent::request(page_url.clone(), nav.id.clone(), request.clone()));
            ctx.handlers
                .on_event(&PluginEvent::response(page_url, nav.id.clone(), request, response));
        }
        Ok(())
    }

    fn resolve(&self, href: &str) -> Option<String> {
        let base = Url::parse(&self.state.lock().url).ok()?;
        base.join(href).ok().map(|u| u.to_string())
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    fn id(&self) -> &str {
        &self.id
    }

    async fn init(&self, _ctx: &Context) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn navigate(&self, ctx: &Context, url: &str) -> Result<()> {
        let nav = Navigation::new(None, crate::model::TriggeredBy::Initial, crate::model::Action::load_url(url));
        self.load(ctx, &nav, "GET", url, None)
    }

    async fn get_url(&self) -> Result<String> {
        Ok(self.state.lock().url.clone())
    }

    async fn get_dom(&self) -> Result<String> {
        Ok(self.page().dom)
    }

    async fn get_base_href(&self) -> Result<String> {
        self.get_url().await
    }

    async fn refresh_document(&self) -> Result<()> {
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    async fn find_elements(&self, _ctx: &Context, selector: &str, _may_refresh: bool) -> Result<Vec<HtmlElement>> {
        Ok(self.page().elements.get(selector).cloned().unwrap_or_default())
    }

    async fn find_forms(&self, _ctx: &Context) -> Result<Vec<HtmlForm>> {
        Ok(self.page().forms)
    }

    async fn find_interactables(&self, _ctx: &Context) -> Result<Vec<HtmlElement>> {
        Ok(self.page().interactables)
    }

    async fn execute_action(&self, ctx: &Context, nav: &Navigation) -> Result<ActionOutcome> {
        ctx.check()?;
        self.state.lock().executed.push(nav.clone());
        let action = &nav.action;
        let mut outcome = ActionOutcome::default();
        match action.kind {
            ActionType::LoadUrl => {
                self.load(ctx, nav, "GET", &action.input_str(), None)?;
                outcome.caused_load = true;
            }
            ActionType::FillForm => {
                let form = action
                    .form
                    .as_ref()
                    .ok_or_else(|| Error::InvalidNavigation("no form".into()))?;
                let target = if form.action_is_self() {
                    self.state.lock().url.clone()
                } else {
                    self.resolve(form.action())
                        .ok_or_else(|| Error::InvalidNavigation(form.action().to_string()))?
                };
                let values = ctx.form_filler.values(form);
                let body = values
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect::<Vec<_>>()
                    .join("&");
                self.load(ctx, nav, &form.method(), &target, Some(body))?;
                outcome.caused_load = true;
            }
            ActionType::ExecuteJs => outcome.result = Some(b"null".to_vec()),
            _ => {
                let el = action
                    .element
                    .as_ref()
                    .ok_or_else(|| Error::InvalidNavigation("no element".into()))?;
                let current = self.page();
                let on_page = current
                    .elements
                    .values()
                    .flatten()
                    .chain(current.interactables.iter())
                    .any(|e| e.hash() == el.hash());
                if !on_page {
                    return Err(Error::ElementNotFound(el.tag.clone()));
                }
                if let Some(href) = el.href().filter(|h| !h.starts_with('#')) {
                    if let Some(target) = self.resolve(href) {
                        self.load(ctx, nav, "GET", &target, None)?;
                        outcome.caused_load = true;
                    }
                }
            }
        }
        Ok(outcome)
    }

    async fn get_cookies(&self) -> Result<Vec<Cookie>> {
        Ok(self.state.lock().cookies.clone())
    }

    fn get_storage_events(&self) -> Vec<StorageEvent> {
        Vec::new()
    }

    fn get_console_events(&self) -> Vec<ConsoleEvent> {
        Vec::new()
    }

    fn get_messages(&self) -> Vec<HttpMessage> {
        self.state.lock().messages.clone()
    }

    async fn inject_request(
        &self,
        _ctx: &Context,
        req: &InjectionRequest,
        _render: bool,
    ) -> Result<InterceptedHttpResponse> {
        let (method, url, body) = (req.method(), req.url(), req.body());
        self.state.lock().injected.push((method.clone(), url.clone(), body));
        let reply = self.inject.as_ref().and_then(|f| f(req));
        match reply {
            Some(body) if body.is_empty() => Err(Error::EmptyInjectionResponse),
            Some(body) => {
                let request = HttpRequest::new(method, url.clone());
                let mut response = HttpResponse::new(url, 200);
                response.set_body(body);
                Ok(InterceptedHttpResponse::new("fake", request, response))
            }
            None => Err(Error::InjectionTimeout),
        }
    }
}

/// Pool handing out tabs built by a closure
pub struct FakePool {
    factory: Box<dyn Fn() -> Arc<FakeBrowser> + Send + Sync>,
    leases: Mutex<HashMap<u64, Arc<FakeBrowser>>>,
    next: AtomicU64,
    /// Every tab handed out, in lease order
    pub issued: Mutex<Vec<Arc<FakeBrowser>>>,
}

impl FakePool {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Arc<FakeBrowser> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            leases: Mutex::new(HashMap::new()),
            next: AtomicU64::new(1),
            issued: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BrowserPool for FakePool {
    async fn take(&self, ctx: &Context) -> Result<(Arc<dyn Browser>, LeaseToken)> {
        ctx.check()?;
        let browser = (self.factory)();
        let token = LeaseToken(self.next.fetch_add(1, Ordering::Relaxed));
        self.leases.lock().insert(token.0, Arc::clone(&browser));
        self.issued.lock().push(Arc::clone(&browser));
        Ok((browser, token))
    }

    async fn return_browser(&self, _ctx: &Context, token: LeaseToken) -> Result<()> {
        self.leases.lock().remove(&token.0).map(|_| ()).ok_or_else(|| Error::NotFound(token.to_string()))
    }

    fn leased(&self) -> usize {
        self.leases.lock().len()
    }

    async fn shutdown(&self) -> Result<()> {
        self.leases.lock().clear();
        Ok(())
    }
}
