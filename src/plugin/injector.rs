// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Handle an active plugin uses to mutate and replay one request

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::browser::Browser;
use crate::context::Context;
use crate::error::Result;
use crate::injast::{InjectKind, InjectionLocation, InjectionRequest, Site};
use crate::model::{HttpMessage, Id};
use crate::network::InterceptedHttpResponse;

#[async_trait]
pub trait Injector: Send {
    /// The captured exchange being attacked
    fn message(&self) -> &HttpMessage;

    /// The site this injector addresses
    fn injection_expr(&self) -> &Site;

    /// Location tags of the addressed site
    fn locations(&self) -> InjectionLocation;

    /// Literal of the addressed site as captured
    fn original(&self) -> String;

    /// Navigation and result the message was captured in
    fn navigation(&self) -> (Id, Id);

    /// Context handed to the plugin; transient handlers go here
    fn context(&self) -> &Context;

    fn context_mut(&mut self) -> &mut Context;

    /// The request as it stands after mutations
    fn request(&self) -> &InjectionRequest;

    /// Replace the addressed literal
    fn inject(&mut self, value: &str, kind: InjectKind) -> bool;

    /// Undo every mutation
    fn reset(&mut self);

    fn replace_path(&mut self, path: &str);
    fn replace_file(&mut self, file: &str);
    fn replace_uri(&mut self, uri: &str);
    fn replace_header(&mut self, name: &str, value: &str);
    fn add_header(&mut self, name: &str, value: &str);
    fn remove_header(&mut self, name: &str);
    fn replace_body(&mut self, body: &str);

    /// Send the mutated request
    async fn send(&mut self, ctx: &Context, with_render: bool) -> Result<InterceptedHttpResponse>;

    /// Send an unrelated request through the same tab
    async fn send_new(
        &mut self,
        ctx: &Context,
        req: &InjectionRequest,
        with_render: bool,
    ) -> Result<InterceptedHttpResponse>;
}

/// Injector backed by a leased tab
pub struct BrowserInjector {
    browser: Arc<dyn Browser>,
    ctx: Context,
    message: HttpMessage,
    request: InjectionRequest,
    site: Site,
    nav_id: Id,
    result_id: Id,
}

impl BrowserInjector {
    pub fn new(
        browser: Arc<dyn Browser>,
        ctx: Context,
        message: HttpMessage,
        request: InjectionRequest,
        site: Site,
    ) -> Self {
        Self {
            browser,
            ctx,
            message,
            request,
            site,
            nav_id: Id::root(),
            result_id: Id::root(),
        }
    }

    pub fn with_navigation(mut self, nav_id: Id, result_id: Id) -> Self {
        self.nav_id = nav_id;
        self.result_id = result_id;
        self
    }

    /// Address another site of the same request
    pub fn retarget(&mut self, site: Site) {
        self.request.reset();
        self.site = site;
    }
}

#[async_trait]
impl Injector for BrowserInjector {
    fn message(&self) -> &HttpMessage {
        &self.message
    }

    fn injection_expr(&self) -> &Site {
        &self.site
    }

    fn locations(&self) -> InjectionLocation {
        self.request.locations(&self.site)
    }

    fn original(&self) -> String {
        self.request.original(&self.site)
    }

    fn navigation(&self) -> (Id, Id) {
        (self.nav_id.clone(), self.result_id.clone())
    }

    fn context(&self) -> &Context {
        &self.ctx
    }

    fn context_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }

    fn request(&self) -> &InjectionRequest {
        &self.request
    }

    fn inject(&mut self, value: &str, kind: InjectKind) -> bool {
        let site = self.site.clone();
        self.request.inject(&site, value, kind)
    }

    fn reset(&mut self) {
        self.request.reset();
    }

    fn replace_path(&mut self, path: &str) {
        self.request.replace_path(path);
    }

    fn replace_file(&mut self, file: &str) {
        self.request.replace_file(file);
    }

    fn replace_uri(&mut self, uri: &str) {
        self.request.replace_uri(uri);
    }

    fn replace_header(&mut self, name: &str, value: &str) {
        self.request.replace_header(name, value);
    }

    fn add_header(&mut self, name: &str, value: &str) {
        self.request.add_header(name, value);
    }

    fn remove_header(&mut self, name: &str) {
        self.request.remove_header(name);
    }

    fn replace_body(&mut self, body: &str) {
        self.request.replace_body(body);
    }

    async fn send(&mut self, ctx: &Context, with_render: bool) -> Result<InterceptedHttpResponse> {
        debug!(
            method = %self.request.method(),
            url = %self.request.url(),
            site = %self.locations(),
            "injecting"
        );
        ctx.run(self.browser.inject_request(ctx, &self.request, with_render))
            .await
    }

    async fn send_new(
        &mut self,
        ctx: &Context,
        req: &InjectionRequest,
        with_render: bool,
    ) -> Result<InterceptedHttpResponse> {
        debug!(method = %req.method(), url = %req.url(), "injecting new request");
        ctx.run(self.browser.inject_request(ctx, req, with_render)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakeBrowser;
    use crate::context::test_support::test_context;
    use crate::error::Error;
    use crate::model::HttpRequest;

    fn injector(browser: Arc<FakeBrowser>) -> BrowserInjector {
        let req = InjectionRequest::new("GET", "http://host/search?q=shoes", &[], None);
        let site = req
            .sites()
            .into_iter()
            .find(|s| req.original(s) == "shoes")
            .unwrap();
        let msg = HttpMessage::new(HttpRequest::new("GET", "http://host/search?q=shoes"));
        BrowserInjector::new(browser, test_context(), msg, req, site)
    }

    #[tokio::test]
    async fn test_inject_and_send() {
        let browser = Arc::new(FakeBrowser::new(vec![]).on_inject(|req| Some(req.url())));
        let mut inj = injector(Arc::clone(&browser));
        assert!(inj.locations().contains(InjectionLocation::QUERY_VALUE));
        assert_eq!(inj.original(), "shoes");
        assert!(inj.inject("boots", InjectKind::Value));

        let ctx = inj.context().clone();
        let resp = inj.send(&ctx, false).await.unwrap();
        assert_eq!(resp.body(), Some("http://host/search?q=boots"));

        inj.reset();
        assert_eq!(inj.request().url(), "http://host/search?q=shoes");
        assert_eq!(browser.injected().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_surfaces_to_plugin() {
        let browser = Arc::new(FakeBrowser::new(vec![]));
        let mut inj = injector(browser);
        let ctx = inj.context().clone();
        let res = inj.send(&ctx, false).await;
        assert!(matches!(res, Err(Error::InjectionTimeout)));
    }
}
