// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Ordered handler chains carried by a [`Context`](crate::context::Context)

use std::sync::Arc;

use super::intercept::{InterceptedHttpRequest, InterceptedHttpResponse};
use crate::model::Navigation;
use crate::plugin::PluginEvent;

/// Called for every paused request
pub type RequestHandler = Arc<dyn Fn(&mut InterceptedHttpRequest) + Send + Sync>;
/// Called for every paused response
pub type ResponseHandler = Arc<dyn Fn(&mut InterceptedHttpResponse) + Send + Sync>;
/// Called for every plugin event
pub type EventHandler = Arc<dyn Fn(&PluginEvent) + Send + Sync>;
/// Returns a script to evaluate around an action
pub type JsHandler = Arc<dyn Fn(&Navigation) -> Option<String> + Send + Sync>;

/// The five handler chains. Cloning copies the chains, not the handlers
#[derive(Clone, Default)]
pub struct Handlers {
    request: Vec<RequestHandler>,
    response: Vec<ResponseHandler>,
    event: Vec<EventHandler>,
    js_before: Vec<JsHandler>,
    js_after: Vec<JsHandler>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_request_handler<F>(&mut self, f: F)
    where
        F: Fn(&mut InterceptedHttpRequest) + Send + Sync + 'static,
    {
        self.request.push(Arc::new(f));
    }

    pub fn add_response_handler<F>(&mut self, f: F)
    where
        F: Fn(&mut InterceptedHttpResponse) + Send + Sync + 'static,
    {
        self.response.push(Arc::new(f));
    }

    pub fn add_event_handler<F>(&mut self, f: F)
    where
        F: Fn(&PluginEvent) + Send + Sync + 'static,
    {
        self.event.push(Arc::new(f));
    }

    pub fn add_js_before_handler<F>(&mut self, f: F)
    where
        F: Fn(&Navigation) -> Option<String> + Send + Sync + 'static,
    {
        self.js_before.push(Arc::new(f));
    }

    pub fn add_js_after_handler<F>(&mut self, f: F)
    where
        F: Fn(&Navigation) -> Option<String> + Send + Sync + 'static,
    {
        self.js_after.push(Arc::new(f));
    }

    /// Run request handlers in registration order
    pub fn on_request(&self, req: &mut InterceptedHttpRequest) {
        for h in &self.request {
            h(req);
        }
    }

    pub fn on_response(&self, resp: &mut InterceptedHttpResponse) {
        for h in &self.response {
            h(resp);
        }
    }

    pub fn on_event(&self, event: &PluginEvent) {
        for h in &self.event {
            h(event);
        }
    }

    pub fn js_before(&self, nav: &Navigation) -> Vec<String> {
        self.js_before.iter().filter_map(|h| h(nav)).collect()
    }

    pub fn js_after(&self, nav: &Navigation) -> Vec<String> {
        self.js_after.iter().filter_map(|h| h(nav)).collect()
    }

    pub fn has_response_handlers(&self) -> bool {
        !self.response.is_empty()
    }

    /// Chain lengths: (request, response, event, js_before, js_after)
    pub fn counts(&self) -> (usize, usize, usize, usize, usize) {
        (
            self.request.len(),
            self.response.len(),
            self.event.len(),
            self.js_before.len(),
            self.js_after.len(),
        )
    }
}

impl std::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (req, resp, ev, before, after) = self.counts();
        f.debug_struct("Handlers")
            .field("request", &req)
            .field("response", &resp)
            .field("event", &ev)
            .field("js_before", &before)
            .field("js_after", &after)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, HttpRequest, TriggeredBy};
    use parking_lot::Mutex;

    #[test]
    fn test_request_chain_order_later_wins() {
        let mut handlers = Handlers::new();
        handlers.add_request_handler(|r| r.set_url("http://h/first"));
        handlers.add_request_handler(|r| {
            assert_eq!(r.url(), "http://h/first");
            r.set_url("http://h/second");
        });
        let mut view = InterceptedHttpRequest::new("1", HttpRequest::new("GET", "http://h/"));
        handlers.on_request(&mut view);
        assert_eq!(view.url(), "http://h/second");
    }

    #[test]
    fn test_clone_isolates_chains() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut base = Handlers::new();
        let s = Arc::clone(&seen);
        base.add_js_before_handler(move |_| {
            s.lock().push("base");
            Some("1".into())
        });

        let snapshot = base.clone();
        base.add_js_before_handler(|_| None);
        assert_eq!(base.counts().3, 2);
        assert_eq!(snapshot.counts().3, 1);

        let nav = Navigation::new(None, TriggeredBy::Initial, Action::load_url("http://h/"));
        assert_eq!(snapshot.js_before(&nav), vec!["1".to_string()]);
        assert_eq!(seen.lock().len(), 1);
    }
}
