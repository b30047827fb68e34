// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Mutable views over paused fetch requests and responses

use crate::model::{Headers, HttpModifiedRequest, HttpModifiedResponse, HttpRequest, HttpResponse};

/// A paused request as seen by request handlers
///
/// Setters record modifications; the original request stays untouched so
/// later handlers still see what the page sent.
#[derive(Debug, Clone)]
pub struct InterceptedHttpRequest {
    /// Fetch domain request id
    pub fetch_id: String,
    pub request: HttpRequest,
    modified: HttpModifiedRequest,
}

impl InterceptedHttpRequest {
    pub fn new(fetch_id: impl Into<String>, request: HttpRequest) -> Self {
        Self {
            fetch_id: fetch_id.into(),
            request,
            modified: HttpModifiedRequest::default(),
        }
    }

    /// Effective URL after modifications
    pub fn url(&self) -> &str {
        self.modified.url.as_deref().unwrap_or(&self.request.url)
    }

    pub fn method(&self) -> &str {
        self.modified.method.as_deref().unwrap_or(&self.request.method)
    }

    pub fn headers(&self) -> &Headers {
        self.modified.headers.as_ref().unwrap_or(&self.request.headers)
    }

    pub fn post_data(&self) -> Option<&str> {
        self.modified
            .post_data
            .as_deref()
            .or(self.request.post_data.as_deref())
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.modified.url = Some(url.into());
    }

    pub fn set_method(&mut self, method: impl Into<String>) {
        self.modified.method = Some(method.into());
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        let mut headers = self.headers().clone();
        headers.set(name, value);
        self.modified.headers = Some(headers);
    }

    pub fn remove_header(&mut self, name: &str) {
        if !self.headers().contains(name) {
            return;
        }
        let mut headers = self.headers().clone();
        headers.remove(name);
        self.modified.headers = Some(headers);
    }

    pub fn set_post_data(&mut self, body: impl Into<String>) {
        self.modified.post_data = Some(body.into());
    }

    /// Fold in modifications produced elsewhere
    pub fn apply(&mut self, modified: HttpModifiedRequest) {
        self.modified.merge(modified);
    }

    pub fn modified(&self) -> &HttpModifiedRequest {
        &self.modified
    }

    pub fn is_modified(&self) -> bool {
        !self.modified.is_empty()
    }
}

/// A paused response as seen by response handlers
#[derive(Debug, Clone)]
pub struct InterceptedHttpResponse {
    pub fetch_id: String,
    pub request: HttpRequest,
    pub response: HttpResponse,
    /// Document after rendering, for injections sent with rendering
    pub dom: Option<String>,
    modified: HttpModifiedResponse,
}

impl InterceptedHttpResponse {
    pub fn new(fetch_id: impl Into<String>, request: HttpRequest, response: HttpResponse) -> Self {
        Self {
            fetch_id: fetch_id.into(),
            request,
            response,
            dom: None,
            modified: HttpModifiedResponse::default(),
        }
    }

    pub fn status(&self) -> i64 {
        self.modified.status.unwrap_or(self.response.status)
    }

    pub fn headers(&self) -> &Headers {
        self.modified.headers.as_ref().unwrap_or(&self.response.headers)
    }

    pub fn body(&self) -> Option<&str> {
        self.modified.body.as_deref().or(self.response.body.as_deref())
    }

    pub fn reason(&self) -> &str {
        self.modified
            .reason
            .as_deref()
            .unwrap_or(&self.response.status_text)
    }

    pub fn set_status(&mut self, status: i64) {
        self.modified.status = Some(status);
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        let mut headers = self.headers().clone();
        headers.set(name, value);
        self.modified.headers = Some(headers);
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.modified.body = Some(body.into());
    }

    pub fn set_reason(&mut self, reason: impl Into<String>) {
        self.modified.reason = Some(reason.into());
    }

    pub fn modified(&self) -> &HttpModifiedResponse {
        &self.modified
    }

    pub fn is_modified(&self) -> bool {
        !self.modified.is_empty()
    }

    /// True when a handler wants to see or change the body
    pub fn needs_body(&self) -> bool {
        self.modified.body.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_modifications_layer() {
        let mut req = HttpRequest::new("GET", "http://h/a");
        req.headers.set("x-browserk-req", "abc");
        let mut view = InterceptedHttpRequest::new("f1", req);
        assert!(!view.is_modified());

        view.set_url("http://h/b");
        view.remove_header("x-browserk-req");
        view.set_header("Authorization", "Basic Zm9v");
        assert_eq!(view.url(), "http://h/b");
        assert!(!view.headers().contains("x-browserk-req"));
        assert_eq!(view.headers().get("authorization"), Some("Basic Zm9v"));
        assert_eq!(view.request.url, "http://h/a");

        view.apply(HttpModifiedRequest {
            url: Some("http://h/c".into()),
            ..Default::default()
        });
        assert_eq!(view.url(), "http://h/c");
        assert!(view.modified().headers.is_some());
    }

    #[test]
    fn test_response_view() {
        let mut resp = HttpResponse::new("http://h/", 200);
        resp.status_text = "OK".into();
        let mut view = InterceptedHttpResponse::new("f2", HttpRequest::new("GET", "http://h/"), resp);
        assert_eq!(view.reason(), "OK");
        view.set_status(403);
        view.set_reason("Forbidden");
        view.set_body("denied");
        assert_eq!(view.status(), 403);
        assert_eq!(view.body(), Some("denied"));
        assert!(view.needs_body());
    }
}
