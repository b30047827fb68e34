// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Events delivered to passive plugins

use url::Url;

use crate::model::{ConsoleEvent, Cookie, Id, HttpRequest, HttpResponse, JsEvent, StorageEvent};
use crate::store::{UniqueKeys, Uniqueness};

/// Kind of a plugin event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Cookie,
    Storage,
    Console,
    Request,
    Response,
    Url,
    Js,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Cookie => "cookie",
            EventType::Storage => "storage",
            EventType::Console => "console",
            EventType::Request => "request",
            EventType::Response => "response",
            EventType::Url => "url",
            EventType::Js => "js",
        }
    }
}

/// Event payload
#[derive(Debug, Clone)]
pub enum EventData {
    Cookie(Cookie),
    Storage(StorageEvent),
    Console(ConsoleEvent),
    Request(HttpRequest),
    Response {
        request: HttpRequest,
        response: HttpResponse,
    },
    Url(String),
    Js(JsEvent),
}

/// An observation made while executing a navigation
#[derive(Debug, Clone)]
pub struct PluginEvent {
    pub event_type: EventType,
    /// Page the event was observed on
    pub url: Url,
    pub nav_id: Id,
    pub data: EventData,
    /// Filled in by the plugin manager before delivery
    pub uniqueness: Uniqueness,
}

impl PluginEvent {
    fn new(event_type: EventType, url: Url, nav_id: Id, data: EventData) -> Self {
        Self {
            event_type,
            url,
            nav_id,
            data,
            uniqueness: Uniqueness::empty(),
        }
    }

    pub fn cookie(url: Url, nav_id: Id, cookie: Cookie) -> Self {
        Self::new(EventType::Cookie, url, nav_id, EventData::Cookie(cookie))
    }

    pub fn storage(url: Url, nav_id: Id, event: StorageEvent) -> Self {
        Self::new(EventType::Storage, url, nav_id, EventData::Storage(event))
    }

    pub fn console(url: Url, nav_id: Id, event: ConsoleEvent) -> Self {
        Self::new(EventType::Console, url, nav_id, EventData::Console(event))
    }

    pub fn request(url: Url, nav_id: Id, request: HttpRequest) -> Self {
        Self::new(EventType::Request, url, nav_id, EventData::Request(request))
    }

    pub fn response(url: Url, nav_id: Id, request: HttpRequest, response: HttpResponse) -> Self {
        Self::new(
            EventType::Response,
            url,
            nav_id,
            EventData::Response { request, response },
        )
    }

    pub fn url_changed(url: Url, nav_id: Id) -> Self {
        let s = url.to_string();
        Self::new(EventType::Url, url, nav_id, EventData::Url(s))
    }

    pub fn js(url: Url, nav_id: Id, event: JsEvent) -> Self {
        Self::new(EventType::Js, url, nav_id, EventData::Js(event))
    }

    /// Per-dimension keys used to compute uniqueness
    pub fn unique_keys(&self) -> UniqueKeys {
        match &self.data {
            EventData::Cookie(c) => {
                let key = format!(
                    "{}|{}|{}|{}|{}|{}|{:?}",
                    c.name, c.value, c.domain, c.path, c.secure, c.http_only, c.same_site
                );
                UniqueKeys::new(&self.url, Some(key.as_bytes()), None)
            }
            EventData::Storage(s) => {
                let key = format!("{:?}|{}|{}|{}", s.kind, s.security_origin, s.key, s.new_value);
                UniqueKeys::new(&self.url, Some(key.as_bytes()), None)
            }
            EventData::Console(c) => {
                UniqueKeys::new(&self.url, Some(format!("{}|{}", c.level, c.text).as_bytes()), None)
            }
            EventData::Request(r) => UniqueKeys::new(&self.url, Some(r.id.as_bytes()), None),
            EventData::Response { request, response } => UniqueKeys::new(
                &self.url,
                Some(request.id.as_bytes()),
                Some(response.id.as_bytes()),
            ),
            EventData::Url(u) => UniqueKeys::new(&self.url, Some(u.as_bytes()), None),
            EventData::Js(j) => UniqueKeys::new(&self.url, Some(j.hash.as_bytes()), None),
        }
    }
}
