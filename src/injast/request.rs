// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! A whole HTTP request as an injection tree
//!
//! Method, request target, headers, cookies and body are parsed into their
//! own arenas. [`InjectionRequest::sites`] walks them in wire order; an
//! invalid request target yields no sites at all, an invalid body only
//! hides the body sites.

use super::ast::{Expr, IdentArena, IdentId, InjectKind, Separator, Span};
use super::body::Body;
use super::location::InjectionLocation;
use super::uri::Uri;

/// Which part of the request a site lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    Method,
    Uri,
    Header,
    Cookie,
    Body,
}

/// An addressable injection point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub part: Part,
    pub expr: Expr,
}

#[derive(Debug, Clone)]
struct HeaderEntry {
    field: Expr,
    removed: bool,
}

/// Parsed request with mutation support
#[derive(Debug, Clone)]
pub struct InjectionRequest {
    method: IdentArena,
    method_id: IdentId,
    uri: Uri,
    header_arena: IdentArena,
    headers: Vec<HeaderEntry>,
    added_headers: Vec<(String, String)>,
    cookie_arena: IdentArena,
    cookies: Vec<Expr>,
    body: Body,
    replaced_uri: Option<String>,
    replaced_body: Option<String>,
}

impl InjectionRequest {
    /// Parse a request. `url` may be absolute or a request target
    pub fn new(method: &str, url: &str, headers: &[(String, String)], body: Option<&str>) -> Self {
        let mut method_arena = IdentArena::new();
        let method_id = method_arena.push(
            method,
            Span::new(0, method.len()),
            InjectionLocation::METHOD,
        );

        let mut header_arena = IdentArena::new();
        let mut cookie_arena = IdentArena::new();
        let mut entries = Vec::new();
        let mut cookies = Vec::new();

        for (name, value) in headers {
            if name.eq_ignore_ascii_case("cookie") {
                cookies.extend(parse_cookie_header(&mut cookie_arena, value));
                continue;
            }
            let key = header_arena.push(name, Span::new(0, name.len()), InjectionLocation::HEADER_NAME);
            let val = header_arena.push(
                value,
                Span::new(0, value.len()),
                InjectionLocation::HEADER_VALUE,
            );
            entries.push(HeaderEntry {
                field: Expr::KeyValue {
                    key: Box::new(Expr::Ident(key)),
                    sep: Some(Separator::Colon),
                    value: val,
                    span: Span::new(0, name.len() + value.len() + 1),
                },
                removed: false,
            });
        }

        Self {
            method: method_arena,
            method_id,
            uri: Uri::parse(url),
            header_arena,
            headers: entries,
            added_headers: Vec::new(),
            cookie_arena,
            cookies,
            body: Body::parse(body.unwrap_or("")),
            replaced_uri: None,
            replaced_body: None,
        }
    }

    /// The parsed request target
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn body_tree(&self) -> &Body {
        &self.body
    }

    fn arena(&self, part: Part) -> &IdentArena {
        match part {
            Part::Method => &self.method,
            Part::Uri => self.uri.arena(),
            Part::Header => &self.header_arena,
            Part::Cookie => &self.cookie_arena,
            Part::Body => self.body.arena(),
        }
    }

    /// Every injection site in wire order
    pub fn sites(&self) -> Vec<Site> {
        if self.uri.is_invalid() {
            return Vec::new();
        }

        let mut sites = vec![Site {
            part: Part::Method,
            expr: Expr::Ident(self.method_id),
        }];
        sites.extend(self.uri.sites().into_iter().map(|expr| Site {
            part: Part::Uri,
            expr,
        }));
        for entry in &self.headers {
            if let Expr::KeyValue { key, value, .. } = &entry.field {
                sites.push(Site {
                    part: Part::Header,
                    expr: (**key).clone(),
                });
                sites.push(Site {
                    part: Part::Header,
                    expr: Expr::Ident(*value),
                });
            }
        }
        for cookie in &self.cookies {
            if let Expr::KeyValue { key, value, .. } = cookie {
                sites.push(Site {
                    part: Part::Cookie,
                    expr: (**key).clone(),
                });
                sites.push(Site {
                    part: Part::Cookie,
                    expr: Expr::Ident(*value),
                });
            }
        }
        sites.extend(self.body.sites().into_iter().map(|expr| Site {
            part: Part::Body,
            expr,
        }));
        sites
    }

    /// Location tags of a site
    pub fn locations(&self, site: &Site) -> InjectionLocation {
        site.expr.locations(self.arena(site.part))
    }

    /// Original literal of a site
    pub fn original(&self, site: &Site) -> String {
        site.expr.original(self.arena(site.part))
    }

    /// Current literal of a site
    pub fn current(&self, site: &Site) -> String {
        site.expr.render(self.arena(site.part))
    }

    /// Replace the literal addressed by `site`
    pub fn inject(&mut self, site: &Site, value: &str, kind: InjectKind) -> bool {
        match site.part {
            Part::Method => self.method.inject(self.method_id, value),
            Part::Uri => self.uri.inject(&site.expr, value, kind),
            Part::Header => match site.expr.target(kind) {
                Some(id) => self.header_arena.inject(id, value),
                None => false,
            },
            Part::Cookie => match site.expr.target(kind) {
                Some(id) => self.cookie_arena.inject(id, value),
                None => false,
            },
            Part::Body => self.body.inject(&site.expr, value, kind),
        }
    }

    /// Undo every injection and replacement
    pub fn reset(&mut self) {
        self.method.reset();
        self.uri.reset();
        self.header_arena.reset();
        self.cookie_arena.reset();
        self.body.reset();
        for entry in &mut self.headers {
            entry.removed = false;
        }
        self.added_headers.clear();
        self.replaced_uri = None;
        self.replaced_body = None;
    }

    pub fn method(&self) -> String {
        self.method.value(self.method_id).to_string()
    }

    /// Current URL / request target
    pub fn url(&self) -> String {
        match &self.replaced_uri {
            Some(uri) => uri.clone(),
            None => self.uri.serialize(),
        }
    }

    /// Current headers, cookies folded back into a single `Cookie` header
    pub fn headers(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self
            .headers
            .iter()
            .filter(|h| !h.removed)
            .filter_map(|h| match &h.field {
                Expr::KeyValue { key, value, .. } => Some((
                    key.render(&self.header_arena),
                    self.header_arena.value(*value).to_string(),
                )),
                _ => None,
            })
            .collect();
        out.extend(self.added_headers.iter().cloned());

        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|c| c.render(&self.cookie_arena))
                .collect::<Vec<_>>()
                .join("; ");
            out.push(("Cookie".to_string(), cookie));
        }
        out
    }

    /// Current body, `None` when the request had none
    pub fn body(&self) -> Option<String> {
        if let Some(body) = &self.replaced_body {
            return Some(body.clone());
        }
        if self.body.raw().is_empty() {
            None
        } else {
            Some(self.body.serialize())
        }
    }

    pub fn replace_path(&mut self, path: &str) {
        let mut uri = self.uri.clone();
        uri.replace_path(path);
        self.replaced_uri = Some(uri.serialize());
    }

    pub fn replace_file(&mut self, file: &str) {
        let mut uri = self.uri.clone();
        if uri.replace_file(file) {
            self.replaced_uri = Some(uri.serialize());
        }
    }

    pub fn replace_uri(&mut self, uri: &str) {
        self.replaced_uri = Some(uri.to_string());
    }

    /// Replace (or add) a header by case-insensitive name
    pub fn replace_header(&mut self, name: &str, value: &str) {
        let mut found = false;
        for entry in &mut self.headers {
            if let Expr::KeyValue { key, value: v, .. } = &entry.field {
                if key.render(&self.header_arena).eq_ignore_ascii_case(name) {
                    self.header_arena.inject(*v, value);
                    entry.removed = false;
                    found = true;
                }
            }
        }
        if !found {
            self.remove_added(name);
            self.added_headers.push((name.to_string(), value.to_string()));
        }
    }

    pub fn add_header(&mut self, name: &str, value: &str) {
        self.added_headers.push((name.to_string(), value.to_string()));
    }

    pub fn remove_header(&mut self, name: &str) {
        for entry in &mut self.headers {
            if let Expr::KeyValue { key, .. } = &entry.field {
                if key.render(&self.header_arena).eq_ignore_ascii_case(name) {
                    entry.removed = true;
                }
            }
        }
        self.remove_added(name);
    }

    fn remove_added(&mut self, name: &str) {
        self.added_headers
            .retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    pub fn replace_body(&mut self, body: &str) {
        self.replaced_body = Some(body.to_string());
    }
}

fn parse_cookie_header(arena: &mut IdentArena, header: &str) -> Vec<Expr> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    for raw in header.split(';') {
        let lead = raw.len() - raw.trim_start().len();
        let pair = raw.trim();
        let start = pos + lead;
        pos += raw.len() + 1;
        if pair.is_empty() {
            continue;
        }
        let (name, value, sep) = match pair.find('=') {
            Some(eq) => (&pair[..eq], &pair[eq + 1..], Some(Separator::Assign)),
            None => (pair, "", None),
        };
        let key = arena.push(name, Span::new(start, start + name.len()), InjectionLocation::COOKIE_NAME);
        let value_start = start + pair.len() - value.len();
        let val = arena.push(
            value,
            Span::new(value_start, start + pair.len()),
            InjectionLocation::COOKIE_VALUE,
        );
        out.push(Expr::KeyValue {
            key: Box::new(Expr::Ident(key)),
            sep,
            value: val,
            span: Span::new(start, start + pair.len()),
        });
    }
    out
}
