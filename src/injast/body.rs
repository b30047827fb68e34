// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Request body injection trees
//!
//! The encoding is sniffed from the first non-whitespace byte: `{` or `[`
//! is JSON, `<` is XML, anything else is form-urlencoded. JSON and XML
//! bodies are re-emitted by splicing modified literals over their original
//! spans, so untouched bytes (whitespace, ordering, comments) survive.

use super::ast::{parse_fields, Expr, FieldLocations, IdentArena, IdentId, InjectKind, Span};
use super::location::InjectionLocation;
use super::uri::push_field_sites;

/// Detected body encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Empty,
    Form,
    Json,
    Xml,
}

/// How a literal is re-encoded when modified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    /// JSON string token (span covers the quotes)
    JsonString,
    /// JSON number / bool / null token
    JsonScalar,
    /// Raw bytes
    Raw,
}

#[derive(Debug, Clone)]
pub struct Body {
    raw: String,
    kind: BodyKind,
    arena: IdentArena,
    /// Form bodies: structured fields
    fields: Vec<Expr>,
    /// JSON / XML bodies: sites in document order and how to encode them
    template_sites: Vec<(Expr, Vec<(IdentId, Encoding)>)>,
    invalid: bool,
}

impl Body {
    /// Parse a body with sniffed encoding
    pub fn parse(input: &str) -> Self {
        let mut body = Self {
            raw: input.to_string(),
            kind: sniff(input),
            arena: IdentArena::new(),
            fields: Vec::new(),
            template_sites: Vec::new(),
            invalid: false,
        };

        let kind = body.kind;
        let ok = match kind {
            BodyKind::Empty => true,
            BodyKind::Form => {
                body.fields = parse_fields(&mut body.arena, input, 0, FieldLocations::BODY);
                true
            }
            BodyKind::Json => {
                let mut parser = JsonParser {
                    input: input.as_bytes(),
                    src: input,
                    pos: 0,
                    body: &mut body,
                };
                parser.parse_document()
            }
            BodyKind::Xml => parse_xml(&mut body, input),
        };

        if !ok {
            body.invalid = true;
            body.fields.clear();
            body.template_sites.clear();
        }
        body
    }

    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    pub fn arena(&self) -> &IdentArena {
        &self.arena
    }

    /// Injection sites in document order
    pub fn sites(&self) -> Vec<Expr> {
        if self.invalid {
            return Vec::new();
        }
        match self.kind {
            BodyKind::Empty => Vec::new(),
            BodyKind::Form => {
                let mut sites = Vec::new();
                push_field_sites(&mut sites, &self.fields, &self.arena);
                sites
            }
            BodyKind::Json | BodyKind::Xml => {
                self.template_sites.iter().map(|(e, _)| e.clone()).collect()
            }
        }
    }

    pub fn inject(&mut self, expr: &Expr, value: &str, kind: InjectKind) -> bool {
        if self.invalid {
            return false;
        }
        match expr.target(kind) {
            Some(id) => self.arena.inject(id, value),
            None => false,
        }
    }

    pub fn reset(&mut self) {
        self.arena.reset();
    }

    /// Render with current literals; an untouched tree renders its input
    pub fn serialize(&self) -> String {
        if self.invalid || !self.arena.is_dirty() {
            return self.raw.clone();
        }
        match self.kind {
            BodyKind::Empty => self.raw.clone(),
            BodyKind::Form => self
                .fields
                .iter()
                .map(|f| f.render(&self.arena))
                .collect::<Vec<_>>()
                .join("&"),
            BodyKind::Json | BodyKind::Xml => self.splice(),
        }
    }

    fn splice(&self) -> String {
        let mut edits: Vec<(Span, String)> = Vec::new();
        for (_, leaves) in &self.template_sites {
            for (id, enc) in leaves {
                if let Some(ident) = self.arena.get(*id) {
                    if ident.is_modified() {
                        edits.push((ident.span(), encode(ident.value(), *enc)));
                    }
                }
            }
        }
        edits.sort_by_key(|(span, _)| span.pos);
        edits.dedup_by_key(|(span, _)| span.pos);

        let mut out = String::with_capacity(self.raw.len() + 32);
        let mut cursor = 0usize;
        for (span, text) in edits {
            if span.pos < cursor {
                continue;
            }
            out.push_str(&self.raw[cursor..span.pos]);
            out.push_str(&text);
            cursor = span.end;
        }
        out.push_str(&self.raw[cursor..]);
        out
    }
}

fn sniff(input: &str) -> BodyKind {
    match input.trim_start().as_bytes().first() {
        None => BodyKind::Empty,
        Some(b'{') | Some(b'[') => BodyKind::Json,
        Some(b'<') => BodyKind::Xml,
        Some(_) => BodyKind::Form,
    }
}

fn encode(value: &str, enc: Encoding) -> String {
    match enc {
        // non-string scalars are emitted as strings once modified
        Encoding::JsonString | Encoding::JsonScalar => {
            serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
        }
        Encoding::Raw => value.to_string(),
    }
}

struct JsonParser<'a> {
    input: &'a [u8],
    src: &'a str,
    pos: usize,
    body: &'a mut Body,
}

impl<'a> JsonParser<'a> {
    fn parse_document(&mut self) -> bool {
        self.skip_ws();
        if !self.parse_value() {
            return false;
        }
        self.skip_ws();
        self.pos == self.input.len()
    }

    fn skip_ws(&mut self) {
        while self.pos < self.input.len() && self.input[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Parse any value; scalar values become JSONValue sites
    fn parse_value(&mut self) -> bool {
        match self.peek() {
            Some(b'{') => self.parse_object(),
            Some(b'[') => self.parse_array(),
            Some(b'"') => match self.parse_string() {
                Some((text, span)) => {
                    let id = self.body.arena.push(&text, span, InjectionLocation::JSON_VALUE);
                    self.body
                        .template_sites
                        .push((Expr::Ident(id), vec![(id, Encoding::JsonString)]));
                    true
                }
                None => false,
            },
            Some(_) => match self.parse_scalar() {
                Some(span) => {
                    let text = &self.src[span.pos..span.end];
                    let id = self.body.arena.push(text, span, InjectionLocation::JSON_VALUE);
                    self.body
                        .template_sites
                        .push((Expr::Ident(id), vec![(id, Encoding::JsonScalar)]));
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    fn parse_object(&mut self) -> bool {
        self.pos += 1;
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return true;
        }
        loop {
            self.skip_ws();
            let (key, span) = match self.parse_string() {
                Some(k) => k,
                None => return false,
            };
            let id = self.body.arena.push(&key, span, InjectionLocation::JSON_NAME);
            self.body
                .template_sites
                .push((Expr::Ident(id), vec![(id, Encoding::JsonString)]));
            self.skip_ws();
            if self.peek() != Some(b':') {
                return false;
            }
            self.pos += 1;
            self.skip_ws();
            if !self.parse_value() {
                return false;
            }
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return true;
                }
                _ => return false,
            }
        }
    }

    fn parse_array(&mut self) -> bool {
        self.pos += 1;
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return true;
        }
        loop {
            self.skip_ws();
            if !self.parse_value() {
                return false;
            }
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return true;
                }
                _ => return false,
            }
        }
    }

    /// Parse a string token; returns the decoded text and the span
    /// including quotes
    fn parse_string(&mut self) -> Option<(String, Span)> {
        if self.peek() != Some(b'"') {
            return None;
        }
        let start = self.pos;
        self.pos += 1;
        while self.pos < self.input.len() {
            match self.input[self.pos] {
                b'\\' => self.pos += 2,
                b'"' => {
                    self.pos += 1;
                    let token = &self.src[start..self.pos];
                    let text: String = serde_json::from_str(token).ok()?;
                    return Some((text, Span::new(start, self.pos)));
                }
                _ => self.pos += 1,
            }
        }
        None
    }

    fn parse_scalar(&mut self) -> Option<Span> {
        let start = self.pos;
        while self.pos < self.input.len() {
            let b = self.input[self.pos];
            if b == b',' || b == b'}' || b == b']' || b.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
        let token = &self.src[start..self.pos];
        let valid = matches!(token, "true" | "false" | "null")
            || (!token.is_empty() && token.parse::<f64>().is_ok());
        if valid {
            Some(Span::new(start, self.pos))
        } else {
            None
        }
    }
}

/// Scan an XML document for attribute and text sites
fn parse_xml(body: &mut Body, input: &str) -> bool {
    let bytes = input.as_bytes();
    let mut pos = 0usize;
    let mut depth: i64 = 0;

    while pos < bytes.len() {
        if bytes[pos] == b'<' {
            if input[pos..].starts_with("<!--") {
                match input[pos..].find("-->") {
                    Some(end) => pos += end + 3,
                    None => return false,
                }
                continue;
            }
            if input[pos..].starts_with("<![CDATA[") {
                let start = pos + 9;
                match input[start..].find("]]>") {
                    Some(end) => {
                        let span = Span::new(start, start + end);
                        push_raw(body, &input[span.pos..span.end], span, InjectionLocation::XML_VALUE);
                        pos = start + end + 3;
                    }
                    None => return false,
                }
                continue;
            }
            let close = match input[pos..].find('>') {
                Some(c) => pos + c,
                None => return false,
            };
            let tag = &input[pos + 1..close];
            if tag.starts_with('?') || tag.starts_with('!') {
                pos = close + 1;
                continue;
            }
            if tag.starts_with('/') {
                depth -= 1;
            } else {
                if !parse_attributes(body, input, pos + 1, close) {
                    return false;
                }
                if !tag.ends_with('/') {
                    depth += 1;
                }
            }
            if depth < 0 {
                return false;
            }
            pos = close + 1;
        } else {
            let next = input[pos..].find('<').map(|n| pos + n).unwrap_or(bytes.len());
            let text = &input[pos..next];
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                let lead = text.len() - text.trim_start().len();
                let start = pos + lead;
                push_raw(
                    body,
                    trimmed,
                    Span::new(start, start + trimmed.len()),
                    InjectionLocation::XML_VALUE,
                );
            }
            pos = next;
        }
    }

    depth == 0
}

fn push_raw(body: &mut Body, text: &str, span: Span, location: InjectionLocation) -> IdentId {
    let id = body.arena.push(text, span, location);
    body.template_sites
        .push((Expr::Ident(id), vec![(id, Encoding::Raw)]));
    id
}

/// Attributes of a start tag between `start` (after `<`) and `end` (`>`)
fn parse_attributes(body: &mut Body, input: &str, start: usize, end: usize) -> bool {
    let bytes = input.as_bytes();
    let mut pos = start;
    // skip the element name
    while pos < end && !bytes[pos].is_ascii_whitespace() && bytes[pos] != b'/' {
        pos += 1;
    }

    loop {
        while pos < end && (bytes[pos].is_ascii_whitespace() || bytes[pos] == b'/') {
            pos += 1;
        }
        if pos >= end {
            return true;
        }
        let name_start = pos;
        while pos < end && bytes[pos] != b'=' && !bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        let name_span = Span::new(name_start, pos);
        while pos < end && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= end || bytes[pos] != b'=' {
            // valueless attribute
            push_raw(body, &input[name_span.pos..name_span.end], name_span, InjectionLocation::XML_NAME);
            continue;
        }
        pos += 1;
        while pos < end && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        let quote = match bytes.get(pos) {
            Some(q @ (b'"' | b'\'')) => *q,
            _ => return false,
        };
        let value_start = pos + 1;
        let value_end = match input[value_start..end].find(quote as char) {
            Some(v) => value_start + v,
            None => return false,
        };

        let name = body
            .arena
            .push(&input[name_span.pos..name_span.end], name_span, InjectionLocation::XML_NAME);
        let value_span = Span::new(value_start, value_end);
        let value = body.arena.push(
            &input[value_start..value_end],
            value_span,
            InjectionLocation::XML_VALUE,
        );
        body.template_sites.push((
            Expr::KeyValue {
                key: Box::new(Expr::Ident(name)),
                sep: Some(super::ast::Separator::Assign),
                value,
                span: Span::new(name_span.pos, value_end + 1),
            },
            vec![(name, Encoding::Raw), (value, Encoding::Raw)],
        ));
        pos = value_end + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniffing() {
        assert_eq!(Body::parse("").kind(), BodyKind::Empty);
        assert_eq!(Body::parse("  {\"a\":1}").kind(), BodyKind::Json);
        assert_eq!(Body::parse("[1,2]").kind(), BodyKind::Json);
        assert_eq!(Body::parse("<a/>").kind(), BodyKind::Xml);
        assert_eq!(Body::parse("a=1").kind(), BodyKind::Form);
    }

    #[test]
    fn test_json_sites_and_splice() {
        let input = r#"{ "user": "bob", "age": 30, "tags": ["x", true] }"#;
        let mut body = Body::parse(input);
        assert!(!body.is_invalid());

        let sites = body.sites();
        let summary: Vec<(String, String)> = sites
            .iter()
            .map(|s| (s.locations(body.arena()).to_string(), s.original(body.arena())))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("JSONName".into(), "user".into()),
                ("JSONValue".into(), "bob".into()),
                ("JSONName".into(), "age".into()),
                ("JSONValue".into(), "30".into()),
                ("JSONName".into(), "tags".into()),
                ("JSONValue".into(), "x".into()),
                ("JSONValue".into(), "true".into()),
            ]
        );

        body.inject(&sites[1], "a\"b", InjectKind::Value);
        body.inject(&sites[3], "<x>", InjectKind::Value);
        assert_eq!(
            body.serialize(),
            r#"{ "user": "a\"b", "age": "<x>", "tags": ["x", true] }"#
        );
        let reparsed: serde_json::Value = serde_json::from_str(&body.serialize()).unwrap();
        assert_eq!(reparsed["user"], "a\"b");

        body.reset();
        assert_eq!(body.serialize(), input);
    }

    #[test]
    fn test_invalid_json() {
        let body = Body::parse("{\"a\": }");
        assert!(body.is_invalid());
        assert!(body.sites().is_empty());
        assert_eq!(body.serialize(), "{\"a\": }");
    }

    #[test]
    fn test_xml_sites() {
        let input = r#"<?xml version="1.0"?><user id="7"><name>bob</name></user>"#;
        let mut body = Body::parse(input);
        let sites = body.sites();
        assert_eq!(sites.len(), 2);
        assert_eq!(
            sites[0].locations(body.arena()),
            InjectionLocation::XML_NAME | InjectionLocation::XML_VALUE
        );

        body.inject(&sites[0], "8", InjectKind::Value);
        body.inject(&sites[1], "<script>", InjectKind::Value);
        assert_eq!(
            body.serialize(),
            r#"<?xml version="1.0"?><user id="8"><name><script></name></user>"#
        );
    }

    #[test]
    fn test_form_body() {
        let mut body = Body::parse("username=a&password=b");
        let sites = body.sites();
        assert_eq!(sites.len(), 4);
        body.inject(&sites[3], "x' OR 1=1", InjectKind::Value);
        assert_eq!(body.serialize(), "username=a&password=x' OR 1=1");
        body.reset();
        assert_eq!(body.serialize(), "username=a&password=b");
    }
}
