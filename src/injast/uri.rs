// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! URI injection tree
//!
//! ```text
//! URI      := "/" (Path "/")* (File)? ("?" Query)? ("#" Fragment)?
//! Query    := QueryParam ("&" QueryParam)*
//! QueryParam:= Key ("=" Value)?
//! Key      := Ident | Ident "[" Ident "]"
//! Fragment := ("/" FragPath)* ("?" FragQuery)? | FragQuery
//! ```
//!
//! Absolute URLs keep their `scheme://authority` prefix verbatim; only the
//! request target is parsed into injection sites.

use super::ast::{
    is_empty_field, parse_fields, Expr, FieldLocations, IdentArena, IdentId, InjectKind, Span,
};
use super::location::InjectionLocation;

/// Parsed fragment
#[derive(Debug, Clone)]
struct Fragment {
    /// Fragment started with `/`
    path_form: bool,
    /// FragmentPath segments (only when `path_form`)
    segments: Vec<IdentId>,
    /// Query part, present if a `?` existed (path form) or always (plain form)
    query: Option<Vec<Expr>>,
}

/// A parsed request target
#[derive(Debug, Clone)]
pub struct Uri {
    raw: String,
    arena: IdentArena,
    prefix: String,
    leading_slash: bool,
    dirs: Vec<IdentId>,
    file: Option<IdentId>,
    query: Option<Vec<Expr>>,
    fragment: Option<Fragment>,
    invalid: bool,
}

impl Uri {
    /// Parse a URI; malformed input produces an invalid tree with no sites
    pub fn parse(input: &str) -> Self {
        let mut uri = Self {
            raw: input.to_string(),
            arena: IdentArena::new(),
            prefix: String::new(),
            leading_slash: false,
            dirs: Vec::new(),
            file: None,
            query: None,
            fragment: None,
            invalid: false,
        };

        if input.bytes().any(|b| b.is_ascii_control() || b == b' ') {
            uri.invalid = true;
            return uri;
        }

        let mut offset = 0usize;
        if let Some(scheme_end) = input.find("://") {
            let scheme = &input[..scheme_end];
            if scheme.is_empty()
                || !scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
            {
                uri.invalid = true;
                return uri;
            }
            let after = scheme_end + 3;
            let authority_end = input[after..]
                .find(|c| c == '/' || c == '?' || c == '#')
                .map(|i| after + i)
                .unwrap_or(input.len());
            if authority_end == after {
                uri.invalid = true;
                return uri;
            }
            uri.prefix = input[..authority_end].to_string();
            offset = authority_end;
        }

        let rest = &input[offset..];
        let (before_frag, frag) = match rest.find('#') {
            Some(i) => (&rest[..i], Some((&rest[i + 1..], offset + i + 1))),
            None => (rest, None),
        };
        let (path, query) = match before_frag.find('?') {
            Some(i) => (
                &before_frag[..i],
                Some((&before_frag[i + 1..], offset + i + 1)),
            ),
            None => (before_frag, None),
        };

        uri.parse_path(path, offset);
        if let Some((q, q_off)) = query {
            uri.query = Some(parse_fields(&mut uri.arena, q, q_off, FieldLocations::QUERY));
        }
        if let Some((f, f_off)) = frag {
            uri.fragment = Some(uri.parse_fragment(f, f_off));
        }

        uri
    }

    fn parse_path(&mut self, path: &str, offset: usize) {
        let mut body = path;
        let mut base = offset;
        if let Some(stripped) = path.strip_prefix('/') {
            self.leading_slash = true;
            body = stripped;
            base += 1;
        }
        if body.is_empty() {
            return;
        }

        let segments: Vec<&str> = body.split('/').collect();
        let last = segments.len() - 1;
        let mut pos = base;
        for (i, seg) in segments.iter().enumerate() {
            let span = Span::new(pos, pos + seg.len());
            if i == last {
                // trailing slash leaves an empty final segment: no file
                if !seg.is_empty() {
                    self.file = Some(self.arena.push(seg, span, InjectionLocation::FILE));
                }
            } else {
                self.dirs.push(self.arena.push(seg, span, InjectionLocation::PATH));
            }
            pos += seg.len() + 1;
        }
    }

    fn parse_fragment(&mut self, frag: &str, offset: usize) -> Fragment {
        if let Some(body) = frag.strip_prefix('/') {
            let (path, query) = match body.find('?') {
                Some(i) => (&body[..i], Some((&body[i + 1..], offset + 1 + i + 1))),
                None => (body, None),
            };
            let mut segments = Vec::new();
            let mut pos = offset + 1;
            for seg in path.split('/') {
                segments.push(self.arena.push(
                    seg,
                    Span::new(pos, pos + seg.len()),
                    InjectionLocation::FRAGMENT_PATH,
                ));
                pos += seg.len() + 1;
            }
            Fragment {
                path_form: true,
                segments,
                query: query.map(|(q, q_off)| {
                    parse_fields(&mut self.arena, q, q_off, FieldLocations::FRAGMENT)
                }),
            }
        } else {
            Fragment {
                path_form: false,
                segments: Vec::new(),
                query: Some(parse_fields(
                    &mut self.arena,
                    frag,
                    offset,
                    FieldLocations::FRAGMENT,
                )),
            }
        }
    }

    /// Original input
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    pub fn arena(&self) -> &IdentArena {
        &self.arena
    }

    /// Directory segments (current literals)
    pub fn dirs(&self) -> Vec<&str> {
        self.dirs.iter().map(|id| self.arena.value(*id)).collect()
    }

    /// File segment (current literal)
    pub fn file(&self) -> Option<&str> {
        self.file.map(|id| self.arena.value(id))
    }

    /// Query fields
    pub fn query_fields(&self) -> &[Expr] {
        self.query.as_deref().unwrap_or(&[])
    }

    /// Fragment path segments (current literals)
    pub fn fragment_path(&self) -> Vec<&str> {
        self.fragment
            .as_ref()
            .map(|f| f.segments.iter().map(|id| self.arena.value(*id)).collect())
            .unwrap_or_default()
    }

    /// Render with current literals; an untouched tree renders its input
    pub fn serialize(&self) -> String {
        if self.invalid || !self.arena.is_dirty() {
            return self.raw.clone();
        }
        self.render()
    }

    fn render(&self) -> String {
        let mut out = self.prefix.clone();
        if self.leading_slash {
            out.push('/');
        }
        for dir in &self.dirs {
            out.push_str(self.arena.value(*dir));
            out.push('/');
        }
        if let Some(file) = self.file {
            out.push_str(self.arena.value(file));
        }
        if let Some(query) = &self.query {
            out.push('?');
            out.push_str(&render_fields(query, &self.arena));
        }
        if let Some(frag) = &self.fragment {
            out.push('#');
            if frag.path_form {
                out.push('/');
                let segs: Vec<&str> = frag.segments.iter().map(|id| self.arena.value(*id)).collect();
                out.push_str(&segs.join("/"));
                if let Some(query) = &frag.query {
                    out.push('?');
                    out.push_str(&render_fields(query, &self.arena));
                }
            } else if let Some(query) = &frag.query {
                out.push_str(&render_fields(query, &self.arena));
            }
        }
        out
    }

    /// Replace the literal addressed by `expr`
    pub fn inject(&mut self, expr: &Expr, value: &str, kind: InjectKind) -> bool {
        if self.invalid {
            return false;
        }
        match expr.target(kind) {
            Some(id) => self.arena.inject(id, value),
            None => false,
        }
    }

    /// Restore the original literals
    pub fn reset(&mut self) {
        self.arena.reset();
    }

    /// Injection sites in document order
    pub fn sites(&self) -> Vec<Expr> {
        let mut sites = Vec::new();
        if self.invalid {
            return sites;
        }

        for dir in &self.dirs {
            if !self.arena.value(*dir).is_empty() {
                sites.push(Expr::Ident(*dir));
            }
        }
        if let Some(file) = self.file {
            sites.push(Expr::Ident(file));
        }
        if let Some(query) = &self.query {
            push_field_sites(&mut sites, query, &self.arena);
        }
        if let Some(frag) = &self.fragment {
            for seg in &frag.segments {
                if !self.arena.get(*seg).map(|i| i.original().is_empty()).unwrap_or(true) {
                    sites.push(Expr::Ident(*seg));
                }
            }
            if let Some(query) = &frag.query {
                push_field_sites(&mut sites, query, &self.arena);
            }
        }
        sites
    }

    /// Replace every directory segment and the file at once
    pub fn replace_path(&mut self, new_path: &str) {
        let path_only = new_path.split(['?', '#']).next().unwrap_or("");
        let parsed = Uri::parse(path_only);
        let new_dirs = parsed.dirs();
        for (i, dir) in self.dirs.iter().enumerate() {
            let value = new_dirs.get(i).copied().unwrap_or("");
            self.arena.inject(*dir, value);
        }
        if let Some(file) = self.file {
            self.arena.inject(file, parsed.file().unwrap_or(""));
        }
    }

    /// Replace only the file segment
    pub fn replace_file(&mut self, new_file: &str) -> bool {
        match self.file {
            Some(file) => self.arena.inject(file, new_file),
            None => false,
        }
    }
}

fn render_fields(fields: &[Expr], arena: &IdentArena) -> String {
    fields
        .iter()
        .map(|f| f.render(arena))
        .collect::<Vec<_>>()
        .join("&")
}

/// Push the key and value sites of each non-empty field
pub(crate) fn push_field_sites(sites: &mut Vec<Expr>, fields: &[Expr], arena: &IdentArena) {
    for field in fields {
        if is_empty_field(field, arena) {
            continue;
        }
        if let Expr::KeyValue { key, value, .. } = field {
            sites.push((**key).clone());
            sites.push(Expr::Ident(*value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site_summary(uri: &Uri) -> Vec<(String, String)> {
        uri.sites()
            .iter()
            .map(|s| (s.locations(uri.arena()).to_string(), s.original(uri.arena())))
            .collect()
    }

    #[test]
    fn test_indexed_query_with_fragment_path() {
        let input = "/x?a[10]=1&a[11]=2#/load";
        let uri = Uri::parse(input);

        assert!(!uri.is_invalid());
        assert_eq!(uri.file(), Some("x"));
        assert_eq!(uri.fragment_path(), vec!["load"]);
        assert_eq!(uri.serialize(), input);
        assert_eq!(uri.render(), input);

        assert_eq!(
            site_summary(&uri),
            vec![
                ("File".to_string(), "x".to_string()),
                ("QueryName|QueryIndex".to_string(), "a[10]".to_string()),
                ("QueryValue".to_string(), "1".to_string()),
                ("QueryName|QueryIndex".to_string(), "a[11]".to_string()),
                ("QueryValue".to_string(), "2".to_string()),
                ("FragmentPath".to_string(), "load".to_string()),
            ]
        );
    }

    #[test]
    fn test_render_matches_input_without_mutation() {
        for input in [
            "/",
            "/a/b/",
            "/a/b/c.php",
            "/search?q=1&&x",
            "/p?flag",
            "/p?a=&b=2#frag",
            "/p#a=1&b=2",
            "/p#/route/sub?x=1",
            "https://host:8443/x/y?z=1",
            "relative/path",
            "/p?",
            "/p#",
        ] {
            let uri = Uri::parse(input);
            assert_eq!(uri.render(), input, "render mismatch for {input}");
            let again = Uri::parse(&uri.serialize());
            assert_eq!(again.render(), input);
        }
    }

    #[test]
    fn test_inject_and_reset() {
        let input = "/dir/page?id=5&flag#/load";
        let mut uri = Uri::parse(input);
        let sites = uri.sites();

        // id value
        assert!(uri.inject(&sites[3], "'", InjectKind::Value));
        assert_eq!(uri.serialize(), "/dir/page?id='&flag#/load");

        // value for a param that had no '='
        assert!(uri.inject(&sites[5], "1", InjectKind::Value));
        assert_eq!(uri.serialize(), "/dir/page?id='&flag=1#/load");

        uri.reset();
        assert_eq!(uri.serialize(), input);
    }

    #[test]
    fn test_inject_index() {
        let mut uri = Uri::parse("/x?a[10]=1");
        let sites = uri.sites();
        uri.inject(&sites[1], "99", InjectKind::Index);
        assert_eq!(uri.serialize(), "/x?a[99]=1");
        uri.reset();
        uri.inject(&sites[1], "b", InjectKind::Name);
        assert_eq!(uri.serialize(), "/x?b[10]=1");
    }

    #[test]
    fn test_invalid_uri_has_no_sites() {
        let uri = Uri::parse("/bad path\n");
        assert!(uri.is_invalid());
        assert!(uri.sites().is_empty());
        assert_eq!(uri.serialize(), "/bad path\n");
    }

    #[test]
    fn test_replace_path_and_file() {
        let mut uri = Uri::parse("/a/b/c.php?x=1");
        uri.replace_file("d.php");
        assert_eq!(uri.serialize(), "/a/b/d.php?x=1");
        uri.reset();
        uri.replace_path("/z/y/w.html");
        assert_eq!(uri.serialize(), "/z/y/w.html?x=1");
    }

    #[test]
    fn test_plain_fragment_is_query() {
        let uri = Uri::parse("/p#section");
        let locs: Vec<String> = uri
            .sites()
            .iter()
            .map(|s| s.locations(uri.arena()).to_string())
            .collect();
        assert_eq!(locs, vec!["File", "FragmentName", "FragmentValue"]);
    }
}
