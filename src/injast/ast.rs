// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Injection expression tree
//!
//! A parsed URI or body owns an arena of [`Ident`] leaves. Structural nodes
//! ([`Expr`]) refer to leaves by index, so a site handed to a plugin stays
//! valid across mutations and `reset` never has to rebuild the tree.

use serde::{Deserialize, Serialize};

use super::location::InjectionLocation;

/// Byte range in the original input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    /// Start offset (inclusive)
    pub pos: usize,
    /// End offset (exclusive)
    pub end: usize,
}

impl Span {
    pub fn new(pos: usize, end: usize) -> Self {
        Self { pos, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == self.end
    }
}

/// Index of an [`Ident`] inside its owning arena
pub type IdentId = usize;

/// A literal leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    orig: String,
    modified: Option<String>,
    span: Span,
    location: InjectionLocation,
}

impl Ident {
    pub fn new(orig: impl Into<String>, span: Span, location: InjectionLocation) -> Self {
        Self {
            orig: orig.into(),
            modified: None,
            span,
            location,
        }
    }

    /// Current literal (modified if injected)
    pub fn value(&self) -> &str {
        self.modified.as_deref().unwrap_or(&self.orig)
    }

    /// Literal as originally parsed
    pub fn original(&self) -> &str {
        &self.orig
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn location(&self) -> InjectionLocation {
        self.location
    }

    pub fn is_modified(&self) -> bool {
        self.modified.is_some()
    }

    pub fn inject(&mut self, value: impl Into<String>) {
        self.modified = Some(value.into());
    }

    pub fn reset(&mut self) {
        self.modified = None;
    }
}

/// Arena of leaves with a dirty marker
#[derive(Debug, Clone, Default)]
pub struct IdentArena {
    idents: Vec<Ident>,
    dirty: bool,
}

impl IdentArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a leaf and return its id
    pub fn push(&mut self, orig: &str, span: Span, location: InjectionLocation) -> IdentId {
        self.idents.push(Ident::new(orig, span, location));
        self.idents.len() - 1
    }

    pub fn get(&self, id: IdentId) -> Option<&Ident> {
        self.idents.get(id)
    }

    /// Current literal of a leaf, empty when the id is unknown
    pub fn value(&self, id: IdentId) -> &str {
        self.idents.get(id).map(|i| i.value()).unwrap_or("")
    }

    pub fn is_modified(&self, id: IdentId) -> bool {
        self.idents.get(id).map(|i| i.is_modified()).unwrap_or(false)
    }

    pub fn location(&self, id: IdentId) -> InjectionLocation {
        self.idents
            .get(id)
            .map(|i| i.location())
            .unwrap_or_else(InjectionLocation::empty)
    }

    /// Replace the literal of a leaf
    pub fn inject(&mut self, id: IdentId, value: &str) -> bool {
        match self.idents.get_mut(id) {
            Some(ident) => {
                ident.inject(value);
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Restore every leaf to its original literal
    pub fn reset(&mut self) {
        for ident in &mut self.idents {
            ident.reset();
        }
        self.dirty = false;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ident> {
        self.idents.iter()
    }

    pub fn len(&self) -> usize {
        self.idents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idents.is_empty()
    }
}

/// Which literal of a composite node an injection replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InjectKind {
    Value,
    Name,
    Index,
}

/// Separator of a key/value pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// `key=value`
    Assign,
    /// `key:value`
    Colon,
}

impl Separator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Separator::Assign => "=",
            Separator::Colon => ":",
        }
    }
}

/// Structural node of the injection tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A single literal
    Ident(IdentId),
    /// `name[index]`
    Index {
        name: IdentId,
        index: IdentId,
        span: Span,
    },
    /// `key <sep> value`; `sep` is `None` when the input had no separator
    KeyValue {
        key: Box<Expr>,
        sep: Option<Separator>,
        value: IdentId,
        span: Span,
    },
    /// A list of fields
    Object {
        fields: Vec<Expr>,
        span: Span,
        location: InjectionLocation,
    },
}

impl Expr {
    /// Union of the locations of the leaves this node addresses directly
    pub fn locations(&self, arena: &IdentArena) -> InjectionLocation {
        match self {
            Expr::Ident(id) => arena.location(*id),
            Expr::Index { name, index, .. } => arena.location(*name) | arena.location(*index),
            Expr::KeyValue { key, value, .. } => key.locations(arena) | arena.location(*value),
            Expr::Object { location, .. } => *location,
        }
    }

    /// Byte range of the node in the original input
    pub fn span(&self, arena: &IdentArena) -> Span {
        match self {
            Expr::Ident(id) => arena.get(*id).map(|i| i.span()).unwrap_or_default(),
            Expr::Index { span, .. } | Expr::KeyValue { span, .. } | Expr::Object { span, .. } => {
                *span
            }
        }
    }

    /// Render the node with current literals
    pub fn render(&self, arena: &IdentArena) -> String {
        match self {
            Expr::Ident(id) => arena.value(*id).to_string(),
            Expr::Index { name, index, .. } => {
                format!("{}[{}]", arena.value(*name), arena.value(*index))
            }
            Expr::KeyValue { key, sep, value, .. } => {
                let mut out = key.render(arena);
                match sep {
                    Some(sep) => out.push_str(sep.as_str()),
                    None if arena.is_modified(*value) => out.push('='),
                    None => {}
                }
                out.push_str(arena.value(*value));
                out
            }
            Expr::Object { fields, .. } => fields
                .iter()
                .map(|f| f.render(arena))
                .collect::<Vec<_>>()
                .join("&"),
        }
    }

    /// Leaf addressed by an injection of the given kind
    pub fn target(&self, kind: InjectKind) -> Option<IdentId> {
        match (self, kind) {
            (Expr::Ident(id), _) => Some(*id),
            (Expr::Index { index, .. }, InjectKind::Index) => Some(*index),
            (Expr::Index { name, .. }, _) => Some(*name),
            (Expr::KeyValue { value, .. }, InjectKind::Value) => Some(*value),
            (Expr::KeyValue { key, .. }, k) => key.target(k),
            (Expr::Object { .. }, _) => None,
        }
    }

    /// Original literal text addressed by this node
    pub fn original(&self, arena: &IdentArena) -> String {
        match self {
            Expr::Ident(id) => arena
                .get(*id)
                .map(|i| i.original().to_string())
                .unwrap_or_default(),
            Expr::Index { name, index, .. } => {
                let name = arena.get(*name).map(|i| i.original()).unwrap_or("");
                let index = arena.get(*index).map(|i| i.original()).unwrap_or("");
                format!("{}[{}]", name, index)
            }
            other => other.render(arena),
        }
    }
}

/// Parse a `name[index]` key; plain keys become a single ident
pub(crate) fn parse_key(
    arena: &mut IdentArena,
    input: &str,
    offset: usize,
    name_loc: InjectionLocation,
    index_loc: InjectionLocation,
) -> Expr {
    if input.ends_with(']') {
        if let Some(open) = input.find('[') {
            if open > 0 && open + 1 < input.len() {
                let name = arena.push(&input[..open], Span::new(offset, offset + open), name_loc);
                let inner = &input[open + 1..input.len() - 1];
                let index = arena.push(
                    inner,
                    Span::new(offset + open + 1, offset + input.len() - 1),
                    index_loc,
                );
                return Expr::Index {
                    name,
                    index,
                    span: Span::new(offset, offset + input.len()),
                };
            }
        }
    }
    Expr::Ident(arena.push(input, Span::new(offset, offset + input.len()), name_loc))
}

/// Parse `k=v&k2=v2` style fields; empty fields are kept for round trips
pub(crate) fn parse_fields(
    arena: &mut IdentArena,
    input: &str,
    offset: usize,
    locs: FieldLocations,
) -> Vec<Expr> {
    let mut fields = Vec::new();
    let mut pos = 0usize;

    for raw in input.split('&') {
        let start = offset + pos;
        let field = match raw.find('=') {
            Some(eq) => {
                let key = parse_key(arena, &raw[..eq], start, locs.name, locs.index);
                let value = arena.push(
                    &raw[eq + 1..],
                    Span::new(start + eq + 1, start + raw.len()),
                    locs.value,
                );
                Expr::KeyValue {
                    key: Box::new(key),
                    sep: Some(Separator::Assign),
                    value,
                    span: Span::new(start, start + raw.len()),
                }
            }
            None => {
                let key = parse_key(arena, raw, start, locs.name, locs.index);
                let end = start + raw.len();
                let value = arena.push("", Span::new(end, end), locs.value);
                Expr::KeyValue {
                    key: Box::new(key),
                    sep: None,
                    value,
                    span: Span::new(start, end),
                }
            }
        };
        fields.push(field);
        pos += raw.len() + 1;
    }

    fields
}

/// Location tags used by one family of fields
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldLocations {
    pub name: InjectionLocation,
    pub value: InjectionLocation,
    pub index: InjectionLocation,
}

impl FieldLocations {
    pub const QUERY: FieldLocations = FieldLocations {
        name: InjectionLocation::QUERY_NAME,
        value: InjectionLocation::QUERY_VALUE,
        index: InjectionLocation::QUERY_INDEX,
    };

    pub const FRAGMENT: FieldLocations = FieldLocations {
        name: InjectionLocation::FRAGMENT_NAME,
        value: InjectionLocation::FRAGMENT_VALUE,
        index: InjectionLocation::FRAGMENT_INDEX,
    };

    pub const BODY: FieldLocations = FieldLocations {
        name: InjectionLocation::BODY_NAME,
        value: InjectionLocation::BODY_VALUE,
        index: InjectionLocation::BODY_INDEX,
    };
}

/// True if a field carries nothing (`&&` or a trailing `&`)
pub(crate) fn is_empty_field(field: &Expr, arena: &IdentArena) -> bool {
    match field {
        Expr::KeyValue { key, sep, value, .. } => {
            sep.is_none() && key.original(arena).is_empty() && arena.value(*value).is_empty()
        }
        _ => false,
    }
}
