// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Injection AST
//!
//! Parses URIs and request bodies into trees of addressable injection
//! sites, lets active plugins replace one literal at a time and
//! re-serializes the request. With no mutation applied, serialization is
//! byte-identical to the input.
//!
//! ```rust
//! use browserk::injast::{InjectionRequest, InjectKind};
//!
//! let mut req = InjectionRequest::new("GET", "/search?q=shoes", &[], None);
//! let sites = req.sites();
//! req.inject(&sites[3], "<svg>", InjectKind::Value);
//! assert_eq!(req.url(), "/search?q=<svg>");
//! req.reset();
//! assert_eq!(req.url(), "/search?q=shoes");
//! ```

pub mod ast;
pub mod body;
pub mod location;
pub mod request;
pub mod uri;

pub use ast::{Expr, Ident, IdentArena, IdentId, InjectKind, Separator, Span};
pub use body::{Body, BodyKind};
pub use location::InjectionLocation;
pub use request::{InjectionRequest, Part, Site};
pub use uri::Uri;
