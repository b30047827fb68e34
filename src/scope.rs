// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Scope service
//!
//! Decides whether a URL may be crawled or attacked. The decision is a pure
//! function of the construction inputs and the URL.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use url::Url;

/// Scope classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    InScope,
    OutOfScope,
    ExcludedFromScope,
}

impl Scope {
    pub fn as_u8(&self) -> u8 {
        match self {
            Scope::InScope => 0,
            Scope::OutOfScope => 1,
            Scope::ExcludedFromScope => 2,
        }
    }
}

/// Host and path based scope checks
#[derive(Debug, Clone)]
pub struct ScopeService {
    target: Url,
    allowed: HashSet<String>,
    ignored: HashSet<String>,
    excluded: HashSet<String>,
    excluded_uris: HashSet<String>,
}

impl ScopeService {
    /// Build the service. Excluded URIs may be paths or absolute URLs
    pub fn new(
        target: Url,
        allowed: &[String],
        ignored: &[String],
        excluded: &[String],
        excluded_uris: &[String],
    ) -> Self {
        let fold = |hosts: &[String]| {
            hosts
                .iter()
                .map(|h| h.trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect::<HashSet<_>>()
        };

        let excluded_uris = excluded_uris
            .iter()
            .map(|u| match Url::parse(u) {
                Ok(abs) if abs.has_host() => abs.path().to_string(),
                _ => u.clone(),
            })
            .collect();

        Self {
            target,
            allowed: fold(allowed),
            ignored: fold(ignored),
            excluded: fold(excluded),
            excluded_uris,
        }
    }

    /// Build from a finalized config
    pub fn from_config(config: &crate::config::Config) -> crate::error::Result<Self> {
        Ok(Self::new(
            config.target()?,
            &config.allowed_hosts,
            &config.ignored_hosts,
            &config.excluded_hosts,
            &config.excluded_uris,
        ))
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    /// Classify a URL
    pub fn check(&self, url: &Url) -> Scope {
        let host = url.host_str().unwrap_or("").to_ascii_lowercase();

        if self.excluded.contains(&host) {
            return Scope::ExcludedFromScope;
        }
        if self.ignored.contains(&host) {
            return Scope::OutOfScope;
        }
        if self.excluded_uris.contains(url.path()) {
            return Scope::ExcludedFromScope;
        }
        if self.allowed.contains(&host) {
            return Scope::InScope;
        }
        Scope::OutOfScope
    }

    /// Classify a URL string; unparseable input is out of scope
    pub fn check_str(&self, url: &str) -> Scope {
        match Url::parse(url) {
            Ok(u) => self.check(&u),
            Err(_) => Scope::OutOfScope,
        }
    }

    /// Resolve `candidate` against `base` (or the target) and classify it
    pub fn resolve_base_href(&self, base: &str, candidate: &str) -> (Option<Url>, Scope) {
        let base = if base.is_empty() {
            self.target.clone()
        } else {
            match Url::parse(base) {
                Ok(b) => b,
                Err(_) => self.target.clone(),
            }
        };

        match base.join(candidate) {
            Ok(resolved) => {
                let scope = self.check(&resolved);
                (Some(resolved), scope)
            }
            Err(_) => (None, Scope::OutOfScope),
        }
    }

    pub fn is_in_scope(&self, url: &Url) -> bool {
        self.check(url) == Scope::InScope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ScopeService {
        ScopeService::new(
            Url::parse("https://a.com/").unwrap(),
            &["a.com".to_string()],
            &["b.com".to_string()],
            &["c.com".to_string()],
            &["/logout".to_string()],
        )
    }

    #[test]
    fn test_precedence() {
        let scope = service();
        assert_eq!(scope.check_str("https://c.com/"), Scope::ExcludedFromScope);
        assert_eq!(scope.check_str("https://b.com/"), Scope::OutOfScope);
        assert_eq!(scope.check_str("https://a.com/logout"), Scope::ExcludedFromScope);
        assert_eq!(scope.check_str("https://a.com/home"), Scope::InScope);
        assert_eq!(scope.check_str("https://d.com/"), Scope::OutOfScope);
    }

    #[test]
    fn test_host_case_folding() {
        let scope = service();
        assert_eq!(scope.check_str("https://A.COM/home"), Scope::InScope);
        // paths are compared exactly
        assert_eq!(scope.check_str("https://a.com/Logout"), Scope::InScope);
    }

    #[test]
    fn test_absolute_excluded_uri() {
        let scope = ScopeService::new(
            Url::parse("http://a.com/").unwrap(),
            &["a.com".to_string()],
            &[],
            &[],
            &["http://a.com/admin/delete".to_string()],
        );
        assert_eq!(scope.check_str("http://a.com/admin/delete"), Scope::ExcludedFromScope);
        assert_eq!(scope.check_str("http://a.com/admin"), Scope::InScope);
    }

    #[test]
    fn test_resolve_base_href() {
        let scope = service();
        let (url, s) = scope.resolve_base_href("", "/home");
        assert_eq!(url.unwrap().as_str(), "https://a.com/home");
        assert_eq!(s, Scope::InScope);

        let (url, s) = scope.resolve_base_href("https://a.com/dir/", "page?x=1");
        assert_eq!(url.unwrap().as_str(), "https://a.com/dir/page?x=1");
        assert_eq!(s, Scope::InScope);

        let (_, s) = scope.resolve_base_href("https://a.com/", "https://d.com/x");
        assert_eq!(s, Scope::OutOfScope);
    }
}
