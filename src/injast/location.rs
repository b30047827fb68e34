// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Injection location tags
//!
//! Every addressable node in a parsed request carries exactly one of the
//! single-bit tags below. Plugins declare the locations they want to attack
//! as a combination of tags (or one of the composite sets).

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Semantic role of an injection point
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct InjectionLocation: u32 {
        const METHOD          = 1 << 0;
        const PATH            = 1 << 1;
        const FILE            = 1 << 2;
        const QUERY           = 1 << 3;
        const QUERY_NAME      = 1 << 4;
        const QUERY_VALUE     = 1 << 5;
        const QUERY_INDEX     = 1 << 6;
        const FRAGMENT        = 1 << 7;
        const FRAGMENT_PATH   = 1 << 8;
        const FRAGMENT_NAME   = 1 << 9;
        const FRAGMENT_VALUE  = 1 << 10;
        const FRAGMENT_INDEX  = 1 << 11;
        const HEADER          = 1 << 12;
        const HEADER_NAME     = 1 << 13;
        const HEADER_VALUE    = 1 << 14;
        const COOKIE          = 1 << 15;
        const COOKIE_NAME     = 1 << 16;
        const COOKIE_VALUE    = 1 << 17;
        const BODY            = 1 << 18;
        const BODY_NAME       = 1 << 19;
        const BODY_VALUE      = 1 << 20;
        const BODY_INDEX      = 1 << 21;
        const JSON            = 1 << 22;
        const JSON_NAME       = 1 << 23;
        const JSON_VALUE      = 1 << 24;
        const XML             = 1 << 25;
        const XML_NAME        = 1 << 26;
        const XML_VALUE       = 1 << 27;

        /// Every location
        const INJECT_ALL = (1 << 28) - 1;

        /// Locations most plugins care about: path segments, query and
        /// body parameters (names and values), JSON and XML values
        const INJECT_COMMON = Self::PATH.bits()
            | Self::FILE.bits()
            | Self::QUERY_NAME.bits()
            | Self::QUERY_VALUE.bits()
            | Self::FRAGMENT_PATH.bits()
            | Self::FRAGMENT_NAME.bits()
            | Self::FRAGMENT_VALUE.bits()
            | Self::BODY_NAME.bits()
            | Self::BODY_VALUE.bits()
            | Self::JSON_NAME.bits()
            | Self::JSON_VALUE.bits()
            | Self::XML_NAME.bits()
            | Self::XML_VALUE.bits();

        /// Parameter names and values everywhere
        const INJECT_NAME_VALUE = Self::QUERY_NAME.bits()
            | Self::QUERY_VALUE.bits()
            | Self::FRAGMENT_NAME.bits()
            | Self::FRAGMENT_VALUE.bits()
            | Self::HEADER_NAME.bits()
            | Self::HEADER_VALUE.bits()
            | Self::COOKIE_NAME.bits()
            | Self::COOKIE_VALUE.bits()
            | Self::BODY_NAME.bits()
            | Self::BODY_VALUE.bits()
            | Self::JSON_NAME.bits()
            | Self::JSON_VALUE.bits()
            | Self::XML_NAME.bits()
            | Self::XML_VALUE.bits();

        /// Parameter values only
        const INJECT_VALUES = Self::QUERY_VALUE.bits()
            | Self::FRAGMENT_VALUE.bits()
            | Self::HEADER_VALUE.bits()
            | Self::COOKIE_VALUE.bits()
            | Self::BODY_VALUE.bits()
            | Self::JSON_VALUE.bits()
            | Self::XML_VALUE.bits();
    }
}

impl Default for InjectionLocation {
    fn default() -> Self {
        InjectionLocation::empty()
    }
}

impl InjectionLocation {
    /// Human readable name of a single-bit tag
    pub fn name(&self) -> &'static str {
        const NAMES: [(InjectionLocation, &str); 28] = [
            (InjectionLocation::METHOD, "Method"),
            (InjectionLocation::PATH, "Path"),
            (InjectionLocation::FILE, "File"),
            (InjectionLocation::QUERY, "Query"),
            (InjectionLocation::QUERY_NAME, "QueryName"),
            (InjectionLocation::QUERY_VALUE, "QueryValue"),
            (InjectionLocation::QUERY_INDEX, "QueryIndex"),
            (InjectionLocation::FRAGMENT, "Fragment"),
            (InjectionLocation::FRAGMENT_PATH, "FragmentPath"),
            (InjectionLocation::FRAGMENT_NAME, "FragmentName"),
            (InjectionLocation::FRAGMENT_VALUE, "FragmentValue"),
            (InjectionLocation::FRAGMENT_INDEX, "FragmentIndex"),
            (InjectionLocation::HEADER, "Header"),
            (InjectionLocation::HEADER_NAME, "HeaderName"),
            (InjectionLocation::HEADER_VALUE, "HeaderValue"),
            (InjectionLocation::COOKIE, "Cookie"),
            (InjectionLocation::COOKIE_NAME, "CookieName"),
            (InjectionLocation::COOKIE_VALUE, "CookieValue"),
            (InjectionLocation::BODY, "Body"),
            (InjectionLocation::BODY_NAME, "BodyName"),
            (InjectionLocation::BODY_VALUE, "BodyValue"),
            (InjectionLocation::BODY_INDEX, "BodyIndex"),
            (InjectionLocation::JSON, "JSON"),
            (InjectionLocation::JSON_NAME, "JSONName"),
            (InjectionLocation::JSON_VALUE, "JSONValue"),
            (InjectionLocation::XML, "XML"),
            (InjectionLocation::XML_NAME, "XMLName"),
            (InjectionLocation::XML_VALUE, "XMLValue"),
        ];

        NAMES
            .iter()
            .find(|(loc, _)| loc == self)
            .map(|(_, name)| *name)
            .unwrap_or("Composite")
    }

    /// True if any tag of `self` is wanted by `wanted`
    pub fn wanted_by(&self, wanted: InjectionLocation) -> bool {
        self.intersects(wanted)
    }
}

impl std::fmt::Display for InjectionLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.iter().map(|l| l.name()).collect();
        write!(f, "{}", names.join("|"))
    }
}
