// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! DOM elements and forms as seen by the crawler

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Id, IdHasher};

/// Coarse element classification used for candidate discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementType {
    A,
    Button,
    Form,
    Input,
    Select,
    TextArea,
    Img,
    Text,
    Other,
}

impl ElementType {
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "a" => ElementType::A,
            "button" => ElementType::Button,
            "form" => ElementType::Form,
            "input" => ElementType::Input,
            "select" => ElementType::Select,
            "textarea" => ElementType::TextArea,
            "img" => ElementType::Img,
            "#text" => ElementType::Text,
            _ => ElementType::Other,
        }
    }

    /// CSS selector used to re-find elements of this type
    pub fn selector(&self) -> &'static str {
        match self {
            ElementType::A => "a",
            ElementType::Button => "button",
            ElementType::Form => "form",
            ElementType::Input => "input",
            ElementType::Select => "select",
            ElementType::TextArea => "textarea",
            ElementType::Img => "img",
            ElementType::Text => "#text",
            ElementType::Other => "*",
        }
    }
}

/// A DOM element snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlElement {
    /// Lowercase tag name
    pub tag: String,
    /// Attributes (sorted by name)
    pub attributes: BTreeMap<String, String>,
    /// Direct text content
    pub text: String,
    /// Heuristic visibility
    pub hidden: bool,
    /// Attached event listener types
    #[serde(default)]
    pub events: Vec<String>,
    /// Node id in the tab that produced this snapshot; not part of identity
    #[serde(default, skip_serializing)]
    pub node_id: i64,
    /// Backend node id; not part of identity
    #[serde(default, skip_serializing)]
    pub backend_node_id: i64,
}

impl HtmlElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            text: String::new(),
            hidden: false,
            events: Vec::new(),
            node_id: 0,
            backend_node_id: 0,
        }
    }

    /// Set an attribute
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set the text content
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn element_type(&self) -> ElementType {
        ElementType::from_tag(&self.tag)
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Stable hash over tag, sorted attributes and text
    pub fn hash(&self) -> Id {
        let mut h = IdHasher::new().str(&self.tag);
        for (name, value) in &self.attributes {
            h = h.str(name).str(value);
        }
        h.str(self.text.trim()).finish()
    }

    /// Link target for anchors
    pub fn href(&self) -> Option<&str> {
        self.get_attr("href")
    }

    /// True for `href="#..."` anchors
    pub fn is_fragment_link(&self) -> bool {
        self.href().map(|h| h.starts_with('#')).unwrap_or(false)
    }

    /// Apply the attribute/style visibility heuristic
    pub fn compute_hidden(&self) -> bool {
        if self.attributes.contains_key("hidden") {
            return true;
        }
        if self
            .get_attr("type")
            .map(|t| t.eq_ignore_ascii_case("hidden"))
            .unwrap_or(false)
        {
            return true;
        }
        if self.get_attr("aria-hidden") == Some("true") {
            return true;
        }
        if let Some(style) = self.get_attr("style") {
            let style: String = style
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();
            if style.contains("display:none") || style.contains("visibility:hidden") {
                return true;
            }
        }
        false
    }
}

/// A form with its fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlForm {
    /// Form attributes (action, method, id, ...)
    pub attributes: BTreeMap<String, String>,
    /// input / select / textarea descendants
    pub fields: Vec<HtmlElement>,
    /// Submit button, if any
    pub submit: Option<HtmlElement>,
    /// Attached event listener types on the form element
    #[serde(default)]
    pub events: Vec<String>,
    pub hidden: bool,
    #[serde(default, skip_serializing)]
    pub node_id: i64,
}

impl HtmlForm {
    pub fn new() -> Self {
        Self {
            attributes: BTreeMap::new(),
            fields: Vec::new(),
            submit: None,
            events: Vec::new(),
            hidden: false,
            node_id: 0,
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn field(mut self, field: HtmlElement) -> Self {
        self.fields.push(field);
        self
    }

    pub fn action(&self) -> &str {
        self.attributes.get("action").map(String::as_str).unwrap_or("")
    }

    pub fn method(&self) -> String {
        self.attributes
            .get("method")
            .map(|m| m.to_ascii_uppercase())
            .unwrap_or_else(|| "GET".to_string())
    }

    /// Action is empty or `#` (form posts to the current document)
    pub fn action_is_self(&self) -> bool {
        let action = self.action().trim();
        action.is_empty() || action == "#"
    }

    /// Stable hash over form attributes and field shapes (not values)
    pub fn hash(&self) -> Id {
        let mut h = IdHasher::new().str("form");
        for (name, value) in &self.attributes {
            h = h.str(name).str(value);
        }
        for field in &self.fields {
            h = h.str(&field.tag);
            for (name, value) in &field.attributes {
                if name == "value" {
                    continue;
                }
                h = h.str(name).str(value);
            }
        }
        h.finish()
    }
}

impl Default for HtmlForm {
    fn default() -> Self {
        Self::new()
    }
}
