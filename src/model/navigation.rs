// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Navigation nodes and their results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::action::{Action, ActionType};
use super::events::{ConsoleEvent, Cookie, StorageEvent};
use super::http::HttpMessage;
use super::{Id, IdHasher};
use crate::scope::Scope;

/// Lifecycle of a navigation node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum NavigationState {
    Invalid = 0,
    Unvisited = 1,
    InProcess = 2,
    Visited = 3,
    Failed = 4,
    Audited = 5,
}

impl NavigationState {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => NavigationState::Unvisited,
            2 => NavigationState::InProcess,
            3 => NavigationState::Visited,
            4 => NavigationState::Failed,
            5 => NavigationState::Audited,
            _ => NavigationState::Invalid,
        }
    }

    pub fn all() -> [NavigationState; 6] {
        [
            NavigationState::Invalid,
            NavigationState::Unvisited,
            NavigationState::InProcess,
            NavigationState::Visited,
            NavigationState::Failed,
            NavigationState::Audited,
        ]
    }
}

impl std::fmt::Display for NavigationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// What created a navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggeredBy {
    Initial,
    Crawler,
    Plugin,
    Auto,
}

/// A single intended action and the metadata to replay it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Navigation {
    pub id: Id,
    /// Predecessor; the root id for the seed
    pub origin_id: Id,
    pub triggered_by: TriggeredBy,
    pub state: NavigationState,
    pub state_updated: DateTime<Utc>,
    pub action: Action,
    pub scope: Scope,
    /// Hops from the seed
    pub distance: usize,
}

impl Navigation {
    /// Create a navigation. `origin` is `None` for the seed
    pub fn new(origin: Option<&Navigation>, triggered_by: TriggeredBy, action: Action) -> Self {
        Self::with_document(origin, triggered_by, action, "")
    }

    /// Create a navigation whose form id may depend on the document URL
    pub fn with_document(
        origin: Option<&Navigation>,
        triggered_by: TriggeredBy,
        action: Action,
        document_url: &str,
    ) -> Self {
        let id = navigation_id(&action, document_url);
        Self {
            id,
            origin_id: origin.map(|o| o.id.clone()).unwrap_or_else(Id::root),
            triggered_by,
            state: NavigationState::Unvisited,
            state_updated: Utc::now(),
            action,
            scope: Scope::InScope,
            distance: origin.map(|o| o.distance + 1).unwrap_or(0),
        }
    }

    pub fn is_root(&self) -> bool {
        self.origin_id.is_root()
    }

    /// Human readable summary for logs and listings
    pub fn describe(&self) -> String {
        match self.action.kind {
            ActionType::LoadUrl | ActionType::ExecuteJs => {
                format!("{} {}", self.action.kind, self.action.input_str())
            }
            ActionType::FillForm => format!(
                "{} action={}",
                self.action.kind,
                self.action.form.as_ref().map(|f| f.action()).unwrap_or("")
            ),
            _ => match &self.action.element {
                Some(el) => {
                    let label = el
                        .href()
                        .map(str::to_string)
                        .or_else(|| el.get_attr("id").map(|i| format!("#{}", i)))
                        .unwrap_or_else(|| el.text.chars().take(32).collect());
                    format!("{} <{}> {}", self.action.kind, el.tag, label)
                }
                None => self.action.kind.to_string(),
            },
        }
    }
}

/// Stable navigation id for an action
///
/// Forms posting to themselves without listeners would coalesce across
/// pages, so their id includes the document URL.
pub fn navigation_id(action: &Action, document_url: &str) -> Id {
    let mut h = IdHasher::new()
        .bytes(&action.input)
        .u8(action.kind.as_u8());
    if let Some(form) = &action.form {
        if action.kind == ActionType::FillForm && form.action_is_self() && form.events.is_empty() {
            h = h.str(document_url);
        }
    }
    h.finish()
}

/// Everything captured while executing one navigation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationResult {
    pub id: Id,
    pub navigation_id: Id,
    pub start_url: String,
    pub end_url: String,
    pub dom: String,
    pub messages: Vec<HttpMessage>,
    pub cookies: Vec<Cookie>,
    pub console_events: Vec<ConsoleEvent>,
    pub storage_events: Vec<StorageEvent>,
    pub caused_load: bool,
    pub was_error: bool,
    pub errors: Vec<String>,
}

impl NavigationResult {
    pub fn new(navigation_id: Id, start_url: impl Into<String>) -> Self {
        Self {
            id: Id::root(),
            navigation_id,
            start_url: start_url.into(),
            end_url: String::new(),
            dom: String::new(),
            messages: Vec::new(),
            cookies: Vec::new(),
            console_events: Vec::new(),
            storage_events: Vec::new(),
            caused_load: false,
            was_error: false,
            errors: Vec::new(),
        }
    }

    /// Record an error without discarding earlier ones
    pub fn add_error(&mut self, err: impl ToString) {
        self.was_error = true;
        self.errors.push(err.to_string());
    }

    /// Compute the result id from its identity fields
    pub fn hash(&mut self) -> Id {
        let first_doc = self
            .messages
            .first()
            .map(|m| m.request.document_url.as_str())
            .unwrap_or("");
        self.id = IdHasher::new()
            .bytes(self.navigation_id.as_bytes())
            .str(&self.start_url)
            .str(&self.end_url)
            .str(first_doc)
            .finish();
        self.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::element::{HtmlElement, HtmlForm};

    #[test]
    fn test_navigation_ids_are_deterministic() {
        let a = Navigation::new(None, TriggeredBy::Initial, Action::load_url("http://host/"));
        let b = Navigation::new(None, TriggeredBy::Initial, Action::load_url("http://host/"));
        assert_eq!(a.id, b.id);
        assert_eq!(a.distance, 0);
        assert!(a.is_root());

        let link = HtmlElement::new("a").attr("href", "/b").with_text("b");
        let child = Navigation::new(
            Some(&a),
            TriggeredBy::Crawler,
            Action::with_element(ActionType::LeftClick, link.clone()),
        );
        let again = Navigation::new(
            Some(&a),
            TriggeredBy::Crawler,
            Action::with_element(ActionType::LeftClick, link),
        );
        assert_eq!(child.id, again.id);
        assert_eq!(child.distance, 1);
        assert_eq!(child.origin_id, a.id);
    }

    #[test]
    fn test_kind_is_part_of_id() {
        let el = HtmlElement::new("div").attr("id", "x");
        let click = navigation_id(&Action::with_element(ActionType::LeftClick, el.clone()), "");
        let hover = navigation_id(&Action::with_element(ActionType::MouseOverAndOut, el), "");
        assert_ne!(click, hover);
    }

    #[test]
    fn test_self_posting_form_depends_on_document() {
        let form = HtmlForm::new().attr("action", "#");
        let a = navigation_id(&Action::fill_form(form.clone()), "http://h/one");
        let b = navigation_id(&Action::fill_form(form), "http://h/two");
        assert_ne!(a, b);

        let mut with_listener = HtmlForm::new().attr("action", "");
        with_listener.events.push("submit".into());
        let c = navigation_id(&Action::fill_form(with_listener.clone()), "http://h/one");
        let d = navigation_id(&Action::fill_form(with_listener), "http://h/two");
        assert_eq!(c, d);

        let real = HtmlForm::new().attr("action", "/submit");
        let e = navigation_id(&Action::fill_form(real.clone()), "http://h/one");
        let f = navigation_id(&Action::fill_form(real), "http://h/two");
        assert_eq!(e, f);
    }

    #[test]
    fn test_result_errors_accumulate() {
        let mut result = NavigationResult::new(Id::from_bytes(vec![1]), "http://h/");
        result.add_error("first");
        result.add_error("second");
        assert!(result.was_error);
        assert_eq!(result.errors, vec!["first", "second"]);
        let id = result.hash();
        assert_eq!(id, result.id);
        assert!(!id.is_root());
    }
}
