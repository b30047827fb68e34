// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Element sets used to suppress already-known candidates

use std::collections::HashSet;

use tracing::debug;

use crate::browser::Browser;
use crate::context::Context;
use crate::model::{Cookie, ElementType, HtmlElement, HtmlForm, Id};

/// Selector for elements that may carry visible text
pub const TEXT_SELECTOR: &str = "p, span, div, li, td, th, label, h1, h2, h3, h4, h5, h6";

/// Set of `(element type, element hash)` pairs
#[derive(Debug, Clone, Default)]
pub struct ElementDiff {
    seen: HashSet<(ElementType, Id)>,
}

impl ElementDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an element; true if it was not present
    pub fn add_element(&mut self, el: &HtmlElement) -> bool {
        self.seen.insert((el.element_type(), el.hash()))
    }

    pub fn add_form(&mut self, form: &HtmlForm) -> bool {
        self.seen.insert((ElementType::Form, form.hash()))
    }

    pub fn contains_element(&self, el: &HtmlElement) -> bool {
        self.seen.contains(&(el.element_type(), el.hash()))
    }

    pub fn contains_form(&self, form: &HtmlForm) -> bool {
        self.seen.contains(&(ElementType::Form, form.hash()))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Capture everything a candidate could be built from on the current
    /// page. Hidden elements are left out, hidden forms are kept
    pub async fn snapshot(ctx: &Context, browser: &dyn Browser) -> Self {
        let mut diff = Self::new();
        match browser.find_forms(ctx).await {
            Ok(forms) => {
                for form in &forms {
                    diff.add_form(form);
                }
            }
            Err(e) => debug!(error = %e, "snapshot: forms unavailable"),
        }

        let mut elements = Vec::new();
        for selector in ["button", "a", "img", TEXT_SELECTOR] {
            match browser.find_elements(ctx, selector, false).await {
                Ok(found) => elements.extend(found),
                Err(e) => debug!(selector, error = %e, "snapshot: elements unavailable"),
            }
        }
        match browser.find_interactables(ctx).await {
            Ok(found) => elements.extend(found),
            Err(e) => debug!(error = %e, "snapshot: interactables unavailable"),
        }
        for el in elements.iter().filter(|el| !el.hidden) {
            diff.add_element(el);
        }
        diff
    }
}

/// Cookies set by the action
///
/// The pre-action jar is not subtracted; every cookie seen after the action
/// is reported.
pub fn diff_cookies(after: Vec<Cookie>) -> Vec<Cookie> {
    after
}
