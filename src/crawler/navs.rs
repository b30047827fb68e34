// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Candidate navigation extraction

use tracing::{debug, trace};

use super::diff::{ElementDiff, TEXT_SELECTOR};
use crate::browser::Browser;
use crate::context::Context;
use crate::error::Result;
use crate::model::{Action, ActionType, HtmlElement, Navigation, TriggeredBy};
use crate::scope::Scope;

/// Collects candidates, dropping anything already seen locally or in the
/// pre-action snapshot
struct Candidates<'a> {
    entry: &'a Navigation,
    snapshot: &'a ElementDiff,
    local: ElementDiff,
    navs: Vec<Navigation>,
}

impl<'a> Candidates<'a> {
    fn fresh(&mut self, el: &HtmlElement) -> bool {
        !el.hidden && !self.snapshot.contains_element(el) && self.local.add_element(el)
    }

    fn push(&mut self, action: Action, document_url: &str) {
        let nav = Navigation::with_document(Some(self.entry), TriggeredBy::Crawler, action, document_url);
        trace!(nav = %nav.id.short(), what = %nav.describe(), "candidate");
        self.navs.push(nav);
    }
}

/// Discover navigations reachable from the current page, in priority order:
/// forms, buttons, links, interactables, images, then text
pub async fn find_new_navs(
    ctx: &Context,
    browser: &dyn Browser,
    entry: &Navigation,
    snapshot: &ElementDiff,
) -> Result<Vec<Navigation>> {
    if entry.distance + 1 > ctx.config.max_depth {
        return Ok(Vec::new());
    }
    let document_url = browser.get_url().await?;
    let base = browser
        .get_base_href()
        .await
        .unwrap_or_else(|_| document_url.clone());
    let mut c = Candidates {
        entry,
        snapshot,
        local: ElementDiff::new(),
        navs: Vec::new(),
    };

    for form in browser.find_forms(ctx).await? {
        if snapshot.contains_form(&form) || !c.local.add_form(&form) {
            continue;
        }
        let target = if form.action_is_self() { "" } else { form.action() };
        let (_, scope) = ctx.scope.resolve_base_href(&base, target);
        if scope != Scope::InScope {
            debug!(action = form.action(), ?scope, "form out of scope");
            continue;
        }
        // the submit control is exercised by the fill
        if let Some(submit) = &form.submit {
            c.local.add_element(submit);
        }
        c.push(Action::fill_form(form), &document_url);
    }

    for button in browser.find_elements(ctx, "button", false).await? {
        if c.fresh(&button) {
            c.push(Action::with_element(ActionType::LeftClick, button), &document_url);
        }
    }

    for link in browser.find_elements(ctx, "a", false).await? {
        let Some(href) = link.href().map(str::to_string) else {
            continue;
        };
        if !link.is_fragment_link() {
            let (_, scope) = ctx.scope.resolve_base_href(&base, &href);
            if scope != Scope::InScope {
                trace!(href = %href, ?scope, "link out of scope");
                continue;
            }
        }
        if c.fresh(&link) {
            c.push(Action::with_element(ActionType::LeftClick, link), &document_url);
        }
    }

    for el in browser.find_interactables(ctx).await? {
        if !c.fresh(&el) {
            continue;
        }
        let mut kinds: Vec<ActionType> = el
            .events
            .iter()
            .filter_map(|e| ActionType::from_event(e))
            .collect();
        kinds.sort_by_key(|k| k.as_u8());
        kinds.dedup();
        for kind in kinds {
            c.push(Action::with_element(kind, el.clone()), &document_url);
        }
    }

    for img in browser.find_elements(ctx, "img", false).await? {
        if c.fresh(&img) {
            c.push(Action::with_element(ActionType::LeftClick, img), &document_url);
        }
    }

    for el in browser.find_elements(ctx, TEXT_SELECTOR, false).await? {
        if el.text.trim().is_empty() {
            continue;
        }
        if c.fresh(&el) {
            c.push(Action::with_element(ActionType::LeftClick, el), &document_url);
        }
    }

    debug!(nav = %entry.id.short(), found = c.navs.len(), "new navigations");
    Ok(c.navs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeBrowser, FakePage};
    use crate::context::test_support::test_context;
    use crate::model::HtmlForm;

    fn seed() -> Navigation {
        Navigation::new(None, TriggeredBy::Initial, Action::load_url("http://host/"))
    }

    async fn loaded(page: FakePage) -> (FakeBrowser, Navigation) {
        let browser = FakeBrowser::new(vec![("http://host/", page)]);
        browser.navigate(&test_context(), "http://host/").await.unwrap();
        (browser, seed())
    }

    #[tokio::test]
    async fn test_priority_order_and_submit_suppression() {
        let submit = HtmlElement::new("button").attr("type", "submit").with_text("Go");
        let mut form = HtmlForm::new().attr("action", "/submit");
        form.submit = Some(submit.clone());
        let page = FakePage::new("<html></html>")
            .element("img", HtmlElement::new("img").attr("src", "/logo.png"))
            .element("a", HtmlElement::new("a").attr("href", "/b").with_text("B"))
            .element("button", submit)
            .element("button", HtmlElement::new("button").with_text("Other"))
            .form(form);
        let (browser, entry) = loaded(page).await;

        let navs = find_new_navs(&test_context(), &browser, &entry, &ElementDiff::new())
            .await
            .unwrap();
        let kinds: Vec<ActionType> = navs.iter().map(|n| n.action.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ActionType::FillForm,
                ActionType::LeftClick,
                ActionType::LeftClick,
                ActionType::LeftClick
            ]
        );
        assert_eq!(navs[1].action.element.as_ref().unwrap().text, "Other");
        assert_eq!(navs[2].action.element.as_ref().unwrap().href(), Some("/b"));
        assert!(navs.iter().all(|n| n.distance == 1 && n.origin_id == entry.id));
    }

    #[tokio::test]
    async fn test_scope_and_hidden_filters() {
        let mut hidden = HtmlElement::new("a").attr("href", "/secret");
        hidden.hidden = true;
        let page = FakePage::new("")
            .element("a", HtmlElement::new("a").attr("href", "http://elsewhere.test/"))
            .element("a", HtmlElement::new("a").attr("href", "#top"))
            .element("a", hidden)
            .form(HtmlForm::new().attr("action", "https://other.test/login"));
        let (browser, entry) = loaded(page).await;

        let navs = find_new_navs(&test_context(), &browser, &entry, &ElementDiff::new())
            .await
            .unwrap();
        assert_eq!(navs.len(), 1);
        assert_eq!(navs[0].action.element.as_ref().unwrap().href(), Some("#top"));
    }

    #[tokio::test]
    async fn test_snapshot_suppresses_known_elements() {
        let link = HtmlElement::new("a").attr("href", "/b");
        let page = FakePage::new("").element("a", link.clone());
        let (browser, entry) = loaded(page).await;
        let mut snapshot = ElementDiff::new();
        snapshot.add_element(&link);

        let navs = find_new_navs(&test_context(), &browser, &entry, &snapshot).await.unwrap();
        assert!(navs.is_empty());
    }

    #[tokio::test]
    async fn test_interactable_events_map_to_actions() {
        let mut el = HtmlElement::new("div").attr("id", "menu");
        el.events = vec!["click".into(), "mousedown".into(), "keyup".into(), "scroll".into()];
        let mut page = FakePage::new("");
        page.interactables.push(el);
        let (browser, entry) = loaded(page).await;

        let navs = find_new_navs(&test_context(), &browser, &entry, &ElementDiff::new())
            .await
            .unwrap();
        let kinds: Vec<ActionType> = navs.iter().map(|n| n.action.kind).collect();
        assert_eq!(kinds, vec![ActionType::LeftClick, ActionType::SendKeys]);
    }

    #[tokio::test]
    async fn test_depth_budget_stops_discovery() {
        let page = FakePage::new("").element("a", HtmlElement::new("a").attr("href", "/b"));
        let (browser, mut entry) = loaded(page).await;
        entry.distance = test_context().config.max_depth;
        let navs = find_new_navs(&test_context(), &browser, &entry, &ElementDiff::new())
            .await
            .unwrap();
        assert!(navs.is_empty());
    }
}
