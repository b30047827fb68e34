// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Crawler step: execute one navigation and capture what it did
//!
//! The worker walks a path from the seed and calls [`Crawler::process`] for
//! every step. Only the last step is final: it is snapshotted beforehand and
//! searched for new navigations afterwards.

mod diff;
mod forms;
mod navs;

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, instrument, warn};
use url::Url;

pub use diff::{diff_cookies, ElementDiff, TEXT_SELECTOR};
pub use forms::FormFiller;
pub use navs::find_new_navs;

use crate::browser::Browser;
use crate::config::Config;
use crate::context::Context;
use crate::error::{ErrorContext, Result};
use crate::model::{Navigation, NavigationResult};
use crate::plugin::PluginEvent;

/// What one step produced
#[derive(Debug)]
pub struct StepOutcome {
    pub result: NavigationResult,
    /// Candidates discovered after a final step
    pub navs: Vec<Navigation>,
}

pub struct Crawler {
    action_timeout: Duration,
}

impl Crawler {
    pub fn new(config: &Config) -> Self {
        Self {
            action_timeout: config.timeouts.navigation(),
        }
    }

    pub fn with_timeout(action_timeout: Duration) -> Self {
        Self { action_timeout }
    }

    /// Execute `entry` on `browser`
    ///
    /// Browser failures are recorded on the result. Cancellation and tab
    /// crashes are returned as errors so the caller can abandon the path.
    #[instrument(skip_all, fields(nav = %entry.id.short(), kind = %entry.action.kind, is_final = is_final))]
    pub async fn process(
        &self,
        ctx: &Context,
        browser: &dyn Browser,
        entry: &Navigation,
        is_final: bool,
    ) -> Result<StepOutcome> {
        ctx.check()?;
        let start_url = browser.get_url().await.unwrap_or_default();
        browser.get_storage_events();
        browser.get_console_events();

        let snapshot = if is_final {
            ElementDiff::snapshot(ctx, browser).await
        } else {
            ElementDiff::new()
        };

        let mut result = NavigationResult::new(entry.id.clone(), start_url.clone());
        let t_start = Utc::now();
        let outcome = ctx
            .run_with_timeout(
                "execute_action",
                self.action_timeout,
                browser.execute_action(ctx, entry),
            )
            .await
            .with_url(&start_url);

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) if e.is_crash() || matches!(e, crate::error::Error::Cancelled) => return Err(e),
            Err(e) => {
                warn!(error = %e, what = %entry.describe(), "action failed");
                result.add_error(&e);
                result.end_url = browser.get_url().await.unwrap_or_default();
                result.messages = messages_since(browser, t_start);
                result.hash();
                return Ok(StepOutcome {
                    result,
                    navs: Vec::new(),
                });
            }
        };

        result.caused_load = outcome.caused_load;
        result.messages = messages_since(browser, t_start);
        match browser.get_dom().await {
            Ok(dom) => result.dom = dom,
            Err(e) => result.add_error(e),
        }
        match browser.get_url().await {
            Ok(url) => result.end_url = url,
            Err(e) => result.add_error(e),
        }
        let cookies = match browser.get_cookies().await {
            Ok(cookies) => diff_cookies(cookies),
            Err(e) => {
                result.add_error(e);
                Vec::new()
            }
        };
        result.storage_events = browser.get_storage_events();
        result.console_events = browser.get_console_events();

        if let Ok(page) = Url::parse(&result.end_url) {
            for cookie in &cookies {
                ctx.handlers
                    .on_event(&PluginEvent::cookie(page.clone(), entry.id.clone(), cookie.clone()));
            }
        }
        result.cookies = cookies;
        result.hash();

        debug!(
            messages = result.messages.len(),
            caused_load = result.caused_load,
            end_url = %result.end_url,
            "step captured"
        );

        let navs = if is_final && !result.was_error {
            match find_new_navs(ctx, browser, entry, &snapshot).await {
                Ok(navs) => navs,
                Err(e) if e.is_crash() => return Err(e),
                Err(e) => {
                    warn!(error = %e, "candidate discovery failed");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Ok(StepOutcome { result, navs })
    }
}

fn messages_since(browser: &dyn Browser, t_start: chrono::DateTime<Utc>) -> Vec<crate::model::HttpMessage> {
    browser
        .get_messages()
        .into_iter()
        .filter(|m| m.request_time >= t_start)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeBrowser, FakePage};
    use crate::context::test_support::test_context;
    use crate::model::{Action, ActionType, Cookie, HtmlElement, HtmlForm, TriggeredBy};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn seed() -> Navigation {
        Navigation::new(None, TriggeredBy::Initial, Action::load_url("http://host/"))
    }

    fn site() -> FakeBrowser {
        FakeBrowser::new(vec![
            (
                "http://host/",
                FakePage::new("<a href=\"/b\">B</a>")
                    .element("a", HtmlElement::new("a").attr("href", "/b").with_text("B"))
                    .cookie(Cookie::new("SID", "x").domain("host").path("/")),
            ),
            ("http://host/b", FakePage::new("<p>b</p>")),
        ])
    }

    #[tokio::test]
    async fn test_final_step_discovers_anchor() {
        let ctx = test_context();
        let browser = site();
        let out = Crawler::with_timeout(Duration::from_secs(5))
            .process(&ctx, &browser, &seed(), true)
            .await
            .unwrap();

        assert!(!out.result.was_error);
        assert!(out.result.caused_load);
        assert_eq!(out.result.end_url, "http://host/");
        assert_eq!(out.result.messages.len(), 1);
        assert_eq!(out.result.cookies.len(), 1);
        assert_eq!(out.navs.len(), 1);
        assert_eq!(out.navs[0].action.kind, ActionType::LeftClick);
        assert_eq!(out.navs[0].distance, 1);

        // ids are content derived
        let again = Crawler::with_timeout(Duration::from_secs(5))
            .process(&ctx, &site(), &seed(), true)
            .await
            .unwrap();
        assert_eq!(again.navs[0].id, out.navs[0].id);
        assert_eq!(again.result.id, out.result.id);
    }

    #[tokio::test]
    async fn test_intermediate_step_has_no_candidates() {
        let ctx = test_context();
        let out = Crawler::with_timeout(Duration::from_secs(5))
            .process(&ctx, &site(), &seed(), false)
            .await
            .unwrap();
        assert!(out.navs.is_empty());
        assert_eq!(out.result.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_action_is_recorded() {
        let ctx = test_context();
        let browser = site();
        let click = Navigation::new(
            Some(&seed()),
            TriggeredBy::Crawler,
            Action::with_element(ActionType::LeftClick, HtmlElement::new("button").with_text("gone")),
        );
        let out = Crawler::with_timeout(Duration::from_secs(5))
            .process(&ctx, &browser, &click, true)
            .await
            .unwrap();
        assert!(out.result.was_error);
        assert_eq!(out.result.errors.len(), 1);
        assert!(out.navs.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_step_propagates() {
        let ctx = test_context();
        ctx.cancel.cancel();
        let res = Crawler::with_timeout(Duration::from_secs(5))
            .process(&ctx, &site(), &seed(), true)
            .await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn test_cookie_events_reach_handlers() {
        let mut ctx = test_context();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        ctx.handlers.add_event_handler(move |ev| {
            if let crate::plugin::EventData::Cookie(c) = &ev.data {
                sink.lock().push(c.name.clone());
            }
        });
        Crawler::with_timeout(Duration::from_secs(5))
            .process(&ctx, &site(), &seed(), false)
            .await
            .unwrap();
        assert_eq!(*seen.lock(), vec!["SID".to_string()]);
    }

    #[tokio::test]
    async fn test_form_fill_posts_configured_values() {
        let mut config = crate::config::Config::new("http://host/");
        config.form_data.insert("username".into(), "admin".into());
        let config = config.finalize().unwrap();
        let crawl = Arc::new(crate::store::CrawlGraph::in_memory(config.max_depth).unwrap());
        let ctx = Context::new(config, Arc::new(crate::report::MemoryReporter::new()), crawl).unwrap();

        let form = HtmlForm::new()
            .attr("action", "/submit")
            .attr("method", "post")
            .field(HtmlElement::new("input").attr("name", "username"))
            .field(HtmlElement::new("input").attr("name", "password").attr("type", "password"));
        let browser = FakeBrowser::new(vec![
            ("http://host/forms/simple", FakePage::new("").form(form.clone())),
            ("http://host/submit", FakePage::new("welcome")),
        ]);
        browser.navigate(&ctx, "http://host/forms/simple").await.unwrap();

        let origin = Navigation::new(None, TriggeredBy::Initial, Action::load_url("http://host/forms/simple"));
        let fill = Navigation::new(Some(&origin), TriggeredBy::Crawler, Action::fill_form(form));
        let out = Crawler::with_timeout(Duration::from_secs(5))
            .process(&ctx, &browser, &fill, false)
            .await
            .unwrap();
        assert!(out.result.messages.len() >= 1);
        let post = &out.result.messages[0].request;
        assert_eq!(post.method, "POST");
        assert!(post.post_data.as_deref().unwrap().contains("username=admin"));
        assert_eq!(out.result.end_url, "http://host/submit");
    }
}
