//! Rendered (headless-browser) extractor variant (spec.md §4.4), feature
//! gated behind `rendered` since it pulls in `headless_chrome`.

#![cfg(feature = "rendered")]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::{Browser, Tab};

use super::selectors::{first_non_empty, literal_matches};
use super::{Element, Extractor, ExtractorFactory};
use crate::errors::{ScanError, ScanResult};
use crate::models::shop::{ExtractMode, SelectorKind, ShopSelector};

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(15);
const ACTION_TIMEOUT: Duration = Duration::from_millis(800);
const SETTLE_MIN: Duration = Duration::from_millis(100);
const SETTLE_MAX: Duration = Duration::from_millis(500);
const JS_CHALLENGE_TIMEOUT: Duration = Duration::from_secs(15);

/// Titles that indicate an interstitial JS challenge page rather than real
/// content (spec.md §4.4 "detect known JS-challenge titles").
const CHALLENGE_TITLES: &[&str] = &["one moment, please", "just a moment", "checking your browser"];

/// A tag attribute used to bind document-order locators when bulk-extracting
/// (spec.md §4.4, §9 "Rendered-engine DOM ordering").
const ORDER_TAG_ATTR: &str = "data-scan-order";

/// Same role as `ORDER_TAG_ATTR`, for `RenderedElement::find_all`'s
/// sub-element locators.
const SUBORDER_TAG_ATTR: &str = "data-scan-suborder";

/// Blocked resource-type extensions and tracker hostnames, so page loads
/// skip everything that isn't needed to read price/availability
/// (spec.md §4.4 "aborts images/stylesheets/fonts/media").
const BLOCKED_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".css", ".woff", ".woff2", ".mp4", ".webm"];
const BLOCKED_HOST_FRAGMENTS: &[&str] =
    &["doubleclick.net", "google-analytics.com", "facebook.net", "hotjar.com", "intercom.io", "zendesk.com"];

/// One headless-browser instance shared across a cycle's rendered shops
/// (spec.md §4.9 "Rendered cycle... sequential across shops (shared
/// browser)"); each scraper owns its own tab.
pub struct RenderedExtractor {
    tab: Arc<Tab>,
    current_url: String,
}

impl RenderedExtractor {
    pub fn new(browser: &Browser) -> ScanResult<Self> {
        let tab = browser
            .new_tab()
            .map_err(|e| ScanError::extractor(format!("failed to open tab: {e}")))?;

        tab.enable_request_interception(Arc::new(|_transport, _session_id, intercepted| {
            let url = &intercepted.request.url;
            let blocked = BLOCKED_EXTENSIONS.iter().any(|ext| url.ends_with(ext))
                || BLOCKED_HOST_FRAGMENTS.iter().any(|host| url.contains(host));
            if blocked {
                headless_chrome::browser::tab::RequestPausedDecision::Fail(
                    headless_chrome::protocol::cdp::Network::ErrorReason::BlockedByClient,
                )
            } else {
                headless_chrome::browser::tab::RequestPausedDecision::Continue(None)
            }
        }))
        .map_err(|e| ScanError::extractor(format!("failed to install request filter: {e}")))?;

        tab.set_default_timeout(ACTION_TIMEOUT);

        Ok(Self { tab, current_url: String::new() })
    }

    fn wait_for_challenge_to_clear(&self) -> ScanResult<()> {
        let deadline = std::time::Instant::now() + JS_CHALLENGE_TIMEOUT;
        loop {
            let title = self.tab.get_title().unwrap_or_default().to_lowercase();
            if !CHALLENGE_TITLES.iter().any(|c| title.contains(c)) {
                return Ok(());
            }
            if std::time::Instant::now() >= deadline {
                return Err(ScanError::extractor("timed out waiting for js challenge to clear".to_string()));
            }
            std::thread::sleep(Duration::from_millis(250));
        }
    }

    /// Removes any leftover `ORDER_TAG_ATTR` markers from a prior
    /// `extract_many` call. Deferred to the next `goto`/`close` rather than
    /// run inside `extract_many` itself, since the `RenderedElement`s it
    /// returns stay bound through that attribute until the caller is done
    /// reading them.
    fn strip_order_tags(&self) {
        let cleanup_script = format!(
            "document.querySelectorAll('[{ORDER_TAG_ATTR}]').forEach(el => el.removeAttribute('{ORDER_TAG_ATTR}'));\
             document.querySelectorAll('[{SUBORDER_TAG_ATTR}]').forEach(el => el.removeAttribute('{SUBORDER_TAG_ATTR}'))"
        );
        let _ = self.tab.evaluate(&cleanup_script, false);
    }
}

#[async_trait(?Send)]
impl Extractor for RenderedExtractor {
    async fn goto(&mut self, url: &str) -> ScanResult<()> {
        self.strip_order_tags();

        self.tab.set_default_timeout(NAVIGATION_TIMEOUT);
        self.tab
            .navigate_to(url)
            .map_err(|e| ScanError::extractor(format!("navigation failed: {e}")))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| ScanError::extractor(format!("navigation did not settle: {e}")))?;
        self.tab.set_default_timeout(ACTION_TIMEOUT);

        self.wait_for_challenge_to_clear()?;

        let settle = rand_between(SETTLE_MIN, SETTLE_MAX);
        tokio::time::sleep(settle).await;

        self.current_url = self.tab.get_url();
        Ok(())
    }

    fn current_url(&self) -> &str {
        &self.current_url
    }

    async fn extract_one(&mut self, selector: &ShopSelector) -> ScanResult<Option<String>> {
        first_non_empty(selector, |kind| extract_kind_value(&self.tab, kind, selector.extract))
    }

    async fn extract_many(&mut self, selector: &ShopSelector) -> ScanResult<Vec<Box<dyn Element>>> {
        let SelectorKind::CssPath(css) = &selector.kind else {
            return Ok(Vec::new());
        };

        // Tag every match with its querySelectorAll index before binding
        // locators, so bulk extraction returns strict document order
        // (spec.md §4.4, §9).
        let tag_script = format!(
            "document.querySelectorAll({css:?}).forEach((el, i) => el.setAttribute('{ORDER_TAG_ATTR}', i))"
        );
        self.tab
            .evaluate(&tag_script, false)
            .map_err(|e| ScanError::extractor(format!("failed to tag document-order nodes: {e}")))?;

        let count_script = format!("document.querySelectorAll('[{ORDER_TAG_ATTR}]').length");
        let count = self
            .tab
            .evaluate(&count_script, false)
            .ok()
            .and_then(|r| r.value.and_then(|v| v.as_u64()))
            .unwrap_or(0);

        let mut elements = Vec::new();
        for index in 0..count {
            let locator = format!("[{ORDER_TAG_ATTR}=\"{index}\"]");
            elements.push(Box::new(RenderedElement { tab: self.tab.clone(), locator }) as Box<dyn Element>);
        }

        // Tags are left in place; the returned elements re-query through
        // them lazily, so they're stripped by `strip_order_tags` on the
        // next `goto`/`close` instead of here.
        Ok(elements)
    }

    async fn exists(&mut self, selector: &ShopSelector) -> ScanResult<bool> {
        for kind in selector.candidates() {
            if kind_exists(&self.tab, kind)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn close(&mut self) -> ScanResult<()> {
        self.strip_order_tags();
        let _ = self.tab.close(true);
        Ok(())
    }
}

fn rand_between(min: Duration, max: Duration) -> Duration {
    use rand::Rng;
    let millis = rand::thread_rng().gen_range(min.as_millis() as u64..=max.as_millis() as u64);
    Duration::from_millis(millis)
}

fn extract_kind_value(tab: &Tab, kind: &SelectorKind, mode: ExtractMode) -> ScanResult<Option<String>> {
    match kind {
        SelectorKind::CssPath(css) => {
            let Ok(element) = tab.find_element(css) else { return Ok(None) };
            let text = element.get_inner_text().unwrap_or_default();
            let href = element.get_attribute_value("href").ok().flatten();
            let inner_html = element.get_inner_text().unwrap_or_default();
            Ok(super::selectors::apply_extract_mode(mode, &text, &text, &inner_html, href.as_deref()))
        }
        SelectorKind::XPath(_) => Err(ScanError::extractor("xpath selectors are not supported by the rendered extractor".to_string())),
        SelectorKind::Literal(text) => {
            let page_text = tab.get_content().unwrap_or_default();
            Ok(literal_matches(&page_text, text).then(|| text.clone()))
        }
        SelectorKind::JsonAttribute { attribute, json_path, expected, aggregator } => {
            let css = format!("[{attribute}]");
            let Ok(element) = tab.find_element(&css) else { return Ok(None) };
            let Ok(Some(raw)) = element.get_attribute_value(attribute) else { return Ok(None) };
            if super::selectors::json_attribute_matches(&raw, json_path, expected.as_ref(), *aggregator)? {
                Ok(Some(raw))
            } else {
                Ok(None)
            }
        }
    }
}

fn kind_exists(tab: &Tab, kind: &SelectorKind) -> ScanResult<bool> {
    match kind {
        SelectorKind::CssPath(css) => Ok(tab.find_element(css).is_ok()),
        SelectorKind::XPath(_) => Ok(false),
        SelectorKind::Literal(text) => {
            let page_text = tab.get_content().unwrap_or_default();
            Ok(literal_matches(&page_text, text))
        }
        SelectorKind::JsonAttribute { .. } => Ok(extract_kind_value(tab, kind, ExtractMode::Text)?.is_some()),
    }
}

/// A bulk-extracted node, bound through its temporary document-order tag
/// rather than a live handle, so re-querying after DOM tagging is cheap and
/// unambiguous (spec.md §4.4, §9).
pub struct RenderedElement {
    tab: Arc<Tab>,
    locator: String,
}

impl Element for RenderedElement {
    fn text(&self) -> String {
        self.tab
            .find_element(&self.locator)
            .and_then(|e| e.get_inner_text())
            .unwrap_or_default()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.tab.find_element(&self.locator).ok()?.get_attribute_value(name).ok().flatten()
    }

    fn find(&self, selector: &ShopSelector) -> Option<Box<dyn Element>> {
        let SelectorKind::CssPath(css) = &selector.kind else { return None };
        let scoped = format!("{} {}", self.locator, css);
        self.tab.find_element(&scoped).ok().map(|_| {
            Box::new(RenderedElement { tab: self.tab.clone(), locator: scoped }) as Box<dyn Element>
        })
    }

    fn find_all(&self, selector: &ShopSelector) -> Vec<Box<dyn Element>> {
        let SelectorKind::CssPath(css) = &selector.kind else { return Vec::new() };
        let scoped = format!("{} {}", self.locator, css);

        let tag_script = format!(
            "document.querySelectorAll({scoped:?}).forEach((el, i) => el.setAttribute('{SUBORDER_TAG_ATTR}', i))"
        );
        if self.tab.evaluate(&tag_script, false).is_err() {
            return Vec::new();
        }

        let count = self
            .tab
            .evaluate(&format!("document.querySelectorAll('[{SUBORDER_TAG_ATTR}]').length"), false)
            .ok()
            .and_then(|r| r.value.and_then(|v| v.as_u64()))
            .unwrap_or(0);

        // Left in place like `extract_many`'s tags; stripped by
        // `strip_order_tags` on the next `goto`/`close`.
        (0..count)
            .map(|i| {
                let locator = format!("[{SUBORDER_TAG_ATTR}=\"{i}\"]");
                Box::new(RenderedElement { tab: self.tab.clone(), locator }) as Box<dyn Element>
            })
            .collect()
    }

    fn matches(&self, selector: &ShopSelector) -> bool {
        selector.candidates().into_iter().any(|kind| self.kind_exists_scoped(kind).unwrap_or(false))
    }
}

impl RenderedElement {
    /// Same contract as `kind_exists`, but scoped to this element rather
    /// than the whole tab: CSS is matched as a descendant of `self.locator`
    /// (the same scoping `find`/`find_all` use) and `Literal` is checked
    /// against this element's own text, not the page's.
    fn kind_exists_scoped(&self, kind: &SelectorKind) -> ScanResult<bool> {
        match kind {
            SelectorKind::CssPath(css) => {
                let scoped = format!("{} {}", self.locator, css);
                Ok(self.tab.find_element(&scoped).is_ok())
            }
            SelectorKind::XPath(_) => Ok(false),
            SelectorKind::Literal(text) => Ok(literal_matches(&self.text(), text)),
            SelectorKind::JsonAttribute { attribute, json_path, expected, aggregator } => {
                let scoped = format!("{} [{attribute}]", self.locator);
                let Ok(element) = self.tab.find_element(&scoped) else { return Ok(false) };
                let Ok(Some(raw)) = element.get_attribute_value(attribute) else { return Ok(false) };
                super::selectors::json_attribute_matches(&raw, json_path, expected.as_ref(), *aggregator)
            }
        }
    }
}

/// Hands out one tab-backed extractor per shop from a shared browser
/// instance (spec.md §4.9 "Rendered cycle... sequential across shops
/// (shared browser)").
pub struct RenderedExtractorFactory {
    browser: Arc<Browser>,
}

impl RenderedExtractorFactory {
    pub fn new(browser: Arc<Browser>) -> Self {
        Self { browser }
    }
}

#[async_trait(?Send)]
impl ExtractorFactory for RenderedExtractorFactory {
    async fn create(&self) -> ScanResult<Box<dyn Extractor>> {
        Ok(Box::new(RenderedExtractor::new(&self.browser)?))
    }
}
