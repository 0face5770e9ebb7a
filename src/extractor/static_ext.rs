//! Static (HTTP GET + HTML parse) extractor variant (spec.md §4.4).

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use scraper::{ElementRef, Html, Selector};

use super::selectors::{apply_extract_mode, first_non_empty, json_attribute_matches, literal_matches};
use super::{Element, Extractor, ExtractorFactory};
use crate::errors::{ScanError, ScanResult};
use crate::models::shop::{AntiBotConfig, JsonAggregator, SelectorKind, ShopSelector};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
];

fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status == 403 || status == 429 || status.is_server_error()
}

fn backoff_delay(attempt: u32) -> Duration {
    match attempt {
        2 => Duration::from_secs(2),
        _ => Duration::from_secs(5),
    }
}

fn jittered_delay(base: Duration) -> Duration {
    if base.is_zero() {
        return base;
    }
    let mut rng = rand::thread_rng();
    let jitter: f64 = rng.gen_range(-0.3..=0.3);
    let millis = (base.as_millis() as f64 * (1.0 + jitter)).max(0.0);
    Duration::from_millis(millis as u64)
}

/// HTTP + CSS-parser extractor. One instance is created per Phase-2 product
/// task (spec.md §4.9); Phase 1 set searches reuse a single instance per
/// shop within the static cycle.
pub struct StaticExtractor {
    client: reqwest::Client,
    anti_bot: AntiBotConfig,
    max_retry_attempts: u32,
    document: Option<Html>,
    current_url: String,
}

impl StaticExtractor {
    pub fn new(anti_bot: AntiBotConfig, max_retry_attempts: u32) -> ScanResult<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .redirect(reqwest::redirect::Policy::limited(5));

        if let Some(proxy_url) = &anti_bot.proxy_url {
            let proxy = reqwest::Proxy::https(proxy_url)
                .map_err(|e| ScanError::extractor(format!("invalid proxy url: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(|e| ScanError::extractor(format!("client build failed: {e}")))?;

        Ok(Self { client, anti_bot, max_retry_attempts, document: None, current_url: String::new() })
    }

    fn random_user_agent() -> &'static str {
        let idx = rand::thread_rng().gen_range(0..USER_AGENTS.len());
        USER_AGENTS[idx]
    }

    fn document(&self) -> ScanResult<&Html> {
        self.document
            .as_ref()
            .ok_or_else(|| ScanError::extractor("extract called before goto".to_string()))
    }
}

#[async_trait(?Send)]
impl Extractor for StaticExtractor {
    async fn goto(&mut self, url: &str) -> ScanResult<()> {
        let delay = jittered_delay(self.anti_bot.base_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let total_attempts = self.max_retry_attempts + 1;
        let mut last_err: Option<ScanError> = None;

        for attempt in 1..=total_attempts {
            if attempt > 1 {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }

            let request = self
                .client
                .get(url)
                .header("User-Agent", Self::random_user_agent())
                .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8");

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if is_retryable_status(status) && attempt < total_attempts {
                        last_err = Some(ScanError::extractor(format!("retryable status {status}")));
                        continue;
                    }
                    if !status.is_success() {
                        return Err(ScanError::extractor(format!("request to {url} failed with status {status}")));
                    }

                    self.current_url = response.url().to_string();
                    let body = response
                        .text()
                        .await
                        .map_err(|e| ScanError::extractor(format!("failed reading response body: {e}")))?;
                    self.document = Some(Html::parse_document(&body));
                    return Ok(());
                }
                Err(e) if attempt < total_attempts => {
                    last_err = Some(ScanError::extractor(format!("network error: {e}")));
                }
                Err(e) => return Err(ScanError::extractor(format!("network error: {e}"))),
            }
        }

        Err(last_err.unwrap_or_else(|| ScanError::extractor("exhausted retry attempts".to_string())))
    }

    fn current_url(&self) -> &str {
        &self.current_url
    }

    async fn extract_one(&mut self, selector: &ShopSelector) -> ScanResult<Option<String>> {
        let document = self.document()?;
        first_non_empty(selector, |kind| extract_kind_value(document.root_element(), kind, selector.extract))
    }

    async fn extract_many(&mut self, selector: &ShopSelector) -> ScanResult<Vec<Box<dyn Element>>> {
        let document = self.document()?;
        let elements = select_candidates(document.root_element(), selector.kind.clone().css_or_none().as_deref())?;
        Ok(elements
            .into_iter()
            .map(|elem| Box::new(StaticElement::from_ref(elem)) as Box<dyn Element>)
            .collect())
    }

    async fn exists(&mut self, selector: &ShopSelector) -> ScanResult<bool> {
        let document = self.document()?;
        for kind in selector.candidates() {
            if kind_exists(document.root_element(), kind)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn close(&mut self) -> ScanResult<()> {
        self.document = None;
        Ok(())
    }
}

/// Builds one `StaticExtractor` per scrape task, reusing the shop's
/// anti-bot configuration and the cycle-wide retry budget.
pub struct StaticExtractorFactory {
    anti_bot: AntiBotConfig,
    max_retry_attempts: u32,
}

impl StaticExtractorFactory {
    pub fn new(anti_bot: AntiBotConfig, max_retry_attempts: u32) -> Self {
        Self { anti_bot, max_retry_attempts }
    }
}

#[async_trait(?Send)]
impl ExtractorFactory for StaticExtractorFactory {
    async fn create(&self) -> ScanResult<Box<dyn Extractor>> {
        Ok(Box::new(StaticExtractor::new(self.anti_bot.clone(), self.max_retry_attempts)?))
    }
}

impl SelectorKind {
    fn css_or_none(self) -> Option<String> {
        match self {
            SelectorKind::CssPath(css) => Some(css),
            _ => None,
        }
    }
}

fn select_candidates<'a>(root: ElementRef<'a>, css: Option<&str>) -> ScanResult<Vec<ElementRef<'a>>> {
    let Some(css) = css else { return Ok(Vec::new()) };
    let selector = Selector::parse(css).map_err(|e| ScanError::extractor(format!("invalid css selector `{css}`: {e:?}")))?;
    Ok(root.select(&selector).collect())
}

fn extract_kind_value(root: ElementRef<'_>, kind: &SelectorKind, mode: crate::models::shop::ExtractMode) -> ScanResult<Option<String>> {
    match kind {
        SelectorKind::CssPath(css) => {
            let candidates = select_candidates(root, Some(css))?;
            Ok(candidates.into_iter().next().and_then(|elem| element_value(elem, mode)))
        }
        SelectorKind::XPath(_) => {
            Err(ScanError::extractor("xpath selectors are not supported by the static extractor".to_string()))
        }
        SelectorKind::Literal(text) => {
            let page_text: String = root.text().collect::<Vec<_>>().join(" ");
            Ok(literal_matches(&page_text, text).then(|| text.clone()))
        }
        SelectorKind::JsonAttribute { attribute, json_path, expected, aggregator } => {
            let css = format!("[{attribute}]");
            let candidates = select_candidates(root, Some(&css))?;
            for elem in candidates {
                if let Some(raw) = elem.value().attr(attribute) {
                    if json_attribute_matches(raw, json_path, expected.as_ref(), *aggregator)? {
                        return Ok(Some(raw.to_string()));
                    }
                }
            }
            Ok(None)
        }
    }
}

fn kind_exists(root: ElementRef<'_>, kind: &SelectorKind) -> ScanResult<bool> {
    match kind {
        SelectorKind::CssPath(css) => Ok(!select_candidates(root, Some(css))?.is_empty()),
        SelectorKind::XPath(_) => Ok(false),
        SelectorKind::Literal(text) => {
            let page_text: String = root.text().collect::<Vec<_>>().join(" ");
            Ok(literal_matches(&page_text, text))
        }
        SelectorKind::JsonAttribute { attribute, json_path, expected, aggregator } => {
            let css = format!("[{attribute}]");
            let candidates = select_candidates(root, Some(&css))?;
            let mut any_seen = false;
            for elem in candidates {
                if let Some(raw) = elem.value().attr(attribute) {
                    any_seen = true;
                    let matched = json_attribute_matches(raw, json_path, expected.as_ref(), *aggregator)?;
                    match aggregator {
                        JsonAggregator::Any if matched => return Ok(true),
                        JsonAggregator::All if !matched => return Ok(false),
                        JsonAggregator::None if matched => return Ok(false),
                        _ => {}
                    }
                }
            }
            Ok(match aggregator {
                JsonAggregator::Any => false,
                JsonAggregator::All => any_seen,
                JsonAggregator::None => true,
            })
        }
    }
}

fn element_value(elem: ElementRef<'_>, mode: crate::models::shop::ExtractMode) -> Option<String> {
    let text: String = elem.text().collect::<Vec<_>>().join(" ");
    let own_text: String = elem
        .children()
        .filter_map(|child| child.value().as_text().map(|t| t.to_string()))
        .collect::<Vec<_>>()
        .join(" ");
    let inner_html = elem.inner_html();
    let href = elem.value().attr("href");
    apply_extract_mode(mode, &text, &own_text, &inner_html, href)
}

/// An extracted node, carrying enough owned data to support further
/// selector drill-down without borrowing from the parent document.
pub struct StaticElement {
    fragment: Html,
}

impl StaticElement {
    fn from_ref(elem: ElementRef<'_>) -> Self {
        Self { fragment: Html::parse_fragment(&elem.html()) }
    }

    fn root(&self) -> Option<ElementRef<'_>> {
        static BODY: std::sync::OnceLock<Selector> = std::sync::OnceLock::new();
        let body_selector = BODY.get_or_init(|| Selector::parse("body").unwrap());
        let body = self.fragment.select(body_selector).next()?;
        body.children().find(|child| child.value().is_element()).and_then(ElementRef::wrap)
    }
}

impl Element for StaticElement {
    fn text(&self) -> String {
        self.root().map(|e| e.text().collect::<Vec<_>>().join(" ")).unwrap_or_default()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.root().and_then(|e| e.value().attr(name).map(str::to_string))
    }

    fn find(&self, selector: &ShopSelector) -> Option<Box<dyn Element>> {
        let root = self.root()?;
        let css = selector.kind.clone().css_or_none()?;
        select_candidates(root, Some(&css)).ok()?.into_iter().next().map(|e| Box::new(StaticElement::from_ref(e)) as Box<dyn Element>)
    }

    fn find_all(&self, selector: &ShopSelector) -> Vec<Box<dyn Element>> {
        let Some(root) = self.root() else { return Vec::new() };
        let Some(css) = selector.kind.clone().css_or_none() else { return Vec::new() };
        select_candidates(root, Some(&css))
            .map(|elems| elems.into_iter().map(|e| Box::new(StaticElement::from_ref(e)) as Box<dyn Element>).collect())
            .unwrap_or_default()
    }

    fn matches(&self, selector: &ShopSelector) -> bool {
        let Some(root) = self.root() else { return false };
        selector
            .candidates()
            .into_iter()
            .any(|kind| kind_exists(root, kind).unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::shop::ExtractMode;

    #[test]
    fn backoff_schedule_matches_spec() {
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(5));
    }

    #[test]
    fn zero_base_delay_has_no_jitter() {
        assert_eq!(jittered_delay(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn css_extraction_reads_text() {
        let html = Html::parse_document(r#"<html><body><h1 class="title">Surging Sparks Booster Box</h1></body></html>"#);
        let selector = ShopSelector::new(SelectorKind::CssPath("h1.title".into()), ExtractMode::Text);
        let value = extract_kind_value(html.root_element(), &selector.kind, ExtractMode::Text).unwrap();
        assert_eq!(value.as_deref(), Some("Surging Sparks Booster Box"));
    }

    #[test]
    fn literal_selector_detects_in_stock_text() {
        let html = Html::parse_document(r#"<html><body><span>In Stock</span></body></html>"#);
        assert!(kind_exists(html.root_element(), &SelectorKind::Literal("in stock".into())).unwrap());
    }

    #[test]
    fn xpath_selector_errors_on_static_backend() {
        let html = Html::parse_document("<html><body></body></html>");
        let err = extract_kind_value(html.root_element(), &SelectorKind::XPath("//h1".into()), ExtractMode::Text);
        assert!(err.is_err());
    }
}
