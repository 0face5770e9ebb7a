//! Shop configuration and the selector union (spec.md §3 "ShopConfig",
//! "Selector").

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Static (HTTP + HTML parse) vs rendered (headless browser) extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Static,
    Rendered,
}

/// Anti-bot pacing knobs (spec.md §3, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AntiBotConfig {
    /// Base per-request delay; actual delay is jittered by ±30% (§4.4).
    #[serde(with = "duration_millis")]
    pub base_delay: Duration,
    pub max_concurrency_override: Option<usize>,
    pub proxy_url: Option<String>,
}

impl Default for AntiBotConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(0),
            max_concurrency_override: None,
            proxy_url: None,
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

/// One element of the Selector union (spec.md §3 "Selector").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SelectorKind {
    CssPath(String),
    XPath(String),
    Literal(String),
    JsonAttribute {
        attribute: String,
        json_path: String,
        expected: Option<serde_json::Value>,
        aggregator: JsonAggregator,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonAggregator {
    Any,
    All,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractMode {
    Text,
    Href,
    InnerHtml,
    OwnText,
}

/// A selector plus its extraction mode and fallback chain (spec.md §3).
/// The first selector (or fallback) that yields a non-empty value wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopSelector {
    pub kind: SelectorKind,
    pub extract: ExtractMode,
    pub fallbacks: Vec<SelectorKind>,
}

impl ShopSelector {
    pub fn new(kind: SelectorKind, extract: ExtractMode) -> Self {
        Self {
            kind,
            extract,
            fallbacks: Vec::new(),
        }
    }

    pub fn with_fallbacks(mut self, fallbacks: Vec<SelectorKind>) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    /// All candidate selectors in try-order: primary first, then fallbacks.
    pub fn candidates(&self) -> Vec<&SelectorKind> {
        std::iter::once(&self.kind).chain(self.fallbacks.iter()).collect()
    }
}

/// Search-page and product-page selector bundle (spec.md §3 "ShopConfig").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorBundle {
    // Search page
    pub search_article: ShopSelector,
    pub search_title: ShopSelector,
    pub search_product_url: ShopSelector,
    pub search_price: Option<ShopSelector>,
    pub search_availability: Option<ShopSelector>,

    // Product page
    pub product_title: ShopSelector,
    pub product_price: ShopSelector,
    pub product_availability: Vec<ShopSelector>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopConfig {
    pub id: Uuid,
    pub name: String,
    pub base_url: String,
    /// Contains `{query}`, or if absent, the phrase is appended URL-encoded.
    pub search_url_template: String,
    pub direct_hit_pattern: Option<String>,
    pub selectors: SelectorBundle,
    pub engine: EngineKind,
    pub anti_bot: AntiBotConfig,
    pub price_locale: crate::text::price::Locale,
    pub disabled: bool,
}

impl ShopConfig {
    /// Build the search URL for one phrase (spec.md §4.3).
    pub fn search_url(&self, phrase: &str) -> String {
        let encoded = url::form_urlencoded::byte_serialize(phrase.as_bytes()).collect::<String>();
        if self.search_url_template.contains("{query}") {
            self.search_url_template.replace("{query}", &encoded)
        } else {
            format!("{}{}", self.search_url_template, encoded)
        }
    }

    pub fn max_concurrency(&self, default_prod_conc: usize) -> usize {
        self.anti_bot.max_concurrency_override.unwrap_or(default_prod_conc)
    }
}
