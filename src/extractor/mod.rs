//! Extractor capability abstraction (spec.md §4.4, Component D).
//!
//! One `async_trait` interface behind two interchangeable variants — a
//! lightweight HTTP+HTML-parser extractor and a heavyweight headless-browser
//! extractor — following the repository-trait-with-multiple-backends
//! pattern this crate already uses for storage.

pub mod rendered;
pub mod selectors;
pub mod static_ext;

pub use static_ext::StaticExtractor;

use async_trait::async_trait;

use crate::errors::ScanResult;
use crate::models::shop::ShopSelector;

/// Document-order-preserving extraction and navigation capability
/// (spec.md §4.4). Both variants guarantee `goto` happens-before any
/// subsequent `extract*`/`exists` call on the same instance (spec.md §5).
///
/// Deliberately not `Send`: `scraper::Html` holds non-atomically-refcounted
/// tendrils, so the static variant can't cross an OS thread. The runner
/// achieves Phase-2 fan-out with `futures::stream::for_each_concurrent`
/// instead of `tokio::spawn`, which only requires driving several futures
/// concurrently on the same task — no `Send` bound needed.
#[async_trait(?Send)]
pub trait Extractor {
    async fn goto(&mut self, url: &str) -> ScanResult<()>;

    /// The URL after following redirects, available only after `goto`.
    fn current_url(&self) -> &str;

    async fn extract_one(&mut self, selector: &ShopSelector) -> ScanResult<Option<String>>;

    /// Bulk extraction in document order (spec.md §4.4, §9 "Rendered-engine
    /// DOM ordering").
    async fn extract_many(&mut self, selector: &ShopSelector) -> ScanResult<Vec<Box<dyn Element>>>;

    async fn exists(&mut self, selector: &ShopSelector) -> ScanResult<bool>;

    async fn close(&mut self) -> ScanResult<()>;
}

/// One matched node, capable of further selector drill-down
/// (spec.md §4.4 `Element`).
pub trait Element {
    fn text(&self) -> String;
    fn attribute(&self, name: &str) -> Option<String>;
    fn find(&self, selector: &ShopSelector) -> Option<Box<dyn Element>>;
    fn find_all(&self, selector: &ShopSelector) -> Vec<Box<dyn Element>>;
    fn matches(&self, selector: &ShopSelector) -> bool;
}

/// Creates one extractor per scrape task (spec.md §4.9 "each task creates
/// its own extractor"). Two implementations ground the two engine kinds.
#[async_trait(?Send)]
pub trait ExtractorFactory {
    async fn create(&self) -> ScanResult<Box<dyn Extractor>>;
}
