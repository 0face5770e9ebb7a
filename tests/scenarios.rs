//! End-to-end scenario tests exercising the public API the way a caller
//! would combine it, rather than each module's own unit tests.
//!
//! `FakeExtractor`/`FakeElement` stand in for a real page: search results
//! and product pages are canned per URL, so these tests drive the same
//! matching/grouping/breaker/dispatch code a live scrape would.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use uuid::Uuid;

use price_scan_core::breaker::CircuitBreaker;
use price_scan_core::dispatcher::Dispatcher;
use price_scan_core::errors::{ScanError, ScanResult};
use price_scan_core::extractor::static_ext::StaticExtractor;
use price_scan_core::extractor::{Element, Extractor};
use price_scan_core::grouper;
use price_scan_core::models::candidate::{Candidate, GroupedProduct, SetGroup};
use price_scan_core::models::product::{Product, ProductSet, ResolvedProduct};
use price_scan_core::models::shop::{
    AntiBotConfig, EngineKind, ExtractMode, SelectorBundle, SelectorKind, ShopConfig, ShopSelector,
};
use price_scan_core::models::user::{NotificationTarget, WatchEntry};
use price_scan_core::navigator;
use price_scan_core::runner::{self, ProductWork};
use price_scan_core::scraper_template;
use price_scan_core::state::NotificationStateService;
use price_scan_core::store::{InMemoryStore, NotificationStore};
use price_scan_core::text::price::Locale;

// --- shared fake extractor -------------------------------------------------

#[derive(Clone)]
struct FakeArticle {
    title: String,
    url: String,
    price: Option<f64>,
    available: bool,
}

enum FakeElement {
    Article(FakeArticle),
    Leaf { text: String, href: Option<String> },
}

fn literal_name(selector: &ShopSelector) -> Option<String> {
    match &selector.kind {
        SelectorKind::Literal(s) => Some(s.clone()),
        _ => None,
    }
}

impl Element for FakeElement {
    fn text(&self) -> String {
        match self {
            FakeElement::Article(a) => a.title.clone(),
            FakeElement::Leaf { text, .. } => text.clone(),
        }
    }

    fn attribute(&self, name: &str) -> Option<String> {
        match self {
            FakeElement::Leaf { href, .. } if name == "href" => href.clone(),
            _ => None,
        }
    }

    fn find(&self, selector: &ShopSelector) -> Option<Box<dyn Element>> {
        let FakeElement::Article(a) = self else { return None };
        match literal_name(selector)?.as_str() {
            "title" => Some(Box::new(FakeElement::Leaf { text: a.title.clone(), href: None })),
            "url" => Some(Box::new(FakeElement::Leaf { text: String::new(), href: Some(a.url.clone()) })),
            "price" => a
                .price
                .map(|p| Box::new(FakeElement::Leaf { text: format!("{p}"), href: None }) as Box<dyn Element>),
            _ => None,
        }
    }

    fn find_all(&self, _selector: &ShopSelector) -> Vec<Box<dyn Element>> {
        Vec::new()
    }

    fn matches(&self, selector: &ShopSelector) -> bool {
        let FakeElement::Article(a) = self else { return false };
        literal_name(selector).as_deref() == Some("availability") && a.available
    }
}

/// Canned pages keyed by URL, plus optional per-URL failures and direct-hit
/// titles — enough to drive the navigator/runner without a live shop.
#[derive(Default)]
struct FakeExtractor {
    current_url: String,
    pages: HashMap<String, Vec<FakeArticle>>,
    direct_hit_titles: HashMap<String, String>,
    fail_urls: std::collections::HashSet<String>,
    goto_count: usize,
}

#[async_trait(?Send)]
impl Extractor for FakeExtractor {
    async fn goto(&mut self, url: &str) -> ScanResult<()> {
        self.goto_count += 1;
        if self.fail_urls.contains(url) {
            return Err(ScanError::extractor(format!("simulated failure for {url}")));
        }
        self.current_url = url.to_string();
        Ok(())
    }

    fn current_url(&self) -> &str {
        &self.current_url
    }

    async fn extract_one(&mut self, _selector: &ShopSelector) -> ScanResult<Option<String>> {
        Ok(self.direct_hit_titles.get(&self.current_url).cloned())
    }

    async fn extract_many(&mut self, _selector: &ShopSelector) -> ScanResult<Vec<Box<dyn Element>>> {
        let articles = self.pages.get(&self.current_url).cloned().unwrap_or_default();
        Ok(articles.into_iter().map(|a| Box::new(FakeElement::Article(a)) as Box<dyn Element>).collect())
    }

    async fn exists(&mut self, _selector: &ShopSelector) -> ScanResult<bool> {
        Ok(false)
    }

    async fn close(&mut self) -> ScanResult<()> {
        Ok(())
    }
}

fn literal_selector(name: &str) -> ShopSelector {
    ShopSelector::new(SelectorKind::Literal(name.into()), ExtractMode::Text)
}

fn shop(direct_hit_pattern: Option<&str>) -> ShopConfig {
    ShopConfig {
        id: Uuid::new_v4(),
        name: "Test Shop".into(),
        base_url: "https://shop.test".into(),
        search_url_template: "https://shop.test/search?q={query}".into(),
        direct_hit_pattern: direct_hit_pattern.map(String::from),
        selectors: SelectorBundle {
            search_article: literal_selector("article"),
            search_title: literal_selector("title"),
            search_product_url: literal_selector("url"),
            search_price: Some(literal_selector("price")),
            search_availability: Some(literal_selector("availability")),
            product_title: literal_selector("title"),
            product_price: literal_selector("price"),
            product_availability: vec![literal_selector("availability")],
        },
        engine: EngineKind::Static,
        anti_bot: AntiBotConfig::default(),
        price_locale: Locale::Us,
        disabled: false,
    }
}

fn resolved(name: &str, set_id: Option<Uuid>, phrase: &str, exclude: Vec<String>) -> ResolvedProduct {
    let mut product = Product::new(name);
    product.set_id = set_id;
    ResolvedProduct::new(product, vec![phrase.into()], exclude).unwrap()
}

// --- scenario 1: search-page data synthesis --------------------------------

#[tokio::test]
async fn set_search_synthesizes_result_from_search_page_data() {
    let shop = shop(None);
    let set_id = Uuid::new_v4();
    let search_url = shop.search_url("surging sparks");

    let mut extractor = FakeExtractor::default();
    extractor.pages.insert(
        search_url,
        vec![FakeArticle {
            title: "Surging Sparks Booster Box".into(),
            url: "/products/surging-sparks-booster-box".into(),
            price: Some(119.99),
            available: true,
        }],
    );
    // Product-page visit must never happen: synthesis takes the search-page
    // data instead.
    extractor
        .fail_urls
        .insert("https://shop.test/products/surging-sparks-booster-box".into());

    let product = resolved("Surging Sparks Booster Box", Some(set_id), "surging sparks booster box", vec![]);
    let group = SetGroup {
        set_id,
        search_phrase: "surging sparks".into(),
        products: vec![GroupedProduct { product: product.clone(), group_exclude: vec![] }],
    };

    let breaker = CircuitBreaker::new(3);
    let work = runner::resolve_group(&mut extractor, shop.id, &shop, &group, &breaker).await;
    assert_eq!(work.len(), 1);

    let ProductWork::Navigated(_, navigation) = work.into_iter().next().unwrap() else {
        panic!("expected a navigated result");
    };
    assert!(navigation.search_page_data.is_some());

    let result = scraper_template::scrape_with_navigation(&mut extractor, &shop, &product, navigation).await;
    assert!(result.is_found());
    assert_eq!(result.price, Some(119.99));
    assert!(result.is_available);
    // Only the one search request happened; the product page was never hit.
    assert_eq!(extractor.goto_count, 1);
}

// --- scenario 2: generic-set auto-exclude ----------------------------------

#[test]
fn generic_set_excludes_sibling_named_sets() {
    let generic_id = Uuid::new_v4();
    let specific_id = Uuid::new_v4();

    let mut sets = HashMap::new();
    sets.insert(
        generic_id,
        ProductSet { id: generic_id, name: "Promos".into(), series: "Promos".into(), release_date: None },
    );
    sets.insert(
        specific_id,
        ProductSet { id: specific_id, name: "Promos SWSH".into(), series: "Promos".into(), release_date: None },
    );

    let generic_member = resolved("Generic Promo", Some(generic_id), "promo", vec![]);
    let specific_member = resolved("SWSH Promo", Some(specific_id), "promo", vec![]);

    let (groups, ungrouped) = grouper::group_products(&[generic_member, specific_member], &sets);
    assert!(ungrouped.is_empty());

    let generic_group = groups.iter().find(|g| g.set_id == generic_id).unwrap();
    let member = &generic_group.products[0];
    let exclude = member.effective_exclude();
    assert!(exclude.iter().any(|e| e.eq_ignore_ascii_case("promos swsh")));

    // A candidate whose title names the sibling set must be rejected.
    let candidate = Candidate::new("Promos SWSH Exclusive Stamp", "/p", 0.0);
    assert!(navigator::score_candidate(candidate, &member.product.phrases[0], &exclude).is_none());
}

// --- scenario 3: notification suppression and reset across cycles ---------

fn result(product_id: Uuid, shop_id: Uuid, price: Option<f64>, is_available: bool) -> price_scan_core::models::result::ExtractionResult {
    price_scan_core::models::result::ExtractionResult {
        product_id,
        shop_id,
        product_url: "https://shop.test/p".into(),
        price,
        is_available,
        timestamp: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn notification_suppresses_then_resets_across_five_cycles() {
    let store = InMemoryStore::new();
    let user = Uuid::new_v4();
    let product_id = Uuid::new_v4();
    let shop_id = Uuid::new_v4();

    store.watchers.write().push(WatchEntry { user_id: user, product_id, max_price: 100.0, is_active: true });
    store.targets.write().insert(
        user,
        NotificationTarget { user_id: user, channel_id: Some("chan".into()), display_name: "U".into() },
    );

    let (dispatcher, _subscribed) = Dispatcher::preload_for_cycle(store.as_ref(), &[product_id]).await.unwrap();
    let state = NotificationStateService::from_loaded(vec![]);
    let shop = shop(None);
    let mut product = Product::new("Watched Item");
    product.id = product_id;

    // Cycle 1: first sighting at 80, available -> notifies.
    dispatcher.process_result(&product, &shop, &result(product_id, shop_id, Some(80.0), true), &state);
    dispatcher.flush_notifications(store.as_ref(), &state).await.unwrap();
    assert_eq!(store.notifications.read().len(), 1);

    // Cycle 2: unchanged -> suppressed, no new notification.
    dispatcher.process_result(&product, &shop, &result(product_id, shop_id, Some(80.0), true), &state);
    dispatcher.flush_notifications(store.as_ref(), &state).await.unwrap();
    assert_eq!(store.notifications.read().len(), 1);

    // Cycle 3: stockout resets tracked state; unavailable so no notify yet.
    dispatcher.process_result(&product, &shop, &result(product_id, shop_id, Some(80.0), false), &state);
    dispatcher.flush_notifications(store.as_ref(), &state).await.unwrap();
    assert_eq!(store.notifications.read().len(), 1);
    assert!(state.should_notify(user, product_id, shop_id));

    // Cycle 4: back in stock at a lower price -> notifies again.
    dispatcher.process_result(&product, &shop, &result(product_id, shop_id, Some(75.0), true), &state);
    dispatcher.flush_notifications(store.as_ref(), &state).await.unwrap();
    assert_eq!(store.notifications.read().len(), 2);

    // Cycle 5: price increase from the last alerted price resets and
    // notifies again, even though it's still under the watcher's max.
    dispatcher.process_result(&product, &shop, &result(product_id, shop_id, Some(90.0), true), &state);
    dispatcher.flush_notifications(store.as_ref(), &state).await.unwrap();
    assert_eq!(store.notifications.read().len(), 3);
}

// --- scenario 4: circuit breaker trips on the third failure ---------------

#[tokio::test]
async fn circuit_breaker_trips_on_third_group_failure_and_stops_requests() {
    let shop = shop(None);
    let mut extractor = FakeExtractor::default();

    let mut groups = Vec::new();
    for i in 0..4 {
        let set_id = Uuid::new_v4();
        let phrase = format!("set {i}");
        let search_url = shop.search_url(&phrase);
        extractor.fail_urls.insert(search_url);

        let product = resolved(&format!("Product {i}"), Some(set_id), &phrase, vec![]);
        groups.push(SetGroup {
            set_id,
            search_phrase: phrase,
            products: vec![GroupedProduct { product, group_exclude: vec![] }],
        });
    }
    let ungrouped = vec![resolved("Loose Item", None, "loose item", vec![])];

    let breaker = CircuitBreaker::new(3);
    let work = runner::run_phase_one(&mut extractor, shop.id, &shop, &groups, &ungrouped, &breaker).await;

    assert!(breaker.is_tripped(shop.id));
    assert!(work.iter().all(|w| matches!(w, ProductWork::NotFound(_))));
    // Groups 1-3 triggered a goto each; the tripped 4th group and the
    // ungrouped tail never issued a request.
    assert_eq!(extractor.goto_count, 3);
}

// --- scenario 5: direct-hit rejection below DIRECT_HIT_SCORE ---------------

#[tokio::test]
async fn direct_hit_below_threshold_falls_back_to_candidate_search() {
    let shop = shop(Some(r"/product/\d+"));
    let product = resolved("Surging Sparks Booster Box", None, "surging sparks booster box", vec![]);
    let search_url = shop.search_url("surging sparks booster box");
    let direct_hit_url = "https://shop.test/product/123".to_string();

    let mut extractor = FakeExtractor::default();
    extractor.pages.insert(search_url.clone(), vec![]);
    // goto jumps straight to what looks like a product page...
    extractor.pages.insert(
        direct_hit_url.clone(),
        vec![FakeArticle {
            title: "Surging Sparks Booster Box".into(),
            url: "/products/surging-sparks-booster-box".into(),
            price: Some(119.99),
            available: true,
        }],
    );
    // ...but the title on that page doesn't actually match well.
    extractor
        .direct_hit_titles
        .insert(direct_hit_url.clone(), "Completely Unrelated Item".into());

    // Route goto for the search phrase straight to the "direct hit" URL by
    // making the fake's goto land there — simulate a shop whose search page
    // redirects straight to a product when there's exactly one result.
    struct RedirectingExtractor {
        inner: FakeExtractor,
        redirect_to: String,
        redirect_from: String,
    }

    #[async_trait(?Send)]
    impl Extractor for RedirectingExtractor {
        async fn goto(&mut self, url: &str) -> ScanResult<()> {
            if url == self.redirect_from {
                self.inner.goto(&self.redirect_to).await
            } else {
                self.inner.goto(url).await
            }
        }
        fn current_url(&self) -> &str {
            self.inner.current_url()
        }
        async fn extract_one(&mut self, selector: &ShopSelector) -> ScanResult<Option<String>> {
            self.inner.extract_one(selector).await
        }
        async fn extract_many(&mut self, selector: &ShopSelector) -> ScanResult<Vec<Box<dyn Element>>> {
            self.inner.extract_many(selector).await
        }
        async fn exists(&mut self, selector: &ShopSelector) -> ScanResult<bool> {
            self.inner.exists(selector).await
        }
        async fn close(&mut self) -> ScanResult<()> {
            self.inner.close().await
        }
    }

    let mut extractor = RedirectingExtractor {
        inner: extractor,
        redirect_to: direct_hit_url.clone(),
        redirect_from: search_url,
    };

    let navigation = navigator::navigate_for_product(&mut extractor, &shop, &product).await.unwrap();
    let navigation = navigation.expect("should fall back to the candidate match on the same page");
    assert!(!navigation.is_direct_hit);
    assert_eq!(navigation.url, "https://shop.test/products/surging-sparks-booster-box");
}

// --- scenario 6: retry with backoff (429 -> 500 -> 200) --------------------

async fn respond(stream: &mut tokio::net::TcpStream, response: &str) {
    let mut buf = [0u8; 1024];
    // Drain the request so the client doesn't see a reset before reading.
    let _ = stream.read(&mut buf).await;
    stream.write_all(response.as_bytes()).await.unwrap();
    stream.shutdown().await.unwrap();
}

#[tokio::test]
async fn retry_with_backoff_recovers_after_429_then_500() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let responses = [
            "HTTP/1.1 429 Too Many Requests\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 13\r\nConnection: close\r\n\r\n<html></html>",
        ];
        for response in responses {
            let (mut stream, _) = listener.accept().await.unwrap();
            respond(&mut stream, response).await;
        }
    });

    let mut extractor = StaticExtractor::new(AntiBotConfig::default(), 2).unwrap();
    let url = format!("http://{addr}/search");

    let start = Instant::now();
    extractor.goto(&url).await.unwrap();
    let elapsed = start.elapsed();

    // backoff_delay(2) = 2s before the 500 retry, backoff_delay(3) = 5s
    // before the eventual 200.
    assert!(elapsed >= Duration::from_secs(7), "elapsed was only {elapsed:?}");
}
