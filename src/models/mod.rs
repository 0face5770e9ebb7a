//! Domain models for the price-scan core.
//!
//! This module contains the entities defined in spec.md §3: the catalog
//! (products, product types, sets), shop configuration and selectors, the
//! search/extraction intermediates (candidates, set groups, extraction
//! results), and the per-user watch/notification state.

pub mod candidate;
pub mod notification;
pub mod product;
pub mod result;
pub mod shop;
pub mod user;

pub use candidate::{Candidate, SearchPageData, SetGroup};
pub use notification::{Notification, NotificationPayload, NotificationState, NotificationStatus};
pub use product::{Product, ProductSet, ProductType, ResolvedProduct, SearchOverride};
pub use result::ExtractionResult;
pub use shop::{
    AntiBotConfig, EngineKind, ExtractMode, SelectorBundle, SelectorKind, ShopConfig, ShopSelector,
};
pub use user::{NotificationTarget, WatchEntry};
