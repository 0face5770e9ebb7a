//! Cycle configuration (spec.md §6 "Environment variables"), loaded from
//! the process environment via `dotenvy` + `config`, matching the
//! teacher's approach of layering env vars over file-backed defaults.

use std::path::PathBuf;

use serde::Deserialize;

use crate::errors::{ScanError, ScanResult};

/// Concurrency and retry knobs for one scan cycle. Every field has a
/// spec-mandated default, so a completely empty environment still
/// produces a runnable configuration (spec.md §4.9, §5, §6).
#[derive(Debug, Clone, Deserialize)]
pub struct CycleConfig {
    /// Shop configs directory (one file per shop, spec.md §6).
    pub shops_dir: PathBuf,

    /// Document-store connection string for the catalog/notification reads
    /// and writes (spec.md §6). A missing value is a fatal configuration
    /// error (spec.md §7 "Fatal").
    pub database_url: String,

    /// `MAX_RETRY_ATTEMPTS` (spec.md §6): default 1 extra attempt, i.e. 2
    /// total attempts.
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,

    /// `SHOP_CONC` (spec.md §4.9, §5): static-cycle shop pool size.
    #[serde(default = "default_shop_conc")]
    pub shop_conc: usize,

    /// `PROD_CONC` (spec.md §4.9, §5): default per-shop product pool size,
    /// overridable per shop via `ShopConfig.anti_bot.max_concurrency_override`.
    #[serde(default = "default_prod_conc")]
    pub prod_conc: usize,

    /// Circuit-breaker consecutive-failure threshold (spec.md §4.8).
    #[serde(default = "default_breaker_threshold")]
    pub breaker_threshold: u32,
}

fn default_max_retry_attempts() -> u32 {
    1
}

fn default_shop_conc() -> usize {
    10
}

fn default_prod_conc() -> usize {
    3
}

fn default_breaker_threshold() -> u32 {
    3
}

impl CycleConfig {
    /// Load from `.env` plus the process environment. `SHOPS_DIR` and
    /// `DATABASE_URL` are required; everything else falls back to its
    /// spec-mandated default (spec.md §6).
    pub fn from_env() -> ScanResult<Self> {
        let _ = dotenvy::dotenv();

        let settings = config::Config::builder()
            .set_default("max_retry_attempts", default_max_retry_attempts() as i64)
            .map_err(config_err)?
            .set_default("shop_conc", default_shop_conc() as i64)
            .map_err(config_err)?
            .set_default("prod_conc", default_prod_conc() as i64)
            .map_err(config_err)?
            .set_default("breaker_threshold", default_breaker_threshold() as i64)
            .map_err(config_err)?
            .add_source(
                config::Environment::default()
                    .try_parsing(true)
                    .with_list_parse_key("none"),
            )
            .build()
            .map_err(config_err)?;

        settings.try_deserialize().map_err(config_err)
    }
}

fn config_err(e: impl std::fmt::Display) -> ScanError {
    ScanError::config(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        assert_eq!(default_max_retry_attempts(), 1);
        assert_eq!(default_shop_conc(), 10);
        assert_eq!(default_prod_conc(), 3);
        assert_eq!(default_breaker_threshold(), 3);
    }
}
