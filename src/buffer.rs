//! Result buffer (spec.md §4.10, Component J): an append-only, cycle-scoped
//! buffer of `ExtractionResult`s with a single bulk hourly-bucket upsert at
//! flush. Guarded by a `parking_lot::RwLock` per §5 ("guard with a mutex or
//! a single-writer message bus; no lock is held across a `goto`").

use parking_lot::RwLock;

use crate::errors::ScanResult;
use crate::models::result::ExtractionResult;
use crate::store::ResultStore;

pub struct ResultBuffer {
    results: RwLock<Vec<ExtractionResult>>,
}

impl ResultBuffer {
    pub fn new() -> Self {
        Self { results: RwLock::new(Vec::new()) }
    }

    pub fn size(&self) -> usize {
        self.results.read().len()
    }

    /// Append a result. Only "found" results are meant to reach the buffer
    /// (spec.md §9 "State persistence of not found") — callers are
    /// responsible for filtering before calling `add`.
    pub fn add(&self, result: ExtractionResult) {
        self.results.write().push(result);
    }

    /// A read-only view for tests and baselines (spec.md §9 "expose a
    /// read-only `snapshot()`").
    pub fn snapshot(&self) -> Vec<ExtractionResult> {
        self.results.read().clone()
    }

    pub fn clear(&self) {
        self.results.write().clear();
    }

    /// Single bulk hourly-bucket upsert (spec.md §4.10, §6), then clear.
    pub async fn flush(&self, store: &dyn ResultStore) -> ScanResult<()> {
        let results = self.snapshot();
        if !results.is_empty() {
            store.upsert_hourly(&results).await?;
        }
        self.clear();
        Ok(())
    }
}

impl Default for ResultBuffer {
    fn default() -> Self {
        Self::new()
    }
}
