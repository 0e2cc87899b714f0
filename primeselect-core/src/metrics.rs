//! # Metrics
//!
//! Approximate retained memory per cache cell and across a registry.
//!
//! Sizes come from [`MemoryEstimator`](crate::MemoryEstimator): the cell's
//! dependency values (shared containers counted once) plus its result. A
//! cleared cell with no dependencies retains 0 bytes.

use std::cmp::Reverse;

use crate::cell::CacheSnapshot;
use crate::error::{PrimeSelectError, Result};
use crate::registry::{CacheKey, CacheRegistry, ErasedCache};
use crate::CacheSize;

#[cfg(feature = "stats")]
use crate::CacheStats;

/// Metrics for one cell.
#[derive(Clone, Debug)]
pub struct SelectorMetrics {
    pub key: CacheKey,
    pub cache_size: CacheSize,
    /// Independent copy of the cell at the time of the report.
    pub cache: CacheSnapshot,
    #[cfg(feature = "stats")]
    pub stats: CacheStats,
}

impl SelectorMetrics {
    fn collect(key: CacheKey, slot: &dyn ErasedCache) -> Self {
        Self {
            key,
            cache_size: CacheSize::from_bytes(slot.retained_bytes()),
            cache: slot.snapshot(),
            #[cfg(feature = "stats")]
            stats: slot.stats(),
        }
    }
}

/// Metrics across every cell of a registry.
#[derive(Clone, Debug, Default)]
pub struct MetricsReport {
    /// Number of cells, sub-caches included.
    pub total_selectors: usize,
    /// Sum of every cell's size.
    pub cache_size: CacheSize,
    /// The cell retaining the most memory, `None` if the registry is empty
    /// or no cell retains anything.
    pub max_cache_usage_selector: Option<SelectorMetrics>,
    /// Every cell, largest first. Equal sizes are ordered by key.
    pub selectors_ranked: Vec<SelectorMetrics>,
}

/// Answer to a metrics request for one cell or the whole registry.
#[derive(Clone, Debug)]
pub enum Metrics {
    Selector(SelectorMetrics),
    Overall(MetricsReport),
}

impl CacheRegistry {
    /// Metrics for the cell under `key`.
    ///
    /// # Errors
    ///
    /// * [`PrimeSelectError::NotFound`] if nothing is registered under `key`
    pub fn metrics(&self, key: &CacheKey) -> Result<SelectorMetrics> {
        let slot = self
            .get_erased(key)
            .ok_or_else(|| PrimeSelectError::NotFound(key.clone()))?;
        Ok(SelectorMetrics::collect(key.clone(), slot.as_ref()))
    }

    /// Metrics for every cell, ranked by retained size.
    pub fn overall_metrics(&self) -> MetricsReport {
        let mut ranked: Vec<SelectorMetrics> = self
            .entries()
            .into_iter()
            .map(|(key, slot)| SelectorMetrics::collect(key, slot.as_ref()))
            .collect();
        ranked.sort_by(|a, b| {
            Reverse(a.cache_size.bytes)
                .cmp(&Reverse(b.cache_size.bytes))
                .then_with(|| a.key.cmp(&b.key))
        });

        let cache_size = ranked.iter().map(|metrics| metrics.cache_size).sum();
        let max_cache_usage_selector = ranked
            .first()
            .filter(|metrics| metrics.cache_size.bytes > 0)
            .cloned();

        MetricsReport {
            total_selectors: ranked.len(),
            cache_size,
            max_cache_usage_selector,
            selectors_ranked: ranked,
        }
    }
}
