//! # Context
//!
//! [`PrimeSelect`] owns everything a group of selectors shares: the cache
//! registry, the configuration and the diagnostics sink. It is a cheap,
//! cloneable handle; selectors keep a clone of the context they were built
//! from.
//!
//! There is no hidden global state in this crate. Applications create a
//! context, pass it where selectors are defined and tear it down with
//! [`PrimeSelect::reset`] when needed (tests typically create one context per
//! test).

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use crate::diagnostics::{self, DiagnosticsSink, RecomputationRecord, TracingSink};
use crate::error::Result;
use crate::metrics::{Metrics, MetricsReport, SelectorMetrics};
use crate::registry::{CacheKey, CacheRegistry, CacheValue};
use crate::selector::{Selector, SelectorBuilder};
use crate::{ConfigUpdate, PrimeSelectConfig, Value};

struct Inner {
    registry: CacheRegistry,
    config: RwLock<PrimeSelectConfig>,
    sink: Arc<dyn DiagnosticsSink>,
}

/// Outcome of [`PrimeSelect::perform_global_garbage_collection`].
#[derive(Clone, Debug, Default)]
pub struct GcSummary {
    /// Number of cells reset.
    pub cleared: usize,
    /// Registry report taken before clearing, verbose runs only.
    pub before: Option<MetricsReport>,
    /// Registry report taken after clearing, verbose runs only.
    pub after: Option<MetricsReport>,
}

/// Selector context: registry, configuration and diagnostics sink.
///
/// # Examples
///
/// ```
/// use primeselect_core::{ConfigUpdate, PrimeSelect, SelectOptions, Value};
///
/// let ctx = PrimeSelect::new();
/// ctx.set_config(ConfigUpdate::new().is_production(true));
///
/// let greet = ctx
///     .create_selector(
///         "greet",
///         |name: &String| vec![Value::from(name.as_str())],
///         |name: &String| format!("Hello, {name}!"),
///     )
///     .unwrap();
///
/// let ada = "Ada".to_string();
/// assert_eq!(*greet.select(&ada).unwrap(), "Hello, Ada!");
/// greet.select_with(&ada, SelectOptions::new().sub_cache("ada")).unwrap();
///
/// assert_eq!(ctx.overall_metrics().total_selectors, 2);
/// ctx.clear_all();
/// assert_eq!(ctx.overall_metrics().cache_size.bytes, 0);
/// ```
#[derive(Clone)]
pub struct PrimeSelect {
    inner: Arc<Inner>,
}

impl PrimeSelect {
    /// Creates an empty context with default config, logging through `tracing`.
    pub fn new() -> Self {
        Self::with_sink(TracingSink)
    }

    /// Creates an empty context delivering recomputation records to `sink`.
    pub fn with_sink(sink: impl DiagnosticsSink + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: CacheRegistry::new(),
                config: RwLock::new(PrimeSelectConfig::default()),
                sink: Arc::new(sink),
            }),
        }
    }

    /// Applies a partial configuration update. Last write wins.
    pub fn set_config(&self, update: ConfigUpdate) {
        self.inner.config.write().apply(update);
    }

    pub fn config(&self) -> PrimeSelectConfig {
        *self.inner.config.read()
    }

    pub fn registry(&self) -> &CacheRegistry {
        &self.inner.registry
    }

    /// Starts configuring a selector named `name`.
    pub fn selector(&self, name: impl Into<String>) -> SelectorBuilder {
        SelectorBuilder::new(self, name)
    }

    /// Creates a shallow-validated selector with default diagnostics.
    ///
    /// # Errors
    ///
    /// * [`PrimeSelectError::InvalidName`](crate::PrimeSelectError::InvalidName) for an empty name
    /// * [`PrimeSelectError::NameConflict`](crate::PrimeSelectError::NameConflict) if the name is taken
    pub fn create_selector<A, R, D, C>(
        &self,
        name: impl Into<String>,
        dependency: D,
        compute: C,
    ) -> Result<Selector<A, R>>
    where
        A: ?Sized,
        R: CacheValue,
        D: Fn(&A) -> Vec<Value> + Send + Sync + 'static,
        C: Fn(&A) -> R + Send + Sync + 'static,
    {
        self.selector(name).build(dependency, compute)
    }

    /// Metrics for one cell.
    ///
    /// # Errors
    ///
    /// * [`PrimeSelectError::NotFound`](crate::PrimeSelectError::NotFound) if nothing is registered under `key`
    pub fn metrics(&self, key: impl Into<CacheKey>) -> Result<SelectorMetrics> {
        self.inner.registry.metrics(&key.into())
    }

    /// Metrics for every cell in the context.
    pub fn overall_metrics(&self) -> MetricsReport {
        self.inner.registry.overall_metrics()
    }

    /// Metrics for a named selector's main cell, or for everything when `name` is `None`.
    pub fn get_metrics(&self, name: Option<&str>) -> Result<Metrics> {
        match name {
            Some(name) => self.metrics(name).map(Metrics::Selector),
            None => Ok(Metrics::Overall(self.overall_metrics())),
        }
    }

    /// Resets one cell (main or sub-cache) to never-computed.
    ///
    /// # Errors
    ///
    /// * [`PrimeSelectError::NotFound`](crate::PrimeSelectError::NotFound) if nothing is registered under `key`
    pub fn clear_cache(&self, key: impl Into<CacheKey>) -> Result<()> {
        self.inner.registry.clear_one(&key.into())
    }

    /// Resets every cell in place; selectors stay registered.
    pub fn clear_all(&self) -> usize {
        self.inner.registry.clear_all()
    }

    /// Clears every cell, logging registry metrics before and after when `verbose`.
    pub fn perform_global_garbage_collection(&self, verbose: bool) -> GcSummary {
        let before = verbose.then(|| self.overall_metrics());
        if let Some(report) = &before {
            tracing::info!(
                target: "primeselect",
                selectors = report.total_selectors,
                bytes = report.cache_size.bytes,
                largest = ?report.max_cache_usage_selector.as_ref().map(|m| m.key.to_string()),
                "before clearing cache"
            );
            tracing::info!(target: "primeselect", "clearing cache");
        }

        let cleared = self.clear_all();

        let after = verbose.then(|| self.overall_metrics());
        if let Some(report) = &after {
            tracing::info!(
                target: "primeselect",
                selectors = report.total_selectors,
                bytes = report.cache_size.bytes,
                "after clearing cache"
            );
        }

        GcSummary {
            cleared,
            before,
            after,
        }
    }

    /// Tears the context down: drops every cell and selector name.
    ///
    /// Configuration and sink are kept. Selectors built before the reset are
    /// retired and fail with
    /// [`PrimeSelectError::NotFound`](crate::PrimeSelectError::NotFound); the
    /// names are free for new selectors.
    pub fn reset(&self) {
        self.inner.registry.reset();
    }

    pub(crate) fn report(&self, record: &RecomputationRecord) {
        diagnostics::dispatch(self.inner.sink.as_ref(), record);
    }
}

impl Default for PrimeSelect {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PrimeSelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimeSelect")
            .field("config", &self.config())
            .field("registry", &self.inner.registry)
            .finish()
    }
}
