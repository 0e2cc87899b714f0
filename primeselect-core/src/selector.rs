//! # Selectors
//!
//! A [`Selector`] is a memoized function. It is built once per name from a
//! dependency extractor and a compute function, and every call goes through
//! the same steps:
//!
//! 1. Pick the cell: the selector's main cell, or the sub-cache named by
//!    [`SelectOptions::sub_cache`] (created on first use).
//! 2. Extract the dependency list from the arguments.
//! 3. Resolve the diagnostics flag: per-call override, then selector default,
//!    then context default; always off in production mode.
//! 4. Validate against the cell. A match on a populated cell returns the
//!    stored result without running compute.
//! 5. Otherwise run compute, store dependency list and result together and
//!    return it. If diagnostics are on, the recomputation record is built
//!    under the cell lock and delivered once the lock is released.
//!
//! Results are returned as `Arc<R>`: repeated hits hand out the very same
//! allocation.
//!
//! # Failures
//!
//! A fallible compute (see [`SelectorBuilder::build_fallible`]) returning
//! `Err` leaves the cell exactly as it was and the error reaches the caller
//! unchanged. A panicking compute unwinds without touching the cell either.
//!
//! # Reentrancy
//!
//! The cell is locked from validation until the new result is stored. A
//! compute function may call other selectors, but must not call back into
//! the same cell, nor request metrics or clear caches of the context.
//! Diagnostics sinks run after the lock is released and may do all of that.
//!
//! # Reset
//!
//! A selector belongs to the registry generation it was registered in. After
//! [`PrimeSelect::reset`] every call on it fails with
//! [`PrimeSelectError::NotFound`]; create the selector again to keep using
//! the name.

use std::fmt;
use std::sync::Arc;

use crate::diagnostics::{RecomputationRecord, RecomputeReason};
use crate::error::{PrimeSelectError, Result};
use crate::registry::{CacheKey, CacheValue};
use crate::{PrimeSelect, ValidationStrategy, Value};

/// Per-call options.
///
/// # Examples
///
/// ```
/// use primeselect_core::SelectOptions;
///
/// let options = SelectOptions::new().sub_cache("user-42").recompute_metrics(true);
/// assert_eq!(options.sub_cache_id, Some("user-42"));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SelectOptions<'a> {
    /// Dedicated cache bucket for this call. An empty id means the main cell.
    pub sub_cache_id: Option<&'a str>,
    /// Overrides the selector and context diagnostics defaults.
    pub recompute_metrics: Option<bool>,
}

impl<'a> SelectOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sub_cache(mut self, sub_cache_id: &'a str) -> Self {
        self.sub_cache_id = Some(sub_cache_id);
        self
    }

    pub fn recompute_metrics(mut self, enabled: bool) -> Self {
        self.recompute_metrics = Some(enabled);
        self
    }
}

/// Configures and registers a [`Selector`].
///
/// # Examples
///
/// ```
/// use primeselect_core::{PrimeSelect, ValidationStrategy, Value};
///
/// let ctx = PrimeSelect::new();
/// let total = ctx
///     .selector("cart-total")
///     .validation(ValidationStrategy::Deep)
///     .build(
///         |cart: &Value| vec![cart.clone()],
///         |cart: &Value| {
///             cart.as_list()
///                 .map(|items| items.read().iter().filter_map(Value::as_i64).sum::<i64>())
///                 .unwrap_or(0)
///         },
///     )
///     .unwrap();
///
/// let cart = Value::list([3, 4]);
/// assert_eq!(*total.select(&cart).unwrap(), 7);
///
/// // Deep validation notices the in-place change.
/// cart.as_list().unwrap().write().push(Value::from(5));
/// assert_eq!(*total.select(&cart).unwrap(), 12);
/// ```
#[derive(Debug)]
pub struct SelectorBuilder {
    context: PrimeSelect,
    name: String,
    validation: ValidationStrategy,
    recompute_metrics: Option<bool>,
}

impl SelectorBuilder {
    pub fn new(context: &PrimeSelect, name: impl Into<String>) -> Self {
        Self {
            context: context.clone(),
            name: name.into(),
            validation: ValidationStrategy::default(),
            recompute_metrics: None,
        }
    }

    /// Validation strategy for the main cell and every sub-cache. Defaults to shallow.
    pub fn validation(mut self, strategy: ValidationStrategy) -> Self {
        self.validation = strategy;
        self
    }

    /// Selector-level diagnostics default.
    pub fn recompute_metrics(mut self, enabled: bool) -> Self {
        self.recompute_metrics = Some(enabled);
        self
    }

    /// Registers a selector with an infallible compute function.
    ///
    /// # Errors
    ///
    /// * [`PrimeSelectError::InvalidName`] for an empty name
    /// * [`PrimeSelectError::NameConflict`] if the name is taken
    pub fn build<A, R, D, C>(self, dependency: D, compute: C) -> Result<Selector<A, R>>
    where
        A: ?Sized,
        R: CacheValue,
        D: Fn(&A) -> Vec<Value> + Send + Sync + 'static,
        C: Fn(&A) -> R + Send + Sync + 'static,
    {
        self.build_fallible(dependency, move |args: &A| Ok(compute(args)))
    }

    /// Registers a selector whose compute function may fail.
    ///
    /// An `Err` from compute is returned to the caller as-is and nothing is
    /// cached for that call.
    pub fn build_fallible<A, R, E, D, C>(
        self,
        dependency: D,
        compute: C,
    ) -> Result<Selector<A, R, E>>
    where
        A: ?Sized,
        R: CacheValue,
        E: From<PrimeSelectError>,
        D: Fn(&A) -> Vec<Value> + Send + Sync + 'static,
        C: Fn(&A) -> std::result::Result<R, E> + Send + Sync + 'static,
    {
        let generation = self
            .context
            .registry()
            .register::<R>(&self.name, self.validation)?
            .generation();
        tracing::trace!(
            target: "primeselect",
            selector = %self.name,
            validation = ?self.validation,
            "selector registered"
        );

        Ok(Selector {
            context: self.context,
            name: self.name,
            generation,
            validation: self.validation,
            recompute_metrics: self.recompute_metrics,
            dependency: Box::new(dependency),
            compute: Box::new(compute),
        })
    }
}

/// A memoized function bound to one name in a [`PrimeSelect`] context.
pub struct Selector<A: ?Sized, R, E = PrimeSelectError> {
    context: PrimeSelect,
    name: String,
    generation: u64,
    validation: ValidationStrategy,
    recompute_metrics: Option<bool>,
    dependency: Box<dyn Fn(&A) -> Vec<Value> + Send + Sync>,
    compute: Box<dyn Fn(&A) -> std::result::Result<R, E> + Send + Sync>,
}

impl<A, R, E> Selector<A, R, E>
where
    A: ?Sized,
    R: CacheValue,
    E: From<PrimeSelectError>,
{
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn validation(&self) -> ValidationStrategy {
        self.validation
    }

    /// Calls the selector against its main cell.
    pub fn select(&self, args: &A) -> std::result::Result<Arc<R>, E> {
        self.select_with(args, SelectOptions::default())
    }

    /// Calls the selector with per-call options.
    pub fn select_with(
        &self,
        args: &A,
        options: SelectOptions<'_>,
    ) -> std::result::Result<Arc<R>, E> {
        let key = self.cache_key(options.sub_cache_id);
        let slot = self
            .context
            .registry()
            .resolve_in::<R>(&key, self.validation, self.generation)?;

        let dependency = (self.dependency)(args);
        let diagnostics = self
            .context
            .config()
            .effective_diagnostics(options.recompute_metrics, self.recompute_metrics);

        let mut cell = slot.lock();
        let validation = cell.validate(&dependency, diagnostics);
        if validation.is_valid {
            if let Some(result) = cell.result() {
                #[cfg(feature = "stats")]
                slot.stats().record_hit();
                tracing::trace!(target: "primeselect", cache = %key, "cache hit");
                return Ok(result);
            }
        }

        #[cfg(feature = "stats")]
        slot.stats().record_miss();

        let record = diagnostics.then(|| RecomputationRecord {
            selector: self.name.clone(),
            sub_cache_id: key.sub_cache_id().map(str::to_string),
            reason: if cell.is_populated() {
                RecomputeReason::DependencyChanged
            } else {
                RecomputeReason::NeverComputed
            },
            dependency_diff: validation.dependency_diff,
        });

        let outcome = (self.compute)(args).map(Arc::new);
        if let Ok(result) = &outcome {
            cell.store(dependency, Arc::clone(result));
        }
        drop(cell);

        if let Some(record) = record {
            self.context.report(&record);
        }
        outcome
    }

    /// Resets the main cell, or the given sub-cache, to never-computed.
    ///
    /// # Errors
    ///
    /// * [`PrimeSelectError::NotFound`] if the cell does not exist or the
    ///   context was reset since this selector was created
    pub fn clear(&self, sub_cache_id: Option<&str>) -> Result<()> {
        let key = self.cache_key(sub_cache_id);
        let registry = self.context.registry();
        if registry.generation() != self.generation {
            return Err(PrimeSelectError::NotFound(key));
        }
        registry.clear_one(&key)
    }

    fn cache_key(&self, sub_cache_id: Option<&str>) -> CacheKey {
        match sub_cache_id {
            Some(id) if !id.is_empty() => CacheKey::sub(self.name.as_str(), id),
            _ => CacheKey::main(self.name.as_str()),
        }
    }
}

impl<A: ?Sized, R, E> fmt::Debug for Selector<A, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("name", &self.name)
            .field("generation", &self.generation)
            .field("validation", &self.validation)
            .field("recompute_metrics", &self.recompute_metrics)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counted<R>(
        counter: &Arc<AtomicUsize>,
        f: impl Fn(&i64) -> R + Send + Sync + 'static,
    ) -> impl Fn(&i64) -> R + Send + Sync + 'static {
        let counter = Arc::clone(counter);
        move |n: &i64| {
            counter.fetch_add(1, Ordering::SeqCst);
            f(n)
        }
    }

    #[test]
    fn test_hits_return_same_allocation() {
        let ctx = PrimeSelect::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let square = ctx
            .create_selector("sq", |n: &i64| vec![Value::from(*n)], counted(&calls, |n| n * n))
            .unwrap();

        let first = square.select(&4).unwrap();
        let second = square.select(&4).unwrap();
        assert_eq!(*first, 16);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_dependencies_compute_once() {
        let ctx = PrimeSelect::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let constant = ctx
            .create_selector("const", |_: &i64| Vec::new(), counted(&calls, |_| 0u8))
            .unwrap();

        assert_eq!(*constant.select(&1).unwrap(), 0);
        assert_eq!(*constant.select(&2).unwrap(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_sub_cache_id_is_main_cell() {
        let ctx = PrimeSelect::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let square = ctx
            .create_selector("sq", |n: &i64| vec![Value::from(*n)], counted(&calls, |n| n * n))
            .unwrap();

        square.select(&3).unwrap();
        square
            .select_with(&3, SelectOptions::new().sub_cache(""))
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.registry().len(), 1);
    }

    #[test]
    fn test_fallible_compute_leaves_cell_untouched() {
        #[derive(Debug, PartialEq)]
        enum ParseError {
            Negative,
            Cache(PrimeSelectError),
        }
        impl From<PrimeSelectError> for ParseError {
            fn from(err: PrimeSelectError) -> Self {
                ParseError::Cache(err)
            }
        }

        let ctx = PrimeSelect::new();
        let sqrt = ctx
            .selector("sqrt")
            .build_fallible(
                |n: &i64| vec![Value::from(*n)],
                |n: &i64| {
                    if *n < 0 {
                        Err(ParseError::Negative)
                    } else {
                        Ok((*n as f64).sqrt())
                    }
                },
            )
            .unwrap();

        assert_eq!(*sqrt.select(&9).unwrap(), 3.0);
        assert_eq!(sqrt.select(&-1).err(), Some(ParseError::Negative));

        let snapshot = ctx.metrics("sqrt").unwrap().cache;
        assert_eq!(snapshot.dependency, vec![Value::from(9)]);
        assert_eq!(snapshot.result.as_deref(), Some("3.0"));
    }

    #[test]
    fn test_panicking_compute_leaves_cell_untouched() {
        let ctx = PrimeSelect::new();
        let checked = ctx
            .create_selector(
                "checked",
                |n: &i64| vec![Value::from(*n)],
                |n: &i64| {
                    assert!(*n >= 0, "negative input");
                    *n
                },
            )
            .unwrap();

        checked.select(&5).unwrap();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| checked.select(&-5)));
        assert!(outcome.is_err());

        let snapshot = ctx.metrics("checked").unwrap().cache;
        assert_eq!(snapshot.dependency, vec![Value::from(5)]);
        assert_eq!(*checked.select(&5).unwrap(), 5);
    }

    #[test]
    fn test_selector_from_before_reset_is_retired() {
        let ctx = PrimeSelect::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let old = ctx
            .create_selector("a", |n: &i64| vec![Value::from(*n)], counted(&calls, |n| n * n))
            .unwrap();
        old.select(&4).unwrap();

        ctx.reset();
        let new = ctx
            .create_selector("a", |n: &i64| vec![Value::from(*n)], |n: &i64| n + 1)
            .unwrap();

        assert_eq!(
            old.select(&4).err(),
            Some(PrimeSelectError::NotFound(CacheKey::main("a")))
        );
        assert_eq!(*new.select(&4).unwrap(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            old.clear(None),
            Err(PrimeSelectError::NotFound(CacheKey::main("a")))
        );
        assert_eq!(*new.select(&4).unwrap(), 5);
    }

    #[test]
    fn test_retired_selector_cannot_leak_sub_caches() {
        let ctx = PrimeSelect::new();
        let old = ctx
            .create_selector("b", |n: &i64| vec![Value::from(*n)], |n: &i64| n * n)
            .unwrap();

        ctx.reset();
        let sub = SelectOptions::new().sub_cache("x");
        assert_eq!(
            old.select_with(&4, sub).err(),
            Some(PrimeSelectError::NotFound(CacheKey::sub("b", "x")))
        );
        assert!(ctx.registry().is_empty());

        let new = ctx
            .create_selector("b", |n: &i64| vec![Value::from(*n)], |n: &i64| n + 1)
            .unwrap();
        assert_eq!(*new.select_with(&4, sub).unwrap(), 5);
    }

    #[test]
    fn test_unsized_arguments() {
        let ctx = PrimeSelect::new();
        let length = ctx
            .create_selector("len", |s: &str| vec![Value::from(s)], |s: &str| s.len())
            .unwrap();
        assert_eq!(*length.select("four").unwrap(), 4);
    }

    #[cfg(feature = "stats")]
    #[test]
    fn test_stats_count_hits_and_misses() {
        let ctx = PrimeSelect::new();
        let square = ctx
            .create_selector("sq", |n: &i64| vec![Value::from(*n)], |n: &i64| n * n)
            .unwrap();
        square.select(&2).unwrap();
        square.select(&2).unwrap();
        square.select(&3).unwrap();

        let stats = ctx.metrics("sq").unwrap().stats;
        assert_eq!(stats.hits(), 1);
        assert_eq!(stats.misses(), 2);
    }
}
