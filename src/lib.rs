//! # PrimeSelect
//!
//! Memoized selectors that only recompute when their dependencies change.
//!
//! ## Features
//!
//! - **Dependency tracking**: Each selector extracts a dependency list from its
//!   arguments and recomputes only when that list changes
//! - **Shallow or deep validation**: Compare containers by reference or by
//!   contents, chosen per selector
//! - **Sub-caches**: Give a call its own cache bucket so unrelated callers stop
//!   evicting each other's single cached result
//! - **Memory metrics**: Approximate retained bytes per cell, ranked across the
//!   registry
//! - **Recomputation diagnostics**: Field-level diffs of what changed, routed
//!   to `tracing` or to your own sink
//! - **Thread-safe**: Cells are locked with `parking_lot`, the registry is a
//!   `DashMap`
//!
//! ## Quick Start
//!
//! ```rust
//! use primeselect::{PrimeSelect, Value};
//!
//! let ctx = PrimeSelect::new();
//! let square = ctx
//!     .create_selector("square", |n: &i64| vec![Value::from(*n)], |n: &i64| n * n)
//!     .unwrap();
//!
//! // First call computes the result
//! assert_eq!(*square.select(&4).unwrap(), 16);
//! // Same dependencies: cached result, no compute
//! assert_eq!(*square.select(&4).unwrap(), 16);
//! // Different dependencies: recompute
//! assert_eq!(*square.select(&5).unwrap(), 25);
//! ```
//!
//! ## Deep Validation
//!
//! Containers in a [`Value`] are shared and mutable in place. Shallow
//! validation compares them by reference, so an in-place change goes
//! unnoticed; deep validation compares contents:
//!
//! ```rust
//! use primeselect::{PrimeSelect, ValidationStrategy, Value};
//!
//! let ctx = PrimeSelect::new();
//! let count = ctx
//!     .selector("count")
//!     .validation(ValidationStrategy::Deep)
//!     .build(
//!         |items: &Value| vec![items.clone()],
//!         |items: &Value| items.as_list().map_or(0, |list| list.read().len()),
//!     )
//!     .unwrap();
//!
//! let items = Value::list([1, 2]);
//! assert_eq!(*count.select(&items).unwrap(), 2);
//! items.as_list().unwrap().write().push(Value::from(3));
//! assert_eq!(*count.select(&items).unwrap(), 3);
//! ```
//!
//! ## Sub-caches
//!
//! ```rust
//! use primeselect::{PrimeSelect, SelectOptions, Value};
//!
//! let ctx = PrimeSelect::new();
//! let double = ctx
//!     .create_selector("double", |n: &i64| vec![Value::from(*n)], |n: &i64| n * 2)
//!     .unwrap();
//!
//! double.select_with(&1, SelectOptions::new().sub_cache("left")).unwrap();
//! double.select_with(&2, SelectOptions::new().sub_cache("right")).unwrap();
//! // Both buckets keep their own result.
//! assert_eq!(ctx.overall_metrics().total_selectors, 3);
//! ```
//!
//! ## Process-wide Context
//!
//! Most code should create and pass its own [`PrimeSelect`]. For applications
//! that want a single shared registry, [`global()`] and the free functions in
//! this crate operate on a lazily created process-wide context.
//!
//! ```rust
//! use primeselect::{ConfigUpdate, Value};
//!
//! primeselect::set_config(ConfigUpdate::new().is_production(true));
//! let halve = primeselect::create_selector(
//!     "docs::halve",
//!     |n: &i64| vec![Value::from(*n)],
//!     |n: &i64| n / 2,
//! )
//! .unwrap();
//! assert_eq!(*halve.select(&10).unwrap(), 5);
//! primeselect::clear_cache(Some("docs::halve")).unwrap();
//! ```

use once_cell::sync::Lazy;

pub use primeselect_core::*;

static GLOBAL: Lazy<PrimeSelect> = Lazy::new(PrimeSelect::new);

/// The process-wide context, created on first use.
pub fn global() -> &'static PrimeSelect {
    &GLOBAL
}

/// Updates the process-wide configuration. Last write wins.
pub fn set_config(update: ConfigUpdate) {
    global().set_config(update);
}

/// Creates a shallow-validated selector in the process-wide context.
///
/// # Errors
///
/// * [`PrimeSelectError::InvalidName`] for an empty name
/// * [`PrimeSelectError::NameConflict`] if the name is taken
pub fn create_selector<A, R, D, C>(
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
    global().create_selector(name, dependency, compute)
}

/// Starts configuring a selector in the process-wide context.
pub fn selector(name: impl Into<String>) -> SelectorBuilder {
    global().selector(name)
}

/// Metrics for one selector's main cell, or for the whole process-wide registry.
pub fn get_metrics(name: Option<&str>) -> Result<Metrics> {
    global().get_metrics(name)
}

/// Clears one selector's main cell, or every cell when `name` is `None`.
///
/// # Errors
///
/// * [`PrimeSelectError::NotFound`] if `name` is not registered
pub fn clear_cache(name: Option<&str>) -> Result<()> {
    match name {
        Some(name) => global().clear_cache(name),
        None => {
            global().clear_all();
            Ok(())
        }
    }
}

/// Clears every cell of the process-wide context.
pub fn perform_global_garbage_collection(verbose: bool) -> GcSummary {
    global().perform_global_garbage_collection(verbose)
}
