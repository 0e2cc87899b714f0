//! # PrimeSelect Core
//!
//! Engine behind the `primeselect` selector memoization library.
//!
//! A selector binds a *dependency extractor* and a *compute* function. Every
//! call extracts a fresh dependency list, compares it against the list stored
//! in the selector's cache cell and only runs compute when the lists differ.
//!
//! ## Module Organization
//!
//! - [`value`] - Dependency values with shared, interior-mutable containers
//! - [`diff`] - Recursive field-level diff used for recomputation diagnostics
//! - [`comparator`] - Shallow and deep dependency list validation
//! - [`cell`] - The singleton cache cell (one dependency list, one result)
//! - [`registry`] - Named cache registry with lazily created sub-caches
//! - [`selector`] - Selector factory and the memoized call path
//! - [`metrics`] - Retained-memory reports and ranking across the registry
//! - [`context`] - The [`PrimeSelect`] context owning registry, config and sink
//!
//! ## Quick Start
//!
//! ```
//! use primeselect_core::{PrimeSelect, Value};
//!
//! let ctx = PrimeSelect::new();
//! let square = ctx
//!     .create_selector("square", |n: &i64| vec![Value::from(*n)], |n: &i64| n * n)
//!     .unwrap();
//!
//! assert_eq!(*square.select(&4).unwrap(), 16);
//! assert_eq!(*square.select(&4).unwrap(), 16); // served from cache
//! assert_eq!(*square.select(&5).unwrap(), 25);
//! ```
pub mod cell;
pub mod comparator;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod diff;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod selector;
pub mod value;

mod memory_estimator;

#[cfg(feature = "stats")]
mod stats;

pub use cell::{CacheSnapshot, SingletonCache};
pub use comparator::{validate, DependencyDiff, Validation};
pub use config::{ConfigUpdate, PrimeSelectConfig};
pub use context::{GcSummary, PrimeSelect};
pub use diagnostics::{DiagnosticsSink, RecomputationRecord, RecomputeReason, TracingSink};
pub use diff::{deep_diff, DeepDiff};
pub use error::{PrimeSelectError, Result};
pub use memory_estimator::{CacheSize, MemoryEstimator};
pub use metrics::{Metrics, MetricsReport, SelectorMetrics};
pub use registry::{CacheKey, CacheRegistry, CacheSlot, CacheValue};
pub use selector::{SelectOptions, Selector, SelectorBuilder};
pub use value::Value;

#[cfg(feature = "stats")]
pub use stats::CacheStats;

/// How a cache cell decides whether its stored dependency list still matches.
///
/// The strategy is fixed when a selector is created and applies to its main
/// cell and every sub-cache it spawns.
///
/// # Variants
///
/// * `Shallow` - Slot-by-slot identity: primitives by value, containers by
///   reference. Stops at the first mismatching slot.
/// * `Deep` - Full structural equality over the whole list. Containers are
///   compared by contents, so in-place mutation is detected.
///
/// # Examples
///
/// ```
/// use primeselect_core::ValidationStrategy;
///
/// assert_eq!(ValidationStrategy::default(), ValidationStrategy::Shallow);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ValidationStrategy {
    #[default]
    Shallow,
    Deep,
}
