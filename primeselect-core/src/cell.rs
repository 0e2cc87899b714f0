//! # Singleton Cache Cell
//!
//! A [`SingletonCache`] holds exactly one dependency list and at most one
//! result. There is no eviction and no history: a recomputation overwrites
//! both halves together.
//!
//! The result is an `Option`. `None` means "never computed (or cleared)",
//! which keeps a legitimately empty, zero or `false` result cacheable and
//! makes the empty-dependency-list case unambiguous.

use std::fmt::Debug;
use std::sync::Arc;

use crate::comparator::{self, Validation};
use crate::memory_estimator::estimate_values;
use crate::value::snapshot;
use crate::{MemoryEstimator, ValidationStrategy, Value};

/// One dependency list plus one cached result.
///
/// All operations are total; none can fail. Cells are never copied
/// implicitly, [`snapshot`](SingletonCache::snapshot) is the only way to get
/// an independent view of one.
///
/// In [`ValidationStrategy::Deep`] mode the cell keeps a deep-cloned snapshot
/// of every dependency list it is given, so that a caller mutating its own
/// container in place is seen as a change on the next validation.
///
/// # Examples
///
/// ```
/// use primeselect_core::{SingletonCache, ValidationStrategy, Value};
/// use std::sync::Arc;
///
/// let mut cell = SingletonCache::new(ValidationStrategy::Shallow);
/// assert!(cell.validate(&[], false).is_valid);
/// assert!(cell.result().is_none()); // valid deps, but never computed
///
/// cell.store(vec![Value::from(4)], Arc::new(16));
/// assert!(cell.validate(&[Value::from(4)], false).is_valid);
/// assert_eq!(cell.result().as_deref(), Some(&16));
///
/// cell.clear();
/// assert!(!cell.is_populated());
/// ```
pub struct SingletonCache<R> {
    strategy: ValidationStrategy,
    dependency: Vec<Value>,
    result: Option<Arc<R>>,
}

impl<R> SingletonCache<R> {
    pub fn new(strategy: ValidationStrategy) -> Self {
        Self {
            strategy,
            dependency: Vec::new(),
            result: None,
        }
    }

    pub fn strategy(&self) -> ValidationStrategy {
        self.strategy
    }

    pub fn set_dependency(&mut self, dependency: Vec<Value>) {
        self.dependency = self.retain(dependency);
    }

    pub fn dependency(&self) -> &[Value] {
        &self.dependency
    }

    pub fn set_result(&mut self, result: Arc<R>) {
        self.result = Some(result);
    }

    /// The cached result, `None` if the cell was never populated or was cleared.
    pub fn result(&self) -> Option<Arc<R>> {
        self.result.clone()
    }

    pub fn is_populated(&self) -> bool {
        self.result.is_some()
    }

    /// Validates `dependency` against the stored list under the cell's strategy.
    pub fn validate(&self, dependency: &[Value], diagnostics: bool) -> Validation {
        comparator::validate(&self.dependency, dependency, self.strategy, diagnostics)
    }

    /// Replaces dependency list and result in one step.
    pub fn store(&mut self, dependency: Vec<Value>, result: Arc<R>) {
        self.dependency = self.retain(dependency);
        self.result = Some(result);
    }

    /// Resets the cell to its initial, never-computed state.
    pub fn clear(&mut self) {
        self.dependency = Vec::new();
        self.result = None;
    }

    fn retain(&self, dependency: Vec<Value>) -> Vec<Value> {
        match self.strategy {
            ValidationStrategy::Shallow => dependency,
            ValidationStrategy::Deep => snapshot(&dependency),
        }
    }
}

impl<R: MemoryEstimator> SingletonCache<R> {
    /// Approximate bytes retained by the dependency list and the result.
    ///
    /// A cleared or never-populated cell with no dependencies retains 0.
    pub fn retained_bytes(&self) -> usize {
        estimate_values(&self.dependency)
            + self
                .result
                .as_deref()
                .map_or(0, MemoryEstimator::estimate_memory)
    }
}

impl<R: Debug> SingletonCache<R> {
    /// Independent copy of the cell's contents for reporting.
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            dependency: snapshot(&self.dependency),
            result: self.result.as_ref().map(|result| format!("{:?}", result)),
        }
    }
}

impl<R: Debug> Debug for SingletonCache<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingletonCache")
            .field("strategy", &self.strategy)
            .field("dependency", &self.dependency)
            .field("result", &self.result)
            .finish()
    }
}

/// Point-in-time copy of a cell, as carried by metrics.
///
/// The result is rendered with its `Debug` implementation since the registry
/// holds cells of many result types.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CacheSnapshot {
    pub dependency: Vec<Value>,
    pub result: Option<String>,
}
