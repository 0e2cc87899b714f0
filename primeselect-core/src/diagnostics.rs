//! # Recomputation Diagnostics
//!
//! When diagnostics are on for a call that has to recompute, the selector
//! builds a [`RecomputationRecord`] and hands it to the context's
//! [`DiagnosticsSink`]. This is a side channel: it never changes the value a
//! call returns, and a panicking sink is caught and ignored.
//!
//! The default sink is [`TracingSink`]. Any `Fn(&RecomputationRecord)`
//! closure is a sink as well.
//!
//! # Examples
//!
//! ```
//! use primeselect_core::{PrimeSelect, RecomputationRecord, SelectOptions, Value};
//! use std::sync::{Arc, Mutex};
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! let ctx = PrimeSelect::with_sink(move |record: &RecomputationRecord| {
//!     sink.lock().unwrap().push(record.selector.clone());
//! });
//!
//! let echo = ctx
//!     .create_selector("echo", |s: &String| vec![Value::from(s.as_str())], |s: &String| s.clone())
//!     .unwrap();
//! echo.select_with(&"hi".to_string(), SelectOptions::new().recompute_metrics(true))
//!     .unwrap();
//!
//! assert_eq!(*seen.lock().unwrap(), vec!["echo".to_string()]);
//! ```

use std::panic::{self, AssertUnwindSafe};

use crate::comparator::DependencyDiff;

/// Why a call had to run compute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecomputeReason {
    /// The cell had no result yet, or was cleared.
    NeverComputed,
    /// The dependency list no longer matches the stored one.
    DependencyChanged,
}

/// Structured record emitted for one recomputation.
#[derive(Clone, Debug)]
pub struct RecomputationRecord {
    pub selector: String,
    pub sub_cache_id: Option<String>,
    pub reason: RecomputeReason,
    /// Empty when the lists differ in length or the cell was never computed.
    pub dependency_diff: Vec<DependencyDiff>,
}

/// Receiver for recomputation records.
///
/// Records are delivered after the recomputed result has been stored and the
/// cell lock released, so a sink may query metrics or clear caches of the
/// same context. A record is still delivered when compute returns an error.
pub trait DiagnosticsSink: Send + Sync {
    fn record(&self, record: &RecomputationRecord);
}

impl<F> DiagnosticsSink for F
where
    F: Fn(&RecomputationRecord) + Send + Sync,
{
    fn record(&self, record: &RecomputationRecord) {
        self(record)
    }
}

/// Emits every record as a `tracing` debug event with target `primeselect`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn record(&self, record: &RecomputationRecord) {
        tracing::debug!(
            target: "primeselect",
            selector = %record.selector,
            sub_cache_id = ?record.sub_cache_id,
            reason = ?record.reason,
            dependency_diff = ?record.dependency_diff,
            "recomputation"
        );
    }
}

/// Delivers a record on a best-effort basis.
pub(crate) fn dispatch(sink: &dyn DiagnosticsSink, record: &RecomputationRecord) {
    if panic::catch_unwind(AssertUnwindSafe(|| sink.record(record))).is_err() {
        tracing::warn!(
            target: "primeselect",
            selector = %record.selector,
            "diagnostics sink panicked, record dropped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record() -> RecomputationRecord {
        RecomputationRecord {
            selector: "totals".to_string(),
            sub_cache_id: Some("eu".to_string()),
            reason: RecomputeReason::DependencyChanged,
            dependency_diff: Vec::new(),
        }
    }

    #[test]
    fn test_closure_sink_receives_record() {
        let count = AtomicUsize::new(0);
        let sink = |record: &RecomputationRecord| {
            assert_eq!(record.selector, "totals");
            count.fetch_add(1, Ordering::SeqCst);
        };
        dispatch(&sink, &record());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_sink_is_contained() {
        let sink = |_: &RecomputationRecord| panic!("sink failure");
        dispatch(&sink, &record());
    }

    #[test]
    fn test_tracing_sink_without_subscriber() {
        TracingSink.record(&record());
    }
}
