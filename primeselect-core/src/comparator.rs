//! # Dependency Comparator
//!
//! Decides whether a stored dependency list still matches a freshly
//! extracted one.
//!
//! - Lists of different length never match and carry no diff.
//! - [`ValidationStrategy::Shallow`] walks slot by slot with [`Value::same`]
//!   and stops at the first mismatch. Cost is O(arity) at worst.
//! - [`ValidationStrategy::Deep`] compares the whole list with
//!   [`Value::deep_equal`]. Cost is O(total structural size).
//! - Two empty lists always match. Telling a cached empty-dependency result
//!   apart from "never computed" is the cache cell's job, not this module's.
//!
//! When diagnostics are requested, a mismatch also reports what changed,
//! using deep-cloned snapshots so the report stays stable if callers keep
//! mutating their containers.

use crate::diff::{deep_diff_all, DeepDiff};
use crate::value::snapshot;
use crate::{ValidationStrategy, Value};

/// One recorded dependency change.
#[derive(Clone, Debug, PartialEq)]
pub struct DependencyDiff {
    /// Previous slot (shallow) or the whole previous list (deep).
    pub previous: Value,
    /// Current slot (shallow) or the whole current list (deep).
    pub current: Value,
    /// Index of the first mismatching slot, shallow mode only.
    pub index: Option<usize>,
    /// Field-level diff, deep mode only.
    pub deep_diff: Option<DeepDiff>,
}

/// Outcome of a validation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Validation {
    pub is_valid: bool,
    /// Empty unless diagnostics were requested and the lists differ.
    pub dependency_diff: Vec<DependencyDiff>,
}

impl Validation {
    fn valid() -> Self {
        Self {
            is_valid: true,
            dependency_diff: Vec::new(),
        }
    }

    fn invalid(dependency_diff: Vec<DependencyDiff>) -> Self {
        Self {
            is_valid: false,
            dependency_diff,
        }
    }
}

/// Compares `previous` against `current` under `strategy`.
///
/// # Examples
///
/// ```
/// use primeselect_core::{validate, ValidationStrategy, Value};
///
/// let config = Value::map([("theme", Value::from("dark"))]);
/// let previous = vec![Value::from(1), config.clone()];
/// let current = vec![Value::from(1), config.deep_clone()];
///
/// // A structurally equal but distinct container is a change for shallow...
/// let shallow = validate(&previous, &current, ValidationStrategy::Shallow, true);
/// assert!(!shallow.is_valid);
/// assert_eq!(shallow.dependency_diff[0].index, Some(1));
///
/// // ...and no change for deep.
/// assert!(validate(&previous, &current, ValidationStrategy::Deep, false).is_valid);
/// ```
pub fn validate(
    previous: &[Value],
    current: &[Value],
    strategy: ValidationStrategy,
    diagnostics: bool,
) -> Validation {
    if previous.len() != current.len() {
        return Validation::invalid(Vec::new());
    }

    match strategy {
        ValidationStrategy::Shallow => {
            let mismatch = previous
                .iter()
                .zip(current)
                .position(|(p, c)| !p.same(c));
            match mismatch {
                None => Validation::valid(),
                Some(index) if diagnostics => Validation::invalid(vec![DependencyDiff {
                    previous: previous[index].deep_clone(),
                    current: current[index].deep_clone(),
                    index: Some(index),
                    deep_diff: None,
                }]),
                Some(_) => Validation::invalid(Vec::new()),
            }
        }
        ValidationStrategy::Deep => {
            if previous.iter().zip(current).all(|(p, c)| p.deep_equal(c)) {
                Validation::valid()
            } else if diagnostics {
                Validation::invalid(vec![DependencyDiff {
                    previous: Value::from(snapshot(previous)),
                    current: Value::from(snapshot(current)),
                    index: None,
                    deep_diff: deep_diff_all(previous, current),
                }])
            } else {
                Validation::invalid(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_mismatch_is_invalid_without_diff() {
        let result = validate(
            &[Value::from(1)],
            &[Value::from(1), Value::from(2)],
            ValidationStrategy::Shallow,
            true,
        );
        assert!(!result.is_valid);
        assert!(result.dependency_diff.is_empty());

        let result = validate(&[], &[Value::from(1)], ValidationStrategy::Deep, true);
        assert!(!result.is_valid);
        assert!(result.dependency_diff.is_empty());
    }

    #[test]
    fn test_empty_lists_are_valid() {
        assert!(validate(&[], &[], ValidationStrategy::Shallow, true).is_valid);
        assert!(validate(&[], &[], ValidationStrategy::Deep, true).is_valid);
    }

    #[test]
    fn test_shallow_reports_first_mismatch_only() {
        let previous = [Value::from(1), Value::from("a"), Value::from(true)];
        let current = [Value::from(1), Value::from("b"), Value::from(false)];

        let result = validate(&previous, &current, ValidationStrategy::Shallow, true);
        assert!(!result.is_valid);
        assert_eq!(result.dependency_diff.len(), 1);
        let diff = &result.dependency_diff[0];
        assert_eq!(diff.index, Some(1));
        assert_eq!(diff.previous, Value::from("a"));
        assert_eq!(diff.current, Value::from("b"));
        assert_eq!(diff.deep_diff, None);
    }

    #[test]
    fn test_shallow_without_diagnostics_has_no_diff() {
        let result = validate(
            &[Value::from(1)],
            &[Value::from(2)],
            ValidationStrategy::Shallow,
            false,
        );
        assert!(!result.is_valid);
        assert!(result.dependency_diff.is_empty());
    }

    #[test]
    fn test_shallow_ignores_in_place_mutation() {
        let list = Value::list([1, 2]);
        let previous = vec![list.clone()];
        list.as_list().unwrap().write().push(Value::from(3));
        let current = vec![list];

        assert!(validate(&previous, &current, ValidationStrategy::Shallow, false).is_valid);
    }

    #[test]
    fn test_deep_compares_contents() {
        let previous = [Value::map([("ids", Value::list([1, 2]))])];
        let same = [Value::map([("ids", Value::list([1, 2]))])];
        let changed = [Value::map([("ids", Value::list([1, 3]))])];

        assert!(validate(&previous, &same, ValidationStrategy::Deep, true).is_valid);

        let result = validate(&previous, &changed, ValidationStrategy::Deep, true);
        assert!(!result.is_valid);
        let diff = &result.dependency_diff[0];
        assert_eq!(diff.index, None);
        assert_eq!(diff.previous, Value::from(previous.to_vec()));
        assert_eq!(diff.current, Value::from(changed.to_vec()));
        assert!(matches!(diff.deep_diff, Some(DeepDiff::Nested(_))));
    }
}
