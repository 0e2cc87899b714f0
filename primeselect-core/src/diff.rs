//! Recursive field-level diff between two dependency values.
//!
//! Only used for recomputation diagnostics, never for validation itself.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::Value;

/// Where and how two values differ.
#[derive(Clone, Debug, PartialEq)]
pub enum DeepDiff {
    /// The value at this position was replaced. `None` marks a side on which
    /// the key or index does not exist.
    Changed {
        previous: Option<Value>,
        current: Option<Value>,
    },
    /// Both sides are containers of the same kind; holds only the keys that
    /// differ. List indices are rendered as decimal keys.
    Nested(BTreeMap<String, DeepDiff>),
}

impl DeepDiff {
    fn changed(previous: Option<&Value>, current: Option<&Value>) -> Self {
        DeepDiff::Changed {
            previous: previous.map(Value::deep_clone),
            current: current.map(Value::deep_clone),
        }
    }
}

/// Diffs two values, returning `None` when they are deep-equal.
///
/// # Examples
///
/// ```
/// use primeselect_core::{deep_diff, DeepDiff, Value};
///
/// let before = Value::map([("name", Value::from("Ada")), ("age", Value::from(36))]);
/// let after = Value::map([("name", Value::from("Ada")), ("age", Value::from(37))]);
///
/// let Some(DeepDiff::Nested(fields)) = deep_diff(&before, &after) else {
///     panic!("expected a nested diff");
/// };
/// assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["age"]);
/// ```
pub fn deep_diff(previous: &Value, current: &Value) -> Option<DeepDiff> {
    let mut diffing = Vec::new();
    diff_inner(previous, current, &mut diffing)
}

/// Diffs two whole dependency lists as if they were list values.
pub fn deep_diff_all(previous: &[Value], current: &[Value]) -> Option<DeepDiff> {
    let mut diffing = Vec::new();
    let fields = diff_sequence(previous, current, &mut diffing);
    if fields.is_empty() {
        None
    } else {
        Some(DeepDiff::Nested(fields))
    }
}

fn diff_inner(
    previous: &Value,
    current: &Value,
    diffing: &mut Vec<(usize, usize)>,
) -> Option<DeepDiff> {
    if previous.deep_equal(current) {
        return None;
    }
    match (previous, current) {
        (Value::List(p), Value::List(c)) => {
            let pair = (Arc::as_ptr(p) as usize, Arc::as_ptr(c) as usize);
            if diffing.contains(&pair) {
                return None;
            }
            diffing.push(pair);
            let fields = diff_sequence(&p.read_recursive(), &c.read_recursive(), diffing);
            diffing.pop();
            Some(DeepDiff::Nested(fields))
        }
        (Value::Map(p), Value::Map(c)) => {
            let pair = (Arc::as_ptr(p) as usize, Arc::as_ptr(c) as usize);
            if diffing.contains(&pair) {
                return None;
            }
            diffing.push(pair);
            let (ps, cs) = (p.read_recursive(), c.read_recursive());
            let keys: BTreeSet<&String> = ps.keys().chain(cs.keys()).collect();
            let fields = keys
                .into_iter()
                .filter_map(|key| {
                    diff_slot(ps.get(key), cs.get(key), diffing).map(|diff| (key.clone(), diff))
                })
                .collect();
            diffing.pop();
            Some(DeepDiff::Nested(fields))
        }
        _ => Some(DeepDiff::changed(Some(previous), Some(current))),
    }
}

fn diff_sequence(
    previous: &[Value],
    current: &[Value],
    diffing: &mut Vec<(usize, usize)>,
) -> BTreeMap<String, DeepDiff> {
    (0..previous.len().max(current.len()))
        .filter_map(|index| {
            diff_slot(previous.get(index), current.get(index), diffing)
                .map(|diff| (index.to_string(), diff))
        })
        .collect()
}

fn diff_slot(
    previous: Option<&Value>,
    current: Option<&Value>,
    diffing: &mut Vec<(usize, usize)>,
) -> Option<DeepDiff> {
    match (previous, current) {
        (Some(p), Some(c)) => diff_inner(p, c, diffing),
        (p, c) => Some(DeepDiff::changed(p, c)),
    }
}
