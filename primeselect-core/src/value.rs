//! # Dependency Values
//!
//! [`Value`] is the element type of a dependency list. Primitives are plain
//! values; lists and maps are shared handles (`Arc<RwLock<..>>`) so a caller
//! can hand the same container to several calls and mutate it in place.
//!
//! That split gives the two comparison modes their meaning:
//!
//! - [`Value::same`] is identity. Primitives compare by value, containers by
//!   pointer. Mutating a container in place keeps it "the same".
//! - [`Value::deep_equal`] is structural. Containers compare by contents.
//!
//! Containers may form cycles. Equality, cloning, diffing, memory estimation
//! and `Debug` output all track visited containers and terminate on cycles.
//!
//! # Examples
//!
//! ```
//! use primeselect_core::Value;
//!
//! let user = Value::map([("name", Value::from("Ada")), ("age", Value::from(36))]);
//! let alias = user.clone();
//! assert!(user.same(&alias));
//!
//! let copy = user.deep_clone();
//! assert!(!user.same(&copy));
//! assert!(user.deep_equal(&copy));
//!
//! user.as_map().unwrap().write().insert("age".to_string(), Value::from(37));
//! assert!(user.same(&alias));
//! assert!(!user.deep_equal(&copy));
//! ```

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Shared, mutable list container.
pub type SharedList = Arc<RwLock<Vec<Value>>>;

/// Shared, mutable string-keyed map container.
pub type SharedMap = Arc<RwLock<BTreeMap<String, Value>>>;

/// A single dependency slot.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(SharedList),
    Map(SharedMap),
}

impl Value {
    /// Creates a new list container from the given items.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::List(Arc::new(RwLock::new(
            items.into_iter().map(Into::into).collect(),
        )))
    }

    /// Creates a new map container from the given entries.
    pub fn map<I, K, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<Value>,
    {
        Value::Map(Arc::new(RwLock::new(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the numeric value of `Int` and `Float` slots.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&SharedList> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&SharedMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Address of the container allocation, `None` for primitives.
    pub(crate) fn container_addr(&self) -> Option<usize> {
        match self {
            Value::List(list) => Some(Arc::as_ptr(list) as usize),
            Value::Map(map) => Some(Arc::as_ptr(map) as usize),
            _ => None,
        }
    }

    /// Identity comparison used by shallow validation.
    ///
    /// Primitives compare by value (`Int(1)` and `Float(1.0)` are the same
    /// number, `NaN` is never the same as anything). Containers are the same
    /// only when both slots hold the same allocation.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_f64() == other.as_f64()
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Structural equality used by deep validation.
    ///
    /// Lists are order-sensitive, maps compare their key sets and values,
    /// `NaN` equals `NaN`. A pair of containers reached again while it is
    /// still being compared is treated as equal, which terminates cycles.
    pub fn deep_equal(&self, other: &Value) -> bool {
        let mut comparing = Vec::new();
        deep_equal_inner(self, other, &mut comparing)
    }

    /// Produces a fully independent copy.
    ///
    /// Containers reached more than once (shared sub-structure or cycles) are
    /// copied once and the copy is shared the same way.
    pub fn deep_clone(&self) -> Value {
        let mut copies = HashMap::new();
        self.deep_clone_inner(&mut copies)
    }

    fn deep_clone_inner(&self, copies: &mut HashMap<usize, Value>) -> Value {
        match self {
            Value::List(list) => {
                let addr = Arc::as_ptr(list) as usize;
                if let Some(copy) = copies.get(&addr) {
                    return copy.clone();
                }
                let copy: SharedList = Arc::new(RwLock::new(Vec::new()));
                copies.insert(addr, Value::List(Arc::clone(&copy)));
                let items: Vec<Value> = list
                    .read_recursive()
                    .iter()
                    .map(|item| item.deep_clone_inner(copies))
                    .collect();
                *copy.write() = items;
                Value::List(copy)
            }
            Value::Map(map) => {
                let addr = Arc::as_ptr(map) as usize;
                if let Some(copy) = copies.get(&addr) {
                    return copy.clone();
                }
                let copy: SharedMap = Arc::new(RwLock::new(BTreeMap::new()));
                copies.insert(addr, Value::Map(Arc::clone(&copy)));
                let entries: BTreeMap<String, Value> = map
                    .read_recursive()
                    .iter()
                    .map(|(key, value)| (key.clone(), value.deep_clone_inner(copies)))
                    .collect();
                *copy.write() = entries;
                Value::Map(copy)
            }
            primitive => primitive.clone(),
        }
    }

    fn fmt_inner(&self, f: &mut fmt::Formatter<'_>, visiting: &mut Vec<usize>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{:?}", &**s),
            Value::List(list) => {
                let addr = Arc::as_ptr(list) as usize;
                if visiting.contains(&addr) {
                    return f.write_str("[Circular]");
                }
                visiting.push(addr);
                f.write_str("[")?;
                for (index, item) in list.read_recursive().iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    item.fmt_inner(f, visiting)?;
                }
                visiting.pop();
                f.write_str("]")
            }
            Value::Map(map) => {
                let addr = Arc::as_ptr(map) as usize;
                if visiting.contains(&addr) {
                    return f.write_str("[Circular]");
                }
                visiting.push(addr);
                f.write_str("{")?;
                for (index, (key, value)) in map.read_recursive().iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key:?}: ")?;
                    value.fmt_inner(f, visiting)?;
                }
                visiting.pop();
                f.write_str("}")
            }
        }
    }
}

fn deep_equal_inner(a: &Value, b: &Value, comparing: &mut Vec<(usize, usize)>) -> bool {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) if x.is_nan() && y.is_nan() => true,
        (Value::List(x), Value::List(y)) => {
            if Arc::ptr_eq(x, y) {
                return true;
            }
            let pair = (Arc::as_ptr(x) as usize, Arc::as_ptr(y) as usize);
            if comparing.contains(&pair) {
                return true;
            }
            let (xs, ys) = (x.read_recursive(), y.read_recursive());
            if xs.len() != ys.len() {
                return false;
            }
            comparing.push(pair);
            let equal = xs
                .iter()
                .zip(ys.iter())
                .all(|(l, r)| deep_equal_inner(l, r, comparing));
            comparing.pop();
            equal
        }
        (Value::Map(x), Value::Map(y)) => {
            if Arc::ptr_eq(x, y) {
                return true;
            }
            let pair = (Arc::as_ptr(x) as usize, Arc::as_ptr(y) as usize);
            if comparing.contains(&pair) {
                return true;
            }
            let (xs, ys) = (x.read_recursive(), y.read_recursive());
            if xs.len() != ys.len() {
                return false;
            }
            comparing.push(pair);
            let equal = xs.iter().all(|(key, l)| {
                ys.get(key)
                    .map_or(false, |r| deep_equal_inner(l, r, comparing))
            });
            comparing.pop();
            equal
        }
        _ => a.same(b),
    }
}

/// Deep-clones a whole dependency list, sharing copies across slots.
pub fn snapshot(values: &[Value]) -> Vec<Value> {
    let mut copies = HashMap::new();
    values
        .iter()
        .map(|value| value.deep_clone_inner(&mut copies))
        .collect()
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.deep_equal(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut visiting = Vec::new();
        self.fmt_inner(f, &mut visiting)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(u: u32) -> Self {
        Value::Int(i64::from(u))
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        i64::try_from(u).map_or(Value::Float(u as f64), Value::Int)
    }
}

impl From<usize> for Value {
    fn from(u: usize) -> Self {
        i64::try_from(u).map_or(Value::Float(u as f64), Value::Int)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f64::from(f))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Arc::new(RwLock::new(items)))
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(Arc::new(RwLock::new(entries)))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
