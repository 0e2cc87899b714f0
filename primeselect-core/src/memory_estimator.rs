use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::Value;

/// Trait for estimating the memory retained by a cached result.
///
/// Metrics use it to size every cache cell. Implementations should return
/// the stack size of the value plus whatever it owns on the heap.
///
/// # Default Implementation
///
/// The default implementation uses `std::mem::size_of_val()`, which is exact
/// for plain data. Types owning heap allocations (`String`, `Vec`, maps, ...)
/// should override it.
///
/// # Examples
///
/// ```
/// use primeselect_core::MemoryEstimator;
///
/// #[derive(Debug)]
/// struct Totals {
///     label: String,
///     rows: Vec<u32>,
/// }
///
/// impl MemoryEstimator for Totals {
///     fn estimate_memory(&self) -> usize {
///         std::mem::size_of::<Self>() + self.label.capacity() + self.rows.capacity() * 4
///     }
/// }
///
/// let totals = Totals { label: "q3".to_string(), rows: vec![1, 2, 3] };
/// assert!(totals.estimate_memory() > std::mem::size_of::<Totals>());
/// ```
pub trait MemoryEstimator {
    /// Estimates the total memory size of this value in bytes.
    fn estimate_memory(&self) -> usize {
        std::mem::size_of_val(self)
    }
}

impl MemoryEstimator for i8 {}
impl MemoryEstimator for i16 {}
impl MemoryEstimator for i32 {}
impl MemoryEstimator for i64 {}
impl MemoryEstimator for i128 {}
impl MemoryEstimator for isize {}

impl MemoryEstimator for u8 {}
impl MemoryEstimator for u16 {}
impl MemoryEstimator for u32 {}
impl MemoryEstimator for u64 {}
impl MemoryEstimator for u128 {}
impl MemoryEstimator for usize {}

impl MemoryEstimator for f32 {}
impl MemoryEstimator for f64 {}

impl MemoryEstimator for bool {}
impl MemoryEstimator for char {}

impl MemoryEstimator for () {}

impl MemoryEstimator for String {
    fn estimate_memory(&self) -> usize {
        std::mem::size_of::<Self>() + self.capacity()
    }
}

impl MemoryEstimator for &'static str {
    fn estimate_memory(&self) -> usize {
        std::mem::size_of::<Self>()
    }
}

impl<T: MemoryEstimator> MemoryEstimator for Vec<T> {
    fn estimate_memory(&self) -> usize {
        let base = std::mem::size_of::<Self>();
        let elements: usize = self.iter().map(|item| item.estimate_memory()).sum();
        base + elements
    }
}

impl<T: MemoryEstimator> MemoryEstimator for Option<T> {
    fn estimate_memory(&self) -> usize {
        std::mem::size_of::<Self>()
            + match self {
                Some(val) => val.estimate_memory(),
                None => 0,
            }
    }
}

impl<T, E> MemoryEstimator for Result<T, E>
where
    T: MemoryEstimator,
    E: MemoryEstimator,
{
    fn estimate_memory(&self) -> usize {
        std::mem::size_of::<Self>()
            + match self {
                Ok(val) => val.estimate_memory(),
                Err(err) => err.estimate_memory(),
            }
    }
}

impl<T1, T2> MemoryEstimator for (T1, T2)
where
    T1: MemoryEstimator,
    T2: MemoryEstimator,
{
    fn estimate_memory(&self) -> usize {
        std::mem::size_of::<Self>() + self.0.estimate_memory() + self.1.estimate_memory()
    }
}

impl<T: MemoryEstimator> MemoryEstimator for Box<T> {
    fn estimate_memory(&self) -> usize {
        std::mem::size_of::<Self>() + (**self).estimate_memory()
    }
}

impl<T: MemoryEstimator> MemoryEstimator for Arc<T> {
    fn estimate_memory(&self) -> usize {
        std::mem::size_of::<Self>() + (**self).estimate_memory()
    }
}

impl<K, V> MemoryEstimator for BTreeMap<K, V>
where
    K: MemoryEstimator,
    V: MemoryEstimator,
{
    fn estimate_memory(&self) -> usize {
        std::mem::size_of::<Self>()
            + self
                .iter()
                .map(|(key, value)| key.estimate_memory() + value.estimate_memory())
                .sum::<usize>()
    }
}

impl<K, V, S> MemoryEstimator for HashMap<K, V, S>
where
    K: MemoryEstimator,
    V: MemoryEstimator,
{
    fn estimate_memory(&self) -> usize {
        std::mem::size_of::<Self>()
            + self
                .iter()
                .map(|(key, value)| key.estimate_memory() + value.estimate_memory())
                .sum::<usize>()
    }
}

impl MemoryEstimator for Value {
    fn estimate_memory(&self) -> usize {
        estimate_values(std::slice::from_ref(self))
    }
}

/// Estimates a whole dependency list.
///
/// Containers reachable from several slots (or through cycles) are counted
/// once; later visits only add the size of the slot that points at them.
pub(crate) fn estimate_values(values: &[Value]) -> usize {
    let mut visited = HashSet::new();
    values
        .iter()
        .map(|value| estimate_value(value, &mut visited))
        .sum()
}

fn estimate_value(value: &Value, visited: &mut HashSet<usize>) -> usize {
    let slot = std::mem::size_of::<Value>();
    if let Some(addr) = value.container_addr() {
        if !visited.insert(addr) {
            return slot;
        }
    }
    match value {
        Value::Str(s) => slot + s.len(),
        Value::List(list) => {
            let items = list.read_recursive();
            slot + std::mem::size_of::<RwLock<Vec<Value>>>()
                + items
                    .iter()
                    .map(|item| estimate_value(item, visited))
                    .sum::<usize>()
        }
        Value::Map(map) => {
            let entries = map.read_recursive();
            slot + std::mem::size_of::<RwLock<BTreeMap<String, Value>>>()
                + entries
                    .iter()
                    .map(|(key, item)| key.estimate_memory() + estimate_value(item, visited))
                    .sum::<usize>()
        }
        _ => slot,
    }
}

/// Approximate retained size, in the three units metrics report.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CacheSize {
    pub bytes: usize,
    pub kilobytes: f64,
    pub megabytes: f64,
}

impl CacheSize {
    pub fn from_bytes(bytes: usize) -> Self {
        Self {
            bytes,
            kilobytes: bytes as f64 / 1024.0,
            megabytes: bytes as f64 / 1_048_576.0,
        }
    }
}

impl std::iter::Sum for CacheSize {
    fn sum<I: Iterator<Item = CacheSize>>(iter: I) -> Self {
        CacheSize::from_bytes(iter.map(|size| size.bytes).sum())
    }
}
