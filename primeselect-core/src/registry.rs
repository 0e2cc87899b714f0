//! # Cache Registry
//!
//! Maps a [`CacheKey`] to the cache slot that serves it.
//!
//! - A selector's *main* cell lives under [`CacheKey::Main`] and is created
//!   when the selector is registered.
//! - Sub-caches live under [`CacheKey::Sub`] and are created lazily the first
//!   time a call names them. They share the selector's validation strategy
//!   but are otherwise independent of the main cell.
//!
//! Keys are an enum rather than a joined string, so no `(name, sub_cache_id)`
//! pair can collide with another pair or with a plain selector name.
//!
//! The map itself is a [`DashMap`]. Slots are stored type-erased and
//! downcast back to `CacheSlot<R>` by the selector that owns them, the only
//! place that knows `R`.
//!
//! # Generations
//!
//! Every slot records the registry generation it was created in, and
//! [`CacheRegistry::reset`] starts a new generation. A selector remembers the
//! generation of its registration and only ever resolves slots from that
//! generation, so a selector built before a reset can never reach the cells of
//! a selector registered afterwards under the same name.
//!
//! # Locking
//!
//! Each slot owns a `parking_lot::Mutex` around its cell. Selectors hold it
//! from validation through compute to store, so a cell's dependency list and
//! result always belong together. Operations spanning the registry (clearing
//! everything, metrics) first copy the slot handles out of the map and only
//! then lock cells one by one, never holding a map shard and a cell at once.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use std::any::Any;
use std::fmt::{self, Debug, Display};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::cell::{CacheSnapshot, SingletonCache};
use crate::error::{PrimeSelectError, Result};
use crate::{MemoryEstimator, ValidationStrategy};

#[cfg(feature = "stats")]
use crate::CacheStats;

/// Identifies one cache cell.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheKey {
    /// The main cell of a selector.
    Main(String),
    /// A dedicated sub-cache of a selector.
    Sub { name: String, sub_cache_id: String },
}

impl CacheKey {
    pub fn main(name: impl Into<String>) -> Self {
        CacheKey::Main(name.into())
    }

    pub fn sub(name: impl Into<String>, sub_cache_id: impl Into<String>) -> Self {
        CacheKey::Sub {
            name: name.into(),
            sub_cache_id: sub_cache_id.into(),
        }
    }

    /// Name of the owning selector.
    pub fn name(&self) -> &str {
        match self {
            CacheKey::Main(name) | CacheKey::Sub { name, .. } => name,
        }
    }

    pub fn sub_cache_id(&self) -> Option<&str> {
        match self {
            CacheKey::Main(_) => None,
            CacheKey::Sub { sub_cache_id, .. } => Some(sub_cache_id),
        }
    }
}

// Human-readable only; never used to look anything up.
impl Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Main(name) => f.write_str(name),
            CacheKey::Sub { name, sub_cache_id } => write!(f, "{name}[{sub_cache_id}]"),
        }
    }
}

impl From<&str> for CacheKey {
    fn from(name: &str) -> Self {
        CacheKey::main(name)
    }
}

impl From<String> for CacheKey {
    fn from(name: String) -> Self {
        CacheKey::Main(name)
    }
}

impl From<&CacheKey> for CacheKey {
    fn from(key: &CacheKey) -> Self {
        key.clone()
    }
}

/// Bounds every cached result type must meet.
pub trait CacheValue: MemoryEstimator + Debug + Send + Sync + 'static {}

impl<T> CacheValue for T where T: MemoryEstimator + Debug + Send + Sync + 'static {}

/// A cell plus its lock and counters, as stored in the registry.
pub struct CacheSlot<R> {
    generation: u64,
    strategy: ValidationStrategy,
    cell: Mutex<SingletonCache<R>>,
    #[cfg(feature = "stats")]
    stats: CacheStats,
}

impl<R> CacheSlot<R> {
    pub fn new(strategy: ValidationStrategy, generation: u64) -> Self {
        Self {
            generation,
            strategy,
            cell: Mutex::new(SingletonCache::new(strategy)),
            #[cfg(feature = "stats")]
            stats: CacheStats::new(),
        }
    }

    pub fn strategy(&self) -> ValidationStrategy {
        self.strategy
    }

    /// Registry generation this slot was created in.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Locks the cell. The lock is not reentrant.
    pub fn lock(&self) -> MutexGuard<'_, SingletonCache<R>> {
        self.cell.lock()
    }

    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

/// Type-erased view of a slot, for operations that do not need `R`.
pub(crate) trait ErasedCache: Send + Sync {
    fn generation(&self) -> u64;
    fn strategy(&self) -> ValidationStrategy;
    fn clear(&self);
    fn retained_bytes(&self) -> usize;
    fn snapshot(&self) -> CacheSnapshot;
    #[cfg(feature = "stats")]
    fn stats(&self) -> CacheStats;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<R: CacheValue> ErasedCache for CacheSlot<R> {
    fn generation(&self) -> u64 {
        self.generation
    }

    fn strategy(&self) -> ValidationStrategy {
        self.strategy
    }

    fn clear(&self) {
        self.lock().clear();
    }

    fn retained_bytes(&self) -> usize {
        self.lock().retained_bytes()
    }

    fn snapshot(&self) -> CacheSnapshot {
        self.lock().snapshot()
    }

    #[cfg(feature = "stats")]
    fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Registry of every cache cell in a context.
///
/// # Examples
///
/// ```
/// use primeselect_core::{CacheKey, CacheRegistry, ValidationStrategy};
///
/// let registry = CacheRegistry::new();
/// registry.register::<u64>("totals", ValidationStrategy::Shallow).unwrap();
/// assert!(registry.register::<u64>("totals", ValidationStrategy::Shallow).is_err());
///
/// let key = CacheKey::sub("totals", "eu");
/// let _slot = registry.resolve::<u64>(&key, ValidationStrategy::Shallow).unwrap();
/// assert_eq!(registry.len(), 2);
/// ```
#[derive(Default)]
pub struct CacheRegistry {
    caches: DashMap<CacheKey, Arc<dyn ErasedCache>>,
    generation: AtomicU64,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation. Starts at 0 and moves on with every [`reset`](Self::reset).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Claims `name` for a new selector and creates its main cell in the
    /// current generation.
    ///
    /// # Errors
    ///
    /// * [`PrimeSelectError::InvalidName`] if `name` is empty
    /// * [`PrimeSelectError::NameConflict`] if `name` is already registered
    pub fn register<R: CacheValue>(
        &self,
        name: &str,
        strategy: ValidationStrategy,
    ) -> Result<Arc<CacheSlot<R>>> {
        if name.is_empty() {
            return Err(PrimeSelectError::InvalidName);
        }
        let generation = self.generation();
        let slot = Arc::new(CacheSlot::<R>::new(strategy, generation));
        let erased: Arc<dyn ErasedCache> = slot.clone();
        match self.caches.entry(CacheKey::main(name)) {
            Entry::Occupied(mut occupied) => {
                // Left behind by a call racing a reset.
                if occupied.get().generation() == generation {
                    return Err(PrimeSelectError::NameConflict(name.to_string()));
                }
                occupied.insert(erased);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(erased);
            }
        }
        Ok(slot)
    }

    /// Returns the slot for `key` in the current generation, creating it with
    /// `strategy` if missing.
    ///
    /// # Errors
    ///
    /// * [`PrimeSelectError::TypeMismatch`] if the existing slot caches another type
    pub fn resolve<R: CacheValue>(
        &self,
        key: &CacheKey,
        strategy: ValidationStrategy,
    ) -> Result<Arc<CacheSlot<R>>> {
        self.resolve_in(key, strategy, self.generation())
    }

    /// Returns the slot for `key` as long as `generation` is still current,
    /// creating it with `strategy` if missing.
    ///
    /// # Errors
    ///
    /// * [`PrimeSelectError::NotFound`] if the registry was reset since `generation`
    /// * [`PrimeSelectError::TypeMismatch`] if the existing slot caches another type
    pub fn resolve_in<R: CacheValue>(
        &self,
        key: &CacheKey,
        strategy: ValidationStrategy,
        generation: u64,
    ) -> Result<Arc<CacheSlot<R>>> {
        if self.generation() != generation {
            return Err(PrimeSelectError::NotFound(key.clone()));
        }
        let existing = self.caches.get(key).map(|entry| Arc::clone(entry.value()));
        let erased = match existing {
            Some(erased) => erased,
            None => Arc::clone(
                self.caches
                    .entry(key.clone())
                    .or_insert_with(|| {
                        Arc::new(CacheSlot::<R>::new(strategy, generation)) as Arc<dyn ErasedCache>
                    })
                    .value(),
            ),
        };
        if erased.generation() != generation {
            return Err(PrimeSelectError::NotFound(key.clone()));
        }
        erased
            .into_any()
            .downcast::<CacheSlot<R>>()
            .map_err(|_| PrimeSelectError::TypeMismatch(key.clone()))
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.caches.contains_key(key)
    }

    /// Validation strategy of the cell under `key`.
    pub fn strategy(&self, key: &CacheKey) -> Option<ValidationStrategy> {
        self.caches.get(key).map(|entry| entry.value().strategy())
    }

    /// Every registered key, sorted.
    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self.caches.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    /// Resets one cell to its never-computed state. The entry stays registered.
    ///
    /// # Errors
    ///
    /// * [`PrimeSelectError::NotFound`] if nothing is registered under `key`
    pub fn clear_one(&self, key: &CacheKey) -> Result<()> {
        let slot = self
            .caches
            .get(key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| PrimeSelectError::NotFound(key.clone()))?;
        slot.clear();
        Ok(())
    }

    /// Resets every cell in place and returns how many were cleared.
    ///
    /// Entries are kept, so selectors created earlier stay registered and
    /// simply recompute on their next call.
    pub fn clear_all(&self) -> usize {
        let slots = self.entries();
        for (_, slot) in &slots {
            slot.clear();
        }
        slots.len()
    }

    /// Drops every entry, including selector names, and starts a new generation.
    ///
    /// Names become free for new selectors. Selectors created before the
    /// reset are retired: every later call on them fails with
    /// [`PrimeSelectError::NotFound`].
    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.caches.clear();
    }

    /// Copies the current entries out of the map, releasing all shard locks.
    pub(crate) fn entries(&self) -> Vec<(CacheKey, Arc<dyn ErasedCache>)> {
        self.caches
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    pub(crate) fn get_erased(&self, key: &CacheKey) -> Option<Arc<dyn ErasedCache>> {
        self.caches.get(key).map(|entry| Arc::clone(entry.value()))
    }
}

impl Debug for CacheRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    #[test]
    fn test_register_rejects_empty_name() {
        let registry = CacheRegistry::new();
        let err = registry
            .register::<i32>("", ValidationStrategy::Shallow)
            .err();
        assert_eq!(err, Some(PrimeSelectError::InvalidName));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let registry = CacheRegistry::new();
        let first = registry
            .register::<i32>("sq", ValidationStrategy::Shallow)
            .unwrap();
        let err = registry.register::<i32>("sq", ValidationStrategy::Deep).err();
        assert_eq!(err, Some(PrimeSelectError::NameConflict("sq".to_string())));

        // The original registration is untouched.
        assert_eq!(registry.strategy(&CacheKey::main("sq")), Some(ValidationStrategy::Shallow));
        let resolved = registry
            .resolve::<i32>(&CacheKey::main("sq"), ValidationStrategy::Shallow)
            .unwrap();
        assert!(Arc::ptr_eq(&first, &resolved));
    }

    #[test]
    fn test_resolve_creates_sub_caches_lazily() {
        let registry = CacheRegistry::new();
        registry
            .register::<i32>("sq", ValidationStrategy::Deep)
            .unwrap();

        let key = CacheKey::sub("sq", "x");
        assert!(!registry.contains(&key));
        let a = registry.resolve::<i32>(&key, ValidationStrategy::Deep).unwrap();
        let b = registry.resolve::<i32>(&key, ValidationStrategy::Deep).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.strategy(), ValidationStrategy::Deep);

        let main = registry
            .resolve::<i32>(&CacheKey::main("sq"), ValidationStrategy::Deep)
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &main));
    }

    #[test]
    fn test_keys_never_collide() {
        let registry = CacheRegistry::new();
        registry.register::<i32>("a[b]", ValidationStrategy::Shallow).unwrap();
        registry
            .resolve::<i32>(&CacheKey::sub("a", "b"), ValidationStrategy::Shallow)
            .unwrap();
        registry
            .resolve::<i32>(&CacheKey::sub("a[", "b]"), ValidationStrategy::Shallow)
            .unwrap();
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_resolve_type_mismatch() {
        let registry = CacheRegistry::new();
        registry.register::<i32>("n", ValidationStrategy::Shallow).unwrap();
        let err = registry
            .resolve::<String>(&CacheKey::main("n"), ValidationStrategy::Shallow)
            .err();
        assert_eq!(err, Some(PrimeSelectError::TypeMismatch(CacheKey::main("n"))));
    }

    #[test]
    fn test_clear_one_and_not_found() {
        let registry = CacheRegistry::new();
        let slot = registry.register::<i32>("n", ValidationStrategy::Shallow).unwrap();
        slot.lock().store(vec![Value::from(1)], Arc::new(1));

        registry.clear_one(&CacheKey::main("n")).unwrap();
        assert!(!slot.lock().is_populated());
        assert!(registry.contains(&CacheKey::main("n")));

        let err = registry.clear_one(&CacheKey::main("missing")).err();
        assert_eq!(err, Some(PrimeSelectError::NotFound(CacheKey::main("missing"))));
    }

    #[test]
    fn test_clear_all_keeps_entries() {
        let registry = CacheRegistry::new();
        let a = registry.register::<i32>("a", ValidationStrategy::Shallow).unwrap();
        let b = registry
            .resolve::<i32>(&CacheKey::sub("a", "1"), ValidationStrategy::Shallow)
            .unwrap();
        a.lock().store(Vec::new(), Arc::new(1));
        b.lock().store(Vec::new(), Arc::new(2));

        assert_eq!(registry.clear_all(), 2);
        assert_eq!(registry.len(), 2);
        assert!(!a.lock().is_populated());
        assert!(!b.lock().is_populated());
    }

    #[test]
    fn test_reset_drops_entries() {
        let registry = CacheRegistry::new();
        registry.register::<i32>("a", ValidationStrategy::Shallow).unwrap();
        registry.reset();
        assert!(registry.is_empty());
        assert_eq!(registry.generation(), 1);
        let slot = registry.register::<i32>("a", ValidationStrategy::Shallow).unwrap();
        assert_eq!(slot.generation(), 1);
    }

    #[test]
    fn test_resolve_rejects_previous_generation() {
        let registry = CacheRegistry::new();
        let old = registry.register::<i32>("a", ValidationStrategy::Shallow).unwrap();
        registry.reset();

        let main = CacheKey::main("a");
        let sub = CacheKey::sub("a", "x");
        for key in [&main, &sub] {
            let err = registry
                .resolve_in::<i32>(key, ValidationStrategy::Shallow, old.generation())
                .err();
            assert_eq!(err, Some(PrimeSelectError::NotFound(key.clone())));
        }
        // Nothing was recreated on behalf of the retired registration.
        assert!(registry.is_empty());
        assert!(registry.register::<i32>("a", ValidationStrategy::Shallow).is_ok());
    }

    #[test]
    fn test_register_replaces_entry_from_previous_generation() {
        let registry = CacheRegistry::new();
        let stale = Arc::new(CacheSlot::<i32>::new(ValidationStrategy::Shallow, 0));
        registry.reset();
        registry.caches.insert(CacheKey::main("a"), stale);

        let fresh = registry.register::<i32>("a", ValidationStrategy::Deep).unwrap();
        assert_eq!(fresh.generation(), 1);
        assert_eq!(registry.strategy(&CacheKey::main("a")), Some(ValidationStrategy::Deep));
    }

    #[test]
    fn test_key_display() {
        assert_eq!(CacheKey::main("users").to_string(), "users");
        assert_eq!(CacheKey::sub("users", "7").to_string(), "users[7]");
        assert_eq!(CacheKey::sub("users", "7").name(), "users");
        assert_eq!(CacheKey::sub("users", "7").sub_cache_id(), Some("7"));
    }
}
