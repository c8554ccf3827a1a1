//! Keyed cache of compiled functions.

use std::hash::Hash;

use nodevm_compiler::SharedFunction;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::debug;

/// Map from a caller-chosen key to a compiled function.
///
/// The cache holds one reference to every stored function. [`acquire`]
/// hands out another, so a function replaced or removed while in use stays
/// alive until its last user releases it.
///
/// # Thread Safety
///
/// All operations go through a single lock.
///
/// [`acquire`]: FunctionCache::acquire
#[derive(Debug)]
pub struct FunctionCache<K> {
    entries: Mutex<FxHashMap<K, SharedFunction>>,
}

impl<K> Default for FunctionCache<K> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(FxHashMap::default()),
        }
    }
}

impl<K: Eq + Hash> FunctionCache<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a reference to the function stored under `key`.
    pub fn acquire(&self, key: &K) -> Option<SharedFunction> {
        self.entries.lock().get(key).map(SharedFunction::retain)
    }

    /// Take a reference to the function stored under `key`, or store the one
    /// `create` returns.
    ///
    /// The lock is held while `create` runs, so concurrent callers with the
    /// same key get the same function and `create` runs once. An error
    /// leaves the cache unchanged.
    pub fn acquire_or_try_insert_with<E>(
        &self,
        key: K,
        create: impl FnOnce() -> Result<SharedFunction, E>,
    ) -> Result<SharedFunction, E> {
        let mut entries = self.entries.lock();
        if let Some(function) = entries.get(&key) {
            return Ok(function.retain());
        }
        let function = create()?;
        entries.insert(key, function.retain());
        Ok(function)
    }

    /// Store `function` under `key`, releasing whatever was there before.
    /// `None` removes the entry.
    pub fn set(&self, key: K, function: Option<&SharedFunction>) {
        let mut entries = self.entries.lock();
        let old = match function {
            Some(function) => entries.insert(key, function.retain()),
            None => entries.remove(&key),
        };
        if let Some(old) = old {
            let destroyed = old.release();
            debug!(destroyed, "replaced cached function");
        }
    }

    /// Remove the entry for `key`. Returns `true` if there was one.
    pub fn remove(&self, key: &K) -> bool {
        let removed = self.entries.lock().remove(key);
        removed.map(SharedFunction::release).is_some()
    }

    /// Release every stored function.
    pub fn clear(&self) {
        let drained: Vec<SharedFunction> = self.entries.lock().drain().map(|(_, f)| f).collect();
        let total = drained.len();
        let destroyed = drained
            .into_iter()
            .map(SharedFunction::release)
            .filter(|&destroyed| destroyed)
            .count();
        debug!(total, destroyed, "cleared function cache");
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use nodevm_compiler::Function;

    use super::*;

    fn shared(name: &str) -> SharedFunction {
        SharedFunction::new(Function::new(name, vec![1], 0, vec![], vec![]))
    }

    #[test]
    fn acquire_retains() {
        let cache = FunctionCache::new();
        let f = shared("a");
        cache.set("a", Some(&f));
        assert_eq!(f.users(), 2);

        let held = cache.acquire(&"a").unwrap();
        assert!(held.ptr_eq(&f));
        assert_eq!(f.users(), 3);
        assert!(!held.release());
        assert!(cache.acquire(&"b").is_none());
    }

    #[test]
    fn acquire_or_insert_creates_once() {
        let cache = FunctionCache::new();
        let mut created = 0;
        let first = cache
            .acquire_or_try_insert_with("a", || {
                created += 1;
                Ok::<_, ()>(shared("a"))
            })
            .unwrap();
        assert_eq!(first.users(), 2);

        let second = cache
            .acquire_or_try_insert_with("a", || {
                created += 1;
                Ok::<_, ()>(shared("other"))
            })
            .unwrap();
        assert_eq!(created, 1);
        assert!(second.ptr_eq(&first));
        assert_eq!(first.users(), 3);

        let failed = cache.acquire_or_try_insert_with("b", || Err("no"));
        assert_eq!(failed.err(), Some("no"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn set_replaces_and_releases() {
        let cache = FunctionCache::new();
        let first = shared("first");
        let second = shared("second");
        cache.set(1, Some(&first));
        cache.set(1, Some(&second));
        assert_eq!(first.users(), 1);
        assert_eq!(second.users(), 2);
        assert_eq!(cache.len(), 1);

        cache.set(1, None);
        assert!(cache.is_empty());
        assert_eq!(second.users(), 1);
    }

    #[test]
    fn removed_function_outlives_cache_entry() {
        let cache = FunctionCache::new();
        cache.set("k", Some(&shared("k")));
        let held = cache.acquire(&"k").unwrap();
        assert!(cache.remove(&"k"));
        assert!(!cache.remove(&"k"));
        assert_eq!(held.users(), 1);
        assert_eq!(held.name(), "k");
        assert!(held.release());
    }

    #[test]
    fn clear_releases_everything() {
        let cache = FunctionCache::new();
        let f = shared("f");
        cache.set(1, Some(&f));
        cache.set(2, Some(&f));
        assert_eq!(f.users(), 3);
        cache.clear();
        assert_eq!(f.users(), 1);
        assert_eq!(cache.len(), 0);
    }
}
