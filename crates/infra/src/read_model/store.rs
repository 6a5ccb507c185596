use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

/// Keyed read model storage.
pub trait ReadStore<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Option<V>;
    fn upsert(&self, key: K, value: V);
    fn remove(&self, key: &K) -> Option<V>;
    fn list(&self) -> Vec<V>;
    fn clear(&self);

    /// Read-modify-write of one key under the store's write lock.
    ///
    /// `f` receives the current value (if any) and returns the new one.
    fn update(&self, key: K, f: &mut dyn FnMut(Option<V>) -> V) -> Option<V>;
}

impl<K, V, S> ReadStore<K, V> for Arc<S>
where
    S: ReadStore<K, V> + ?Sized,
{
    fn get(&self, key: &K) -> Option<V> {
        (**self).get(key)
    }

    fn upsert(&self, key: K, value: V) {
        (**self).upsert(key, value)
    }

    fn remove(&self, key: &K) -> Option<V> {
        (**self).remove(key)
    }

    fn list(&self) -> Vec<V> {
        (**self).list()
    }

    fn clear(&self) {
        (**self).clear()
    }

    fn update(&self, key: K, f: &mut dyn FnMut(Option<V>) -> V) -> Option<V> {
        (**self).update(key, f)
    }
}

#[derive(Debug)]
pub struct InMemoryReadStore<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> InMemoryReadStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryReadStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ReadStore<K, V> for InMemoryReadStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(key).cloned()
    }

    fn upsert(&self, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(key, value);
        }
    }

    fn remove(&self, key: &K) -> Option<V> {
        let mut map = self.inner.write().ok()?;
        map.remove(key)
    }

    fn list(&self) -> Vec<V> {
        match self.inner.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => vec![],
        }
    }

    fn clear(&self) {
        if let Ok(mut map) = self.inner.write() {
            map.clear();
        }
    }

    fn update(&self, key: K, f: &mut dyn FnMut(Option<V>) -> V) -> Option<V> {
        let mut map = self.inner.write().ok()?;
        let next = f(map.remove(&key));
        map.insert(key, next.clone());
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_is_read_modify_write() {
        let store = InMemoryReadStore::<u32, i64>::new();
        store.update(1, &mut |v: Option<i64>| v.unwrap_or(0) + 5);
        store.update(1, &mut |v: Option<i64>| v.unwrap_or(0) - 2);

        assert_eq!(store.get(&1), Some(3));
        assert_eq!(store.list(), vec![3]);
    }

    #[test]
    fn clear_drops_everything() {
        let store = InMemoryReadStore::<u32, &'static str>::new();
        store.upsert(1, "a");
        store.upsert(2, "b");
        store.clear();

        assert!(store.list().is_empty());
        assert_eq!(store.remove(&1), None);
    }
}
