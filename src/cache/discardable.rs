//! Discardable Key/Value Cache
//!
//! A two-generation map behind one reader/writer lock, used for compute
//! pipelines. Lookups take the read lock; only a backfill hit (which moves the
//! entry into current) or an insertion takes the write lock.
//!
//! [`DiscardableKeyValueCache::discard`] hands every backfill entry to a
//! callback, drops them and swaps the generations. Anything not looked up
//! during a whole period is therefore released after two discards.

use std::hash::Hash;

use parking_lot::RwLock;

use crate::cache::generations::Generations;

pub struct DiscardableKeyValueCache<K, V> {
    maps: RwLock<Generations<K, V>>,
}

impl<K, V> Default for DiscardableKeyValueCache<K, V> {
    fn default() -> Self {
        Self {
            maps: RwLock::new(Generations::default()),
        }
    }
}

impl<K, V> DiscardableKeyValueCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up `key`, promoting a backfill hit into current.
    pub fn find(&self, key: &K) -> Option<V> {
        {
            let maps = self.maps.read();
            if let Some(value) = maps.current().get(key) {
                return Some(value.clone());
            }
            if !maps.backfill().contains_key(key) {
                return None;
            }
        }

        let mut maps = self.maps.write();
        Self::promote(&mut maps, key)
    }

    /// Inserts into current, replacing any entry already stored for `key`.
    pub fn add(&self, key: K, value: V) {
        let mut maps = self.maps.write();
        maps.backfill_mut().remove(&key);
        maps.current_mut().insert(key, value);
    }

    /// Returns the entry for `key`, or inserts the one built by `make`.
    ///
    /// `make` runs under the write lock, so two racing callers never both
    /// insert. The flag is `true` when `make` ran.
    pub fn find_or_add_with(&self, key: &K, make: impl FnOnce() -> V) -> (V, bool) {
        if let Some(value) = self.find(key) {
            return (value, false);
        }

        let mut maps = self.maps.write();
        if let Some(value) = Self::promote(&mut maps, key) {
            return (value, false);
        }
        let value = make();
        maps.current_mut().insert(key.clone(), value.clone());
        (value, true)
    }

    /// Releases every backfill entry (after passing it to `on_discard`) and
    /// swaps the generations. Returns the number released.
    pub fn discard(&self, mut on_discard: impl FnMut(&V)) -> usize {
        let mut maps = self.maps.write();
        let backfill = std::mem::take(maps.backfill_mut());
        let count = backfill.len();
        for value in backfill.values() {
            on_discard(value);
        }
        maps.swap();
        count
    }

    /// Entries in both generations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.maps.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn current_len(&self) -> usize {
        self.maps.read().current().len()
    }

    #[must_use]
    pub fn backfill_len(&self) -> usize {
        self.maps.read().backfill().len()
    }

    /// Clones every entry in both generations.
    #[must_use]
    pub fn values(&self) -> Vec<V> {
        let maps = self.maps.read();
        maps.current()
            .values()
            .chain(maps.backfill().values())
            .cloned()
            .collect()
    }

    fn promote(maps: &mut Generations<K, V>, key: &K) -> Option<V> {
        if let Some(value) = maps.current().get(key) {
            return Some(value.clone());
        }
        let value = maps.backfill_mut().remove(key)?;
        maps.current_mut().insert(key.clone(), value.clone());
        Some(value)
    }
}
