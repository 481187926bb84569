use rustc_hash::FxHashMap;

/// A pair of maps that trade places on every swap.
///
/// Entries not looked up since the last swap sit in *backfill* and are
/// dropped at the next one.
pub(crate) struct Generations<K, V> {
    maps: [FxHashMap<K, V>; 2],
    current: usize,
}

impl<K, V> Default for Generations<K, V> {
    fn default() -> Self {
        Self {
            maps: [FxHashMap::default(), FxHashMap::default()],
            current: 0,
        }
    }
}

impl<K, V> Generations<K, V> {
    pub(crate) fn current(&self) -> &FxHashMap<K, V> {
        &self.maps[self.current]
    }

    pub(crate) fn current_mut(&mut self) -> &mut FxHashMap<K, V> {
        &mut self.maps[self.current]
    }

    pub(crate) fn backfill(&self) -> &FxHashMap<K, V> {
        &self.maps[1 - self.current]
    }

    pub(crate) fn backfill_mut(&mut self) -> &mut FxHashMap<K, V> {
        &mut self.maps[1 - self.current]
    }

    /// Current becomes backfill and the (emptied) backfill becomes current.
    pub(crate) fn swap(&mut self) {
        self.current = 1 - self.current;
    }

    pub(crate) fn len(&self) -> usize {
        self.maps[0].len() + self.maps[1].len()
    }
}
