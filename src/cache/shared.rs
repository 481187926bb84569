//! Thread-Local / Generation Cache
//!
//! The graphics pipeline cache is sharded so recording threads never contend
//! with each other on the hot path:
//!
//! - Every recording thread owns a **local map** it alone writes to. Local maps
//!   live in an explicit registry keyed by [`ThreadId`], so the coordinating
//!   thread can walk all of them.
//! - Two shared **generation maps** (*current* and *backfill*) are read-only
//!   while recording threads are active.
//!
//! Lookups check the caller's local map, then current, then backfill. A
//! backfill hit is copied into the local map so the entry survives the next
//! consolidation.
//!
//! # Frame protocol
//!
//! Once per frame, with every recording thread idle, the coordinating thread
//! calls [`consolidate_threaded_caches`], [`process_delayed_cleanup`] and
//! periodically [`discard_and_swap`]. Overlap between those calls and
//! [`find`]/[`add`] is a programming error and panics.
//!
//! Two threads can miss on the same key in the same frame and both create a
//! state. Consolidation keeps the first one it sees in *current* and queues the
//! other for deletion once its compile has finished.
//!
//! [`consolidate_threaded_caches`]: SharedPipelineStateCache::consolidate_threaded_caches
//! [`process_delayed_cleanup`]: SharedPipelineStateCache::process_delayed_cleanup
//! [`discard_and_swap`]: SharedPipelineStateCache::discard_and_swap
//! [`find`]: SharedPipelineStateCache::find
//! [`add`]: SharedPipelineStateCache::add

use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::thread::{self, ThreadId};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::cache::generations::Generations;
use crate::pipeline::desc::PipelineDesc;
use crate::pipeline::state::PipelineState;
use crate::utils::time::ScopeTimeGuard;

/// What the shared cache needs to know about a cached value.
pub trait CacheEntry: Clone + Send + Sync {
    /// Identity comparison (same object, not equal content).
    fn same_entry(&self, other: &Self) -> bool;

    /// `true` once no compile is in flight for this entry.
    fn is_compile_complete(&self) -> bool;

    /// Drops the entry's completion event.
    fn clear_completion(&self);

    /// Recorded-but-not-executed binds. Must be zero before deletion.
    fn in_use_count(&self) -> i32;

    fn label(&self) -> String;
}

impl<D: PipelineDesc> CacheEntry for Arc<PipelineState<D>> {
    fn same_entry(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }

    fn is_compile_complete(&self) -> bool {
        PipelineState::is_compile_complete(self)
    }

    fn clear_completion(&self) {
        self.clear_completion_event();
    }

    fn in_use_count(&self) -> i32 {
        PipelineState::in_use_count(self)
    }

    fn label(&self) -> String {
        PipelineState::label(self)
    }
}

// ─── Overlap verification ─────────────────────────────────────────────────────

/// Held by `find`/`add`. The counter is positive while lookups run and −1
/// while the coordinating thread owns the maps.
struct ScopeVerifyIncrement<'a>(&'a AtomicI32);

impl<'a> ScopeVerifyIncrement<'a> {
    fn new(counter: &'a AtomicI32) -> Self {
        let result = counter.fetch_add(1, Ordering::AcqRel) + 1;
        if result <= 0 {
            counter.fetch_sub(1, Ordering::AcqRel);
            log::error!("Pipeline cache lookup overlapped consolidation");
            panic!("Find was hit while Consolidate was running");
        }
        Self(counter)
    }
}

impl Drop for ScopeVerifyIncrement<'_> {
    fn drop(&mut self) {
        let result = self.0.fetch_sub(1, Ordering::AcqRel) - 1;
        if result < 0 && !thread::panicking() {
            panic!("Find was hit while Consolidate was running");
        }
    }
}

/// Held by consolidation and discard-and-swap.
struct ScopeVerifyDecrement<'a>(&'a AtomicI32);

impl<'a> ScopeVerifyDecrement<'a> {
    fn new(counter: &'a AtomicI32) -> Self {
        let result = counter.fetch_sub(1, Ordering::AcqRel) - 1;
        if result >= 0 {
            counter.fetch_add(1, Ordering::AcqRel);
            log::error!("Pipeline cache consolidation overlapped a lookup");
            panic!("Consolidate was hit while Get/SetPSO was running");
        }
        Self(counter)
    }
}

impl Drop for ScopeVerifyDecrement<'_> {
    fn drop(&mut self) {
        let result = self.0.fetch_add(1, Ordering::AcqRel) + 1;
        if result != 0 && !thread::panicking() {
            panic!("Consolidate was hit while Get/SetPSO was running");
        }
    }
}

type LocalSlot<K, V> = Arc<Mutex<FxHashMap<K, V>>>;

/// Result of one consolidation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsolidateStats {
    /// Entries moved into the current map.
    pub promoted: usize,
    /// Duplicates queued for delayed deletion.
    pub duplicates: usize,
    /// Entries left in local maps because their compile is still running.
    pub pending: usize,
}

// ─── Shared cache ─────────────────────────────────────────────────────────────

pub struct SharedPipelineStateCache<K, V> {
    generations: RwLock<Generations<K, V>>,
    locals: RwLock<FxHashMap<ThreadId, LocalSlot<K, V>>>,
    delete_queue: Mutex<Vec<V>>,
    duplicates_generated: AtomicU64,
    verify: AtomicI32,
    time_guard: Duration,
}

impl<K, V> Default for SharedPipelineStateCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: CacheEntry,
{
    fn default() -> Self {
        Self::new(Duration::from_micros(100))
    }
}

impl<K, V> SharedPipelineStateCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: CacheEntry,
{
    /// `time_guard` is the consolidation budget above which a warning is logged.
    #[must_use]
    pub fn new(time_guard: Duration) -> Self {
        Self {
            generations: RwLock::new(Generations::default()),
            locals: RwLock::new(FxHashMap::default()),
            delete_queue: Mutex::new(Vec::new()),
            duplicates_generated: AtomicU64::new(0),
            verify: AtomicI32::new(0),
            time_guard,
        }
    }

    fn local_slot(&self, thread: ThreadId) -> Option<LocalSlot<K, V>> {
        self.locals.read().get(&thread).cloned()
    }

    fn local_slot_or_register(&self, thread: ThreadId) -> LocalSlot<K, V> {
        if let Some(slot) = self.local_slot(thread) {
            return slot;
        }
        Arc::clone(self.locals.write().entry(thread).or_default())
    }

    // ── Recording-thread API ─────────────────────────────────────────────────

    /// Looks `key` up in the caller's local map, then current, then backfill.
    pub fn find(&self, key: &K) -> Option<V> {
        let _verify = ScopeVerifyIncrement::new(&self.verify);
        let thread = thread::current().id();

        if let Some(slot) = self.local_slot(thread) {
            let hit = slot.lock().get(key).cloned();
            if hit.is_some() {
                return hit;
            }
        }

        let generations = self.generations.read();
        if let Some(value) = generations.current().get(key) {
            return Some(value.clone());
        }

        let value = generations.backfill().get(key).cloned()?;
        drop(generations);

        // Keep it alive through the next consolidation.
        self.local_slot_or_register(thread)
            .lock()
            .insert(key.clone(), value.clone());
        Some(value)
    }

    /// Inserts into the caller's local map.
    ///
    /// # Panics
    ///
    /// If the caller's local map already holds `key`.
    pub fn add(&self, key: K, value: V) {
        let _verify = ScopeVerifyIncrement::new(&self.verify);
        let slot = self.local_slot_or_register(thread::current().id());
        let mut local = slot.lock();

        if local.contains_key(&key) {
            log::error!(
                "Pipeline state '{}' added twice to the same thread-local cache",
                value.label()
            );
            panic!("pipeline state added twice to a thread-local cache");
        }
        local.insert(key, value);
    }

    // ── Coordinating-thread API ──────────────────────────────────────────────

    /// Merges every local map into the current generation.
    ///
    /// Entries whose compile is still running stay in their local map.
    pub fn consolidate_threaded_caches(&self) -> ConsolidateStats {
        let _time = ScopeTimeGuard::new("ConsolidatePipelineCache", self.time_guard);
        let _verify = ScopeVerifyDecrement::new(&self.verify);

        let mut locals = self.locals.write();
        let mut generations = self.generations.write();
        let mut delete_queue = self.delete_queue.lock();
        let mut stats = ConsolidateStats::default();

        for slot in locals.values() {
            slot.lock().retain(|key, value| {
                if !value.is_compile_complete() {
                    stats.pending += 1;
                    return true;
                }
                value.clear_completion();
                generations.backfill_mut().remove(key);

                let existing = generations.current().get(key).map(|c| c.same_entry(value));
                match existing {
                    // Several threads promoted the same backfill entry.
                    Some(true) => {}
                    Some(false) => {
                        stats.duplicates += 1;
                        delete_queue.push(value.clone());
                    }
                    None => {
                        stats.promoted += 1;
                        generations.current_mut().insert(key.clone(), value.clone());
                    }
                }
                false
            });
        }

        // Threads re-register on their next add or backfill hit.
        locals.retain(|_, slot| !slot.lock().is_empty());

        if stats.duplicates > 0 {
            self.duplicates_generated
                .fetch_add(stats.duplicates as u64, Ordering::Relaxed);
            log::debug!("Pipeline cache resolved {} duplicate states", stats.duplicates);
        }
        stats
    }

    /// Releases the duplicates found by consolidation. Returns how many.
    ///
    /// # Panics
    ///
    /// If a duplicate is still bound by a recorded command.
    pub fn process_delayed_cleanup(&self) -> usize {
        let mut queue = self.delete_queue.lock();
        let count = queue.len();
        for value in queue.drain(..) {
            assert_eq!(
                value.in_use_count(),
                0,
                "deleting pipeline state '{}' while it is still in use",
                value.label()
            );
        }
        count
    }

    /// Deletes everything still in backfill and swaps the generations.
    /// Returns the number of discarded entries.
    ///
    /// # Panics
    ///
    /// If a discarded entry is still bound by a recorded command, or if a
    /// lookup is running concurrently.
    pub fn discard_and_swap(&self) -> usize {
        let _verify = ScopeVerifyDecrement::new(&self.verify);
        let mut generations = self.generations.write();

        let discarded = generations.backfill().len();
        for value in generations.backfill().values() {
            assert_eq!(
                value.in_use_count(),
                0,
                "discarding pipeline state '{}' while it is still in use",
                value.label()
            );
        }
        generations.backfill_mut().clear();
        generations.swap();
        discarded
    }

    // ── Introspection ────────────────────────────────────────────────────────

    #[must_use]
    pub fn current_len(&self) -> usize {
        self.generations.read().current().len()
    }

    #[must_use]
    pub fn backfill_len(&self) -> usize {
        self.generations.read().backfill().len()
    }

    /// Entries across every thread-local map.
    #[must_use]
    pub fn local_len(&self) -> usize {
        self.locals.read().values().map(|slot| slot.lock().len()).sum()
    }

    /// Number of registered thread-local maps.
    #[must_use]
    pub fn registered_threads(&self) -> usize {
        self.locals.read().len()
    }

    #[must_use]
    pub fn pending_cleanup_len(&self) -> usize {
        self.delete_queue.lock().len()
    }

    /// Total duplicates resolved since creation.
    #[must_use]
    pub fn duplicates_generated(&self) -> u64 {
        self.duplicates_generated.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn current_get(&self, key: &K) -> Option<V> {
        self.generations.read().current().get(key).cloned()
    }

    #[must_use]
    pub fn backfill_contains(&self, key: &K) -> bool {
        self.generations.read().backfill().contains_key(key)
    }

    /// Clones every entry of the current generation.
    #[must_use]
    pub fn current_values(&self) -> Vec<V> {
        self.generations.read().current().values().cloned().collect()
    }
}
