//! Recycling allocator for per-operation resources.
//!
//! A [`Pool`] keeps released items on a free list and hands them out again
//! instead of allocating. Items are reset through [`Recycle`] on release, so
//! whatever `acquire` returns is always in its cleared state.
//!
//! Pools are unbounded: the free list grows to the high-water mark of
//! concurrent use and stays there until [`Pool::clear`].

use std::{
    fmt,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use crate::sync::lock;

/// Reset hook run when an item goes back to its pool.
pub trait Recycle {
    /// Return the item to its freshly-constructed state, keeping allocations.
    fn recycle(&mut self);
}

/// Snapshot of a pool's occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Items sitting on the free list
    pub idle: usize,
    /// Items handed out and not yet released
    pub in_use: usize,
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "idle={} in_use={}", self.idle, self.in_use)
    }
}

/// Thread-safe recycling pool.
pub struct Pool<T> {
    name: &'static str,
    free: Mutex<Vec<T>>,
    in_use: AtomicUsize,
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool").field("name", &self.name).field("stats", &self.stats()).finish()
    }
}

impl<T> Pool<T> {
    /// Create an empty pool. `name` only shows up in logs.
    pub fn new(name: &'static str) -> Self {
        Self { name, free: Mutex::new(Vec::new()), in_use: AtomicUsize::new(0) }
    }

    /// Name given at construction.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current occupancy.
    pub fn stats(&self) -> PoolStats {
        PoolStats { idle: lock(&self.free).len(), in_use: self.in_use.load(Ordering::Acquire) }
    }

    /// Drop every idle item. Returns occupancy as it was just before.
    pub fn clear(&self) -> PoolStats {
        let before = self.stats();
        lock(&self.free).clear();
        before
    }
}

impl<T: Default + Recycle> Pool<T> {
    /// Take an item off the free list, or build a fresh one.
    pub fn acquire(&self) -> T {
        let recycled = lock(&self.free).pop();
        self.in_use.fetch_add(1, Ordering::AcqRel);
        recycled.unwrap_or_default()
    }

    /// Reset `item` and put it back on the free list.
    pub fn release(&self, mut item: T) {
        item.recycle();
        lock(&self.free).push(item);
        // Saturate: releasing an item this pool never handed out must not
        // wrap the counter.
        let _ = self
            .in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)));
    }
}
