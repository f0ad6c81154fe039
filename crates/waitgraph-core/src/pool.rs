//! # Record Pool
//!
//! Dense arena of fixed-size records with a LIFO free list.
//!
//! Vertices and edges are replaced at the cadence reporters push their local
//! wait-for graphs. Recycling slots keeps that path free of per-record
//! allocations: once the pool has grown to the working-set size, `acquire`
//! and `release` are a push/pop on the free list.
//!
//! Records are addressed by [`Handle`], a typed `u32` index. A handle stays
//! valid until it is released; after that the slot may be handed out again,
//! so holders must drop every copy of a handle before releasing it.

use crate::WaitGraphError;
use crate::primitives::MAX_POOL_RECORDS;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

// =============================================================================
// HANDLE
// =============================================================================

/// Typed index of a record inside a [`Pool`].
pub struct Handle<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    const fn new(index: u32) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    /// Raw slot index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }
}

// Manual impls: deriving would require `T: Copy`/`T: Eq`.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.index)
    }
}

// =============================================================================
// POOL
// =============================================================================

#[derive(Debug, Clone)]
struct Slot<T> {
    record: T,
    live: bool,
}

/// Arena of recyclable records.
#[derive(Clone)]
pub struct Pool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    name: &'static str,
}

impl<T> Pool<T> {
    /// Create an empty pool. `name` appears in capacity errors.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            name,
        }
    }

    /// Take a record slot, reusing a released one when available.
    ///
    /// Never fails once [`reserve`](Self::reserve) has succeeded for this
    /// acquisition; without a reservation, growing past the handle space
    /// aborts like any other allocation failure.
    pub fn acquire(&mut self, record: T) -> Handle<T> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(!slot.live, "free list holds a live slot");
            slot.record = record;
            slot.live = true;
            return Handle::new(index);
        }

        if self.slots.len() >= MAX_POOL_RECORDS {
            std::process::abort();
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot { record, live: true });
        Handle::new(index)
    }

    /// Return a record slot to the free list.
    ///
    /// The record's contents are left in place and overwritten on reuse.
    pub fn release(&mut self, handle: Handle<T>) {
        let slot = &mut self.slots[handle.index as usize];
        debug_assert!(slot.live, "double release of {:?}", handle);
        slot.live = false;
        self.free.push(handle.index);
    }

    /// Make room for `additional` more acquisitions.
    ///
    /// Fails without side effects when the handle space or the allocator
    /// cannot provide the slots.
    pub fn reserve(&mut self, additional: usize) -> Result<(), WaitGraphError> {
        let fresh = additional.saturating_sub(self.free.len());
        if fresh == 0 {
            return Ok(());
        }
        let total = self
            .slots
            .len()
            .checked_add(fresh)
            .ok_or(WaitGraphError::CapacityExceeded(self.name))?;
        if total > MAX_POOL_RECORDS {
            return Err(WaitGraphError::CapacityExceeded(self.name));
        }
        self.slots
            .try_reserve(fresh)
            .map_err(|_| WaitGraphError::CapacityExceeded(self.name))?;
        // Released slots go back on the free list; make sure that push
        // cannot reallocate mid-update either.
        self.free
            .try_reserve(total.saturating_sub(self.free.len()))
            .map_err(|_| WaitGraphError::CapacityExceeded(self.name))
    }

    /// Borrow a live record.
    #[must_use]
    pub fn get(&self, handle: Handle<T>) -> &T {
        let slot = &self.slots[handle.index as usize];
        debug_assert!(slot.live, "access to released {:?}", handle);
        &slot.record
    }

    /// Mutably borrow a live record.
    pub fn get_mut(&mut self, handle: Handle<T>) -> &mut T {
        let slot = &mut self.slots[handle.index as usize];
        debug_assert!(slot.live, "access to released {:?}", handle);
        &mut slot.record
    }

    /// Check whether a handle currently designates a live record.
    #[must_use]
    pub fn is_live(&self, handle: Handle<T>) -> bool {
        self.slots
            .get(handle.index as usize)
            .is_some_and(|slot| slot.live)
    }

    /// Number of records currently handed out.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Number of released records waiting for reuse.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Total number of slots ever created.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Iterate over live records with their handles, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.live)
            .map(|(index, slot)| (Handle::new(index as u32), &slot.record))
    }

    /// Mutably iterate over live records, in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.slots
            .iter_mut()
            .filter(|slot| slot.live)
            .map(|slot| &mut slot.record)
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.name)
            .field("live", &self.live_count())
            .field("free", &self.free.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_appends_when_free_list_empty() {
        let mut pool = Pool::new("test");
        let a = pool.acquire(10u64);
        let b = pool.acquire(20u64);

        assert_ne!(a, b);
        assert_eq!(*pool.get(a), 10);
        assert_eq!(*pool.get(b), 20);
        assert_eq!(pool.live_count(), 2);
        assert_eq!(pool.capacity(), 2);
    }

    #[test]
    fn released_slot_is_reused_lifo() {
        let mut pool = Pool::new("test");
        let a = pool.acquire(1u64);
        let b = pool.acquire(2u64);
        pool.release(a);
        pool.release(b);
        assert_eq!(pool.free_count(), 2);

        // Most recently released comes back first
        let c = pool.acquire(3u64);
        assert_eq!(c, b);
        assert_eq!(*pool.get(c), 3);
        let d = pool.acquire(4u64);
        assert_eq!(d, a);

        assert_eq!(pool.capacity(), 2);
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn is_live_tracks_release() {
        let mut pool = Pool::new("test");
        let a = pool.acquire(());
        assert!(pool.is_live(a));
        pool.release(a);
        assert!(!pool.is_live(a));
    }

    #[test]
    fn reserve_counts_free_slots() {
        let mut pool = Pool::new("test");
        let a = pool.acquire(0u8);
        pool.release(a);

        pool.reserve(1).expect("reuse needs no growth");
        pool.reserve(64).expect("small growth");
        assert_eq!(pool.capacity(), 1);
    }

    #[test]
    fn reserve_rejects_handle_space_overflow() {
        let mut pool: Pool<u8> = Pool::new("edges");
        let result = pool.reserve(MAX_POOL_RECORDS + 1);
        assert_eq!(result, Err(WaitGraphError::CapacityExceeded("edges")));
        assert_eq!(pool.capacity(), 0);
    }

    #[test]
    fn iter_skips_released_records() {
        let mut pool = Pool::new("test");
        let a = pool.acquire('a');
        let _b = pool.acquire('b');
        pool.release(a);

        let live: Vec<char> = pool.iter().map(|(_, c)| *c).collect();
        assert_eq!(live, vec!['b']);
    }
}
