// This module provides the pooled allocator that backs every instruction node of a block.
// Pool<T> owns a bumpalo arena sized for a fixed number of nodes per chunk, so appending
// instructions never pays for an individual heap allocation. Nodes are addressed through
// SlotId handles: a dense slot index plus the generation stamped on the pool at creation.
// Every pool draws a fresh generation from a global counter, which lets a pool reject handles
// minted by a different pool instead of silently reading the wrong node. There is no
// individual free. Storage is reclaimed as a unit when the pool drops, and node destructors run
// at that point. Allocation failure is fatal, as it is for the global allocator.

//! Block-scoped pooled allocation.
//!
//! A [`Pool`] hands out stable storage for values of one type in large
//! batches and addresses them through generation-checked [`SlotId`]s.

use bumpalo::Bump;
use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering};

/// Number of slots reserved per arena chunk unless configured otherwise.
pub const DEFAULT_CHUNK_SLOTS: usize = 4096;

static NEXT_GENERATION: AtomicU32 = AtomicU32::new(1);

/// Handle to a slot in a [`Pool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId {
    index: u32,
    generation: u32,
}

impl SlotId {
    /// Dense allocation index within the owning pool.
    pub fn index(self) -> u32 {
        self.index
    }

    /// Generation of the pool that minted this handle.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// Arena of `T` values with stable addresses and bulk deallocation.
pub struct Pool<T> {
    /// Backing storage; chunks never move once allocated.
    arena: Bump,
    /// One pointer per allocated slot, in allocation order.
    slots: Vec<NonNull<T>>,
    /// Stamp shared by every handle this pool hands out.
    generation: u32,
    /// Slots reserved per chunk.
    chunk_slots: usize,
}

// SAFETY: the pool exclusively owns every value behind `slots`; moving the pool to another
// thread moves that ownership with it.
unsafe impl<T: Send> Send for Pool<T> {}

impl<T> Pool<T> {
    /// Create a pool reserving [`DEFAULT_CHUNK_SLOTS`] slots per chunk.
    pub fn new() -> Self {
        Self::with_chunk_slots(DEFAULT_CHUNK_SLOTS)
    }

    /// Create a pool reserving `chunk_slots` slots per chunk.
    pub fn with_chunk_slots(chunk_slots: usize) -> Self {
        let chunk_slots = chunk_slots.max(1);
        Self {
            arena: Bump::with_capacity(chunk_slots * std::mem::size_of::<T>()),
            slots: Vec::with_capacity(chunk_slots),
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            chunk_slots,
        }
    }

    /// Move `value` into the pool and return its handle.
    ///
    /// # Panics
    ///
    /// Panics if the pool already holds `u32::MAX` slots. Out-of-memory aborts
    /// through the allocator.
    pub fn alloc(&mut self, value: T) -> SlotId {
        let index = u32::try_from(self.slots.len()).unwrap_or_else(|_| panic!("pool slot space exhausted"));
        if self.slots.len() == self.slots.capacity() {
            self.slots.reserve(self.chunk_slots);
        }

        let slot = NonNull::from(self.arena.alloc(value));
        self.slots.push(slot);

        SlotId {
            index,
            generation: self.generation,
        }
    }

    /// Whether `id` was minted by this pool.
    pub fn owns(&self, id: SlotId) -> bool {
        id.generation == self.generation && (id.index as usize) < self.slots.len()
    }

    /// Shared access to the value behind `id`.
    pub fn get(&self, id: SlotId) -> Option<&T> {
        if !self.owns(id) {
            return None;
        }
        // SAFETY: the slot points into `arena`, which lives as long as `self` and never
        // moves its chunks. `&self` rules out a concurrent `get_mut`.
        Some(unsafe { self.slots[id.index as usize].as_ref() })
    }

    /// Exclusive access to the value behind `id`.
    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        if !self.owns(id) {
            return None;
        }
        // SAFETY: as in `get`; every slot is a distinct allocation and `&mut self`
        // guarantees this is the only live reference into the pool.
        Some(unsafe { self.slots[id.index as usize].as_mut() })
    }

    /// Number of slots handed out so far.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot has been handed out.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Generation stamped on this pool's handles.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Slots reserved per chunk.
    pub fn chunk_slots(&self) -> usize {
        self.chunk_slots
    }

    /// Bytes currently reserved by the backing arena.
    pub fn allocated_bytes(&self) -> usize {
        self.arena.allocated_bytes()
    }
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Pool<T> {
    fn drop(&mut self) {
        if !std::mem::needs_drop::<T>() {
            return;
        }
        for slot in &self.slots {
            // SAFETY: each slot holds an initialised value that nothing else will touch
            // again; the arena frees the memory itself afterwards.
            unsafe { std::ptr::drop_in_place(slot.as_ptr()) };
        }
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("generation", &self.generation)
            .field("slots", &self.slots.len())
            .field("chunk_slots", &self.chunk_slots)
            .finish()
    }
}
