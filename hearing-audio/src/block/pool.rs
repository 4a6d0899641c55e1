use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU16, AtomicU32, AtomicU8, AtomicUsize, Ordering};

use crate::constants::{MAX_BLOCK_SAMPLES, MAX_POOL_BLOCKS, POOL_WORD_BITS};
use crate::error::ConfigError;
use crate::settings::AudioSettings;

use super::ref_types::AudioBlockMut;

/// Raw audio block storage: up to 128 `f32` samples plus the block metadata.
#[derive(Clone, Copy)]
#[repr(C, align(4))]
pub struct AudioBlockData {
    pub samples: [f32; MAX_BLOCK_SAMPLES],
    /// Active length, `<= MAX_BLOCK_SAMPLES`.
    pub length: usize,
    pub sample_rate_hz: f32,
    /// Monotonically increasing block id, used to detect gaps between streams.
    pub id: u32,
}

impl AudioBlockData {
    const fn zeroed() -> Self {
        AudioBlockData {
            samples: [0.0; MAX_BLOCK_SAMPLES],
            length: 0,
            sample_rate_hz: 0.0,
            id: 0,
        }
    }
}

/// Names one allocation of one pool slot.
///
/// The generation is bumped every time the slot is handed out again, so a stale
/// handle can be told apart from the slot's current owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockHandle {
    index: u16,
    generation: u16,
}

impl BlockHandle {
    /// Slot index inside the pool.
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// Allocation generation of the slot at the time this handle was issued.
    pub fn generation(&self) -> u16 {
        self.generation
    }
}

/// Fixed-capacity, lock-free pool of audio blocks.
///
/// Uses an atomic bitmap to track which slots are allocated, and per-slot
/// atomic reference counts for shared ownership. All tick-path operations are
/// lock-free CAS loops or single atomic read-modify-writes, so they are safe to
/// call from interrupt context and from a lower-priority background loop at the
/// same time.
///
/// The pool is created once at startup and passed by reference to the graph;
/// the only heap allocation happens in [`BlockPool::new`].
pub struct BlockPool {
    settings: AudioSettings,
    capacity: usize,
    /// Bit N of word W = 1 means slot `W * 32 + N` is allocated. Bits past
    /// `capacity` are set permanently so the scan never hands them out.
    bitmap: Box<[AtomicU32]>,
    refcounts: Box<[AtomicU8]>,
    generations: Box<[AtomicU16]>,
    storage: Box<[UnsafeCell<AudioBlockData>]>,
    in_use: AtomicUsize,
    max_in_use: AtomicUsize,
}

// SAFETY: The pool uses atomic operations for all shared state.
// A storage cell is only accessed through a slot that is exclusively owned
// (refcount == 1, one `AudioBlockMut`) or shared read-only (`AudioBlockRef`s).
unsafe impl Sync for BlockPool {}

impl BlockPool {
    /// Create a pool of `capacity` blocks stamped with `settings`.
    ///
    /// Fails if the capacity is outside `1..=MAX_POOL_BLOCKS`, the settings are
    /// invalid, or the storage cannot be reserved.
    pub fn new(capacity: usize, settings: AudioSettings) -> Result<Self, ConfigError> {
        if capacity == 0 || capacity > MAX_POOL_BLOCKS {
            return Err(ConfigError::PoolCapacity {
                requested: capacity,
                max: MAX_POOL_BLOCKS,
            });
        }
        settings.validate()?;

        let words = capacity.div_ceil(POOL_WORD_BITS);
        let bitmap = reserve_slice(words, "pool bitmap", |w| {
            let first = w * POOL_WORD_BITS;
            let valid = (capacity - first).min(POOL_WORD_BITS);
            let unused = if valid == POOL_WORD_BITS {
                0
            } else {
                !0u32 << valid
            };
            AtomicU32::new(unused)
        })?;
        let refcounts = reserve_slice(capacity, "pool refcounts", |_| AtomicU8::new(0))?;
        let generations = reserve_slice(capacity, "pool generations", |_| AtomicU16::new(0))?;
        let storage = reserve_slice(capacity, "pool storage", |_| {
            UnsafeCell::new(AudioBlockData::zeroed())
        })?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            capacity,
            block_samples = settings.block_samples,
            sample_rate_hz = settings.sample_rate_hz,
            "block pool created"
        );

        Ok(BlockPool {
            settings,
            capacity,
            bitmap,
            refcounts,
            generations,
            storage,
            in_use: AtomicUsize::new(0),
            max_in_use: AtomicUsize::new(0),
        })
    }

    /// Allocate a block. Returns `None` when every slot is in use.
    ///
    /// The block has refcount 1, zeroed samples, the configured active length and
    /// sample rate, and id 0.
    pub fn allocate(&self) -> Option<AudioBlockMut<'_>> {
        self.alloc_slot().map(|handle| AudioBlockMut::new(self, handle))
    }

    /// Claim a free slot. Returns its handle, or `None` if the pool is full.
    pub(crate) fn alloc_slot(&self) -> Option<BlockHandle> {
        for (w, word) in self.bitmap.iter().enumerate() {
            let mut bitmap = word.load(Ordering::Acquire);
            loop {
                let free = !bitmap;
                if free == 0 {
                    break; // this word is full
                }
                let bit = free.trailing_zeros();
                match word.compare_exchange_weak(
                    bitmap,
                    bitmap | (1u32 << bit),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => return Some(self.claim(w * POOL_WORD_BITS + bit as usize)),
                    Err(actual) => bitmap = actual, // raced, rescan this word
                }
            }
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(capacity = self.capacity, "block pool exhausted");
        None
    }

    /// Initialize a slot that was just claimed through the bitmap.
    fn claim(&self, index: usize) -> BlockHandle {
        self.refcounts[index].store(1, Ordering::Release);
        let generation = self.generations[index]
            .fetch_add(1, Ordering::AcqRel)
            .wrapping_add(1);
        // SAFETY: We just exclusively claimed this slot via the bitmap CAS.
        unsafe {
            let data = &mut *self.storage[index].get();
            *data = AudioBlockData::zeroed();
            data.length = self.settings.block_samples;
            data.sample_rate_hz = self.settings.sample_rate_hz;
        }
        let used = self.in_use.fetch_add(1, Ordering::AcqRel) + 1;
        self.max_in_use.fetch_max(used, Ordering::AcqRel);
        BlockHandle {
            index: index as u16,
            generation,
        }
    }

    /// Increment the reference count of a live slot (fan-out, `AudioBlockRef::clone`).
    pub(crate) fn inc_ref(&self, handle: BlockHandle) {
        debug_assert!(handle.index() < self.capacity);
        let old = self.refcounts[handle.index()].fetch_add(1, Ordering::AcqRel);
        debug_assert!(old > 0, "inc_ref on unallocated slot");
        debug_assert!(old < u8::MAX, "refcount overflow");
    }

    /// Decrement the reference count of a slot. When it reaches zero the slot
    /// returns to the free set.
    pub(crate) fn dec_ref(&self, handle: BlockHandle) {
        debug_assert!(handle.index() < self.capacity);
        let index = handle.index();
        let old = self.refcounts[index].fetch_sub(1, Ordering::AcqRel);
        debug_assert!(old > 0, "dec_ref on slot with refcount 0");
        if old == 1 {
            self.in_use.fetch_sub(1, Ordering::AcqRel);
            let bit = 1u32 << (index % POOL_WORD_BITS);
            self.bitmap[index / POOL_WORD_BITS].fetch_and(!bit, Ordering::Release);
        }
    }

    /// Current reference count of the slot named by `handle`.
    pub fn refcount(&self, handle: BlockHandle) -> u8 {
        self.refcounts[handle.index()].load(Ordering::Acquire)
    }

    /// Whether `handle` still names the current allocation of its slot.
    pub fn is_live(&self, handle: BlockHandle) -> bool {
        handle.index() < self.capacity
            && self.refcount(handle) > 0
            && self.generations[handle.index()].load(Ordering::Acquire) == handle.generation
    }

    /// Get a pointer to the block data for a given slot.
    ///
    /// # Safety
    /// Caller must ensure the slot is currently allocated and that it either holds
    /// the only handle (for writes) or only reads.
    pub(crate) unsafe fn data_ptr(&self, handle: BlockHandle) -> *mut AudioBlockData {
        debug_assert!(
            self.is_live(handle),
            "stale block handle {:?}",
            handle
        );
        self.storage[handle.index()].get()
    }

    /// Number of blocks the pool manages.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of blocks currently allocated.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    /// Number of free blocks.
    pub fn available(&self) -> usize {
        self.capacity - self.in_use()
    }

    /// Highest number of simultaneously allocated blocks since creation or the
    /// last [`reset_max_in_use`](Self::reset_max_in_use).
    pub fn max_in_use(&self) -> usize {
        self.max_in_use.load(Ordering::Acquire)
    }

    /// Restart high-water tracking from the current usage.
    pub fn reset_max_in_use(&self) {
        self.max_in_use.store(self.in_use(), Ordering::Release);
    }

    /// Settings stamped on every freshly allocated block.
    pub fn settings(&self) -> AudioSettings {
        self.settings
    }
}

impl core::fmt::Debug for BlockPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockPool")
            .field("capacity", &self.capacity)
            .field("in_use", &self.in_use())
            .field("max_in_use", &self.max_in_use())
            .finish()
    }
}

fn reserve_slice<T>(
    len: usize,
    what: &'static str,
    mut init: impl FnMut(usize) -> T,
) -> Result<Box<[T]>, ConfigError> {
    let mut items = Vec::new();
    items
        .try_reserve_exact(len)
        .map_err(|_| ConfigError::OutOfMemory(what))?;
    for i in 0..len {
        items.push(init(i));
    }
    Ok(items.into_boxed_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(capacity: usize) -> BlockPool {
        BlockPool::new(capacity, AudioSettings::new(24_000.0, 32)).unwrap()
    }

    #[test]
    fn alloc_returns_slot() {
        let pool = pool(8);
        let handle = pool.alloc_slot().unwrap();
        assert!(handle.index() < 8);
        assert_eq!(pool.refcount(handle), 1);
        assert_eq!(pool.in_use(), 1);
    }

    #[test]
    fn alloc_zeroes_data_and_stamps_settings() {
        let pool = pool(4);
        {
            let mut block = pool.allocate().unwrap();
            block.fill(0.75);
            block.set_id(9);
        }
        let block = pool.allocate().unwrap();
        assert!(block.iter().all(|&s| s == 0.0));
        assert_eq!(block.len(), 32);
        assert_eq!(block.sample_rate_hz(), 24_000.0);
        assert_eq!(block.id(), 0);
    }

    #[test]
    fn alloc_unique_slots() {
        let pool = pool(40);
        let mut slots: Vec<usize> = (0..40).map(|_| pool.alloc_slot().unwrap().index()).collect();
        slots.sort();
        slots.dedup();
        assert_eq!(slots.len(), 40);
        assert!(slots.iter().all(|&s| s < 40), "slot past capacity handed out");
    }

    #[test]
    fn alloc_exhaustion() {
        let pool = pool(MAX_POOL_BLOCKS);
        for _ in 0..MAX_POOL_BLOCKS {
            assert!(pool.alloc_slot().is_some());
        }
        assert!(pool.alloc_slot().is_none());
        assert!(pool.allocate().is_none());
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn release_restores_exactly_released_count() {
        let pool = pool(6);
        let handles: Vec<_> = (0..6).map(|_| pool.alloc_slot().unwrap()).collect();
        assert!(pool.alloc_slot().is_none());

        pool.dec_ref(handles[1]);
        pool.dec_ref(handles[4]);
        assert_eq!(pool.available(), 2);

        let a = pool.alloc_slot().unwrap();
        let b = pool.alloc_slot().unwrap();
        assert!(pool.alloc_slot().is_none());
        let mut reused = [a.index(), b.index()];
        reused.sort();
        assert_eq!(reused, [handles[1].index(), handles[4].index()]);
    }

    #[test]
    fn refcount_lifecycle() {
        let pool = pool(4);
        let handle = pool.alloc_slot().unwrap();
        assert_eq!(pool.refcount(handle), 1);

        pool.inc_ref(handle);
        assert_eq!(pool.refcount(handle), 2);

        pool.dec_ref(handle);
        assert_eq!(pool.refcount(handle), 1);
        assert_eq!(pool.in_use(), 1); // still allocated

        pool.dec_ref(handle);
        assert_eq!(pool.in_use(), 0); // now freed
    }

    #[test]
    fn generation_invalidates_stale_handle() {
        let pool = pool(1);
        let first = pool.alloc_slot().unwrap();
        assert!(pool.is_live(first));
        pool.dec_ref(first);
        assert!(!pool.is_live(first));

        let second = pool.alloc_slot().unwrap();
        assert_eq!(second.index(), first.index());
        assert_ne!(second.generation(), first.generation());
        assert!(!pool.is_live(first));
        assert!(pool.is_live(second));
    }

    #[test]
    fn high_water_mark() {
        let pool = pool(8);
        let a = pool.alloc_slot().unwrap();
        let b = pool.alloc_slot().unwrap();
        let c = pool.alloc_slot().unwrap();
        pool.dec_ref(b);
        pool.dec_ref(c);
        assert_eq!(pool.in_use(), 1);
        assert_eq!(pool.max_in_use(), 3);

        pool.reset_max_in_use();
        assert_eq!(pool.max_in_use(), 1);
        pool.dec_ref(a);
        assert_eq!(pool.max_in_use(), 1);
    }

    #[test]
    fn rejects_bad_capacity() {
        let settings = AudioSettings::default();
        assert_eq!(
            BlockPool::new(0, settings).unwrap_err(),
            ConfigError::PoolCapacity { requested: 0, max: MAX_POOL_BLOCKS }
        );
        assert!(BlockPool::new(MAX_POOL_BLOCKS + 1, settings).is_err());
        assert!(BlockPool::new(4, AudioSettings::new(24_000.0, 0)).is_err());
    }
}
