use core::fmt;
use core::ops::{Deref, DerefMut};

use crate::constants::MAX_BLOCK_SAMPLES;

use super::pool::{AudioBlockData, BlockHandle, BlockPool};

/// Exclusive (mutable) handle to an audio block in a [`BlockPool`].
///
/// There is exactly one `AudioBlockMut` per allocated slot, so the holder may
/// mutate samples and metadata freely. Derefs to the active samples
/// (`len()` of them). Dropping it releases the block.
pub struct AudioBlockMut<'p> {
    pool: &'p BlockPool,
    handle: BlockHandle,
}

impl<'p> AudioBlockMut<'p> {
    /// Wrap a slot that was just allocated with refcount 1 and has no other handle.
    pub(crate) fn new(pool: &'p BlockPool, handle: BlockHandle) -> Self {
        AudioBlockMut { pool, handle }
    }

    /// Convert this exclusive reference into a shared reference.
    /// This is a zero-cost conversion (no data copy, no refcount change).
    pub fn into_shared(self) -> AudioBlockRef<'p> {
        let (pool, handle) = (self.pool, self.handle);
        core::mem::forget(self); // don't run Drop (don't dec_ref)
        AudioBlockRef { pool, handle }
    }

    /// Give the block back to the pool. Equivalent to dropping it.
    pub fn release(self) {}

    /// Pool slot and generation of this block.
    pub fn handle(&self) -> BlockHandle {
        self.handle
    }

    /// The pool this block belongs to.
    pub fn pool(&self) -> &'p BlockPool {
        self.pool
    }

    /// Number of active samples.
    pub fn len(&self) -> usize {
        self.data().length
    }

    /// Whether the active length is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capacity of the sample buffer (`full_length`).
    pub const fn full_len(&self) -> usize {
        MAX_BLOCK_SAMPLES
    }

    /// Set the active length, clamped to the buffer capacity.
    pub fn set_len(&mut self, len: usize) {
        self.data_mut().length = len.min(MAX_BLOCK_SAMPLES);
    }

    pub fn id(&self) -> u32 {
        self.data().id
    }

    pub fn set_id(&mut self, id: u32) {
        self.data_mut().id = id;
    }

    pub fn sample_rate_hz(&self) -> f32 {
        self.data().sample_rate_hz
    }

    pub fn set_sample_rate_hz(&mut self, sample_rate_hz: f32) {
        self.data_mut().sample_rate_hz = sample_rate_hz;
    }

    /// The whole sample buffer, regardless of the active length.
    pub fn full_buffer_mut(&mut self) -> &mut [f32; MAX_BLOCK_SAMPLES] {
        &mut self.data_mut().samples
    }

    /// Copy id, sample rate and active length from another block.
    pub fn copy_metadata_from(&mut self, other: &AudioBlockRef<'_>) {
        let data = self.data_mut();
        data.id = other.id();
        data.sample_rate_hz = other.sample_rate_hz();
        data.length = other.len();
    }

    fn data(&self) -> &AudioBlockData {
        // SAFETY: We hold exclusive access (refcount == 1, unique AudioBlockMut).
        unsafe { &*self.pool.data_ptr(self.handle) }
    }

    fn data_mut(&mut self) -> &mut AudioBlockData {
        // SAFETY: We hold exclusive access (refcount == 1, unique AudioBlockMut).
        unsafe { &mut *self.pool.data_ptr(self.handle) }
    }
}

impl Deref for AudioBlockMut<'_> {
    type Target = [f32];

    fn deref(&self) -> &Self::Target {
        let data = self.data();
        &data.samples[..data.length]
    }
}

impl DerefMut for AudioBlockMut<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        let data = self.data_mut();
        &mut data.samples[..data.length]
    }
}

impl Drop for AudioBlockMut<'_> {
    fn drop(&mut self) {
        self.pool.dec_ref(self.handle);
    }
}

impl fmt::Debug for AudioBlockMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioBlockMut")
            .field("handle", &self.handle)
            .field("len", &self.len())
            .field("id", &self.id())
            .finish()
    }
}

/// Shared (immutable) handle to an audio block.
///
/// Multiple `AudioBlockRef`s can point to the same slot. Cloning increments the
/// refcount; dropping decrements it. When the last reference is dropped, the
/// pool slot is freed.
pub struct AudioBlockRef<'p> {
    pool: &'p BlockPool,
    handle: BlockHandle,
}

impl<'p> AudioBlockRef<'p> {
    /// Pool slot and generation of this block.
    pub fn handle(&self) -> BlockHandle {
        self.handle
    }

    /// Number of holders of this block, this one included.
    pub fn refcount(&self) -> u8 {
        self.pool.refcount(self.handle)
    }

    pub fn len(&self) -> usize {
        self.data().length
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn id(&self) -> u32 {
        self.data().id
    }

    pub fn sample_rate_hz(&self) -> f32 {
        self.data().sample_rate_hz
    }

    /// Drop this reference. Equivalent to dropping it.
    pub fn release(self) {}

    /// Try to convert back to an exclusive mutable reference.
    ///
    /// - If this is the only reference (refcount == 1), converts in place (no copy).
    /// - If there are other references, allocates a new block, copies samples and
    ///   metadata, and releases this reference. Returns `None` if the pool is
    ///   exhausted (this reference is released either way).
    pub fn into_mut(self) -> Option<AudioBlockMut<'p>> {
        if self.refcount() == 1 {
            // We're the sole owner — convert in place
            let (pool, handle) = (self.pool, self.handle);
            core::mem::forget(self);
            Some(AudioBlockMut::new(pool, handle))
        } else {
            // Copy-on-write: allocate a new block and copy
            let new_handle = self.pool.alloc_slot()?;
            // SAFETY: the new slot is exclusively ours; the old one is only read.
            unsafe {
                *self.pool.data_ptr(new_handle) = *self.pool.data_ptr(self.handle);
            }
            let pool = self.pool;
            drop(self);
            Some(AudioBlockMut::new(pool, new_handle))
        }
    }

    fn data(&self) -> &AudioBlockData {
        // SAFETY: Slot is allocated and data is immutable through shared references.
        unsafe { &*self.pool.data_ptr(self.handle) }
    }
}

impl Deref for AudioBlockRef<'_> {
    type Target = [f32];

    fn deref(&self) -> &Self::Target {
        let data = self.data();
        &data.samples[..data.length]
    }
}

impl Clone for AudioBlockRef<'_> {
    fn clone(&self) -> Self {
        self.pool.inc_ref(self.handle);
        AudioBlockRef {
            pool: self.pool,
            handle: self.handle,
        }
    }
}

impl Drop for AudioBlockRef<'_> {
    fn drop(&mut self) {
        self.pool.dec_ref(self.handle);
    }
}

impl fmt::Debug for AudioBlockRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioBlockRef")
            .field("handle", &self.handle)
            .field("refcount", &self.refcount())
            .field("len", &self.len())
            .field("id", &self.id())
            .finish()
    }
}
