//! Lock-free single-producer single-consumer (SPSC) ring.
//!
//! Carries owned audio buffers between the tick context and a lower-priority
//! context (a background loop, a host thread). One side may only call the
//! producer methods and the other only the consumer methods; the two sides may
//! run concurrently.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Bounded SPSC queue of `N` slots, `N - 1` of them usable.
///
/// One slot always stays empty so that `head == tail` means empty and
/// `head + 1 == tail` means full without a separate counter.
pub struct SpscQueue<T, const N: usize> {
    slots: [UnsafeCell<MaybeUninit<T>>; N],
    /// Next slot the producer writes. Advanced only by the producer.
    head: AtomicUsize,
    /// Next slot the consumer reads. Advanced only by the consumer.
    tail: AtomicUsize,
}

// SAFETY: values move between contexts, so `T: Send`. Each slot is touched by
// exactly one side at a time: the producer owns `[head, tail - 1)` and the
// consumer owns `[tail, head)`, and the Release/Acquire pairs on `head` and
// `tail` publish slot contents before ownership changes hands.
unsafe impl<T: Send, const N: usize> Sync for SpscQueue<T, N> {}
unsafe impl<T: Send, const N: usize> Send for SpscQueue<T, N> {}

impl<T, const N: usize> SpscQueue<T, N> {
    const SLOTS_OK: () = assert!(N >= 2, "SpscQueue needs at least 2 slots");

    pub const fn new() -> Self {
        let () = Self::SLOTS_OK;
        SpscQueue {
            slots: [const { UnsafeCell::new(MaybeUninit::uninit()) }; N],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Number of values the queue can hold.
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Producer side: enqueue `value`, or hand it back if the queue is full.
    pub fn push(&self, value: T) -> Result<(), T> {
        let head = self.head.load(Ordering::Relaxed);
        let next = (head + 1) % N;
        if next == self.tail.load(Ordering::Acquire) {
            return Err(value);
        }
        // SAFETY: slot `head` belongs to the producer until `head` is published.
        unsafe { (*self.slots[head].get()).write(value) };
        self.head.store(next, Ordering::Release);
        Ok(())
    }

    /// Consumer side: dequeue the oldest value.
    pub fn pop(&self) -> Option<T> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: `tail != head`, so the producer initialized this slot and
        // will not touch it again until `tail` moves past it.
        let value = unsafe { (*self.slots[tail].get()).assume_init_read() };
        self.tail.store((tail + 1) % N, Ordering::Release);
        Some(value)
    }

    /// Consumer side: drop everything currently queued. Returns how many values were dropped.
    pub fn clear(&self) -> usize {
        let mut dropped = 0;
        while self.pop().is_some() {
            dropped += 1;
        }
        dropped
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == N - 1
    }

    /// Snapshot of the number of queued values.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        (head + N - tail) % N
    }
}

impl<T, const N: usize> Default for SpscQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for SpscQueue<T, N> {
    fn drop(&mut self) {
        self.clear();
    }
}
