//! Lock-free single-producer single-consumer byte ring.
//!
//! The only structure that may be touched from the realtime callback and an
//! application thread at the same time. [`RingBuffer::split`] hands out one
//! [`RingProducer`] and one [`RingConsumer`]; neither is `Clone`, so the
//! single-producer/single-consumer contract is enforced by ownership.
//!
//! Cursors live in `[0, 2 * capacity)`: the doubled modulus tells a full ring
//! (`write - read == capacity`) from an empty one (`write == read`) without
//! sacrificing a slot. Byte offsets are the cursors taken modulo `capacity`.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::models::error::StreamError;

/// Capacities are rounded up to a multiple of this many bytes.
pub const RING_ALIGNMENT: usize = 4096;

/// Largest capacity the cursor arithmetic supports.
pub const MAX_RING_CAPACITY: usize = usize::MAX / 4 / RING_ALIGNMENT * RING_ALIGNMENT;

struct Shared {
    storage: Box<[UnsafeCell<u8>]>,
    capacity: usize,
    write: AtomicUsize,
    read: AtomicUsize,
}

// SAFETY: `storage` is only accessed through regions derived from the
// cursors. The producer touches `[write, write + free)` and the consumer
// `[read, read + fill)`; these never overlap while fill + free == capacity,
// which `advance` preserves. Release stores on a cursor publish the bytes
// written or released before it, and the opposite side loads with Acquire.
unsafe impl Sync for Shared {}

impl Shared {
    fn base(&self) -> *mut u8 {
        UnsafeCell::raw_get(self.storage.as_ptr())
    }

    fn distance(&self, write: usize, read: usize) -> usize {
        (write + 2 * self.capacity - read) % (2 * self.capacity)
    }

    fn advance(&self, cursor: usize, n: usize) -> usize {
        (cursor + n) % (2 * self.capacity)
    }

    fn offset(&self, cursor: usize) -> usize {
        cursor % self.capacity
    }

    fn fill_count(&self) -> usize {
        let write = self.write.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Acquire);
        self.distance(write, read)
    }

    /// # Safety
    ///
    /// `start..start + len` must lie within the storage and must not be
    /// accessed by the other side for the lifetime of the returned slice.
    unsafe fn slice_mut(&self, start: usize, len: usize) -> &mut [u8] {
        debug_assert!(start + len <= self.capacity);
        std::slice::from_raw_parts_mut(self.base().add(start), len)
    }

    /// # Safety
    ///
    /// Same contract as [`Shared::slice_mut`].
    unsafe fn slice(&self, start: usize, len: usize) -> &[u8] {
        debug_assert!(start + len <= self.capacity);
        std::slice::from_raw_parts(self.base().add(start), len)
    }
}

/// Fixed-capacity byte ring, not yet split into its two halves.
pub struct RingBuffer {
    shared: Arc<Shared>,
}

impl RingBuffer {
    /// Creates a ring holding at least `requested` bytes.
    ///
    /// The capacity is rounded up to [`RING_ALIGNMENT`]; a request of zero
    /// yields one alignment unit.
    pub fn new(requested: usize) -> Result<Self, StreamError> {
        let units = requested.max(1).div_ceil(RING_ALIGNMENT);
        let capacity = units
            .checked_mul(RING_ALIGNMENT)
            .filter(|&capacity| capacity <= MAX_RING_CAPACITY)
            .ok_or(StreamError::NoMem)?;

        let storage = (0..capacity).map(|_| UnsafeCell::new(0u8)).collect();
        Ok(Self {
            shared: Arc::new(Shared {
                storage,
                capacity,
                write: AtomicUsize::new(0),
                read: AtomicUsize::new(0),
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn fill_count(&self) -> usize {
        self.shared.fill_count()
    }

    pub fn free_count(&self) -> usize {
        self.capacity() - self.fill_count()
    }

    /// Empties the ring. Exclusive access guarantees no transfer is in flight.
    pub fn clear(&mut self) {
        self.shared.write.store(0, Ordering::Release);
        self.shared.read.store(0, Ordering::Release);
    }

    /// Reassembles a ring from its two halves so it can be cleared.
    /// Halves of different rings are handed back unchanged.
    pub fn join(
        producer: RingProducer,
        consumer: RingConsumer,
    ) -> Result<Self, (RingProducer, RingConsumer)> {
        if !Arc::ptr_eq(&producer.shared, &consumer.shared) {
            return Err((producer, consumer));
        }
        drop(producer);
        Ok(Self {
            shared: consumer.shared,
        })
    }

    pub fn split(self) -> (RingProducer, RingConsumer) {
        (
            RingProducer {
                shared: Arc::clone(&self.shared),
            },
            RingConsumer {
                shared: self.shared,
            },
        )
    }
}

/// Write half of a [`RingBuffer`].
pub struct RingProducer {
    shared: Arc<Shared>,
}

impl RingProducer {
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn fill_count(&self) -> usize {
        self.shared.fill_count()
    }

    pub fn free_count(&self) -> usize {
        self.capacity() - self.fill_count()
    }

    pub fn is_full(&self) -> bool {
        self.free_count() == 0
    }

    /// Contiguous free region at the write cursor.
    ///
    /// Shorter than [`free_count`](Self::free_count) when the free space
    /// wraps past the end of the storage.
    pub fn write_slice(&mut self) -> &mut [u8] {
        let shared = &*self.shared;
        let write = shared.write.load(Ordering::Relaxed);
        let read = shared.read.load(Ordering::Acquire);
        let free = shared.capacity - shared.distance(write, read);
        let offset = shared.offset(write);
        let len = free.min(shared.capacity - offset);
        // SAFETY: the region is free space, which the consumer never reads,
        // and `&mut self` rules out a second live producer slice.
        unsafe { shared.slice_mut(offset, len) }
    }

    /// Publishes `n` bytes written through [`write_slice`](Self::write_slice).
    ///
    /// `n` must not exceed the free count. Debug builds panic on violation;
    /// release builds clamp.
    pub fn advance_write(&mut self, n: usize) {
        let shared = &*self.shared;
        let write = shared.write.load(Ordering::Relaxed);
        let read = shared.read.load(Ordering::Acquire);
        let free = shared.capacity - shared.distance(write, read);
        debug_assert!(n <= free, "advance_write({}) exceeds free count {}", n, free);
        let n = n.min(free);
        shared.write.store(shared.advance(write, n), Ordering::Release);
    }

    /// Copies as much of `data` as fits and returns the byte count written.
    pub fn push_slice(&mut self, data: &[u8]) -> usize {
        let mut staged = self.stage();
        let written = staged.write(data);
        staged.commit();
        written
    }

    /// Starts a multi-part write that is published in one step by
    /// [`StagedWrite::commit`]. Dropping it uncommitted discards the bytes.
    pub fn stage(&mut self) -> StagedWrite<'_> {
        let shared = &*self.shared;
        let write = shared.write.load(Ordering::Relaxed);
        let read = shared.read.load(Ordering::Acquire);
        let available = shared.capacity - shared.distance(write, read);
        StagedWrite {
            producer: self,
            start: write,
            available,
            written: 0,
        }
    }
}

/// Pending write into a [`RingProducer`]. Wraps across the end of the
/// storage transparently.
pub struct StagedWrite<'a> {
    producer: &'a mut RingProducer,
    start: usize,
    available: usize,
    written: usize,
}

impl StagedWrite<'_> {
    /// Bytes that can still be staged.
    pub fn remaining(&self) -> usize {
        self.available - self.written
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Copies as much of `data` as fits and returns the byte count staged.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let mut copied = 0;
        self.fill_with(data.len(), |dst, from| {
            dst.copy_from_slice(&data[from..from + dst.len()]);
            copied += dst.len();
        });
        copied
    }

    /// Stages up to `n` zero bytes and returns the count staged.
    pub fn write_zeros(&mut self, n: usize) -> usize {
        let mut zeroed = 0;
        self.fill_with(n, |dst, _| {
            dst.fill(0);
            zeroed += dst.len();
        });
        zeroed
    }

    fn fill_with(&mut self, n: usize, mut copy: impl FnMut(&mut [u8], usize)) {
        let shared = &*self.producer.shared;
        let n = n.min(self.remaining());
        let mut done = 0;
        while done < n {
            let offset = shared.offset(self.start + self.written);
            let len = (n - done).min(shared.capacity - offset);
            // SAFETY: the span lies within the free space observed when
            // staging began, which only grows while the producer is held.
            let dst = unsafe { shared.slice_mut(offset, len) };
            copy(dst, done);
            done += len;
            self.written += len;
        }
    }

    /// Publishes everything staged so far and returns its length.
    pub fn commit(self) -> usize {
        let shared = &*self.producer.shared;
        shared
            .write
            .store(shared.advance(self.start, self.written), Ordering::Release);
        self.written
    }
}

/// Read half of a [`RingBuffer`].
pub struct RingConsumer {
    shared: Arc<Shared>,
}

impl RingConsumer {
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn fill_count(&self) -> usize {
        self.shared.fill_count()
    }

    pub fn free_count(&self) -> usize {
        self.capacity() - self.fill_count()
    }

    pub fn is_empty(&self) -> bool {
        self.fill_count() == 0
    }

    /// Contiguous readable region at the read cursor.
    ///
    /// Shorter than [`fill_count`](Self::fill_count) when the data wraps
    /// past the end of the storage.
    pub fn read_slice(&self) -> &[u8] {
        let shared = &*self.shared;
        let read = shared.read.load(Ordering::Relaxed);
        let write = shared.write.load(Ordering::Acquire);
        let fill = shared.distance(write, read);
        let offset = shared.offset(read);
        let len = fill.min(shared.capacity - offset);
        // SAFETY: the region holds published bytes the producer will not
        // overwrite until `advance_read`, which needs `&mut self` and so
        // cannot run while this slice is borrowed.
        unsafe { shared.slice(offset, len) }
    }

    /// Releases `n` bytes read through [`read_slice`](Self::read_slice).
    ///
    /// `n` must not exceed the fill count. Debug builds panic on violation;
    /// release builds clamp.
    pub fn advance_read(&mut self, n: usize) {
        let shared = &*self.shared;
        let read = shared.read.load(Ordering::Relaxed);
        let write = shared.write.load(Ordering::Acquire);
        let fill = shared.distance(write, read);
        debug_assert!(n <= fill, "advance_read({}) exceeds fill count {}", n, fill);
        let n = n.min(fill);
        shared.read.store(shared.advance(read, n), Ordering::Release);
    }

    /// Copies up to `out.len()` bytes out of the ring and returns the count.
    pub fn pop_slice(&mut self, out: &mut [u8]) -> usize {
        let mut copied = 0;
        while copied < out.len() {
            let chunk = self.read_slice();
            let len = chunk.len().min(out.len() - copied);
            if len == 0 {
                break;
            }
            out[copied..copied + len].copy_from_slice(&chunk[..len]);
            self.advance_read(len);
            copied += len;
        }
        copied
    }

    /// Drops everything currently readable. Safe to call while the producer
    /// keeps writing; bytes published afterwards are kept.
    pub fn discard_all(&mut self) -> usize {
        let shared = &*self.shared;
        let read = shared.read.load(Ordering::Relaxed);
        let write = shared.write.load(Ordering::Acquire);
        shared.read.store(write, Ordering::Release);
        shared.distance(write, read)
    }
}
