//! Single-producer/single-consumer byte ring buffer.
//!
//! Structurally grounded in the teacher's generic SPSC `RingBuffer<T>` (raw
//! pointer + `Arc<AtomicU64>` cursors + an optional owned backing allocation
//! kept alive alongside the pointer), but byte-oriented with arbitrary
//! (non-power-of-two) capacity: indices wrap with an explicit modulo rather
//! than a bitmask, since capacity here is driven by `8 + message_size` rather
//! than chosen for fast masking.

use std::ptr;
use std::sync::atomic::{fence, AtomicU64, Ordering};
use std::sync::Arc;

/// Lock-free SPSC byte FIFO over a caller-owned or heap-allocated backing array.
///
/// One byte of capacity is always reserved to disambiguate full from empty:
/// a buffer of `capacity` bytes can hold at most `capacity - 1` bytes at once.
pub struct RingBuffer {
    buffer: *mut u8,
    capacity: usize,
    read_index: Arc<AtomicU64>,
    write_index: Arc<AtomicU64>,
    _heap: Option<Box<[u8]>>,
}

unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}

impl RingBuffer {
    /// Create a ring buffer backed by a fresh heap allocation of `capacity` bytes.
    ///
    /// # Panics
    /// Panics if `capacity < 2`: a buffer must have room for at least one
    /// usable byte once the full/empty-disambiguating slot is reserved.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 2, "ring buffer capacity must be >= 2, got {capacity}");
        let heap: Box<[u8]> = vec![0u8; capacity].into_boxed_slice();
        let ptr = heap.as_ptr() as *mut u8;
        Self {
            buffer: ptr,
            capacity,
            read_index: Arc::new(AtomicU64::new(0)),
            write_index: Arc::new(AtomicU64::new(0)),
            _heap: Some(heap),
        }
    }

    /// Capacity in bytes, including the one reserved disambiguation slot.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    fn read_pos(&self) -> u64 {
        self.read_index.load(Ordering::Acquire)
    }

    #[inline]
    fn write_pos(&self) -> u64 {
        self.write_index.load(Ordering::Acquire)
    }

    /// Bytes available to read right now.
    #[inline]
    pub fn available_read(&self) -> usize {
        let w = self.write_pos();
        let r = self.read_pos();
        let cap = self.capacity as u64;
        (((w + cap) - r) % cap) as usize
    }

    /// Bytes of free space available to write right now.
    #[inline]
    pub fn available_write(&self) -> usize {
        self.capacity - 1 - self.available_read()
    }

    /// True if the buffer has a valid backing allocation.
    #[inline]
    pub fn is_created(&self) -> bool {
        !self.buffer.is_null()
    }

    /// Write `src` into the buffer. Returns `false` without modifying any
    /// state if there isn't enough room.
    pub fn write(&self, src: &[u8]) -> bool {
        let n = src.len();
        if n == 0 {
            return true;
        }
        if self.available_write() < n {
            return false;
        }
        let cap = self.capacity;
        let w = self.write_pos();
        let at = (w as usize) % cap;
        let first_size = (cap - at).min(n);
        let second_size = n - first_size;

        unsafe {
            ptr::copy_nonoverlapping(src.as_ptr(), self.buffer.add(at), first_size);
            if second_size > 0 {
                ptr::copy_nonoverlapping(src.as_ptr().add(first_size), self.buffer, second_size);
            }
        }

        fence(Ordering::Release);
        self.write_index.store(w + n as u64, Ordering::Release);
        true
    }

    /// Read `dst.len()` bytes into `dst`, advancing the read cursor. Returns
    /// `false` without modifying any state if fewer bytes are available.
    pub fn read(&self, dst: &mut [u8]) -> bool {
        if !self.peek(dst) {
            return false;
        }
        self.skip(dst.len());
        true
    }

    /// Like [`read`](Self::read) but does not advance the read cursor.
    pub fn peek(&self, dst: &mut [u8]) -> bool {
        let n = dst.len();
        if n == 0 {
            return true;
        }
        if self.available_read() < n {
            return false;
        }
        let cap = self.capacity;
        let r = self.read_pos();
        let at = (r as usize) % cap;
        let first_size = (cap - at).min(n);
        let second_size = n - first_size;

        unsafe {
            ptr::copy_nonoverlapping(self.buffer.add(at), dst.as_mut_ptr(), first_size);
            if second_size > 0 {
                ptr::copy_nonoverlapping(self.buffer, dst.as_mut_ptr().add(first_size), second_size);
            }
        }
        true
    }

    /// Advance the read cursor by `n` bytes without copying — used to discard
    /// bytes already inspected via [`peek`](Self::peek).
    ///
    /// # Panics
    /// Panics if fewer than `n` bytes are available.
    pub fn skip(&self, n: usize) {
        assert!(self.available_read() >= n, "skip past available data");
        let r = self.read_pos();
        fence(Ordering::Release);
        self.read_index.store(r + n as u64, Ordering::Release);
    }

    /// Invalidate the buffer: subsequent `is_created` calls return `false`.
    /// Present for parity with the reference implementation; not used on any
    /// hot path.
    pub fn clear(&mut self) {
        self.buffer = ptr::null_mut();
        self.capacity = 0;
        self.read_index.store(0, Ordering::Relaxed);
        self.write_index.store(0, Ordering::Relaxed);
        self._heap = None;
    }
}
