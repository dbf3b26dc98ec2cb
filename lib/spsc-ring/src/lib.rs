// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A single-producer/single-consumer byte FIFO, backed by borrowed memory.
//!
//! When given an `n`-byte slice of backing memory, a [`Ring`] can store up to
//! `n - 1` bytes in FIFO order. One slot is sacrificed so that the empty and
//! full conditions are distinguishable from the two indices alone, without a
//! separate element count.
//!
//! # Design goals
//!
//! There are many ways of implementing a circular buffer. This version's
//! design goals are:
//!
//! 1. `no_std`, no allocation: backing memory is supplied by the caller, so a
//!    ring can live in a named `static` for debug visibility.
//! 2. Support the classic serial-driver split: one side of the ring is filled
//!    from an interrupt handler or a second thread while the other side is
//!    drained by protocol code. [`Ring::split`] hands out a [`Producer`] and a
//!    [`Consumer`] that can be moved to different execution contexts.
//! 3. Expose contiguous regions of the buffer ([`Consumer::linear_read`],
//!    [`Producer::linear_write`]) so DMA engines can transfer straight into
//!    or out of the backing memory, with [`Consumer::skip`] and
//!    [`Producer::advance`] to account for what the hardware moved.
//!
//! Non-goals: multi-producer or multi-consumer operation, and element types
//! other than bytes.
//!
//! # Memory ordering
//!
//! The write index is only ever stored by the producer and the read index
//! only by the consumer. Each side loads its own index relaxed, loads the
//! opposing index with acquire, and publishes its own index with release
//! *after* the byte copy, so the other side never observes an index covering
//! bytes that are not yet (or no longer) there.
//!
//! With the `disable-atomics` feature the index cells degrade to volatile
//! word accesses. That mode is only sound where a plain word store is
//! naturally atomic and both sides share one core (thread + ISR); it exists
//! for targets without atomic instructions and must be opted into explicitly.

#![cfg_attr(not(test), no_std)]

use core::cell::UnsafeCell;

/// Operations reported to a ring's event callback.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RingEvent {
    /// Bytes were committed on the write side (`write` or `advance`).
    Write,
    /// Bytes were released on the read side (`read` or `skip`).
    Read,
    /// Both indices were cleared.
    Reset,
}

/// Event callback: operation kind plus the number of bytes it moved.
///
/// This is a plain function pointer rather than a closure so that a ring
/// remains shareable between the producer and consumer contexts; anything
/// with captured state would need its own synchronisation.
pub type RingEventFn = fn(RingEvent, usize);

#[cfg(not(feature = "disable-atomics"))]
mod index {
    use core::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) struct Index(AtomicUsize);

    impl Index {
        pub(crate) const fn zero() -> Self {
            Self(AtomicUsize::new(0))
        }

        /// Load for the side that owns this index.
        pub(crate) fn load_owned(&self) -> usize {
            self.0.load(Ordering::Relaxed)
        }

        /// Load for the side that observes this index.
        pub(crate) fn load_opposite(&self) -> usize {
            self.0.load(Ordering::Acquire)
        }

        /// Publish a new value after the byte copy is complete.
        pub(crate) fn store(&self, val: usize) {
            self.0.store(val, Ordering::Release);
        }
    }
}

#[cfg(feature = "disable-atomics")]
mod index {
    use core::cell::UnsafeCell;

    pub(crate) struct Index(UnsafeCell<usize>);

    // The single-writer discipline still holds in this mode; volatile word
    // access stands in for the atomics on targets that lack them.
    unsafe impl Sync for Index {}

    impl Index {
        pub(crate) const fn zero() -> Self {
            Self(UnsafeCell::new(0))
        }

        pub(crate) fn load_owned(&self) -> usize {
            unsafe { self.0.get().read_volatile() }
        }

        pub(crate) fn load_opposite(&self) -> usize {
            unsafe { self.0.get().read_volatile() }
        }

        pub(crate) fn store(&self, val: usize) {
            unsafe { self.0.get().write_volatile(val) }
        }
    }
}

use index::Index;

/// A fixed-capacity byte FIFO over caller-provided storage.
///
/// Through `&mut Ring` every operation is available directly; this is the
/// right surface when producer and consumer run in one context (tests, a
/// polled main loop). For cross-context use, call [`Ring::split`] and move
/// the halves apart.
pub struct Ring<'s> {
    storage: &'s [UnsafeCell<u8>],
    w: Index,
    r: Index,
    evt_fn: Option<RingEventFn>,
}

// Safety: the storage cells are only touched according to the index
// protocol: the producer writes exclusively inside the free region and the
// consumer reads exclusively inside the used region, and the regions are
// disjoint. The indices themselves are single-writer cells (see `Index`).
unsafe impl Send for Ring<'_> {}
unsafe impl Sync for Ring<'_> {}

/// Write half of a split ring. Owns the write index.
pub struct Producer<'r, 's> {
    ring: &'r Ring<'s>,
}

/// Read half of a split ring. Owns the read index.
pub struct Consumer<'r, 's> {
    ring: &'r Ring<'s>,
}

impl<'s> Ring<'s> {
    /// Creates a ring over `storage`. The ring is initially empty and can
    /// hold up to `storage.len() - 1` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `storage` is empty.
    pub fn new(storage: &'s mut [u8]) -> Self {
        assert!(!storage.is_empty(), "ring storage must not be empty");
        // An exclusive borrow of the bytes is held for 's, so wrapping them
        // in cells does not introduce any aliasing the caller can observe.
        let storage = unsafe {
            &*(storage as *mut [u8] as *const [UnsafeCell<u8>])
        };
        Self {
            storage,
            w: Index::zero(),
            r: Index::zero(),
            evt_fn: None,
        }
    }

    /// Number of bytes the ring can hold (one less than the backing slice).
    pub fn capacity(&self) -> usize {
        self.storage.len() - 1
    }

    /// Sets or clears the event callback. Fired after writes, reads and
    /// resets with the byte count the operation actually moved.
    pub fn set_event_fn(&mut self, evt_fn: Option<RingEventFn>) {
        self.evt_fn = evt_fn;
    }

    /// Splits the ring into its producer and consumer halves.
    ///
    /// The halves borrow the ring, so the ring itself must be kept alive
    /// (typically in a `static` or an outer stack frame) while they are in
    /// use. Each half can be moved to its own execution context.
    pub fn split(&mut self) -> (Producer<'_, 's>, Consumer<'_, 's>) {
        (Producer { ring: self }, Consumer { ring: self })
    }

    /// Clears both indices, discarding all buffered bytes.
    ///
    /// Requires `&mut self`: resetting is not safe against a concurrent
    /// operation on either side, so the application must quiesce first.
    pub fn reset(&mut self) {
        self.w.store(0);
        self.r.store(0);
        self.send_evt(RingEvent::Reset, 0);
    }

    /// Copies as much of `data` as fits and returns the number of bytes
    /// written; `0` when the ring is full.
    pub fn write(&mut self, data: &[u8]) -> usize {
        unsafe { self.write_side(data) }
    }

    /// Reads up to `out.len()` bytes and returns how many were copied; `0`
    /// when the ring is empty.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        unsafe { self.read_side(out) }
    }

    /// Non-destructive read: copies up to `out.len()` bytes starting `skip`
    /// bytes past the read index, without moving it.
    pub fn peek(&self, skip: usize, out: &mut [u8]) -> usize {
        unsafe { self.peek_side(skip, out) }
    }

    /// Advances the read index by up to `count` bytes, as if they had been
    /// read. Returns the number of bytes actually skipped.
    pub fn skip(&mut self, count: usize) -> usize {
        unsafe { self.skip_side(count) }
    }

    /// Advances the write index by up to `count` bytes, declaring bytes that
    /// something else (typically DMA) placed in the linear write region.
    /// Returns the number of bytes actually advanced.
    pub fn advance(&mut self, count: usize) -> usize {
        unsafe { self.advance_side(count) }
    }

    /// Bytes available to write before the ring is full.
    pub fn free(&self) -> usize {
        self.free_inner()
    }

    /// Bytes buffered and available to read.
    pub fn available(&self) -> usize {
        self.available_inner()
    }

    /// Checks whether the ring is empty.
    pub fn is_empty(&self) -> bool {
        self.available_inner() == 0
    }

    /// The contiguous readable region at the read index. May be shorter than
    /// [`Self::available`] when the used region wraps; empty when the ring
    /// is empty.
    pub fn linear_read(&self) -> &[u8] {
        unsafe { self.linear_read_side() }
    }

    /// The contiguous writable region at the write index. May be shorter
    /// than [`Self::free`]; empty when the ring is full.
    pub fn linear_write(&mut self) -> &mut [u8] {
        unsafe { self.linear_write_side() }
    }

    /// Searches the buffered bytes for `needle`, starting `start_offset`
    /// bytes past the read index. Returns the needle's offset relative to
    /// the read index.
    pub fn find(&self, needle: &[u8], start_offset: usize) -> Option<usize> {
        unsafe { self.find_side(needle, start_offset) }
    }

    fn send_evt(&self, evt: RingEvent, count: usize) {
        if let Some(evt_fn) = self.evt_fn {
            evt_fn(evt, count);
        }
    }

    fn free_inner(&self) -> usize {
        let size = self.storage.len();
        let w = self.w.load_owned();
        let r = self.r.load_opposite();

        // The sentinel slot: a completely full ring still has w one slot
        // behind r, so free() never reaches `size`.
        let used_plus_one = if w >= r { w - r + 1 } else { size - (r - w) + 1 };
        size - used_plus_one
    }

    fn available_inner(&self) -> usize {
        let size = self.storage.len();
        let w = self.w.load_opposite();
        let r = self.r.load_owned();

        if w >= r {
            w - r
        } else {
            size - (r - w)
        }
    }

    /// Producer-side bulk write.
    ///
    /// # Safety
    ///
    /// Caller must have exclusive producer access (hold the only `Producer`,
    /// or `&mut Ring`).
    unsafe fn write_side(&self, data: &[u8]) -> usize {
        let count = data.len().min(self.free_inner());
        if count == 0 {
            return 0;
        }
        let size = self.storage.len();
        let w = self.w.load_owned();

        let first = count.min(size - w);
        unsafe {
            self.copy_in(w, &data[..first]);
        }
        let mut new_w = w + first;
        if count > first {
            unsafe {
                self.copy_in(0, &data[first..count]);
            }
            new_w = count - first;
        }
        if new_w >= size {
            new_w = 0;
        }
        self.w.store(new_w);

        self.send_evt(RingEvent::Write, count);
        count
    }

    /// Consumer-side bulk read.
    ///
    /// # Safety
    ///
    /// Caller must have exclusive consumer access.
    unsafe fn read_side(&self, out: &mut [u8]) -> usize {
        let count = out.len().min(self.available_inner());
        if count == 0 {
            return 0;
        }
        let size = self.storage.len();
        let r = self.r.load_owned();

        let first = count.min(size - r);
        unsafe {
            self.copy_out(r, &mut out[..first]);
        }
        let mut new_r = r + first;
        if count > first {
            unsafe {
                self.copy_out(0, &mut out[first..count]);
            }
            new_r = count - first;
        }
        if new_r >= size {
            new_r = 0;
        }
        self.r.store(new_r);

        self.send_evt(RingEvent::Read, count);
        count
    }

    /// # Safety
    ///
    /// Caller must have exclusive consumer access.
    unsafe fn peek_side(&self, skip: usize, out: &mut [u8]) -> usize {
        let available = self.available_inner();
        if skip >= available {
            return 0;
        }
        let size = self.storage.len();
        let mut r = self.r.load_owned() + skip;
        if r >= size {
            r -= size;
        }

        let count = out.len().min(available - skip);
        if count == 0 {
            return 0;
        }
        let first = count.min(size - r);
        unsafe {
            self.copy_out(r, &mut out[..first]);
            if count > first {
                self.copy_out(0, &mut out[first..count]);
            }
        }
        count
    }

    /// # Safety
    ///
    /// Caller must have exclusive consumer access.
    unsafe fn skip_side(&self, count: usize) -> usize {
        let count = count.min(self.available_inner());
        if count == 0 {
            return 0;
        }
        let size = self.storage.len();
        let mut r = self.r.load_owned() + count;
        if r >= size {
            r -= size;
        }
        self.r.store(r);
        self.send_evt(RingEvent::Read, count);
        count
    }

    /// # Safety
    ///
    /// Caller must have exclusive producer access.
    unsafe fn advance_side(&self, count: usize) -> usize {
        let count = count.min(self.free_inner());
        if count == 0 {
            return 0;
        }
        let size = self.storage.len();
        let mut w = self.w.load_owned() + count;
        if w >= size {
            w -= size;
        }
        self.w.store(w);
        self.send_evt(RingEvent::Write, count);
        count
    }

    /// # Safety
    ///
    /// Caller must have exclusive consumer access for the lifetime of the
    /// returned slice.
    unsafe fn linear_read_side(&self) -> &[u8] {
        let size = self.storage.len();
        let w = self.w.load_opposite();
        let r = self.r.load_owned();

        let len = if w > r {
            w - r
        } else if r > w {
            size - r
        } else {
            0
        };
        // The producer never writes inside [r, r + available), so reading
        // this region is race-free while the consumer holds it.
        unsafe {
            core::slice::from_raw_parts(self.storage[r].get(), len)
        }
    }

    /// # Safety
    ///
    /// Caller must have exclusive producer access for the lifetime of the
    /// returned slice.
    #[allow(clippy::mut_from_ref)]
    unsafe fn linear_write_side(&self) -> &mut [u8] {
        let size = self.storage.len();
        let w = self.w.load_owned();
        let r = self.r.load_opposite();

        let len = if w >= r {
            // When the read index sits at the base, the last slot of the
            // tail is the sentinel and must stay unused.
            if r == 0 {
                size - w - 1
            } else {
                size - w
            }
        } else {
            r - w - 1
        };
        unsafe {
            core::slice::from_raw_parts_mut(self.storage[w].get(), len)
        }
    }

    /// # Safety
    ///
    /// Caller must have exclusive consumer access.
    unsafe fn find_side(&self, needle: &[u8], start_offset: usize) -> Option<usize> {
        if needle.is_empty() {
            return None;
        }
        let available = self.available_inner();
        let end = available.checked_sub(start_offset)?.checked_sub(needle.len())?;
        let size = self.storage.len();
        let r = self.r.load_owned();

        'outer: for skip in start_offset..=start_offset + end {
            let mut pos = r + skip;
            if pos >= size {
                pos -= size;
            }
            for &nb in needle {
                let b = unsafe { self.storage[pos].get().read() };
                if b != nb {
                    continue 'outer;
                }
                pos += 1;
                if pos >= size {
                    pos = 0;
                }
            }
            return Some(skip);
        }
        None
    }

    /// # Safety
    ///
    /// `at + src.len()` must not exceed the storage length, and the region
    /// must be owned by the caller per the index protocol.
    unsafe fn copy_in(&self, at: usize, src: &[u8]) {
        unsafe {
            core::ptr::copy_nonoverlapping(src.as_ptr(), self.storage[at].get(), src.len());
        }
    }

    /// # Safety
    ///
    /// Same contract as [`Self::copy_in`], for the read direction.
    unsafe fn copy_out(&self, at: usize, dst: &mut [u8]) {
        unsafe {
            core::ptr::copy_nonoverlapping(self.storage[at].get(), dst.as_mut_ptr(), dst.len());
        }
    }
}

impl Producer<'_, '_> {
    /// See [`Ring::write`].
    pub fn write(&mut self, data: &[u8]) -> usize {
        unsafe { self.ring.write_side(data) }
    }

    /// See [`Ring::advance`].
    pub fn advance(&mut self, count: usize) -> usize {
        unsafe { self.ring.advance_side(count) }
    }

    /// See [`Ring::linear_write`].
    pub fn linear_write(&mut self) -> &mut [u8] {
        unsafe { self.ring.linear_write_side() }
    }

    /// See [`Ring::free`].
    pub fn free(&self) -> usize {
        self.ring.free_inner()
    }
}

impl Consumer<'_, '_> {
    /// See [`Ring::read`].
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        unsafe { self.ring.read_side(out) }
    }

    /// Reads a single byte (convenience function).
    pub fn pop(&mut self) -> Option<u8> {
        let mut byte = [0];
        if self.read(&mut byte) == 1 {
            Some(byte[0])
        } else {
            None
        }
    }

    /// See [`Ring::peek`].
    pub fn peek(&self, skip: usize, out: &mut [u8]) -> usize {
        unsafe { self.ring.peek_side(skip, out) }
    }

    /// See [`Ring::skip`].
    pub fn skip(&mut self, count: usize) -> usize {
        unsafe { self.ring.skip_side(count) }
    }

    /// See [`Ring::linear_read`].
    pub fn linear_read(&self) -> &[u8] {
        unsafe { self.ring.linear_read_side() }
    }

    /// See [`Ring::available`].
    pub fn available(&self) -> usize {
        self.ring.available_inner()
    }

    /// Checks whether there is nothing to read.
    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    /// See [`Ring::find`].
    pub fn find(&self, needle: &[u8], start_offset: usize) -> Option<usize> {
        unsafe { self.ring.find_side(needle, start_offset) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn base_state() {
        let mut backing = [0; 16];
        let ring = Ring::new(&mut backing);

        assert!(ring.is_empty());
        assert_eq!(ring.capacity(), 15);
        assert_eq!(ring.available(), 0);
        assert_eq!(ring.free(), 15);
    }

    #[test]
    #[should_panic]
    fn empty_storage_rejected() {
        let mut backing = [0; 0];
        let _ = Ring::new(&mut backing);
    }

    #[test]
    fn roundtrip_simple() {
        let mut backing = [0; 16];
        let mut ring = Ring::new(&mut backing);

        assert_eq!(ring.write(b"hello"), 5);
        assert_eq!(ring.available(), 5);
        assert_eq!(ring.free(), 10);

        let mut out = [0; 5];
        assert_eq!(ring.read(&mut out), 5);
        assert_eq!(&out, b"hello");
        assert!(ring.is_empty());
    }

    #[test]
    fn accounting_is_consistent() {
        let mut backing = [0; 16];
        let mut ring = Ring::new(&mut backing);

        for fill in 0..=15 {
            assert_eq!(ring.available(), fill);
            assert_eq!(ring.free() + ring.available(), 15);
            ring.write(&[fill as u8]);
        }
        // Full: the sentinel slot keeps one byte of storage unusable.
        assert_eq!(ring.free(), 0);
        assert_eq!(ring.write(&[0xFF]), 0);
    }

    #[test]
    fn fifo_order_across_wrap() {
        let mut backing = [0; 8];
        let mut ring = Ring::new(&mut backing);
        let mut out = [0; 8];

        // Push the indices near the end of storage, then write across the
        // wrap point.
        assert_eq!(ring.write(b"abcde"), 5);
        assert_eq!(ring.read(&mut out[..5]), 5);
        assert_eq!(ring.write(b"vwxyz"), 5);
        assert_eq!(ring.available(), 5);
        assert_eq!(ring.read(&mut out[..5]), 5);
        assert_eq!(&out[..5], b"vwxyz");
    }

    #[test]
    fn partial_write_when_nearly_full() {
        let mut backing = [0; 8];
        let mut ring = Ring::new(&mut backing);

        assert_eq!(ring.write(b"abcd"), 4);
        // Only 3 slots left; the write is clamped.
        assert_eq!(ring.write(b"efgh"), 3);

        let mut out = [0; 7];
        assert_eq!(ring.read(&mut out), 7);
        assert_eq!(&out, b"abcdefg");
    }

    #[test]
    fn read_empty_returns_zero() {
        let mut backing = [0; 8];
        let mut ring = Ring::new(&mut backing);
        let mut out = [0; 4];

        assert_eq!(ring.read(&mut out), 0);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut backing = [0; 16];
        let mut ring = Ring::new(&mut backing);
        ring.write(b"abcdef");

        let mut out = [0; 3];
        assert_eq!(ring.peek(0, &mut out), 3);
        assert_eq!(&out, b"abc");
        assert_eq!(ring.peek(2, &mut out), 3);
        assert_eq!(&out, b"cde");
        assert_eq!(ring.available(), 6);

        // Skip past everything buffered: nothing to peek.
        assert_eq!(ring.peek(6, &mut out), 0);
        // Peek near the end is clamped.
        assert_eq!(ring.peek(5, &mut out), 1);
        assert_eq!(out[0], b'f');
    }

    #[test]
    fn peek_across_wrap() {
        let mut backing = [0; 8];
        let mut ring = Ring::new(&mut backing);
        let mut out = [0; 6];

        ring.write(b"12345");
        ring.read(&mut out[..5]);
        ring.write(b"abcdef");

        assert_eq!(ring.peek(0, &mut out), 6);
        assert_eq!(&out, b"abcdef");
    }

    #[test]
    fn skip_counts_as_read() {
        let mut backing = [0; 16];
        let mut ring = Ring::new(&mut backing);
        ring.write(b"abcdef");

        assert_eq!(ring.skip(2), 2);
        let mut out = [0; 4];
        assert_eq!(ring.read(&mut out), 4);
        assert_eq!(&out, b"cdef");

        // Skipping more than is buffered is clamped.
        ring.write(b"xy");
        assert_eq!(ring.skip(10), 2);
        assert!(ring.is_empty());
    }

    #[test]
    fn advance_publishes_dma_bytes() {
        let mut backing = [0; 16];
        let mut ring = Ring::new(&mut backing);

        // Imitate a DMA transfer: fill the linear region directly, then
        // advance the write index.
        let region = ring.linear_write();
        region[..4].copy_from_slice(b"dma!");
        assert_eq!(ring.advance(4), 4);

        let mut out = [0; 4];
        assert_eq!(ring.read(&mut out), 4);
        assert_eq!(&out, b"dma!");
    }

    #[test]
    fn linear_regions_respect_wrap() {
        let mut backing = [0; 8];
        let mut ring = Ring::new(&mut backing);
        let mut out = [0; 8];

        // Fresh ring, read index at base: the sentinel limits the writable
        // tail to size - 1.
        assert_eq!(ring.linear_write().len(), 7);

        ring.write(b"abcdef");
        assert_eq!(ring.linear_read().len(), 6);
        ring.read(&mut out[..4]);

        // Used region is e,f at positions 4,5; writable tail runs to the end
        // of storage.
        assert_eq!(ring.linear_read(), b"ef");
        assert_eq!(ring.linear_write().len(), 2);

        ring.write(b"ghi");
        // Now the used region wraps: linear read stops at the end of
        // storage.
        assert_eq!(ring.linear_read(), b"efgh");
    }

    #[test]
    fn find_basic() {
        let mut backing = [0; 32];
        let mut ring = Ring::new(&mut backing);
        ring.write(b"..needle..");

        assert_eq!(ring.find(b"needle", 0), Some(2));
        assert_eq!(ring.find(b"needle", 2), Some(2));
        assert_eq!(ring.find(b"needle", 3), None);
        assert_eq!(ring.find(b"absent", 0), None);
        assert_eq!(ring.find(b"", 0), None);
    }

    #[test]
    fn find_across_wrap() {
        let mut backing = [0; 8];
        let mut ring = Ring::new(&mut backing);
        let mut out = [0; 8];

        ring.write(b"12345");
        ring.read(&mut out[..5]);
        // "abc" lands at the tail, "d" wraps to the base.
        ring.write(b"abcd");

        assert_eq!(ring.find(b"bc", 0), Some(1));
        assert_eq!(ring.find(b"cd", 0), Some(2));
    }

    #[test]
    fn find_at_tail_of_used_region() {
        let mut backing = [0; 32];
        let mut ring = Ring::new(&mut backing);
        ring.write(b"xxxxend");

        assert_eq!(ring.find(b"end", 0), Some(4));
    }

    static WRITE_EVENTS: AtomicUsize = AtomicUsize::new(0);
    static READ_EVENTS: AtomicUsize = AtomicUsize::new(0);
    static RESET_EVENTS: AtomicUsize = AtomicUsize::new(0);

    fn count_events(evt: RingEvent, count: usize) {
        match evt {
            RingEvent::Write => WRITE_EVENTS.fetch_add(count, Ordering::Relaxed),
            RingEvent::Read => READ_EVENTS.fetch_add(count, Ordering::Relaxed),
            RingEvent::Reset => RESET_EVENTS.fetch_add(1, Ordering::Relaxed),
        };
    }

    #[test]
    fn events_report_operations() {
        let mut backing = [0; 16];
        let mut ring = Ring::new(&mut backing);
        ring.set_event_fn(Some(count_events));

        ring.write(b"abcdef");
        let mut out = [0; 2];
        ring.read(&mut out);
        ring.skip(1);
        ring.reset();

        assert_eq!(WRITE_EVENTS.load(Ordering::Relaxed), 6);
        assert_eq!(READ_EVENTS.load(Ordering::Relaxed), 3);
        assert_eq!(RESET_EVENTS.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn reset_discards_contents() {
        let mut backing = [0; 16];
        let mut ring = Ring::new(&mut backing);

        ring.write(b"stale");
        ring.reset();
        assert!(ring.is_empty());
        assert_eq!(ring.free(), 15);

        ring.write(b"fresh");
        let mut out = [0; 5];
        assert_eq!(ring.read(&mut out), 5);
        assert_eq!(&out, b"fresh");
    }

    #[test]
    fn split_halves_stream_across_threads() {
        let mut backing = [0; 64];
        let mut ring = Ring::new(&mut backing);
        let (mut prod, mut cons) = ring.split();

        std::thread::scope(|scope| {
            scope.spawn(move || {
                let mut next: u32 = 0;
                while next < 10_000 {
                    let byte = [(next % 251) as u8];
                    if prod.write(&byte) == 1 {
                        next += 1;
                    } else {
                        std::thread::yield_now();
                    }
                }
            });

            let mut expected: u32 = 0;
            while expected < 10_000 {
                match cons.pop() {
                    Some(b) => {
                        assert_eq!(b, (expected % 251) as u8);
                        expected += 1;
                    }
                    None => std::thread::yield_now(),
                }
            }
        });
    }
}
