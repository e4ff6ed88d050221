//! Provides [`RingBuffer`], a fixed-capacity queue shared between exactly one producer (e.g., the serial receive
//! interrupt) and exactly one consumer (e.g., the task draining bytes into the parser).
//!
//! The buffer itself is never pushed to or popped from directly. Instead, [`RingBuffer::split`] hands out a
//! [`Producer`] and a [`Consumer`]; because splitting requires an exclusive borrow, at most one of each can exist,
//! which is what makes the lock-free implementation sound.
//!
//! Both cursors increase monotonically (wrapping at `usize::MAX`) and are masked on access. Since the capacity is a
//! power of two it evenly divides the range of `usize`, so masking stays consistent across the wrap. One slot is
//! permanently reserved to distinguish a full buffer from an empty one: a buffer of capacity `N` holds at most
//! `N - 1` items.

use core::{
    cell::UnsafeCell,
    fmt,
    mem::MaybeUninit,
    sync::atomic::{AtomicUsize, Ordering},
};

/// Returned by [`Producer::push`] when the buffer is full. Holds the rejected item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFull<T>(pub T);

impl<T> fmt::Display for QueueFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("queue is full")
    }
}

#[cfg(feature = "defmt")]
impl<T> defmt::Format for QueueFull<T> {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "QueueFull");
    }
}

/// A single-producer/single-consumer queue with room for `N - 1` items of type `T`.
///
/// `N` must be a power of two; this is checked at compile time when [`RingBuffer::new`] is instantiated.
pub struct RingBuffer<T, const N: usize> {
    /// Position of the next item to be read. Only ever advanced by the [`Consumer`].
    read: AtomicUsize,
    /// Position of the next slot to be written. Only ever advanced by the [`Producer`].
    write: AtomicUsize,
    slots: [UnsafeCell<MaybeUninit<T>>; N],
}

// SAFETY: the producer only touches `write` and the slot it points to, the consumer only touches `read` and the slot
// it points to, and a slot is handed from one side to the other through a release store observed by an acquire load.
unsafe impl<T: Send, const N: usize> Sync for RingBuffer<T, N> {}

impl<T, const N: usize> RingBuffer<T, N> {
    const POWER_OF_TWO: () = assert!(
        N.is_power_of_two() && N > 1,
        "RingBuffer capacity must be a power of two greater than one"
    );
    const MASK: usize = N - 1;

    /// Constructs an empty [`RingBuffer`]. Usable in `static` and `StaticCell` initializers.
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::POWER_OF_TWO;

        Self {
            read: AtomicUsize::new(0),
            write: AtomicUsize::new(0),
            slots: [const { UnsafeCell::new(MaybeUninit::uninit()) }; N],
        }
    }

    /// Splits the buffer into its [`Producer`] and [`Consumer`] halves.
    pub fn split(&mut self) -> (Producer<'_, T, N>, Consumer<'_, T, N>) {
        let buffer = &*self;
        (Producer { buffer }, Consumer { buffer })
    }

    /// Total number of slots, `N`. One of them is always kept free, so at most `N - 1` items are buffered.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of items currently buffered.
    pub fn size(&self) -> usize {
        // read first: `write` only grows, so the difference can't go negative if the consumer advances in between
        let read = self.read.load(Ordering::Acquire);
        let write = self.write.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    /// Returns `true` if no items are buffered.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Stores `item` at the write cursor unless the buffer is full.
    ///
    /// Must only be called by the single producer.
    fn enqueue(&self, item: T) -> Result<(), QueueFull<T>> {
        let write = self.write.load(Ordering::Relaxed);
        let read = self.read.load(Ordering::Acquire);

        if write.wrapping_sub(read) == Self::MASK {
            return Err(QueueFull(item));
        }

        // SAFETY: the slot at `write` is outside the range the consumer may read (`read..write`), and only the
        // single producer writes slots.
        unsafe {
            (*self.slots[write & Self::MASK].get()).write(item);
        }
        self.write.store(write.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Takes the item at the read cursor, if any.
    ///
    /// Must only be called by the single consumer.
    fn dequeue(&self) -> Option<T> {
        let read = self.read.load(Ordering::Relaxed);
        let write = self.write.load(Ordering::Acquire);

        if read == write {
            return None;
        }

        // SAFETY: `read != write`, so the producer initialized this slot and published it with its release store;
        // the producer won't touch it again until `read` has been advanced past it.
        let item = unsafe { (*self.slots[read & Self::MASK].get()).assume_init_read() };
        self.read.store(read.wrapping_add(1), Ordering::Release);
        Some(item)
    }
}

impl<T, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for RingBuffer<T, N> {
    fn drop(&mut self) {
        while self.dequeue().is_some() {}
    }
}

/// The writing half of a [`RingBuffer`].
pub struct Producer<'a, T, const N: usize> {
    buffer: &'a RingBuffer<T, N>,
}

impl<T, const N: usize> Producer<'_, T, N> {
    /// Adds an item to the back of the queue. When the queue is full the item is handed back inside [`QueueFull`]
    /// and the buffer is left unchanged; this never blocks.
    pub fn push(&mut self, item: T) -> Result<(), QueueFull<T>> {
        self.buffer.enqueue(item)
    }

    /// Adds an item to the back of the queue, silently dropping it if the queue is full.
    ///
    /// This is the form used from interrupt context, where there is no way to wait and nobody to report to.
    pub fn enqueue(&mut self, item: T) {
        let _ = self.buffer.enqueue(item);
    }

    /// Returns `true` if another push would fail.
    pub fn is_full(&self) -> bool {
        self.buffer.size() == RingBuffer::<T, N>::MASK
    }

    /// Number of items currently buffered.
    pub fn size(&self) -> usize {
        self.buffer.size()
    }

    /// Returns `true` if no items are buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// See [`RingBuffer::capacity`].
    pub const fn capacity(&self) -> usize {
        N
    }
}

/// The reading half of a [`RingBuffer`].
pub struct Consumer<'a, T, const N: usize> {
    buffer: &'a RingBuffer<T, N>,
}

impl<'a, T, const N: usize> Consumer<'a, T, N> {
    /// Removes and returns the oldest item, or `None` if the queue is empty.
    pub fn pop(&mut self) -> Option<T> {
        self.buffer.dequeue()
    }

    /// Returns an [`Iterator`] which pops items until the queue is empty.
    ///
    /// Items pushed while the iterator is in use are yielded as well.
    pub fn drain(&mut self) -> Drain<'_, 'a, T, N> {
        Drain { consumer: self }
    }

    /// Number of items currently buffered.
    pub fn size(&self) -> usize {
        self.buffer.size()
    }

    /// Returns `true` if no items are buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// See [`RingBuffer::capacity`].
    pub const fn capacity(&self) -> usize {
        N
    }
}

/// Iterator returned by [`Consumer::drain`].
pub struct Drain<'c, 'a, T, const N: usize> {
    consumer: &'c mut Consumer<'a, T, N>,
}

impl<T, const N: usize> Iterator for Drain<'_, '_, T, N> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.consumer.pop()
    }
}
