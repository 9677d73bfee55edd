//! Fixed-capacity buffer slots shared by ports and connectors.
//!
//! Two shapes are provided. `RingBuffer<T>` always snaps its read cursor to
//! the slot that was just written, so `get` only ever returns the newest
//! value — a single-slot "latest value" semantic regardless of its
//! configured capacity. `FifoBuffer<T>` is a conventional circular queue
//! with an independently advancing read cursor that drops the oldest
//! unread value on overwrite, for callers that actually want to drain a
//! capacity-`N` backlog in order. Both exist because a buffer's documented
//! "always returns latest" contract and its own capacity-`N` shape pull in
//! different directions, and no single buffer type satisfies both.

/// A single buffer slot: the stored value (absent until the first `put`) and
/// whether it has been read since it was last written.
#[derive(Debug, Clone)]
struct Slot<T> {
    value: Option<T>,
    fresh: bool,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            value: None,
            fresh: false,
        }
    }
}

/// Latest-only buffer: `N` slots are allocated but `get()` always reads the
/// slot most recently written by `put()`. Capacity below 2 is coerced to 2.
#[derive(Debug)]
pub struct RingBuffer<T> {
    slots: Vec<Slot<T>>,
    write_cursor: usize,
    read_cursor: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        let slots = (0..capacity).map(|_| Slot::default()).collect();
        Self {
            slots,
            write_cursor: 0,
            read_cursor: capacity - 1,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Write a value. The read cursor snaps to the slot just written; the
    /// write cursor advances modulo capacity. Never fails.
    pub fn put(&mut self, value: T) {
        let idx = self.write_cursor;
        self.slots[idx] = Slot {
            value: Some(value),
            fresh: true,
        };
        self.read_cursor = idx;
        self.write_cursor = (self.write_cursor + 1) % self.slots.len();
    }

    /// Read the current slot and mark it non-fresh. Returns `None` only if
    /// the buffer has never been written to.
    pub fn get(&mut self) -> Option<&T> {
        let slot = &mut self.slots[self.read_cursor];
        slot.fresh = false;
        slot.value.as_ref()
    }

    /// Whether the current read slot still holds an unread value.
    pub fn is_new(&self) -> bool {
        self.slots[self.read_cursor].fresh
    }

    /// This buffer overwrites rather than blocking, so it is conventionally
    /// never full.
    pub fn is_full(&self) -> bool {
        false
    }

    pub fn is_empty(&self) -> bool {
        !self.is_new()
    }

    /// Pre-fill every slot with the same value by writing it `capacity`
    /// times.
    pub fn init(&mut self, value: T)
    where
        T: Clone,
    {
        for _ in 0..self.slots.len() {
            self.put(value.clone());
        }
    }
}

/// Outcome of writing into a [`FifoBuffer`], used by the port/connector
/// layer to decide which listener events to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FifoWriteOutcome {
    /// The target slot was empty or already read; no data was lost.
    Accepted,
    /// The target slot still held an unread value that was overwritten, and
    /// the read cursor was advanced past it to keep pointing at the oldest
    /// surviving entry.
    Overwrote,
}

/// Conventional circular queue: write cursor and read cursor advance
/// independently; when the write cursor catches up to the read cursor, the
/// oldest unread slot is dropped and the read cursor is pushed forward past
/// it (overwrite-oldest policy). This is what connector queues use by
/// default so that a burst of writes is drained in order.
#[derive(Debug)]
pub struct FifoBuffer<T> {
    slots: Vec<Slot<T>>,
    write_cursor: usize,
    read_cursor: usize,
    len: usize,
}

impl<T> FifoBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        let slots = (0..capacity).map(|_| Slot::default()).collect();
        Self {
            slots,
            write_cursor: 0,
            read_cursor: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// Write a value, overwriting the oldest unread entry if the buffer is
    /// already full.
    pub fn put(&mut self, value: T) -> FifoWriteOutcome {
        let was_full = self.is_full();
        let idx = self.write_cursor;
        self.slots[idx] = Slot {
            value: Some(value),
            fresh: true,
        };
        self.write_cursor = (self.write_cursor + 1) % self.slots.len();
        if was_full {
            self.read_cursor = (self.read_cursor + 1) % self.slots.len();
            FifoWriteOutcome::Overwrote
        } else {
            self.len += 1;
            FifoWriteOutcome::Accepted
        }
    }

    /// Pop the oldest unread value in write order. Returns `None` if empty.
    pub fn get(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let idx = self.read_cursor;
        let slot = std::mem::take(&mut self.slots[idx]);
        self.read_cursor = (self.read_cursor + 1) % self.slots.len();
        self.len -= 1;
        slot.value
    }
}
