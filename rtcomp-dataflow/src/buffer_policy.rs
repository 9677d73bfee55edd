//! The connector-side buffer: a [`FifoBuffer`] wrapped with a lock, a
//! condition variable, and the `buffer.write.full_policy` behavior. The raw
//! buffer is not thread-safe by design; this is the "port provides the
//! lock" wrapper around it.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rtcomp_core::{FifoBuffer, FifoWriteOutcome};

/// What to do when `put` finds the buffer already full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullPolicy {
    /// Overwrite the oldest unread slot (the default).
    Overwrite,
    /// Block the writer until a slot frees up or `write_timeout` elapses.
    Block,
    /// Drop the new value, keeping the buffer's current contents.
    Drop,
}

#[derive(Debug, Clone, Copy)]
pub struct BufferConfig {
    pub length: usize,
    pub full_policy: FullPolicy,
    pub write_timeout: Duration,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            length: 8,
            full_policy: FullPolicy::Overwrite,
            write_timeout: Duration::ZERO,
        }
    }
}

/// Result of a single `put`, used by the port layer to pick which listener
/// events to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Accepted,
    Overwrote,
    Dropped,
    TimedOut,
}

/// Result of a single `get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Empty,
}

pub struct GuardedBuffer<T> {
    config: BufferConfig,
    state: Mutex<FifoBuffer<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> GuardedBuffer<T> {
    pub fn new(config: BufferConfig) -> Self {
        Self {
            state: Mutex::new(FifoBuffer::new(config.length)),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            config,
        }
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Write a value honoring `full_policy`. The caller is expected to fire
    /// `ON_BUFFER_WRITE` before calling this and interpret the returned
    /// outcome to fire the matching `ON_BUFFER_FULL` / `ON_BUFFER_OVERWRITE`
    /// / `ON_BUFFER_WRITE_TIMEOUT` events.
    pub fn put(&self, value: T) -> WriteOutcome {
        let mut guard = self.state.lock();
        if !guard.is_full() {
            guard.put(value);
            self.not_empty.notify_one();
            return WriteOutcome::Accepted;
        }

        match self.config.full_policy {
            FullPolicy::Overwrite => {
                let outcome = guard.put(value);
                self.not_empty.notify_one();
                match outcome {
                    FifoWriteOutcome::Overwrote => WriteOutcome::Overwrote,
                    FifoWriteOutcome::Accepted => WriteOutcome::Accepted,
                }
            }
            FullPolicy::Drop => WriteOutcome::Dropped,
            FullPolicy::Block => {
                if self.config.write_timeout.is_zero() {
                    return WriteOutcome::TimedOut;
                }
                let deadline = Instant::now() + self.config.write_timeout;
                loop {
                    if !guard.is_full() {
                        guard.put(value);
                        self.not_empty.notify_one();
                        return WriteOutcome::Accepted;
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        return WriteOutcome::TimedOut;
                    }
                    let timed_out = self.not_full.wait_for(&mut guard, deadline - now).timed_out();
                    if timed_out {
                        return WriteOutcome::TimedOut;
                    }
                }
            }
        }
    }

    /// Pop the oldest unread value, if any. The caller fires `ON_BUFFER_READ`
    /// on success or `ON_BUFFER_EMPTY` (untyped) on `None`.
    pub fn get(&self) -> Option<T> {
        let mut guard = self.state.lock();
        let value = guard.get();
        if value.is_some() {
            self.not_full.notify_one();
        }
        value
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.state.lock().is_full()
    }

    /// Wake any thread blocked in `put`'s `Block` policy, used by shutdown to
    /// unstick writers.
    pub fn wake_all(&self) {
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
}
