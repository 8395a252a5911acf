//! Bounded blocking FIFO.
//!
//! A [`Mailbox`] holds at most `N` items in a fixed-capacity
//! [`heapless::Deque`]. Any number of producers may [`put`](Mailbox::put);
//! the single consumer calls [`get`](Mailbox::get). Both sides take an
//! optional timeout, `None` meaning wait forever.

use std::fmt;
use std::time::{Duration, Instant};

use heapless::Deque;
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::DEFAULT_MAX_QUEUE_MESSAGES;

/// Item handed back by [`Mailbox::put`] when no slot freed up in time.
pub struct Full<T>(pub T);

impl<T> Full<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Full(..)")
    }
}

/// Outcome of [`Mailbox::get`].
#[derive(Debug, PartialEq, Eq)]
pub enum Recv<T> {
    Item(T),
    Timeout,
    /// [`Mailbox::interrupt`] woke the consumer before an item arrived.
    Interrupted,
}

struct Slots<T, const N: usize> {
    queue: Deque<T, N>,
    max_depth: usize,
    interrupted: bool,
}

pub struct Mailbox<T, const N: usize = DEFAULT_MAX_QUEUE_MESSAGES> {
    slots: Mutex<Slots<T, N>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T, const N: usize> Mailbox<T, N> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slots {
                queue: Deque::new(),
                max_depth: 0,
                interrupted: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.slots.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().queue.is_empty()
    }

    /// Highest number of items queued at once since construction.
    pub fn max_depth(&self) -> usize {
        self.slots.lock().max_depth
    }

    /// Appends `item`, waiting up to `timeout` for a free slot.
    pub fn put(&self, item: T, timeout: Option<Duration>) -> Result<(), Full<T>> {
        let deadline = deadline(timeout);
        let mut slots = self.slots.lock();
        while slots.queue.is_full() {
            if !wait(&self.not_full, &mut slots, deadline) && slots.queue.is_full() {
                return Err(Full(item));
            }
        }
        slots.queue.push_back(item).map_err(Full)?;
        slots.max_depth = slots.max_depth.max(slots.queue.len());
        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes the oldest item, waiting up to `timeout` for one to arrive.
    pub fn get(&self, timeout: Option<Duration>) -> Recv<T> {
        let deadline = deadline(timeout);
        let mut slots = self.slots.lock();
        loop {
            if let Some(item) = slots.queue.pop_front() {
                self.not_full.notify_one();
                return Recv::Item(item);
            }
            if slots.interrupted {
                slots.interrupted = false;
                return Recv::Interrupted;
            }
            if !wait(&self.not_empty, &mut slots, deadline) && slots.queue.is_empty() {
                return Recv::Timeout;
            }
        }
    }

    /// Wakes a consumer blocked in [`get`](Self::get) without delivering an
    /// item. The flag is sticky until the next `get` observes it.
    pub fn interrupt(&self) {
        let mut slots = self.slots.lock();
        slots.interrupted = true;
        self.not_empty.notify_one();
    }
}

impl<T, const N: usize> Default for Mailbox<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

fn deadline(timeout: Option<Duration>) -> Option<Instant> {
    timeout.and_then(|t| Instant::now().checked_add(t))
}

/// Waits on `cond`; returns `false` once `deadline` has passed.
fn wait<S>(cond: &Condvar, guard: &mut MutexGuard<'_, S>, deadline: Option<Instant>) -> bool {
    match deadline {
        None => {
            cond.wait(guard);
            true
        }
        Some(deadline) => !cond.wait_until(guard, deadline).timed_out(),
    }
}
