//! Timed-wait event source.
//!
//! Wraps a module mailbox so the consumer never blocks longer than its
//! keep-alive period: a timeout kicks the heartbeat and the wait resumes,
//! and only a real item is handed back to the caller.

use crate::liveness::Heartbeat;
use crate::mailbox::{Mailbox, Recv};

pub struct TimedEventSource<'a, T, const N: usize> {
    mailbox: &'a Mailbox<T, N>,
    heartbeat: &'a Heartbeat,
}

impl<'a, T, const N: usize> TimedEventSource<'a, T, N> {
    pub fn new(mailbox: &'a Mailbox<T, N>, heartbeat: &'a Heartbeat) -> Self {
        Self { mailbox, heartbeat }
    }

    /// Blocks until an item arrives.
    ///
    /// The wait budget is re-read on every iteration so a watchdog attached
    /// while waiting takes effect once the mailbox is interrupted.
    pub fn next(&self) -> T {
        loop {
            match self.mailbox.get(self.heartbeat.period()) {
                Recv::Item(item) => {
                    self.heartbeat.beat(false);
                    return item;
                }
                Recv::Timeout => self.heartbeat.beat(true),
                Recv::Interrupted => {}
            }
        }
    }
}
