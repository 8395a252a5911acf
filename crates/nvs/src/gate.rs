//! Open/close bracket shared by the storage backends.

use std::thread::{self, ThreadId};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::{NvsError, NvsResult};

/// How long `open` waits for another thread to close the storage.
const OPEN_TIMEOUT: Duration = Duration::from_secs(1);

/// Grants the storage to one thread at a time.
pub(crate) struct Gate {
    owner: Mutex<Option<ThreadId>>,
    released: Condvar,
}

impl Gate {
    pub(crate) fn new() -> Self {
        Self {
            owner: Mutex::new(None),
            released: Condvar::new(),
        }
    }

    pub(crate) fn acquire(&self) -> bool {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        while owner.is_some_and(|id| id != me) {
            if self.released.wait_for(&mut owner, OPEN_TIMEOUT).timed_out() {
                return false;
            }
        }
        *owner = Some(me);
        true
    }

    pub(crate) fn release(&self) {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        if *owner == Some(me) {
            *owner = None;
            self.released.notify_one();
        }
    }

    pub(crate) fn check(&self) -> NvsResult<()> {
        if *self.owner.lock() == Some(thread::current().id()) {
            Ok(())
        } else {
            Err(NvsError::NotOpen)
        }
    }

    pub(crate) fn is_held(&self) -> bool {
        self.owner.lock().is_some()
    }
}
