//! Message envelope posted to a module mailbox.
//!
//! A message owns its payload. Posting a message moves it into the mailbox,
//! and dequeuing moves it out to the consumer, so there is never more than
//! one owner. The payload is released when the consumer drops the message,
//! whichever path the state handler takes.

use core::fmt;
use std::any::Any;

use crate::signal::Signal;

/// Type-erased, move-only payload.
pub type Payload = Box<dyn Any + Send>;

/// A signal plus an optional owned payload.
pub struct Message {
    signal: Signal,
    payload: Option<Payload>,
}

impl Message {
    /// Creates a message that carries no payload.
    pub fn new(signal: Signal) -> Self {
        Self {
            signal,
            payload: None,
        }
    }

    /// Creates a message carrying `payload`.
    pub fn with_payload<T: Any + Send>(signal: Signal, payload: T) -> Self {
        Self {
            signal,
            payload: Some(Box::new(payload)),
        }
    }

    pub fn signal(&self) -> Signal {
        self.signal
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    /// Borrows the payload if it is a `T`.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_ref()?.downcast_ref::<T>()
    }

    /// Takes the payload out if it is a `T`; a payload of another type stays
    /// in place.
    pub fn take_payload<T: Any>(&mut self) -> Option<T> {
        match self.payload.take()?.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(other) => {
                self.payload = Some(other);
                None
            }
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("signal", &self.signal)
            .field("payload", &self.payload.is_some())
            .finish()
    }
}
