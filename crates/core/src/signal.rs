//! Signal identifiers.
//!
//! Every message posted to a module carries a numeric signal. The first few
//! values are reserved for the lifecycle events generated by the state
//! machine engine itself; applications number their own signals from
//! [`Signal::USER`] upwards.

use core::fmt;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Type-safe signal identifier.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signal(pub u16);

impl Signal {
    /// Delivered to a state when it becomes the current state.
    pub const ENTRY: Signal = Signal(1);
    /// Delivered to the current state when a transition leaves it.
    pub const EXIT: Signal = Signal(2);
    /// Reserved for timed wake-ups posted by modules to themselves.
    pub const TIMEOUT: Signal = Signal(3);

    /// First user-defined signal.
    pub const USER: Signal = Signal(4);

    /// Creates a new signal from a raw value.
    pub const fn new(raw: u16) -> Self {
        Signal(raw)
    }

    /// Returns the raw signal value.
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Returns `true` for the lifecycle signals owned by the engine.
    pub const fn is_reserved(self) -> bool {
        self.0 < Self::USER.0
    }
}

impl From<u16> for Signal {
    #[inline]
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ENTRY => f.write_str("ENTRY"),
            Self::EXIT => f.write_str("EXIT"),
            Self::TIMEOUT => f.write_str("TIMEOUT"),
            Signal(raw) => write!(f, "SIG({raw})"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Signal {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "SIG({})", self.0);
    }
}
