//! # am-nvs
//!
//! Non-volatile key/value storage consumed by active modules.
//!
//! The storage is shared by every module on the device. Callers bracket each
//! operation with [`NvStorage::open`] and [`NvStorage::close`]; while one
//! thread holds the storage open, other openers wait. [`Session`] wraps that
//! bracket so the storage is closed on every path.
//!
//! ## Backends
//! - [`MemoryStorage`] – volatile map with fault injection, for tests.
//! - [`DirStorage`]    – one file per key under a directory.

use std::fmt;
use std::io;

use thiserror::Error;

mod dir;
mod gate;
mod memory;
mod session;

pub use dir::DirStorage;
pub use memory::MemoryStorage;
pub use session::Session;

/// Longest key accepted by the storage, in bytes.
pub const MAX_KEY_LEN: usize = 15;

/// Encoding of a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Opaque byte block, typically a whole configuration record.
    Blob,
    /// Single scalar parameter stored in little-endian form.
    Param,
}

impl ValueKind {
    pub(crate) fn tag(self) -> u8 {
        match self {
            ValueKind::Blob => 0x42,
            ValueKind::Param => 0x50,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x42 => Some(ValueKind::Blob),
            0x50 => Some(ValueKind::Param),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Blob => f.write_str("blob"),
            ValueKind::Param => f.write_str("param"),
        }
    }
}

/// Errors reported by storage backends.
#[derive(Error, Debug)]
pub enum NvsError {
    #[error("storage not opened by this thread")]
    NotOpen,
    #[error("invalid key `{0}`")]
    InvalidKey(String),
    #[error("key `{0}` not found")]
    NotFound(String),
    #[error("key `{key}` holds a {stored} value, {requested} requested")]
    KindMismatch {
        key: String,
        stored: ValueKind,
        requested: ValueKind,
    },
    #[error("key `{key}` holds {stored} bytes, {requested} requested")]
    SizeMismatch {
        key: String,
        stored: usize,
        requested: usize,
    },
    #[error("corrupted record for key `{0}`")]
    Corrupted(String),
    #[error("write rejected by backend")]
    WriteRejected,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type NvsResult<T> = Result<T, NvsError>;

/// Non-volatile key/value storage collaborator.
pub trait NvStorage: Send + Sync {
    /// Acquires the storage for the calling thread. Returns `false` when the
    /// backend cannot be opened.
    fn open(&self) -> bool;

    fn save(&self, key: &str, data: &[u8], kind: ValueKind) -> NvsResult<()>;

    /// Restores `key` into `buf`; the stored value must be exactly
    /// `buf.len()` bytes of the requested kind.
    fn restore(&self, key: &str, buf: &mut [u8], kind: ValueKind) -> NvsResult<()>;

    fn remove_key(&self, key: &str) -> NvsResult<()>;

    /// Releases the storage acquired by [`NvStorage::open`].
    fn close(&self);
}

/// Checks that `key` is a short identifier usable by every backend.
pub fn validate_key(key: &str) -> NvsResult<()> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(NvsError::InvalidKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_short_identifiers() {
        assert!(validate_key("ThermostatCfg").is_ok());
        assert!(validate_key("a_b-c").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("ThisKeyIsWayTooLong").is_err());
        assert!(validate_key("../escape").is_err());
    }

    #[test]
    fn kind_tags_roundtrip() {
        for kind in [ValueKind::Blob, ValueKind::Param] {
            assert_eq!(ValueKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(ValueKind::from_tag(0), None);
    }
}
