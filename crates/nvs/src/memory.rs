//! Volatile storage backend with fault injection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::gate::Gate;
use crate::{validate_key, NvStorage, NvsError, NvsResult, ValueKind};

/// In-memory [`NvStorage`].
///
/// Besides holding values it counts open/close calls and can be told to
/// refuse opens or writes, which lets tests drive every failure branch of
/// the parameter helpers.
pub struct MemoryStorage {
    gate: Gate,
    values: Mutex<HashMap<String, (ValueKind, Vec<u8>)>>,
    fail_open: AtomicBool,
    fail_writes: AtomicBool,
    opens: AtomicUsize,
    closes: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            gate: Gate::new(),
            values: Mutex::new(HashMap::new()),
            fail_open: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        }
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Successful `open` calls so far.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// `true` while some thread holds the storage open.
    pub fn is_open(&self) -> bool {
        self.gate.is_held()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl NvStorage for MemoryStorage {
    fn open(&self) -> bool {
        if self.fail_open.load(Ordering::SeqCst) || !self.gate.acquire() {
            return false;
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn save(&self, key: &str, data: &[u8], kind: ValueKind) -> NvsResult<()> {
        self.gate.check()?;
        validate_key(key)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(NvsError::WriteRejected);
        }
        self.values
            .lock()
            .insert(key.to_string(), (kind, data.to_vec()));
        Ok(())
    }

    fn restore(&self, key: &str, buf: &mut [u8], kind: ValueKind) -> NvsResult<()> {
        self.gate.check()?;
        validate_key(key)?;
        let values = self.values.lock();
        let (stored_kind, data) = values
            .get(key)
            .ok_or_else(|| NvsError::NotFound(key.to_string()))?;
        if *stored_kind != kind {
            return Err(NvsError::KindMismatch {
                key: key.to_string(),
                stored: *stored_kind,
                requested: kind,
            });
        }
        if data.len() != buf.len() {
            return Err(NvsError::SizeMismatch {
                key: key.to_string(),
                stored: data.len(),
                requested: buf.len(),
            });
        }
        buf.copy_from_slice(data);
        Ok(())
    }

    fn remove_key(&self, key: &str) -> NvsResult<()> {
        self.gate.check()?;
        validate_key(key)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(NvsError::WriteRejected);
        }
        self.values
            .lock()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| NvsError::NotFound(key.to_string()))
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.gate.release();
    }
}
