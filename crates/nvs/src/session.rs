use crate::{NvStorage, NvsResult, ValueKind};

/// Open storage bracket; the storage is closed when the session drops.
pub struct Session<'a> {
    storage: &'a dyn NvStorage,
}

impl<'a> Session<'a> {
    /// Opens `storage`, or returns `None` if the backend refuses.
    pub fn open(storage: &'a dyn NvStorage) -> Option<Self> {
        storage.open().then_some(Self { storage })
    }

    pub fn save(&self, key: &str, data: &[u8], kind: ValueKind) -> NvsResult<()> {
        self.storage.save(key, data, kind)
    }

    pub fn restore(&self, key: &str, buf: &mut [u8], kind: ValueKind) -> NvsResult<()> {
        self.storage.restore(key, buf, kind)
    }

    pub fn remove_key(&self, key: &str) -> NvsResult<()> {
        self.storage.remove_key(key)
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.storage.close();
    }
}
