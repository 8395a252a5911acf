//! Directory-backed storage: one file per key.
//!
//! Each file holds a one byte kind tag followed by the value bytes. Writes go
//! through a temporary file and a rename so a power cut never leaves a torn
//! record behind.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::gate::Gate;
use crate::{validate_key, NvStorage, NvsError, NvsResult, ValueKind};

pub struct DirStorage {
    root: PathBuf,
    gate: Gate,
}

impl DirStorage {
    /// Uses `root` as the storage partition, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            gate: Gate::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> NvsResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(format!("{key}.nv")))
    }
}

impl NvStorage for DirStorage {
    fn open(&self) -> bool {
        if !self.root.is_dir() {
            log::error!("storage partition {} missing", self.root.display());
            return false;
        }
        self.gate.acquire()
    }

    fn save(&self, key: &str, data: &[u8], kind: ValueKind) -> NvsResult<()> {
        self.gate.check()?;
        let path = self.path_for(key)?;
        let tmp = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&[kind.tag()])?;
            file.write_all(data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn restore(&self, key: &str, buf: &mut [u8], kind: ValueKind) -> NvsResult<()> {
        self.gate.check()?;
        let path = self.path_for(key)?;
        let record = match fs::read(&path) {
            Ok(record) => record,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(NvsError::NotFound(key.to_string()))
            }
            Err(err) => return Err(err.into()),
        };
        let (&tag, data) = record
            .split_first()
            .ok_or_else(|| NvsError::Corrupted(key.to_string()))?;
        let stored = ValueKind::from_tag(tag).ok_or_else(|| NvsError::Corrupted(key.to_string()))?;
        if stored != kind {
            return Err(NvsError::KindMismatch {
                key: key.to_string(),
                stored,
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
        let path = self.path_for(key)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(NvsError::NotFound(key.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn close(&self) {
        self.gate.release();
    }
}
