//! NV parameter helpers. Each call opens the storage, performs one
//! operation and closes it again.

use am_nvs::{Session, ValueKind};

use crate::shared::Shared;

impl Shared {
    fn open_session(&self) -> Option<Session<'_>> {
        let Some(storage) = self.storage.as_deref() else {
            module_error!(self.identity, "ERR_NVS no storage attached");
            return None;
        };
        let session = Session::open(storage);
        if session.is_none() {
            module_error!(self.identity, "ERR_NVS cannot open storage");
        }
        session
    }

    pub(crate) fn save_parameter(&self, id: &str, data: &[u8], kind: ValueKind) -> bool {
        let Some(session) = self.open_session() else {
            return false;
        };
        match session.save(id, data, kind) {
            Ok(()) => {
                module_debug!(self.identity, "Parameter {id} saved ({} bytes)", data.len());
                true
            }
            Err(err) => {
                module_warn!(self.identity, "ERR_NVS [{err}] saving {id}");
                false
            }
        }
    }

    pub(crate) fn restore_parameter(&self, id: &str, buf: &mut [u8], kind: ValueKind) -> bool {
        let Some(session) = self.open_session() else {
            return false;
        };
        match session.restore(id, buf, kind) {
            Ok(()) => {
                module_debug!(self.identity, "Parameter {id} restored ({} bytes)", buf.len());
                true
            }
            Err(err) => {
                module_warn!(self.identity, "ERR_NVS [{err}] restoring {id}");
                false
            }
        }
    }

    pub(crate) fn remove_parameter(&self, id: &str) -> bool {
        let Some(session) = self.open_session() else {
            return false;
        };
        match session.remove_key(id) {
            Ok(()) => {
                module_debug!(self.identity, "Parameter {id} removed");
                true
            }
            Err(err) => {
                module_warn!(self.identity, "ERR_NVS [{err}] removing {id}");
                false
            }
        }
    }
}
