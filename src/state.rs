//! Local state served to the front-end: the provisioner config from the
//! kernel descriptor and the allocation file written by the provisioner.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value;

use crate::cache::CachedDocument;
use crate::error::WriteError;
use crate::kernel;
use crate::settings::Settings;

const KERNEL_ROLE: &str = "slurm-provisioner-kernel/kernel.json";
const ALLOCATIONS_ROLE: &str = "runtime/slurm_provisioner.json";

#[derive(Debug, Clone, Serialize)]
pub struct LocalSnapshot {
    pub current_config: Value,
    pub allocations: Value,
}

pub struct LocalState {
    kernel_file: PathBuf,
    config: CachedDocument,
    allocations: CachedDocument,
    write_lock: Mutex<()>,
}

fn whole_document(value: Value) -> Value {
    value
}

impl LocalState {
    pub fn new(settings: &Settings) -> Self {
        let kernel_file = settings.kernel_file();

        Self {
            config: CachedDocument::new(&kernel_file, KERNEL_ROLE, kernel::provisioner_config),
            allocations: CachedDocument::new(
                settings.allocations_file(),
                ALLOCATIONS_ROLE,
                whole_document,
            ),
            kernel_file,
            write_lock: Mutex::new(()),
        }
    }

    pub fn current_config(&self) -> Value {
        let lookup = self.config.lookup();
        log::debug!("current config: {:?}", lookup.provenance);
        lookup.value
    }

    pub fn allocations(&self) -> Value {
        let lookup = self.allocations.lookup();
        log::debug!("allocations: {:?}", lookup.provenance);
        lookup.value
    }

    pub fn read_local_state(&self) -> LocalSnapshot {
        LocalSnapshot {
            current_config: self.current_config(),
            allocations: self.allocations(),
        }
    }

    /// Store `payload` (raw request body) as the provisioner config.
    pub fn write_config(&self, payload: &[u8]) -> Result<(), WriteError> {
        if payload.is_empty() {
            log::error!("Slurmel: No body sent");
            return Err(WriteError::NoPayload);
        }

        let new_config: Value = serde_json::from_str(&String::from_utf8_lossy(payload))
            .map_err(|source| WriteError::InvalidPayload { source })?;

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        kernel::replace_config(&self.kernel_file, new_config).map_err(|err| {
            log::error!("Slurmel: could not update kernel descriptor: {:?}", err);
            err
        })?;

        // A rewrite inside the same mtime tick would otherwise go unnoticed.
        self.config.invalidate();

        log::info!("updated provisioner config in {:?}", self.kernel_file);

        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn config_loads(&self) -> u64 {
        self.config.loads()
    }
}
