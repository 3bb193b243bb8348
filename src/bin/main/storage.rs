use alloc::vec::Vec;

use log::warn;
use scribe_core::storage::{BlobStore, MemoryBlobStore};
use scribe_hal_esp32s3::storage::flash_blobs::{FlashBlobError, FlashBlobStore};

/// Flash-backed when the data partition is usable, volatile otherwise.
pub enum BoardStore {
    Flash(FlashBlobStore),
    Memory(MemoryBlobStore),
}

impl BoardStore {
    pub fn open() -> Self {
        match FlashBlobStore::new() {
            Ok(store) => Self::Flash(store),
            Err(err) => {
                warn!(
                    "storage: flash unavailable err={:?}; settings will not survive a restart",
                    err
                );
                Self::Memory(MemoryBlobStore::new())
            }
        }
    }
}

impl BlobStore for BoardStore {
    type Error = FlashBlobError;

    fn exists(&mut self, name: &str) -> Result<bool, Self::Error> {
        match self {
            Self::Flash(store) => store.exists(name),
            Self::Memory(store) => store.exists(name).map_err(|never| match never {}),
        }
    }

    fn read(&mut self, name: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        match self {
            Self::Flash(store) => store.read(name),
            Self::Memory(store) => store.read(name).map_err(|never| match never {}),
        }
    }

    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), Self::Error> {
        match self {
            Self::Flash(store) => store.write(name, data),
            Self::Memory(store) => store.write(name, data).map_err(|never| match never {}),
        }
    }

    fn remove(&mut self, name: &str) -> Result<(), Self::Error> {
        match self {
            Self::Flash(store) => store.remove(name),
            Self::Memory(store) => store.remove(name).map_err(|never| match never {}),
        }
    }
}
