//! Named-blob persistence boundary.

use alloc::{collections::BTreeMap, format, string::String, vec::Vec};
use core::{convert::Infallible, fmt};

/// Minimal key-value store over named blobs.
///
/// Names are path-like (`/config.json`). A missing blob reads as `Ok(None)`;
/// errors are reserved for the backend itself misbehaving.
pub trait BlobStore {
    type Error: fmt::Debug;

    fn exists(&mut self, name: &str) -> Result<bool, Self::Error>;
    fn read(&mut self, name: &str) -> Result<Option<Vec<u8>>, Self::Error>;
    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), Self::Error>;
    fn remove(&mut self, name: &str) -> Result<(), Self::Error>;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StorageOp {
    Read,
    Write,
    Remove,
}

impl StorageOp {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Remove => "remove",
        }
    }
}

/// Backend-agnostic storage failure carried by the records built on top of
/// [`BlobStore`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StorageError {
    Backend {
        op: StorageOp,
        blob: &'static str,
        detail: String,
    },
    Encode {
        blob: &'static str,
    },
}

impl StorageError {
    pub fn backend<E: fmt::Debug>(op: StorageOp, blob: &'static str, err: E) -> Self {
        Self::Backend {
            op,
            blob,
            detail: format!("{:?}", err),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend { op, blob, detail } => {
                write!(f, "Failed to {} {}: {}", op.as_str(), blob, detail)
            }
            Self::Encode { blob } => write!(f, "Failed to encode {}", blob),
        }
    }
}

/// Volatile store; used by tests and as the fallback when flash is unusable.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: BTreeMap<String, Vec<u8>>,
}

impl MemoryBlobStore {
    pub const fn new() -> Self {
        Self {
            blobs: BTreeMap::new(),
        }
    }
}

impl BlobStore for MemoryBlobStore {
    type Error = Infallible;

    fn exists(&mut self, name: &str) -> Result<bool, Self::Error> {
        Ok(self.blobs.contains_key(name))
    }

    fn read(&mut self, name: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.blobs.get(name).cloned())
    }

    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), Self::Error> {
        self.blobs.insert(String::from(name), data.to_vec());
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<(), Self::Error> {
        self.blobs.remove(name);
        Ok(())
    }
}
