//! Persistence for baked probe batch data.

use crate::error::{PhonoSyncError, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Sink for serialized probe batches.
///
/// Writes with `flush == false` may be buffered until [`flush_all`](Self::flush_all).
/// Only the thread that produced the data writes it.
pub trait BakedDataStore: Send + Sync {
    fn write(&self, name: &str, data: &[u8], flush: bool) -> Result<()>;

    /// Persists every deferred write.
    fn flush_all(&self) -> Result<()>;

    /// Reads back the persisted data for `name`, ignoring deferred writes.
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>>;
}

/// In-memory store, useful for tools and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pending: Mutex<BTreeMap<String, Vec<u8>>>,
    persisted: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Names of persisted entries, in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.persisted.lock().keys().cloned().collect()
    }

    pub fn total_bytes(&self) -> usize {
        self.persisted.lock().values().map(Vec::len).sum()
    }
}

impl BakedDataStore for MemoryStore {
    fn write(&self, name: &str, data: &[u8], flush: bool) -> Result<()> {
        if flush {
            self.pending.lock().remove(name);
            self.persisted.lock().insert(name.to_string(), data.to_vec());
        } else {
            self.pending.lock().insert(name.to_string(), data.to_vec());
        }
        Ok(())
    }

    fn flush_all(&self) -> Result<()> {
        let pending = std::mem::take(&mut *self.pending.lock());
        self.persisted.lock().extend(pending);
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.persisted.lock().get(name).cloned())
    }
}

/// Stores each probe batch as `<root>/<name>.probes`.
#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
    pending: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl DirectoryStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            pending: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() {
            return Err(PhonoSyncError::Storage("empty probe batch name".into()));
        }
        let file_name: String = name
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c => c,
            })
            .collect();
        Ok(self.root.join(format!("{file_name}.probes")))
    }
}

impl BakedDataStore for DirectoryStore {
    fn write(&self, name: &str, data: &[u8], flush: bool) -> Result<()> {
        let path = self.path_for(name)?;
        if flush {
            self.pending.lock().remove(name);
            std::fs::write(&path, data)?;
            log::debug!("Wrote {} bytes to {}", data.len(), path.display());
        } else {
            self.pending.lock().insert(name.to_string(), data.to_vec());
        }
        Ok(())
    }

    fn flush_all(&self) -> Result<()> {
        let pending = std::mem::take(&mut *self.pending.lock());
        for (name, data) in &pending {
            let path = self.path_for(name)?;
            std::fs::write(&path, data)?;
            log::debug!("Wrote {} bytes to {}", data.len(), path.display());
        }
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(name)?;
        match std::fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
