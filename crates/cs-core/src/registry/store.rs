//! Registry store implementations.
//!
//! The store handle is constructed once per invocation and injected into
//! the reconciler; there is no process-wide shared connection. Writes are
//! unconditional last-writer-wins at document level, but the add-instance
//! operation is add-if-absent at store level so concurrent registrations
//! from different hosts do not lose updates.

use super::types::{Instance, RegistryDocument, ServerEntry};
use cs_common::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Document store holding the single registry aggregate.
pub trait RegistryStore {
    /// Fetch the registry document. A store with no document yet yields
    /// the empty aggregate.
    fn fetch(&self) -> Result<RegistryDocument>;

    /// Append a new server entry (unconditional push).
    fn push_server(&self, entry: ServerEntry) -> Result<()>;

    /// Add an instance to the server entry with the given ipaddr, if an
    /// instance of that name is not already present. Returns whether the
    /// instance was added.
    fn add_instance(&self, ipaddr: &str, instance: Instance) -> Result<bool>;
}

/// File-backed JSON document store.
///
/// Mutations run under an exclusive lock file acquired with a bounded
/// wait (the store's connect timeout), and land via temp-file + rename so
/// readers never observe a torn document.
pub struct JsonFileStore {
    path: PathBuf,
    lock_timeout: Duration,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        JsonFileStore {
            path: path.into(),
            lock_timeout,
        }
    }

    fn read_document(&self) -> Result<RegistryDocument> {
        match fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| Error::Store(format!("corrupt registry document: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(RegistryDocument::default())
            }
            Err(e) => Err(Error::Store(format!(
                "cannot read {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn write_document(&self, doc: &RegistryDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Store(format!("cannot create {}: {e}", parent.display())))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let text = serde_json::to_string_pretty(doc)
            .map_err(|e| Error::Store(format!("serialize registry document: {e}")))?;
        fs::write(&tmp, text)
            .map_err(|e| Error::Store(format!("cannot write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| Error::Store(format!("cannot commit {}: {e}", self.path.display())))?;
        Ok(())
    }

    /// Run a mutation of the document under the store lock.
    fn update<T>(&self, mutate: impl FnOnce(&mut RegistryDocument) -> T) -> Result<T> {
        let _guard = LockGuard::acquire(&self.path, self.lock_timeout)?;
        let mut doc = self.read_document()?;
        let out = mutate(&mut doc);
        self.write_document(&doc)?;
        Ok(out)
    }
}

impl RegistryStore for JsonFileStore {
    fn fetch(&self) -> Result<RegistryDocument> {
        self.read_document()
    }

    fn push_server(&self, entry: ServerEntry) -> Result<()> {
        self.update(|doc| doc.servers.push(entry))
    }

    fn add_instance(&self, ipaddr: &str, instance: Instance) -> Result<bool> {
        let added = self.update(|doc| {
            doc.find_server_mut(ipaddr)
                .map(|entry| entry.add_instance_if_absent(instance))
        })?;
        added.ok_or_else(|| Error::Store(format!("no server entry for {ipaddr}")))
    }
}

/// Exclusive lock file with bounded acquisition.
struct LockGuard {
    lock_path: PathBuf,
}

impl LockGuard {
    fn acquire(store_path: &Path, timeout: Duration) -> Result<Self> {
        let lock_path = store_path.with_extension("lock");
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Store(format!("cannot create {}: {e}", parent.display())))?;
        }
        let deadline = Instant::now() + timeout;
        loop {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(_) => {
                    debug!(lock = %lock_path.display(), "registry lock acquired");
                    return Ok(LockGuard { lock_path });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if Instant::now() >= deadline {
                        return Err(Error::Store(format!(
                            "timed out after {timeout:?} waiting for registry lock {}",
                            lock_path.display()
                        )));
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(e) => {
                    return Err(Error::Store(format!(
                        "cannot lock {}: {e}",
                        lock_path.display()
                    )))
                }
            }
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    doc: Mutex<RegistryDocument>,
}

impl InMemoryStore {
    pub fn new(doc: RegistryDocument) -> Self {
        InMemoryStore {
            doc: Mutex::new(doc),
        }
    }

    /// Current document contents (test assertions).
    pub fn document(&self) -> RegistryDocument {
        self.doc.lock().expect("store mutex poisoned").clone()
    }
}

impl RegistryStore for InMemoryStore {
    fn fetch(&self) -> Result<RegistryDocument> {
        Ok(self.document())
    }

    fn push_server(&self, entry: ServerEntry) -> Result<()> {
        self.doc
            .lock()
            .expect("store mutex poisoned")
            .servers
            .push(entry);
        Ok(())
    }

    fn add_instance(&self, ipaddr: &str, instance: Instance) -> Result<bool> {
        let mut doc = self.doc.lock().expect("store mutex poisoned");
        doc.find_server_mut(ipaddr)
            .map(|entry| entry.add_instance_if_absent(instance))
            .ok_or_else(|| Error::Store(format!("no server entry for {ipaddr}")))
    }
}
