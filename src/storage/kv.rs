use std::{
    collections::{BTreeMap, HashMap},
    fs::{File, OpenOptions},
    io::Write as _,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, OnceLock},
};

use anyhow::Context;

use crate::foundation::error::{StudioError, StudioResult};

/// Durable string key-value slots.
///
/// Mirrors a browser-style local store: plain get/set/remove plus an atomic read-modify-write used
/// for counters and append-only lists. Implementations must make `read_modify_write` atomic with
/// respect to every other call on the same store.
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// Read a slot.
    fn get_string(&self, key: &str) -> StudioResult<Option<String>>;

    /// Overwrite a slot.
    fn set_string(&self, key: &str, value: &str) -> StudioResult<()>;

    /// Delete a slot. Missing keys are not an error.
    fn remove_key(&self, key: &str) -> StudioResult<()>;

    /// Atomically replace a slot with `f(current)`. Returning `None` removes the slot.
    fn read_modify_write(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<String>) -> StudioResult<Option<String>>,
    ) -> StudioResult<Option<String>>;
}

/// Shared store handle.
pub type SharedStore = Arc<dyn KeyValueStore>;

/// Read a JSON value from a slot.
pub fn get_json<T: serde::de::DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> StudioResult<Option<T>> {
    match store.get_string(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Write a JSON value into a slot.
pub fn set_json<T: serde::Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> StudioResult<()> {
    let raw = serde_json::to_string(value)?;
    store.set_string(key, &raw)
}

fn lock<T>(m: &Mutex<T>) -> StudioResult<MutexGuard<'_, T>> {
    m.lock()
        .map_err(|_| StudioError::storage("store mutex poisoned"))
}

/// In-memory store. Clones of the surrounding `Arc` behave like tabs sharing one origin.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Whether the store holds no slots.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get_string(&self, key: &str) -> StudioResult<Option<String>> {
        Ok(lock(&self.slots)?.get(key).cloned())
    }

    fn set_string(&self, key: &str, value: &str) -> StudioResult<()> {
        lock(&self.slots)?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_key(&self, key: &str) -> StudioResult<()> {
        lock(&self.slots)?.remove(key);
        Ok(())
    }

    fn read_modify_write(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<String>) -> StudioResult<Option<String>>,
    ) -> StudioResult<Option<String>> {
        let mut slots = lock(&self.slots)?;
        let next = f(slots.get(key).cloned())?;
        match &next {
            Some(v) => {
                slots.insert(key.to_string(), v.clone());
            }
            None => {
                slots.remove(key);
            }
        }
        Ok(next)
    }
}

/// Single-file JSON store.
///
/// Every mutation re-reads the file, applies the change and replaces it through a uniquely named
/// sibling temp file, so readers see either the old or the new document. Access is serialized per
/// path: handles opened on the same file share one in-process gate, and an advisory lock on a
/// sibling `.lock` file covers other processes.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
    gate: Arc<Mutex<()>>,
}

/// In-process gates keyed by canonical store path.
fn path_gate(path: &Path) -> StudioResult<Arc<Mutex<()>>> {
    static GATES: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();
    let mut gates = lock(GATES.get_or_init(Mutex::default))?;
    Ok(gates.entry(path.to_path_buf()).or_default().clone())
}

/// Holds both the in-process gate and the cross-process file lock.
struct Exclusive<'a> {
    _file: File,
    _gate: MutexGuard<'a, ()>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> StudioResult<Self> {
        let path = path.into();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create store dir '{}'", dir.display()))?;
        let file_name = path
            .file_name()
            .ok_or_else(|| StudioError::validation(format!("'{}' is not a file path", path.display())))?;
        let dir = dir
            .canonicalize()
            .with_context(|| format!("resolve store dir '{}'", dir.display()))?;
        let path = dir.join(file_name);
        let mut lock_name = file_name.to_os_string();
        lock_name.push(".lock");
        Ok(Self {
            lock_path: dir.join(lock_name),
            gate: path_gate(&path)?,
            path,
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn exclusive(&self) -> StudioResult<Exclusive<'_>> {
        let gate = lock(&self.gate)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .with_context(|| format!("open lock file '{}'", self.lock_path.display()))?;
        file.lock()
            .with_context(|| format!("lock '{}'", self.lock_path.display()))?;
        Ok(Exclusive {
            _file: file,
            _gate: gate,
        })
    }

    fn load(&self) -> StudioResult<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                StudioError::storage(format!("corrupt store '{}': {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("read store '{}'", self.path.display()))
                .into()),
        }
    }

    fn save(&self, slots: &BTreeMap<String, String>) -> StudioResult<()> {
        let raw = serde_json::to_string_pretty(slots)?;
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("create temp file in '{}'", dir.display()))?;
        tmp.write_all(raw.as_bytes())
            .with_context(|| format!("write '{}'", tmp.path().display()))?;
        tmp.persist(&self.path)
            .with_context(|| format!("replace '{}'", self.path.display()))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get_string(&self, key: &str) -> StudioResult<Option<String>> {
        let _lock = self.exclusive()?;
        Ok(self.load()?.remove(key))
    }

    fn set_string(&self, key: &str, value: &str) -> StudioResult<()> {
        let _lock = self.exclusive()?;
        let mut slots = self.load()?;
        slots.insert(key.to_string(), value.to_string());
        self.save(&slots)
    }

    fn remove_key(&self, key: &str) -> StudioResult<()> {
        let _lock = self.exclusive()?;
        let mut slots = self.load()?;
        if slots.remove(key).is_some() {
            self.save(&slots)?;
        }
        Ok(())
    }

    fn read_modify_write(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<String>) -> StudioResult<Option<String>>,
    ) -> StudioResult<Option<String>> {
        let _lock = self.exclusive()?;
        let mut slots = self.load()?;
        let next = f(slots.get(key).cloned())?;
        match &next {
            Some(v) => {
                slots.insert(key.to_string(), v.clone());
            }
            None => {
                slots.remove(key);
            }
        }
        self.save(&slots)?;
        Ok(next)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/storage/kv.rs"]
mod tests;
