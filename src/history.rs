//! Durable, capacity-bounded history of probe results.
//!
//! The history is kept newest-first and persisted as one full JSON
//! snapshot per write. Storage goes through the [`Storage`] trait so the
//! engine can be run against a directory on disk or an in-memory map.

use crate::errors::SpeedLensError;
use crate::results::ProbeResult;
use log::{debug, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};

/// Maximum number of results kept.
pub const DEFAULT_CAPACITY: usize = 50;

/// Storage key holding the serialized history.
pub const HISTORY_KEY: &str = "history";

/// Storage key holding the serialized settings.
pub const SETTINGS_KEY: &str = "settings";

/// Key/value persistence for serialized snapshots.
pub trait Storage {
    /// Read the value stored under `key`, if any.
    fn load(&self, key: &str) -> Result<Option<String>, SpeedLensError>;

    /// Replace the value stored under `key`.
    fn save(&self, key: &str, value: &str) -> Result<(), SpeedLensError>;

    /// Delete the value stored under `key`. Missing keys are not an error.
    fn remove(&self, key: &str) -> Result<(), SpeedLensError>;
}

impl<S: Storage> Storage for &S {
    fn load(&self, key: &str) -> Result<Option<String>, SpeedLensError> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &str) -> Result<(), SpeedLensError> {
        (**self).save(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), SpeedLensError> {
        (**self).remove(key)
    }
}

/// One `<key>.json` file per key inside a data directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so
/// an interrupted write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Use `dir` as the data directory, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, SpeedLensError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            SpeedLensError::persistence(format!(
                "cannot create data directory {}: {}",
                dir.display(),
                e
            ))
            .with_source(e)
        })?;

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Storage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>, SpeedLensError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), SpeedLensError> {
        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{}.json.tmp", key));

        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&tmp, &path)?;
        debug!("Wrote {} bytes to {}", value.len(), path.display());

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SpeedLensError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Volatile storage, for tests and one-off runs.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: RefCell<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, SpeedLensError> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), SpeedLensError> {
        self.values.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SpeedLensError> {
        self.values.borrow_mut().remove(key);
        Ok(())
    }
}

/// Newest-first, capacity-bounded sequence of results.
///
/// The in-memory sequence is authoritative. When a write fails the
/// mutation is kept and the error is returned so the caller can warn.
#[derive(Debug)]
pub struct HistoryStore<S: Storage> {
    storage: S,
    capacity: usize,
    results: Vec<ProbeResult>,
}

impl<S: Storage> HistoryStore<S> {
    /// Load the persisted history from `storage`.
    ///
    /// An unreadable or corrupt snapshot is logged and replaced with an
    /// empty history, the same as a first run.
    pub fn open(storage: S, capacity: usize) -> Self {
        let results = match load_snapshot(&storage) {
            Ok(results) => results,
            Err(e) => {
                warn!("Discarding unreadable history: {}", e);
                Vec::new()
            }
        };

        let mut store = Self { storage, capacity, results };
        store.results.truncate(capacity);
        store
    }

    /// Prepend `result`, evict anything past capacity and persist.
    pub fn append(&mut self, result: ProbeResult) -> Result<(), SpeedLensError> {
        self.results.insert(0, result);
        if self.results.len() > self.capacity {
            let evicted = self.results.len() - self.capacity;
            self.results.truncate(self.capacity);
            debug!("Evicted {} result(s) past capacity", evicted);
        }

        self.persist()
    }

    /// All results, newest first.
    pub fn all(&self) -> &[ProbeResult] {
        &self.results
    }

    /// Up to `n` of the newest results.
    pub fn recent(&self, n: usize) -> &[ProbeResult] {
        &self.results[..n.min(self.results.len())]
    }

    /// Drop every result and persist the empty history.
    pub fn clear(&mut self) -> Result<(), SpeedLensError> {
        self.results.clear();
        self.persist()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn persist(&self) -> Result<(), SpeedLensError> {
        let snapshot = serde_json::to_string(&self.results)?;
        self.storage.save(HISTORY_KEY, &snapshot)
    }
}

fn load_snapshot<S: Storage>(
    storage: &S,
) -> Result<Vec<ProbeResult>, SpeedLensError> {
    match storage.load(HISTORY_KEY)? {
        Some(snapshot) if !snapshot.trim().is_empty() => {
            Ok(serde_json::from_str(&snapshot)?)
        }
        _ => Ok(Vec::new()),
    }
}
