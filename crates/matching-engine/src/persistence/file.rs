//! JSON-file profile storage

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{KeyValueStore, PersistenceResult};

/// Profile storage kept as one JSON object on disk
///
/// The file is read on first access and rewritten in full on every change
/// through a temp file + rename, so a crash never leaves half a document.
/// An unreadable document is treated as empty and replaced on the next write.
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    entries: Mutex<Option<BTreeMap<String, String>>>,
}

impl FileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling of the profile file, whatever its extension
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("profile"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn load(&self) -> PersistenceResult<BTreeMap<String, String>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&raw) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Profile storage file is corrupt, starting empty"
                );
                Ok(BTreeMap::new())
            }
        }
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> PersistenceResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.temp_path();
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), entries = entries.len(), "Profile storage written");
        Ok(())
    }

    /// Apply a change to a copy, persist it, then commit it to the cache
    fn update<F>(&self, change: F) -> PersistenceResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let mut guard = self.entries.lock();
        let mut next = match guard.as_ref() {
            Some(entries) => entries.clone(),
            None => self.load()?,
        };

        if change(&mut next) {
            self.persist(&next)?;
        }
        *guard = Some(next);
        Ok(())
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get_item(&self, key: &str) -> PersistenceResult<Option<String>> {
        let mut guard = self.entries.lock();
        if guard.is_none() {
            *guard = Some(self.load()?);
        }
        Ok(guard.as_ref().and_then(|entries| entries.get(key).cloned()))
    }

    fn set_item(&self, key: &str, value: &str) -> PersistenceResult<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string()).as_deref() != Some(value)
        })
    }

    fn remove_item(&self, key: &str) -> PersistenceResult<()> {
        self.update(|entries| entries.remove(key).is_some())
    }
}
