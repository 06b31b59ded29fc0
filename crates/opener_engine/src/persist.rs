use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use opener_logging::opener_debug;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::{HostError, SettingsChange, SettingsStore};

const CHANGE_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("settings directory missing or not writable: {0}")]
    Directory(String),
    #[error("settings file is not a JSON object: {0}")]
    Parse(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure the settings directory exists; create if missing.
pub fn ensure_settings_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::Directory(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::Directory("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::Directory(e.to_string()))?;
    }
    Ok(())
}

/// Durable settings kept as one JSON object on disk.
///
/// Every `set` rewrites the whole file through a temp file and a rename, so a
/// crash never leaves a half-written file behind. Subscribers, the writer
/// included, are notified after the write lands.
pub struct FileSettingsStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
    changes: broadcast::Sender<SettingsChange>,
}

impl FileSettingsStore {
    /// Opens the store at `path`. A missing file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => map,
                Ok(other) => return Err(PersistError::Parse(format!("found {other}"))),
                Err(err) => return Err(PersistError::Parse(err.to_string())),
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => Map::new(),
            Err(err) => return Err(PersistError::Io(err)),
        };
        opener_debug!("Opened settings at {:?} with {} key(s)", path, values.len());
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            path,
            values: Mutex::new(values),
            changes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_file(&self, values: &Map<String, Value>) -> Result<(), PersistError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        ensure_settings_dir(&dir)?;

        let content = serde_json::to_string_pretty(values)
            .map_err(|err| PersistError::Parse(err.to_string()))?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&self.path).map_err(|e| PersistError::Io(e.error))?;
        Ok(())
    }

    fn lock_values(&self) -> MutexGuard<'_, Map<String, Value>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, HostError> {
        Ok(self.lock_values().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), HostError> {
        {
            let mut values = self.lock_values();
            let mut next = values.clone();
            next.insert(key.to_owned(), value.clone());
            self.write_file(&next)?;
            *values = next;
        }
        let change = SettingsChange {
            key: key.to_owned(),
            value,
        };
        if self.changes.send(change).is_err() {
            opener_debug!("Settings change for {} had no subscribers", key);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SettingsChange> {
        self.changes.subscribe()
    }
}
