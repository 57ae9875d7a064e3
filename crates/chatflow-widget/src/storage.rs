//! Session persistence
//!
//! One record per widget instance, overwritten wholesale on every save.

use chatflow_api::Message;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// A persisted conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub chat_id: String,
    pub chat_history: Vec<Message>,
}

/// Storage key for a chatflow's session record
pub fn storage_key(chatflow_id: &str) -> String {
    format!("{}_EXTERNAL", chatflow_id)
}

/// Where session records live
pub trait SessionStorage: Send + Sync {
    /// Load the record stored under `key`, if any
    fn load(&self, key: &str) -> Result<Option<SessionRecord>>;

    /// Replace the record stored under `key`
    fn save(&self, key: &str, record: &SessionRecord) -> Result<()>;

    /// Delete the record stored under `key`; missing records are not an error
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-process storage holding serialized records
#[derive(Default)]
pub struct MemoryStorage {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// The serialized record under `key`
    pub fn raw(&self, key: &str) -> Option<String> {
        self.records.lock().get(key).cloned()
    }

    /// Store a serialized record directly
    pub fn insert_raw(&self, key: impl Into<String>, raw: impl Into<String>) {
        self.records.lock().insert(key.into(), raw.into());
    }

    /// Whether a record exists under `key`
    pub fn contains(&self, key: &str) -> bool {
        self.records.lock().contains_key(key)
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<SessionRecord>> {
        match self.raw(key) {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn save(&self, key: &str, record: &SessionRecord) -> Result<()> {
        let raw = serde_json::to_string(record)?;
        self.records.lock().insert(key.to_string(), raw);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.records.lock().remove(key);
        Ok(())
    }
}

/// One JSON file per record under a directory
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Default sessions directory
    pub fn default_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chatflow")
            .join("sessions")
    }

    /// Store records under `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory records are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a key; characters unsafe in file names become `_`
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

impl Default for FileStorage {
    fn default() -> Self {
        Self::new(Self::default_dir())
    }
}

impl SessionStorage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<SessionRecord>> {
        let path = self.path_for(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn save(&self, key: &str, record: &SessionRecord) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(record)?;
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
