use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;

use crate::clip::ClipRecord;
use crate::identity::Identity;

pub const CLIPS_KEY: &str = "clips.json";
pub const TOKENS_KEY: &str = "tokens.txt";
pub const IDENTITY_KEY: &str = "identity.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store read failed: {0}")]
    Read(String),
    #[error("store write failed: {0}")]
    Write(String),
}

/// The opaque durable key-value capability. Hosts provide whatever backing
/// they have; the typed helpers below never assume more than get/set.
pub trait KeyValue {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// File-per-key store rooted in the platform data directory.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn default_root() -> PathBuf {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("fartcaster")
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

impl KeyValue for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.root.join(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(StoreError::Read(error.to_string())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).map_err(|error| StoreError::Write(error.to_string()))?;
        fs::write(self.root.join(key), value).map_err(|error| StoreError::Write(error.to_string()))
    }
}

/// In-memory shim with the same contract, for tests and headless hosts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValue for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Read("store lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Write("store lock poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Absent or malformed persisted clips hydrate to an empty feed; startup must
/// never fail on bad data.
pub fn load_clips(store: &impl KeyValue) -> Vec<ClipRecord> {
    match store.get(CLIPS_KEY) {
        Ok(Some(payload)) => serde_json::from_str(&payload).unwrap_or_default(),
        _ => Vec::new(),
    }
}

pub fn save_clips(store: &impl KeyValue, clips: &[ClipRecord]) -> Result<(), StoreError> {
    let payload =
        serde_json::to_string(clips).map_err(|error| StoreError::Write(error.to_string()))?;
    store.set(CLIPS_KEY, &payload)
}

pub fn load_balance(store: &impl KeyValue) -> u64 {
    match store.get(TOKENS_KEY) {
        Ok(Some(payload)) => payload.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

pub fn save_balance(store: &impl KeyValue, balance: u64) -> Result<(), StoreError> {
    store.set(TOKENS_KEY, &balance.to_string())
}

/// Accepts the current JSON encoding as well as the bare-string username
/// written by earlier iterations of the app.
pub fn load_identity(store: &impl KeyValue) -> Option<Identity> {
    let payload = match store.get(IDENTITY_KEY) {
        Ok(Some(payload)) => payload,
        _ => return None,
    };

    if let Ok(identity) = serde_json::from_str::<Identity>(&payload) {
        return Some(identity);
    }

    let legacy = payload.trim();
    if legacy.is_empty() || legacy.starts_with('{') {
        return None;
    }
    Some(Identity::Local {
        username: legacy.to_string(),
    })
}

pub fn save_identity(store: &impl KeyValue, identity: &Identity) -> Result<(), StoreError> {
    let payload =
        serde_json::to_string(identity).map_err(|error| StoreError::Write(error.to_string()))?;
    store.set(IDENTITY_KEY, &payload)
}

pub fn clear_identity(store: &impl KeyValue) -> Result<(), StoreError> {
    store.set(IDENTITY_KEY, "")
}
