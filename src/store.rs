//! Key/value persistence for the engine aggregates.
//!
//! Every value is a JSON envelope `{"version": 1, "data": ...}`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

pub const STATE_VERSION: u32 = 1;

pub const KEY_BOTS: &str = "aegis_bots";
pub const KEY_CREDITS: &str = "aegis_credits";
pub const KEY_BALANCE: &str = "aegis_balance";
pub const KEY_BILLING: &str = "aegis_billing";
pub const KEY_PANIC: &str = "aegis_panic";

pub trait StateStore: Send {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&mut self, key: &str, value: &str) -> Result<()>;
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    data: T,
}

pub fn encode<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(&Envelope {
        version: STATE_VERSION,
        data: value,
    })?)
}

pub fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T> {
    let envelope: Envelope<T> = serde_json::from_str(raw)?;
    if envelope.version != STATE_VERSION {
        return Err(EngineError::VersionMismatch {
            key: key.to_string(),
            found: envelope.version,
            expected: STATE_VERSION,
        });
    }
    Ok(envelope.data)
}

/// Load `key`, falling back to `default` when absent or unreadable.
pub fn load_or<T: DeserializeOwned>(store: &dyn StateStore, key: &str, default: T) -> T {
    match store.load(key) {
        Ok(Some(raw)) => match decode(key, &raw) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("discarding persisted {}: {}", key, e);
                default
            }
        },
        Ok(None) => default,
        Err(e) => {
            log::warn!("failed to read persisted {}: {}", key, e);
            default
        }
    }
}

pub fn save_value<T: Serialize>(store: &mut dyn StateStore, key: &str, value: &T) -> Result<()> {
    let raw = encode(value)?;
    store.save(key, &raw)
}

/// One `<key>.json` file per key inside a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StateStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = FileStore::open(dir.path()).unwrap();
            save_value(&mut store, KEY_CREDITS, &12.5f64).unwrap();
        }
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(load_or(&store, KEY_CREDITS, 0.0f64), 12.5);
        assert!(!dir.path().join("aegis_credits.json.tmp").exists());
    }

    #[test]
    fn test_missing_key_uses_default() {
        let store = MemoryStore::new();
        assert!(load_or(&store, KEY_PANIC, true));
    }

    #[test]
    fn test_wrong_version_falls_back() {
        let mut store = MemoryStore::new();
        store
            .save(KEY_BALANCE, r#"{"version":99,"data":1.0}"#)
            .unwrap();
        assert_eq!(load_or(&store, KEY_BALANCE, 5.0f64), 5.0);
        assert!(matches!(
            decode::<f64>(KEY_BALANCE, r#"{"version":99,"data":1.0}"#),
            Err(EngineError::VersionMismatch { found: 99, .. })
        ));
    }

    #[test]
    fn test_garbage_falls_back() {
        let mut store = MemoryStore::new();
        store.save(KEY_BALANCE, "not json").unwrap();
        assert_eq!(load_or(&store, KEY_BALANCE, 3.0f64), 3.0);
    }
}
