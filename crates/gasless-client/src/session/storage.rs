//! Persistence for session keys.
//!
//! Records are keyed by chain id inside one origin. Every `put` replaces the whole record
//! for that chain in one step, so a reader never sees half of an old key and half of a new
//! one.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use gasless_primitives::alloy::primitives::B256;
use gasless_primitives::session::SessionAuthorization;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Persisted form of a session key
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSessionKey {
    pub private_key: B256,
    pub authorization: SessionAuthorization,
}

impl std::fmt::Debug for StoredSessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredSessionKey")
            .field("private_key", &"<redacted>")
            .field("authorization", &self.authorization)
            .finish()
    }
}

impl StoredSessionKey {
    pub fn chain_id(&self) -> u64 {
        self.authorization.chain_id
    }
}

pub trait SessionStorage: Send + Sync {
    fn origin(&self) -> &str;
    fn put(&self, record: &StoredSessionKey) -> Result<()>;
    fn get(&self, chain_id: u64) -> Result<Option<StoredSessionKey>>;
    fn remove(&self, chain_id: u64) -> Result<()>;
    fn chain_ids(&self) -> Result<Vec<u64>>;
}

/// In-process storage, lost on exit
#[derive(Debug)]
pub struct MemorySessionStorage {
    origin: String,
    records: Mutex<HashMap<u64, StoredSessionKey>>,
}

impl MemorySessionStorage {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            records: Mutex::new(HashMap::new()),
        }
    }

    fn records(&self) -> Result<std::sync::MutexGuard<'_, HashMap<u64, StoredSessionKey>>> {
        self.records
            .lock()
            .map_err(|_| ClientError::Storage("session storage lock poisoned".into()))
    }
}

impl SessionStorage for MemorySessionStorage {
    fn origin(&self) -> &str {
        &self.origin
    }

    fn put(&self, record: &StoredSessionKey) -> Result<()> {
        self.records()?.insert(record.chain_id(), record.clone());
        Ok(())
    }

    fn get(&self, chain_id: u64) -> Result<Option<StoredSessionKey>> {
        Ok(self.records()?.get(&chain_id).cloned())
    }

    fn remove(&self, chain_id: u64) -> Result<()> {
        self.records()?.remove(&chain_id);
        Ok(())
    }

    fn chain_ids(&self) -> Result<Vec<u64>> {
        Ok(self.records()?.keys().copied().collect())
    }
}

/// One JSON file per chain under `<root>/<origin>/`
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    origin: String,
    dir: PathBuf,
}

impl FileSessionStorage {
    pub fn new(root: impl AsRef<Path>, origin: impl Into<String>) -> Result<Self> {
        let origin = origin.into();
        let dir = root.as_ref().join(sanitize_origin(&origin));
        fs::create_dir_all(&dir).map_err(|e| ClientError::Storage(e.to_string()))?;
        Ok(Self { origin, dir })
    }

    fn record_path(&self, chain_id: u64) -> PathBuf {
        self.dir.join(format!("{chain_id}.json"))
    }
}

fn sanitize_origin(origin: &str) -> String {
    origin
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}

fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

impl SessionStorage for FileSessionStorage {
    fn origin(&self) -> &str {
        &self.origin
    }

    fn put(&self, record: &StoredSessionKey) -> Result<()> {
        let path = self.record_path(record.chain_id());
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_vec(record).map_err(|e| ClientError::Storage(e.to_string()))?;
        write_private(&tmp, &data).map_err(|e| ClientError::Storage(e.to_string()))?;
        // rename is atomic on the same filesystem
        fs::rename(&tmp, &path).map_err(|e| ClientError::Storage(e.to_string()))
    }

    fn get(&self, chain_id: u64) -> Result<Option<StoredSessionKey>> {
        let path = self.record_path(chain_id);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ClientError::Storage(e.to_string())),
        };
        match serde_json::from_slice::<StoredSessionKey>(&data) {
            Ok(record) if record.chain_id() == chain_id => Ok(Some(record)),
            Ok(record) => {
                tracing::warn!(
                    "session record {} holds chain {}, dropping it",
                    path.display(),
                    record.chain_id()
                );
                self.remove(chain_id)?;
                Ok(None)
            }
            Err(e) => {
                tracing::warn!("unreadable session record {}: {}", path.display(), e);
                self.remove(chain_id)?;
                Ok(None)
            }
        }
    }

    fn remove(&self, chain_id: u64) -> Result<()> {
        match fs::remove_file(self.record_path(chain_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClientError::Storage(e.to_string())),
        }
    }

    fn chain_ids(&self) -> Result<Vec<u64>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| ClientError::Storage(e.to_string()))?;
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ClientError::Storage(e.to_string()))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<u64>().ok())
            {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gasless_primitives::alloy::primitives::{Address, PrimitiveSignature, U256};

    fn record(chain_id: u64) -> StoredSessionKey {
        StoredSessionKey {
            private_key: B256::repeat_byte(7),
            authorization: SessionAuthorization {
                session_address: Address::repeat_byte(1),
                owner: Address::repeat_byte(2),
                chain_id,
                created_at: 100,
                expires_at: 1_900,
                signature: PrimitiveSignature::new(U256::from(1), U256::from(2), false),
            },
        }
    }

    #[test]
    fn test_memory_storage_replaces_per_chain() {
        let storage = MemorySessionStorage::new("app.example");
        storage.put(&record(1)).unwrap();
        let mut replacement = record(1);
        replacement.private_key = B256::repeat_byte(9);
        storage.put(&replacement).unwrap();
        storage.put(&record(2)).unwrap();

        assert_eq!(storage.get(1).unwrap(), Some(replacement));
        storage.remove(1).unwrap();
        assert_eq!(storage.get(1).unwrap(), None);
        assert_eq!(storage.chain_ids().unwrap(), vec![2]);
    }

    #[test]
    fn test_file_storage_round_trip() {
        let root = tempfile::tempdir().unwrap();
        let storage = FileSessionStorage::new(root.path(), "https://app.example").unwrap();
        storage.put(&record(84532)).unwrap();

        let reopened = FileSessionStorage::new(root.path(), "https://app.example").unwrap();
        assert_eq!(reopened.get(84532).unwrap(), Some(record(84532)));
        assert_eq!(reopened.chain_ids().unwrap(), vec![84532]);

        // other origins do not see the record
        let other = FileSessionStorage::new(root.path(), "https://other.example").unwrap();
        assert_eq!(other.get(84532).unwrap(), None);

        reopened.remove(84532).unwrap();
        reopened.remove(84532).unwrap();
        assert_eq!(storage.get(84532).unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_storage_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        let storage = FileSessionStorage::new(root.path(), "origin").unwrap();
        storage.put(&record(1)).unwrap();
        let mode = fs::metadata(storage.record_path(1)).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_record_is_dropped() {
        let root = tempfile::tempdir().unwrap();
        let storage = FileSessionStorage::new(root.path(), "origin").unwrap();
        fs::write(storage.record_path(5), b"{not json").unwrap();
        assert_eq!(storage.get(5).unwrap(), None);
        assert!(!storage.record_path(5).exists());
    }

    #[test]
    fn test_debug_hides_key() {
        let printed = format!("{:?}", record(1));
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains(&format!("{}", B256::repeat_byte(7))));
    }
}
