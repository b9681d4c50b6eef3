//! Key-value blob storage for raw fetches, processed tables and models.
//!
//! Keys are `/`-separated relative paths such as
//! `processed/tourist_processed_data.csv`.

use serde::{de::DeserializeOwned, Serialize};
use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("invalid key {0:?}")]
    InvalidKey(String),
    #[error("failed to (de)serialize {key}: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

pub trait BlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Keys directly under `dir`, sorted.
    fn list(&self, dir: &str) -> Result<Vec<String>, StoreError>;
}

pub fn submissions_key(handle: &str) -> String {
    format!("data/{handle}_submissions.json")
}

pub fn rating_key(handle: &str) -> String {
    format!("data/{handle}_rating.json")
}

pub const PROCESSED_DIR: &str = "processed";
pub const PROCESSED_SUFFIX: &str = "_processed_data.csv";

pub fn processed_key(handle: &str) -> String {
    format!("{PROCESSED_DIR}/{handle}{PROCESSED_SUFFIX}")
}

pub fn user_model_key(handle: &str) -> String {
    format!("models/{handle}_rating_model.json")
}

pub const GENERAL_MODEL_KEY: &str = "models/general_model.json";

fn check_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if bad {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Writes an estimator as JSON, replacing any previous artifact.
pub fn save_estimator<S, E>(store: &mut S, key: &str, estimator: &E) -> Result<(), StoreError>
where
    S: BlobStore + ?Sized,
    E: Serialize,
{
    let bytes = serde_json::to_vec(estimator)
        .map_err(|source| StoreError::Json { key: key.to_string(), source })?;
    store.put(key, &bytes)
}

pub fn load_estimator<S, E>(store: &S, key: &str) -> Result<E, StoreError>
where
    S: BlobStore + ?Sized,
    E: DeserializeOwned,
{
    let bytes = store.get(key)?.ok_or_else(|| StoreError::NotFound(key.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
        key: key.to_string(),
        source,
    })
}

/// Stores blobs as files under a root directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &str) -> Result<PathBuf, StoreError> {
        check_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |p, part| p.join(part)))
    }
}

impl BlobStore for FsStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { key: key.to_string(), source }),
        }
    }

    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path(key)?;
        let io_err = |source| StoreError::Io { key: key.to_string(), source };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&path, bytes).map_err(io_err)
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, StoreError> {
        let path = self.path(dir)?;
        let entries = match fs::read_dir(&path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Io { key: dir.to_string(), source }),
        };
        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io { key: dir.to_string(), source })?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if let (true, Some(name)) = (is_file, entry.file_name().to_str()) {
                keys.push(format!("{dir}/{name}"));
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// In-process store, mostly for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl BlobStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        check_key(key)?;
        Ok(self.blobs.get(key).cloned())
    }

    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        check_key(key)?;
        self.blobs.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, StoreError> {
        check_key(dir)?;
        let prefix = format!("{dir}/");
        Ok(self
            .blobs
            .keys()
            .filter(|k| k.strip_prefix(&prefix).is_some_and(|rest| !rest.contains('/')))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &mut dyn BlobStore) {
        assert_eq!(store.get("processed/a.csv").unwrap(), None);
        store.put("processed/a.csv", b"x").unwrap();
        store.put("processed/b.csv", b"y").unwrap();
        store.put("models/a.json", b"{}").unwrap();
        assert_eq!(store.get("processed/a.csv").unwrap().as_deref(), Some(&b"x"[..]));
        assert_eq!(
            store.list("processed").unwrap(),
            vec!["processed/a.csv".to_string(), "processed/b.csv".to_string()]
        );
        assert!(store.list("nothing").unwrap().is_empty());
        store.put("processed/a.csv", b"z").unwrap();
        assert_eq!(store.get("processed/a.csv").unwrap().as_deref(), Some(&b"z"[..]));
    }

    #[test]
    fn memory_store_roundtrip() {
        let mut store = MemoryStore::new();
        exercise(&mut store);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn fs_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsStore::new(dir.path());
        exercise(&mut store);
        assert!(dir.path().join("processed").join("b.csv").exists());
    }

    #[test]
    fn rejects_escaping_keys() {
        let mut store = MemoryStore::new();
        for key in ["", "/etc/passwd", "../x", "a//b", "a/./b"] {
            assert!(matches!(store.put(key, b""), Err(StoreError::InvalidKey(_))), "{key}");
        }
    }

    #[test]
    fn missing_estimator_is_not_found() {
        let store = MemoryStore::new();
        let res: Result<serde_json::Value, _> = load_estimator(&store, GENERAL_MODEL_KEY);
        assert!(matches!(res, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn key_layout() {
        assert_eq!(processed_key("tourist"), "processed/tourist_processed_data.csv");
        assert_eq!(user_model_key("tourist"), "models/tourist_rating_model.json");
        assert_eq!(submissions_key("tourist"), "data/tourist_submissions.json");
    }
}
