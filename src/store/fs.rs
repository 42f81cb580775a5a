//! The filesystem-backed store: one directory per collection, one file
//! per key, written atomically via [`crate::util::write_file`].
//!
//! This is the backend every collection starts on; the migration
//! orchestrator copies it into the `redb`-backed store on boot and the
//! daemon runs off the database afterwards (see `migration`).

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use super::{BlobStore, Collection, StoreError, TextStore};

/// Percent-encode a key into a filesystem-safe filename. Collection
/// keys are either hex hashes or the fixed ASCII strings
/// `"latest-network-map"`/`"next-params-update"`/`"current-parameters"`,
/// none of which contain characters that need escaping, but we encode
/// defensively rather than assume that forever.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02x}")),
        }
    }
    out
}

/// A single collection's directory on disk.
pub struct FsStore {
    dir: Utf8PathBuf,
}

impl FsStore {
    /// Root the store at `root/<collection-name>/`, creating the
    /// directory if it does not yet exist.
    pub fn open(root: &Utf8Path, collection: Collection) -> Result<Self, StoreError> {
        let dir = root.join(collection.name());
        fs::create_dir_all(&dir)?;
        Ok(FsStore { dir })
    }

    fn path_for(&self, key: &str) -> Utf8PathBuf {
        self.dir.join(encode_key(key))
    }
}

impl BlobStore for FsStore {
    fn get(&self, key: &str) -> Result<Option<bytes::Bytes>, StoreError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes::Bytes::from(bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        crate::util::write_file(&self.path_for(key), value)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                keys.push(name.to_string());
            }
        }
        Ok(keys)
    }
}

impl TextStore for FsStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        crate::util::write_file(&self.path_for(key), value.as_bytes())?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        BlobStore::delete(self, key)
    }

    fn clear(&self) -> Result<(), StoreError> {
        for key in BlobStore::list_keys(self)? {
            BlobStore::delete(self, &key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_blob() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let store = FsStore::open(root, Collection::SignedNodeInfo).unwrap();

        assert!(store.get("abc").unwrap().is_none());
        store.put("abc", b"hello").unwrap();
        assert_eq!(store.get("abc").unwrap().unwrap(), bytes::Bytes::from_static(b"hello"));
    }

    #[test]
    fn list_keys_reflects_puts() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let store = FsStore::open(root, Collection::SignedNodeInfo).unwrap();

        store.put("one", b"1").unwrap();
        store.put("two", b"2").unwrap();
        let mut keys = store.list_keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn text_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let store = FsStore::open(root, Collection::Etc).unwrap();

        TextStore::put(&store, "current-parameters", "deadbeef").unwrap();
        assert_eq!(
            TextStore::get(&store, "current-parameters").unwrap(),
            Some("deadbeef".to_string())
        );
    }
}
