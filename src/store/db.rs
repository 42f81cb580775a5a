//! The `redb`-backed store: one shared database file, one table per
//! collection.
//!
//! `redb` ships no client/server process and needs no schema migration
//! tool of its own, which is why it was chosen over a networked document
//! database for the "embedded" backend — see `Config::db_backend`.

use std::sync::Arc;

use camino::Utf8Path;
use redb::{Database, TableDefinition};

use super::{BlobStore, Collection, StoreError, TextStore};

type Table = TableDefinition<'static, &'static str, &'static [u8]>;

fn table_for(collection: Collection) -> Table {
    TableDefinition::new(collection.name())
}

/// Open (creating if absent) the single database file all collections'
/// tables live in.
pub fn open_database(path: &Utf8Path) -> Result<Arc<Database>, StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Database::create(path).map_err(|e| StoreError::Db(e.to_string()))?;
    Ok(Arc::new(db))
}

/// A handle onto one collection's table within the shared database.
pub struct DbStore {
    db: Arc<Database>,
    collection: Collection,
}

impl DbStore {
    /// Open `collection`'s table, creating it on first use.
    pub fn open(db: Arc<Database>, collection: Collection) -> Result<Self, StoreError> {
        let write_txn = db.begin_write().map_err(|e| StoreError::Db(e.to_string()))?;
        {
            let _ = write_txn
                .open_table(table_for(collection))
                .map_err(|e| StoreError::Db(e.to_string()))?;
        }
        write_txn.commit().map_err(|e| StoreError::Db(e.to_string()))?;
        Ok(DbStore { db, collection })
    }
}

impl BlobStore for DbStore {
    fn get(&self, key: &str) -> Result<Option<bytes::Bytes>, StoreError> {
        let read_txn = self.db.begin_read().map_err(|e| StoreError::Db(e.to_string()))?;
        let table = read_txn
            .open_table(table_for(self.collection))
            .map_err(|e| StoreError::Db(e.to_string()))?;
        let value = table.get(key).map_err(|e| StoreError::Db(e.to_string()))?;
        Ok(value.map(|v| bytes::Bytes::copy_from_slice(v.value())))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write().map_err(|e| StoreError::Db(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(table_for(self.collection))
                .map_err(|e| StoreError::Db(e.to_string()))?;
            table.insert(key, value).map_err(|e| StoreError::Db(e.to_string()))?;
        }
        write_txn.commit().map_err(|e| StoreError::Db(e.to_string()))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write().map_err(|e| StoreError::Db(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(table_for(self.collection))
                .map_err(|e| StoreError::Db(e.to_string()))?;
            table.remove(key).map_err(|e| StoreError::Db(e.to_string()))?;
        }
        write_txn.commit().map_err(|e| StoreError::Db(e.to_string()))?;
        Ok(())
    }

    fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let read_txn = self.db.begin_read().map_err(|e| StoreError::Db(e.to_string()))?;
        let table = read_txn
            .open_table(table_for(self.collection))
            .map_err(|e| StoreError::Db(e.to_string()))?;
        let mut keys = Vec::new();
        for item in table.iter().map_err(|e| StoreError::Db(e.to_string()))? {
            let (k, _v) = item.map_err(|e| StoreError::Db(e.to_string()))?;
            keys.push(k.value().to_string());
        }
        Ok(keys)
    }
}

impl TextStore for DbStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match BlobStore::get(self, key)? {
            Some(bytes) => {
                let text = String::from_utf8(bytes.to_vec())
                    .map_err(|e| StoreError::Db(format!("non-UTF-8 value for '{key}': {e}")))?;
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        BlobStore::put(self, key, value.as_bytes())
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
        let path = Utf8Path::from_path(dir.path()).unwrap().join("netmap.redb");
        let db = open_database(&path).unwrap();
        let store = DbStore::open(db, Collection::SignedNodeInfo).unwrap();

        assert!(store.get("abc").unwrap().is_none());
        store.put("abc", b"hello").unwrap();
        assert_eq!(store.get("abc").unwrap().unwrap(), bytes::Bytes::from_static(b"hello"));
    }

    #[test]
    fn separate_collections_do_not_share_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap().join("netmap.redb");
        let db = open_database(&path).unwrap();
        let params_store = DbStore::open(db.clone(), Collection::SignedNetworkParameters).unwrap();
        let node_store = DbStore::open(db, Collection::SignedNodeInfo).unwrap();

        params_store.put("shared-key", b"params").unwrap();
        assert!(node_store.get("shared-key").unwrap().is_none());
    }

    #[test]
    fn text_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap().join("netmap.redb");
        let db = open_database(&path).unwrap();
        let store = DbStore::open(db, Collection::Etc).unwrap();

        TextStore::put(&store, "current-parameters", "deadbeef").unwrap();
        assert_eq!(
            TextStore::get(&store, "current-parameters").unwrap(),
            Some("deadbeef".to_string())
        );
    }
}
