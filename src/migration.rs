//! One-shot migration from the filesystem-backed stores to the
//! database-backed ones, run once at boot before the processor starts
//! serving commands.
//!
//! Every collection starts life on [`crate::store::fs::FsStore`] (see
//! that module's doc comment); the first time the daemon finds a
//! database-backed collection empty, it copies over whatever the
//! filesystem store holds and clears the filesystem side. A collection
//! whose filesystem store is already empty is a no-op, which makes this
//! safe to run unconditionally on every boot rather than gated behind a
//! one-time marker file.

use std::fmt;
use std::sync::Arc;

use camino::Utf8Path;
use redb::Database;
use tracing::info;

use crate::store::db::DbStore;
use crate::store::fs::FsStore;
use crate::store::{BlobStore, Collection, StoreError};

/// A collection failed to migrate. Fatal: `spec.md` §7 classes a failed
/// boot-time migration as `fatal-bootstrap`.
#[derive(Debug)]
pub struct MigrationError {
    pub collection: Collection,
    pub source: StoreError,
}

impl fmt::Display for MigrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "migrating collection '{}' failed: {}",
            self.collection.name(),
            self.source
        )
    }
}

impl std::error::Error for MigrationError {}

/// Migrate every collection under `fs_root` into `db`, concurrently.
///
/// Each collection is read from its filesystem store, written into its
/// database table, and only then cleared from disk, so a crash partway
/// through leaves the filesystem copy intact for the next attempt
/// rather than losing data.
pub async fn run(fs_root: &Utf8Path, db: Arc<Database>) -> Result<(), MigrationError> {
    let tasks = Collection::ALL.map(|collection| {
        let fs_root = fs_root.to_owned();
        let db = db.clone();
        tokio::task::spawn_blocking(move || migrate_collection(&fs_root, db, collection))
    });

    for result in futures::future::join_all(tasks).await {
        let result = result.expect("migration task panicked");
        result?;
    }
    Ok(())
}

fn migrate_collection(
    fs_root: &Utf8Path,
    db: Arc<Database>,
    collection: Collection,
) -> Result<(), MigrationError> {
    let to_err = |source: StoreError| MigrationError { collection, source };

    let fs_store = FsStore::open(fs_root, collection).map_err(to_err)?;
    let db_store = DbStore::open(db, collection).map_err(to_err)?;

    let entries = fs_store.get_all().map_err(to_err)?;
    if entries.is_empty() {
        return Ok(());
    }

    for (key, value) in &entries {
        db_store.put(key, value).map_err(to_err)?;
    }
    for key in entries.keys() {
        fs_store.delete(key).map_err(to_err)?;
    }

    info!(
        "migrated {} entr{} from '{}' into the database",
        entries.len(),
        if entries.len() == 1 { "y" } else { "ies" },
        collection.name(),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::db;

    #[tokio::test]
    async fn migrates_entries_and_clears_the_filesystem_store() {
        let dir = tempfile::tempdir().unwrap();
        let root = camino::Utf8Path::from_path(dir.path()).unwrap();

        let fs_store = FsStore::open(root, Collection::SignedNodeInfo).unwrap();
        fs_store.put("abc", b"hello").unwrap();

        let db = db::open_database(&root.join("netmap.redb")).unwrap();
        run(root, db.clone()).await.unwrap();

        assert!(fs_store.list_keys().unwrap().is_empty());

        let db_store = DbStore::open(db, Collection::SignedNodeInfo).unwrap();
        assert_eq!(db_store.get("abc").unwrap().unwrap(), bytes::Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn an_empty_filesystem_store_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let root = camino::Utf8Path::from_path(dir.path()).unwrap();
        let db = db::open_database(&root.join("netmap.redb")).unwrap();

        run(root, db).await.unwrap();
    }

    #[tokio::test]
    async fn all_five_collections_migrate() {
        let dir = tempfile::tempdir().unwrap();
        let root = camino::Utf8Path::from_path(dir.path()).unwrap();
        for collection in Collection::ALL {
            FsStore::open(root, collection).unwrap().put("k", b"v").unwrap();
        }

        let db = db::open_database(&root.join("netmap.redb")).unwrap();
        run(root, db.clone()).await.unwrap();

        for collection in Collection::ALL {
            let store = DbStore::open(db.clone(), collection).unwrap();
            assert_eq!(store.get("k").unwrap().unwrap(), bytes::Bytes::from_static(b"v"));
        }
    }
}
