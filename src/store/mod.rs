//! Storage backends for the five persisted collections.
//!
//! Both backends are synchronous: a filesystem write-then-rename and a
//! `redb` transaction are both blocking calls, and the processor that
//! owns them runs on its own dedicated OS thread (see `processor`), not
//! the shared multi-threaded runtime, so there is no executor to starve.

pub mod db;
pub mod fs;

use std::fmt;

/// The five collections `BlobStore`/`TextStore` instances are addressed
/// by. Kept as a type rather than bare `&str`s so a typo in a collection
/// name is a compile error, not a silent empty lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    SignedNetworkParameters,
    SignedNetworkMap,
    SignedNodeInfo,
    ParametersUpdate,
    Etc,
}

impl Collection {
    /// The name used both as a filesystem subdirectory and as a `redb`
    /// table name.
    pub fn name(self) -> &'static str {
        match self {
            Collection::SignedNetworkParameters => "signed-network-parameters",
            Collection::SignedNetworkMap => "signed-network-map",
            Collection::SignedNodeInfo => "signed-node-info",
            Collection::ParametersUpdate => "parameters-update",
            Collection::Etc => "etc",
        }
    }

    /// All collections, in the fixed order the migration orchestrator
    /// walks them in.
    pub const ALL: [Collection; 5] = [
        Collection::SignedNetworkParameters,
        Collection::SignedNetworkMap,
        Collection::SignedNodeInfo,
        Collection::ParametersUpdate,
        Collection::Etc,
    ];
}

/// A storage operation failed.
#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Db(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "I/O error: {e}"),
            StoreError::Db(e) => write!(f, "database error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

/// Content-addressed or fixed-key binary blob storage, as used by four
/// of the five collections.
pub trait BlobStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<bytes::Bytes>, StoreError>;
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
    fn list_keys(&self) -> Result<Vec<String>, StoreError>;

    /// Every stored entry, keyed by its store key. Used by the migration
    /// orchestrator, which needs the values as well as the keys.
    fn get_all(&self) -> Result<std::collections::BTreeMap<String, bytes::Bytes>, StoreError> {
        let mut out = std::collections::BTreeMap::new();
        for key in self.list_keys()? {
            if let Some(value) = self.get(&key)? {
                out.insert(key, value);
            }
        }
        Ok(out)
    }
}

/// Small UTF-8 text values, as used by the `etc` collection's single
/// `current-parameters` entry. Upsert semantics: `put` always succeeds
/// whether or not `key` previously existed.
pub trait TextStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn get_or_default(&self, key: &str, default: &str) -> Result<String, StoreError> {
        Ok(self.get(key)?.unwrap_or_else(|| default.to_string()))
    }
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}
