//! The closed set of mutations that can be made to `NetworkParameters`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{Hash, NotaryInfo};

/// A single mutation of `NetworkParameters`, dispatched by
/// `changeset::apply`. Closed on purpose: adding a new kind of change
/// means adding a variant here and a matching arm in `apply`, not
/// reaching for open-ended polymorphism.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change {
    /// Append a notary if its identity is absent; a no-op if already
    /// present.
    AddNotary(NotaryInfo),

    /// Remove the single notary whose identity name hashes to
    /// `name_hash`; a no-op if absent.
    RemoveNotary { name_hash: Hash },

    /// Union `entries` into the existing whitelist.
    AppendWhiteList {
        entries: Vec<(String, BTreeSet<Hash>)>,
    },

    /// Replace the whitelist wholesale.
    ReplaceWhiteList {
        entries: Vec<(String, BTreeSet<Hash>)>,
    },

    /// Empty the whitelist.
    ClearWhiteList,
}

impl Change {
    /// A short human-readable description, used as the default
    /// `ParametersUpdate::description` when the caller did not supply one.
    pub fn default_description(&self) -> String {
        match self {
            Change::AddNotary(info) => format!("add notary {}", info.identity.name),
            Change::RemoveNotary { .. } => "remove notary".to_string(),
            Change::AppendWhiteList { .. } => "append whitelist".to_string(),
            Change::ReplaceWhiteList { .. } => "replace whitelist".to_string(),
            Change::ClearWhiteList => "clear whitelist".to_string(),
        }
    }
}
