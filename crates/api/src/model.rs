//! The network map's document model.

use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::Hash;

/// The maximum transaction size permitted by the template parameters,
/// chosen as the largest value a signed 32-bit integer can hold.
pub const MAX_SIGNED_I32: u32 = i32::MAX as u32;

/// The template's default maximum message size, 10 MiB.
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 10_485_760;

/// A participant's distinguished name together with the public key that
/// owns it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalIdentity {
    pub name: String,
    pub owning_key: Bytes,
}

/// A trusted identity participating in consensus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotaryInfo {
    pub identity: LegalIdentity,
    pub validating: bool,
}

/// The protocol-wide constitution.
///
/// Every successful mutation increments `epoch` by exactly one and
/// advances `modified_time`; all other fields carry forward unchanged
/// except for the ones the mutation specifically targets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParameters {
    pub min_platform_version: u32,
    pub notaries: Vec<NotaryInfo>,
    pub max_message_size: u32,
    pub max_transaction_size: u32,
    pub modified_time: Timestamp,
    pub epoch: u64,
    /// Fully-qualified contract name to the ordered set of attachment
    /// hashes approved to implement it. A `BTreeMap`/`BTreeSet` pair keeps
    /// the serialized form, and therefore the content hash, deterministic.
    pub whitelisted_contracts: BTreeMap<String, BTreeSet<Hash>>,
}

impl NetworkParameters {
    /// The parameters a fresh network starts from: epoch 1, no notaries,
    /// an empty whitelist.
    pub fn template(now: Timestamp) -> Self {
        NetworkParameters {
            min_platform_version: 1,
            notaries: Vec::new(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_transaction_size: MAX_SIGNED_I32,
            modified_time: now,
            epoch: 1,
            whitelisted_contracts: BTreeMap::new(),
        }
    }
}

/// A participant's self-description.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub legal_identities: Vec<LegalIdentity>,
    pub addresses: Vec<String>,
    pub platform_version: u32,
}

/// A scheduled activation of a new set of parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParametersUpdate {
    pub new_parameters_hash: Hash,
    pub description: String,
    pub update_deadline: Timestamp,
}

/// An aggregate snapshot of the network, signed to produce the artifact
/// participants actually poll for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkMap {
    pub node_info_hashes: Vec<Hash>,
    pub network_parameter_hash: Hash,
    pub parameters_update: Option<ParametersUpdate>,
}

/// The fixed key `NetworkMap` is stored under in the blob store; it is
/// replaced in place rather than content-addressed, since only the
/// current map matters.
pub const LATEST_NETWORK_MAP_KEY: &str = "latest-network-map";

/// The fixed key a pending `ParametersUpdate` is stored under.
pub const NEXT_PARAMS_UPDATE_KEY: &str = "next-params-update";

/// The text-store key holding the hash of the currently active
/// `NetworkParameters`.
pub const CURRENT_PARAMETERS_KEY: &str = "current-parameters";
