//! Commands exchanged between units and the processor.
//!
//! Every unit (the HTTP server, the notary directory watcher, the CLI's
//! gRPC-free HTTP admin surface) talks to the processor by sending an
//! [`ApplicationCommand`] down an `mpsc::UnboundedSender` and awaiting a
//! `oneshot` reply. The processor is the only task that ever touches the
//! stores or the signing authority directly.

use std::fmt;

use jiff::Timestamp;
use netmap_api::{
    Change, Hash, NetworkMap, NetworkParameters, NodeAddError, NodeInfo, NodeListResult,
    NotFoundError, NotaryInfo, NotaryListResult, ParametersUpdateError, ParametersUpdateResult,
    PublishNodeResult, Signed, WhitelistResult,
};
use tokio::sync::oneshot;

use crate::store::StoreError;

/// The processor has shut down before it could reply to a command.
#[derive(Debug)]
pub struct Terminated;

impl fmt::Display for Terminated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "the processor terminated before replying")
    }
}

impl std::error::Error for Terminated {}

/// A request sent to the processor, paired with the channel its reply
/// goes back on.
pub enum ApplicationCommand {
    /// Publish a signed `NodeInfo`. Fails on bad signature or on a legal
    /// name already claimed by a different node.
    PublishNode {
        signed: Signed<NodeInfo>,
        reply: oneshot::Sender<Result<PublishNodeResult, NodeAddError>>,
    },

    /// Apply a change to the current network parameters and schedule its
    /// activation after the configured delay.
    UpdateParameters {
        change: Change,
        description: Option<String>,
        reply: oneshot::Sender<Result<ParametersUpdateResult, ParametersUpdateError>>,
    },

    /// Fetch the currently published, signed network map.
    GetNetworkMap {
        reply: oneshot::Sender<Option<Signed<NetworkMap>>>,
    },

    /// Fetch the current network parameters, signed. Fails only on a
    /// storage-backend error; the pointer and blob are expected to exist
    /// once bootstrap has completed.
    GetNetworkParameters {
        reply: oneshot::Sender<Result<Signed<NetworkParameters>, StoreError>>,
    },

    /// Fetch a previously published `NodeInfo` by its content hash.
    GetNodeInfo {
        hash: Hash,
        reply: oneshot::Sender<Option<Signed<NodeInfo>>>,
    },

    /// Fetch a previously signed `NetworkParameters` document by its
    /// content hash (not necessarily the currently active one).
    GetNetworkParametersByHash {
        hash: Hash,
        reply: oneshot::Sender<Option<Signed<NetworkParameters>>>,
    },

    /// Remove a previously published node info and schedule a rebuild.
    DeleteNode {
        hash: Hash,
        reply: oneshot::Sender<Result<(), NotFoundError>>,
    },

    /// List all currently known nodes.
    ListNodes { reply: oneshot::Sender<NodeListResult> },

    /// List the notaries in the current parameters.
    ListNotaries { reply: oneshot::Sender<NotaryListResult> },

    /// List the current contract attachment whitelist.
    ListWhitelist { reply: oneshot::Sender<WhitelistResult> },

    /// Tell the processor the notary directory watcher derived a new
    /// notary set from the directory's contents, so it should replace
    /// `notaries` wholesale and schedule the change's activation.
    NotaryDirectoryChanged {
        notaries: Vec<NotaryInfo>,
        observed_at: Timestamp,
        reply: oneshot::Sender<()>,
    },
}
