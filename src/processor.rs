//! The serialized event processor — the heart of the service.
//!
//! Everything that mutates the network map's state (a node registration,
//! an admin parameters change, a notary directory reconciliation, a
//! scheduled activation) runs on one dedicated OS thread hosting its own
//! single-threaded Tokio runtime, built via
//! [`tokio::runtime::Builder::new_current_thread`]. Nothing else is ever
//! scheduled on that runtime, so two mutations can never interleave: this
//! is the literal reading of "a single dedicated worker executor with
//! exactly one thread" rather than a promise enforced only by convention
//! on the shared multi-threaded runtime.
//!
//! Every other unit (the HTTP server, the notary directory watcher) talks
//! to the processor exclusively through the `mpsc`/`oneshot` channels in
//! [`crate::comms`]; none of them hold a reference to the stores or the
//! signing authority directly.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use jiff::{Span, SpanRelativeTo, Timestamp};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use netmap_api::{
    Change, Hash, NetworkMap, NetworkParameters, NodeAddError, NodeInfo, NodeListEntry,
    NodeListResult, NotFoundError, NotaryInfo, NotaryListResult, ParametersUpdateResult,
    PublishNodeResult, Signed, WhitelistResult, CURRENT_PARAMETERS_KEY, LATEST_NETWORK_MAP_KEY,
    NEXT_PARAMS_UPDATE_KEY,
};

use crate::changeset;
use crate::comms::ApplicationCommand;
use crate::metrics::Metrics;
use crate::signing::SigningAuthority;
use crate::store::{BlobStore, StoreError, TextStore};

/// The five collections the processor reads and writes. Bundled into one
/// struct so `Processor::spawn` takes a single argument regardless of
/// which backend (filesystem or database) backs each collection.
pub struct Stores {
    pub network_parameters: Box<dyn BlobStore>,
    pub network_map: Box<dyn BlobStore>,
    pub node_info: Box<dyn BlobStore>,
    pub parameters_update: Box<dyn BlobStore>,
    pub etc: Box<dyn TextStore>,
}

/// The processor failed to establish its initial `NetworkParameters` or
/// `NetworkMap`. Per `spec.md` §7 this is fatal: the process should not
/// continue starting up.
#[derive(Debug)]
pub struct BootstrapError(pub StoreError);

impl fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to establish initial network parameters: {}", self.0)
    }
}

impl std::error::Error for BootstrapError {}

/// A handle to the running processor: the channel its callers enqueue
/// work on, and a one-shot signal for whether bootstrap succeeded.
pub struct ProcessorHandle {
    pub tx: mpsc::UnboundedSender<ApplicationCommand>,
    pub ready: oneshot::Receiver<Result<(), BootstrapError>>,
    pub thread: thread::JoinHandle<()>,
}

/// Events the processor sends to itself from timer tasks. Never exposed
/// to other units; always routed back through the processor's own loop
/// so a timer firing is just another message to the single consumer.
enum Internal {
    /// A debounced rebuild timer fired. Stale if `generation` no longer
    /// matches `Processor::rebuild_generation` — i.e. a later
    /// `addNode`/`update` call re-armed the debounce after this timer was
    /// scheduled.
    RebuildFired { generation: u64 },

    /// A pending parameters update's activation deadline arrived. Not
    /// generation-guarded: whichever `next-params-update` is current when
    /// this fires gets applied (see `spec.md` §9's stale-timer note).
    ActivatePending,
}

pub struct Processor {
    stores: Stores,
    signing: Arc<SigningAuthority>,
    metrics: Arc<Metrics>,
    param_update_delay: Span,
    network_map_delay: Span,
    rebuild_generation: u64,
    internal_tx: mpsc::UnboundedSender<Internal>,
}

impl Processor {
    /// Spawn the processor on its own OS thread and start running its
    /// bootstrap sequence. Returns immediately; callers that need to know
    /// whether bootstrap succeeded should await `ProcessorHandle::ready`.
    pub fn spawn(
        stores: Stores,
        signing: Arc<SigningAuthority>,
        metrics: Arc<Metrics>,
        param_update_delay: Span,
        network_map_delay: Span,
    ) -> ProcessorHandle {
        let (app_tx, app_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        let thread = thread::Builder::new()
            .name("netmap-processor".to_string())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                    .expect("failed to build the processor's dedicated runtime");

                runtime.block_on(async move {
                    let mut processor = Processor {
                        stores,
                        signing,
                        metrics,
                        param_update_delay,
                        network_map_delay,
                        rebuild_generation: 0,
                        internal_tx,
                    };

                    let result = processor.bootstrap();
                    let ok = result.is_ok();
                    let _ = ready_tx.send(result);
                    if ok {
                        processor.run(app_rx, internal_rx).await;
                    }
                });
            })
            .expect("failed to spawn the netmap-processor thread");

        ProcessorHandle {
            tx: app_tx,
            ready: ready_rx,
            thread,
        }
    }

    async fn run(
        mut self,
        mut app_rx: mpsc::UnboundedReceiver<ApplicationCommand>,
        mut internal_rx: mpsc::UnboundedReceiver<Internal>,
    ) {
        loop {
            tokio::select! {
                cmd = app_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd),
                        None => {
                            debug!("processor command channel closed, shutting down");
                            break;
                        }
                    }
                }
                ev = internal_rx.recv() => {
                    match ev {
                        Some(ev) => self.handle_internal(ev),
                        None => unreachable!("the processor holds its own internal sender"),
                    }
                }
            }
        }
    }

    fn handle_command(&mut self, cmd: ApplicationCommand) {
        match cmd {
            ApplicationCommand::PublishNode { signed, reply } => {
                let result = self.add_node(signed);
                let _ = reply.send(result);
            }
            ApplicationCommand::UpdateParameters {
                change,
                description,
                reply,
            } => {
                let now = Timestamp::now();
                let activation = now.checked_add(self.param_update_delay).expect("param update delay is a small fixed span");
                let description = description.unwrap_or_else(|| change.default_description());
                let result = self.update_network_parameters(
                    move |params, now| changeset::apply(params, &change, now),
                    description,
                    activation,
                );
                let _ = reply.send(result);
            }
            ApplicationCommand::GetNetworkMap { reply } => {
                let _ = reply.send(self.get_network_map());
            }
            ApplicationCommand::GetNetworkParameters { reply } => {
                let _ = reply.send(self.get_current_network_parameters());
            }
            ApplicationCommand::GetNetworkParametersByHash { hash, reply } => {
                let _ = reply.send(self.get_network_parameters_by_hash(hash));
            }
            ApplicationCommand::GetNodeInfo { hash, reply } => {
                let _ = reply.send(self.get_node_info(hash));
            }
            ApplicationCommand::DeleteNode { hash, reply } => {
                let result = self.delete_node(hash);
                let _ = reply.send(result);
            }
            ApplicationCommand::ListNodes { reply } => {
                let _ = reply.send(self.list_nodes());
            }
            ApplicationCommand::ListNotaries { reply } => {
                let _ = reply.send(self.list_notaries());
            }
            ApplicationCommand::ListWhitelist { reply } => {
                let _ = reply.send(self.list_whitelist());
            }
            ApplicationCommand::NotaryDirectoryChanged {
                notaries,
                observed_at: _,
                reply,
            } => {
                let now = Timestamp::now();
                let activation = now.checked_add(self.param_update_delay).expect("param update delay is a small fixed span");
                let result = self.update_network_parameters(
                    move |params, now| changeset::replace_notaries(params, notaries, now),
                    "notaries changed".to_string(),
                    activation,
                );
                if let Err(err) = result {
                    error!("failed to apply notary directory change: {err}");
                }
                let _ = reply.send(());
            }
        }
    }

    fn handle_internal(&mut self, ev: Internal) {
        match ev {
            Internal::RebuildFired { generation } => {
                if generation != self.rebuild_generation {
                    debug!("dropping stale rebuild timer (generation {generation})");
                    return;
                }
                if let Err(err) = self.create_network_map() {
                    error!("scheduled network map rebuild failed: {err}");
                }
            }
            Internal::ActivatePending => {
                if let Err(err) = self.activate_pending() {
                    error!("scheduled parameters activation failed: {err}");
                }
            }
        }
    }

    // ---- Start sequence (spec.md §4.F) ------------------------------

    fn bootstrap(&mut self) -> Result<(), BootstrapError> {
        self.create_network_parameters().map_err(BootstrapError)?;
        self.create_network_map().map_err(BootstrapError)?;
        Ok(())
    }

    fn create_network_parameters(&mut self) -> Result<(), StoreError> {
        if self.stores.etc.get(CURRENT_PARAMETERS_KEY)?.is_some() {
            return Ok(());
        }

        let now = Timestamp::now();
        let template = NetworkParameters::template(now);
        let signed = self.signing.sign(&template);
        let hash = signed.hash();
        self.stores
            .network_parameters
            .put(&hash.to_hex(), &signed.to_bytes())?;
        self.stores.etc.put(CURRENT_PARAMETERS_KEY, &hash.to_hex())?;
        info!("created initial network parameters (epoch {})", template.epoch);
        Ok(())
    }

    // ---- Node publication (spec.md §4.F "addNode") -------------------

    fn add_node(&mut self, signed: Signed<NodeInfo>) -> Result<PublishNodeResult, NodeAddError> {
        let info: NodeInfo = signed.decode_payload().map_err(|_| NodeAddError::Malformed)?;
        let Some(primary) = info.legal_identities.first() else {
            return Err(NodeAddError::Malformed);
        };
        crate::signing::verify(&signed, &primary.owning_key).map_err(|_| {
            self.metrics.publish_rejections.inc();
            NodeAddError::SignatureInvalid
        })?;

        let mut names_to_keys: BTreeMap<String, bytes::Bytes> = BTreeMap::new();
        let existing_entries = self.stores.node_info.get_all().map_err(store_io_err)?;
        for value in existing_entries.into_values() {
            let Ok(existing) = Signed::<NodeInfo>::from_bytes(value) else {
                continue;
            };
            let Ok(existing_info) = existing.decode_payload() else {
                continue;
            };
            for identity in existing_info.legal_identities {
                names_to_keys.insert(identity.name, identity.owning_key);
            }
        }

        let mut conflicts = Vec::new();
        for identity in &info.legal_identities {
            if let Some(existing_key) = names_to_keys.get(&identity.name) {
                if existing_key != &identity.owning_key {
                    conflicts.push(identity.name.clone());
                }
            }
        }
        if !conflicts.is_empty() {
            self.metrics.publish_rejections.inc();
            return Err(NodeAddError::NameConflict { names: conflicts });
        }

        let hash = signed.hash();
        self.stores
            .node_info
            .put(&hash.to_hex(), &signed.to_bytes())
            .map_err(store_io_err)?;

        self.schedule_network_map_rebuild();
        Ok(PublishNodeResult { hash })
    }

    fn delete_node(&mut self, hash: Hash) -> Result<(), NotFoundError> {
        let key = hash.to_hex();
        match self.stores.node_info.get(&key) {
            Ok(Some(_)) => {}
            Ok(None) => return Err(NotFoundError),
            Err(err) => {
                error!("failed to look up node info '{key}' for deletion: {err}");
                return Err(NotFoundError);
            }
        }
        if let Err(err) = self.stores.node_info.delete(&key) {
            error!("failed to delete node info '{key}': {err}");
            return Err(NotFoundError);
        }
        self.schedule_network_map_rebuild();
        Ok(())
    }

    // ---- Parameters updates (spec.md §4.F "updateNetworkParameters") -

    fn update_network_parameters(
        &mut self,
        transform: impl FnOnce(&NetworkParameters, Timestamp) -> NetworkParameters,
        description: String,
        activation: Timestamp,
    ) -> Result<ParametersUpdateResult, netmap_api::ParametersUpdateError> {
        use netmap_api::ParametersUpdateError as Error;

        let now = Timestamp::now();
        let current = self
            .get_current_network_parameters_decoded()
            .map_err(|e| Error::StorageIo(e.to_string()))?;
        let next = transform(&current, now);
        let signed = self.signing.sign(&next);
        let hash = signed.hash();
        self.stores
            .network_parameters
            .put(&hash.to_hex(), &signed.to_bytes())
            .map_err(|e| Error::StorageIo(e.to_string()))?;

        if activation <= now {
            self.stores
                .etc
                .put(CURRENT_PARAMETERS_KEY, &hash.to_hex())
                .map_err(|e| Error::StorageIo(e.to_string()))?;
            self.create_network_map()
                .map_err(|e| Error::StorageIo(e.to_string()))?;
        } else {
            let update = netmap_api::ParametersUpdate {
                new_parameters_hash: hash,
                description,
                update_deadline: activation,
            };
            let body = serde_json::to_vec(&update)
                .expect("ParametersUpdate always serializes");
            self.stores
                .parameters_update
                .put(NEXT_PARAMS_UPDATE_KEY, &body)
                .map_err(|e| Error::StorageIo(e.to_string()))?;
            self.schedule_network_map_rebuild();
        }

        Ok(ParametersUpdateResult {
            new_parameters_hash: hash,
            activates_at: activation,
        })
    }

    // ---- Rebuild debouncing (spec.md §4.F "scheduleNetworkMapRebuild") -

    fn schedule_network_map_rebuild(&mut self) {
        self.rebuild_generation += 1;
        let generation = self.rebuild_generation;

        if self.network_map_delay.is_zero() {
            if let Err(err) = self.create_network_map() {
                error!("immediate network map rebuild failed: {err}");
            }
            return;
        }

        let delay = span_to_duration(self.network_map_delay);
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Internal::RebuildFired { generation });
        });
    }

    // ---- Map rebuild (spec.md §4.F "createNetworkMap") ---------------

    fn create_network_map(&mut self) -> Result<(), StoreError> {
        let mut node_info_hashes: Vec<Hash> = self
            .stores
            .node_info
            .list_keys()?
            .into_iter()
            .filter_map(|key| key.parse().ok())
            .collect();
        node_info_hashes.sort();

        let pending = self.read_pending_update()?;

        let current_hash_hex = self.stores.etc.get(CURRENT_PARAMETERS_KEY)?.ok_or_else(|| {
            StoreError::Db("current-parameters pointer is missing".to_string())
        })?;
        let network_parameter_hash: Hash = current_hash_hex.parse().map_err(|_| {
            StoreError::Db(format!("current-parameters pointer '{current_hash_hex}' is not a valid hash"))
        })?;

        let map = NetworkMap {
            node_info_hashes,
            network_parameter_hash,
            parameters_update: pending.clone(),
        };
        let signed = self.signing.sign(&map);
        self.stores
            .network_map
            .put(LATEST_NETWORK_MAP_KEY, &signed.to_bytes())?;
        self.metrics.maps_rebuilt.inc();
        self.refresh_gauges(&map)?;

        if let Some(pending) = pending {
            let now = Timestamp::now();
            let delay = duration_until(pending.update_deadline, now);
            let tx = self.internal_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(Internal::ActivatePending);
            });
        }

        Ok(())
    }

    fn activate_pending(&mut self) -> Result<(), StoreError> {
        let Some(pending) = self.read_pending_update()? else {
            debug!("activation timer fired with no pending update; already applied");
            return Ok(());
        };
        self.stores
            .etc
            .put(CURRENT_PARAMETERS_KEY, &pending.new_parameters_hash.to_hex())?;
        self.stores.parameters_update.delete(NEXT_PARAMS_UPDATE_KEY)?;
        info!("activated pending parameters update: {}", pending.description);
        self.create_network_map()
    }

    fn read_pending_update(&self) -> Result<Option<netmap_api::ParametersUpdate>, StoreError> {
        match self.stores.parameters_update.get(NEXT_PARAMS_UPDATE_KEY)? {
            None => Ok(None),
            Some(bytes) => match serde_json::from_slice(&bytes) {
                Ok(update) => Ok(Some(update)),
                Err(err) => {
                    warn!("discarding unparseable pending parameters update: {err}");
                    Ok(None)
                }
            },
        }
    }

    // ---- Reads exposed to other units ---------------------------------

    fn get_network_map(&self) -> Option<Signed<NetworkMap>> {
        self.stores
            .network_map
            .get(LATEST_NETWORK_MAP_KEY)
            .ok()
            .flatten()
            .and_then(|bytes| Signed::from_bytes(bytes).ok())
    }

    /// Read the `current-parameters` pointer and resolve it to a signed
    /// blob. Propagates storage-backend errors instead of panicking: a
    /// transient read failure here must fail this request's future (§7
    /// `storage-io`), not abort the process.
    fn get_current_network_parameters(&self) -> Result<Signed<NetworkParameters>, StoreError> {
        let hash_hex = self.stores.etc.get(CURRENT_PARAMETERS_KEY)?.ok_or_else(|| {
            StoreError::Db("current-parameters pointer is missing".to_string())
        })?;
        let bytes = self.stores.network_parameters.get(&hash_hex)?.ok_or_else(|| {
            StoreError::Db(format!("current-parameters points at missing blob '{hash_hex}'"))
        })?;
        Signed::from_bytes(bytes)
            .map_err(|_| StoreError::Db("corrupt current parameters blob".to_string()))
    }

    fn get_current_network_parameters_decoded(&self) -> Result<NetworkParameters, StoreError> {
        let signed = self.get_current_network_parameters()?;
        signed
            .decode_payload()
            .map_err(|e| StoreError::Db(format!("corrupt current parameters: {e}")))
    }

    fn get_network_parameters_by_hash(&self, hash: Hash) -> Option<Signed<NetworkParameters>> {
        self.stores
            .network_parameters
            .get(&hash.to_hex())
            .ok()
            .flatten()
            .and_then(|bytes| Signed::from_bytes(bytes).ok())
    }

    fn get_node_info(&self, hash: Hash) -> Option<Signed<NodeInfo>> {
        self.stores
            .node_info
            .get(&hash.to_hex())
            .ok()
            .flatten()
            .and_then(|bytes| Signed::from_bytes(bytes).ok())
    }

    fn list_nodes(&self) -> NodeListResult {
        let mut nodes = Vec::new();
        if let Ok(all) = self.stores.node_info.get_all() {
            for (hash_hex, bytes) in all {
                let Ok(signed) = Signed::<NodeInfo>::from_bytes(bytes) else {
                    continue;
                };
                let Ok(info) = signed.decode_payload() else {
                    continue;
                };
                let Ok(hash) = hash_hex.parse() else {
                    continue;
                };
                nodes.push(NodeListEntry {
                    hash,
                    legal_identities: info.legal_identities.into_iter().map(|i| i.name).collect(),
                });
            }
        }
        NodeListResult { nodes }
    }

    fn list_notaries(&self) -> NotaryListResult {
        let notaries = self
            .get_current_network_parameters_decoded()
            .map(|p| p.notaries)
            .unwrap_or_default();
        NotaryListResult { notaries }
    }

    fn list_whitelist(&self) -> WhitelistResult {
        let entries = self
            .get_current_network_parameters_decoded()
            .map(|p| {
                p.whitelisted_contracts
                    .into_iter()
                    .map(|(fqn, hashes)| (fqn, hashes.into_iter().collect()))
                    .collect()
            })
            .unwrap_or_default();
        WhitelistResult { entries }
    }

    fn refresh_gauges(&self, map: &NetworkMap) -> Result<(), StoreError> {
        if let Ok(params) = self.get_current_network_parameters_decoded() {
            self.metrics.current_epoch.set(params.epoch as i64);
            self.metrics.notary_count.set(params.notaries.len() as i64);
        }
        self.metrics.node_count.set(map.node_info_hashes.len() as i64);
        self.metrics
            .pending_update
            .set(map.parameters_update.is_some() as i64);
        Ok(())
    }
}

/// A storage-backend failure while handling a publish: `storage-io`
/// (§7), surfaced as its own variant rather than disguised as a
/// `NameConflict` or `Malformed` rejection.
fn store_io_err(err: StoreError) -> NodeAddError {
    error!("storage error while publishing node info: {err}");
    NodeAddError::StorageIo(err.to_string())
}

/// `max(1ms, span)`, falling back to 1ms if the span cannot be converted
/// to a fixed-length duration (it never should, since every delay we
/// schedule comes from a parsed, time-only config fragment).
fn span_to_duration(span: Span) -> Duration {
    span.to_duration(SpanRelativeTo::days_are_24_hours())
        .map(|d| d.unsigned_abs())
        .unwrap_or(Duration::from_millis(1))
        .max(Duration::from_millis(1))
}

/// `max(1ms, deadline - now)`. A deadline already in the past (the
/// processor was down past it, or clock skew) fires almost immediately
/// rather than not at all.
fn duration_until(deadline: Timestamp, now: Timestamp) -> Duration {
    let remaining = deadline.duration_since(now);
    if remaining.is_negative() {
        Duration::from_millis(1)
    } else {
        remaining.unsigned_abs().max(Duration::from_millis(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::SigningAuthority;
    use crate::store::fs::FsStore;
    use crate::store::Collection;
    use netmap_api::LegalIdentity;

    fn test_stores(root: &camino::Utf8Path) -> Stores {
        Stores {
            network_parameters: Box::new(
                FsStore::open(root, Collection::SignedNetworkParameters).unwrap(),
            ),
            network_map: Box::new(FsStore::open(root, Collection::SignedNetworkMap).unwrap()),
            node_info: Box::new(FsStore::open(root, Collection::SignedNodeInfo).unwrap()),
            parameters_update: Box::new(
                FsStore::open(root, Collection::ParametersUpdate).unwrap(),
            ),
            etc: Box::new(FsStore::open(root, Collection::Etc).unwrap()),
        }
    }

    fn test_signing(root: &camino::Utf8Path) -> Arc<SigningAuthority> {
        Arc::new(SigningAuthority::load_or_generate(&root.join("signing.p8")).unwrap())
    }

    fn signed_node(signing: &SigningAuthority, name: &str) -> Signed<NodeInfo> {
        let public_key = signing.public_key();
        let info = NodeInfo {
            legal_identities: vec![LegalIdentity {
                name: name.to_string(),
                owning_key: bytes::Bytes::copy_from_slice(&public_key),
            }],
            addresses: vec!["127.0.0.1:10000".to_string()],
            platform_version: 1,
        };
        signing.sign(&info)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn bootstrap_creates_template_parameters_and_empty_map() {
        let dir = tempfile::tempdir().unwrap();
        let root = camino::Utf8Path::from_path(dir.path()).unwrap();
        let signing = test_signing(root);
        let metrics = Arc::new(Metrics::new());
        let mut processor = Processor {
            stores: test_stores(root),
            signing,
            metrics,
            param_update_delay: Span::new().seconds(10),
            network_map_delay: Span::new().seconds(0),
            rebuild_generation: 0,
            internal_tx: mpsc::unbounded_channel().0,
        };

        processor.bootstrap().unwrap();

        let params = processor.get_current_network_parameters_decoded().unwrap();
        assert_eq!(params.epoch, 1);
        assert!(params.notaries.is_empty());

        let map = processor.get_network_map().unwrap();
        let map: NetworkMap = map.decode_payload().unwrap();
        assert!(map.node_info_hashes.is_empty());
        assert!(map.parameters_update.is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn publishing_a_node_rebuilds_the_map_immediately_when_delay_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        let root = camino::Utf8Path::from_path(dir.path()).unwrap();
        let signing = test_signing(root);
        let metrics = Arc::new(Metrics::new());
        let mut processor = Processor {
            stores: test_stores(root),
            signing: signing.clone(),
            metrics,
            param_update_delay: Span::new().seconds(10),
            network_map_delay: Span::new().seconds(0),
            rebuild_generation: 0,
            internal_tx: mpsc::unbounded_channel().0,
        };
        processor.bootstrap().unwrap();

        let signed = signed_node(&signing, "Alice");
        let result = processor.add_node(signed).unwrap();

        let map: NetworkMap = processor.get_network_map().unwrap().decode_payload().unwrap();
        assert_eq!(map.node_info_hashes, vec![result.hash]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn name_conflict_is_rejected_without_a_storage_side_effect() {
        let dir = tempfile::tempdir().unwrap();
        let root = camino::Utf8Path::from_path(dir.path()).unwrap();
        let signing = test_signing(root);
        let other_signing = SigningAuthority::load_or_generate(&root.join("other.p8")).unwrap();
        let metrics = Arc::new(Metrics::new());
        let mut processor = Processor {
            stores: test_stores(root),
            signing: signing.clone(),
            metrics,
            param_update_delay: Span::new().seconds(10),
            network_map_delay: Span::new().seconds(0),
            rebuild_generation: 0,
            internal_tx: mpsc::unbounded_channel().0,
        };
        processor.bootstrap().unwrap();

        let first = signed_node(&signing, "Alice");
        processor.add_node(first).unwrap();

        let conflicting_key = other_signing.public_key();
        let conflicting_info = NodeInfo {
            legal_identities: vec![LegalIdentity {
                name: "Alice".to_string(),
                owning_key: bytes::Bytes::copy_from_slice(&conflicting_key),
            }],
            addresses: vec![],
            platform_version: 1,
        };
        let second = other_signing.sign(&conflicting_info);
        let err = processor.add_node(second).unwrap_err();
        assert!(matches!(err, NodeAddError::NameConflict { .. }));

        let map: NetworkMap = processor.get_network_map().unwrap().decode_payload().unwrap();
        assert_eq!(map.node_info_hashes.len(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn update_with_immediate_activation_advances_current_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let root = camino::Utf8Path::from_path(dir.path()).unwrap();
        let signing = test_signing(root);
        let metrics = Arc::new(Metrics::new());
        let mut processor = Processor {
            stores: test_stores(root),
            signing,
            metrics,
            param_update_delay: Span::new().seconds(10),
            network_map_delay: Span::new().seconds(0),
            rebuild_generation: 0,
            internal_tx: mpsc::unbounded_channel().0,
        };
        processor.bootstrap().unwrap();

        let before = processor.get_current_network_parameters_decoded().unwrap();
        let result = processor
            .update_network_parameters(
                |params, now| changeset::apply(params, &Change::ClearWhiteList, now),
                "test".to_string(),
                Timestamp::now(),
            )
            .unwrap();

        let after = processor.get_current_network_parameters_decoded().unwrap();
        assert_eq!(after.epoch, before.epoch + 1);
        let current_hash_hex = processor.stores.etc.get(CURRENT_PARAMETERS_KEY).unwrap().unwrap();
        assert_eq!(current_hash_hex, result.new_parameters_hash.to_hex());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn update_with_future_activation_is_recorded_as_pending() {
        let dir = tempfile::tempdir().unwrap();
        let root = camino::Utf8Path::from_path(dir.path()).unwrap();
        let signing = test_signing(root);
        let metrics = Arc::new(Metrics::new());
        let mut processor = Processor {
            stores: test_stores(root),
            signing,
            metrics,
            param_update_delay: Span::new().seconds(10),
            network_map_delay: Span::new().seconds(0),
            rebuild_generation: 0,
            internal_tx: mpsc::unbounded_channel().0,
        };
        processor.bootstrap().unwrap();

        let before = processor.get_current_network_parameters_decoded().unwrap();
        let activation = Timestamp::now().checked_add(Span::new().seconds(30)).unwrap();
        processor
            .update_network_parameters(
                |params, now| changeset::apply(params, &Change::ClearWhiteList, now),
                "later".to_string(),
                activation,
            )
            .unwrap();

        let after = processor.get_current_network_parameters_decoded().unwrap();
        assert_eq!(after.epoch, before.epoch, "current parameters unchanged until activation");
        let pending = processor.read_pending_update().unwrap();
        assert!(pending.is_some());

        let map: NetworkMap = processor.get_network_map().unwrap().decode_payload().unwrap();
        assert!(map.parameters_update.is_some());
    }
}
