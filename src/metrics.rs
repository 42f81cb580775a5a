//! Maintaining and outputting metrics.
//!
//! Relevant sources for selecting metrics, metric names, and labels:
//! - <https://prometheus.io/docs/practices/naming/>
//! - <https://prometheus.io/docs/instrumenting/writing_exporters/#labels>

use std::sync::atomic::{AtomicI64, AtomicU64};

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

const PROMETHEUS_PREFIX: &str = "netmap";

/// The service's Prometheus metrics registry and the handles used to
/// update it from the processor.
#[derive(Debug)]
pub struct Metrics {
    registry: Registry,

    /// The epoch of the current `NetworkParameters`.
    pub current_epoch: Gauge<i64, AtomicI64>,

    /// The number of node infos currently stored.
    pub node_count: Gauge<i64, AtomicI64>,

    /// The number of notaries in the current parameters.
    pub notary_count: Gauge<i64, AtomicI64>,

    /// 1 if a parameters update is pending activation, 0 otherwise.
    pub pending_update: Gauge<i64, AtomicI64>,

    /// Total number of network maps signed since startup.
    pub maps_rebuilt: Counter<u64, AtomicU64>,

    /// Total number of rejected node-info publishes (signature or
    /// name-conflict failures).
    pub publish_rejections: Counter<u64, AtomicU64>,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix(PROMETHEUS_PREFIX);

        let current_epoch = Gauge::default();
        registry.register(
            "current_epoch",
            "Epoch of the currently active network parameters",
            current_epoch.clone(),
        );

        let node_count = Gauge::default();
        registry.register(
            "node_count",
            "Number of node infos currently stored",
            node_count.clone(),
        );

        let notary_count = Gauge::default();
        registry.register(
            "notary_count",
            "Number of notaries in the current network parameters",
            notary_count.clone(),
        );

        let pending_update = Gauge::default();
        registry.register(
            "pending_update",
            "Whether a parameters update is pending activation (1) or not (0)",
            pending_update.clone(),
        );

        let maps_rebuilt = Counter::default();
        registry.register(
            "maps_rebuilt_total",
            "Number of network maps signed since startup",
            maps_rebuilt.clone(),
        );

        let publish_rejections = Counter::default();
        registry.register(
            "publish_rejections_total",
            "Number of rejected node info publishes",
            publish_rejections.clone(),
        );

        Metrics {
            registry,
            current_epoch,
            node_count,
            notary_count,
            pending_update,
            maps_rebuilt,
            publish_rejections,
        }
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut buf = String::new();
        encode(&mut buf, &self.registry).expect("encoding metrics is infallible");
        buf
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
