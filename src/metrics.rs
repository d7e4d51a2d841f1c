//! Operator Metrics
//!
//! Prometheus counters for image resolution, hardware version decisions and
//! the storage usage pipeline. Each instance owns its registry.

use crate::domain::ports::ImageRecord;
use crate::error::{Error, Result};
use crate::vm::HardwareVersion;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

const NAMESPACE: &str = "vm_image_policy";

/// Outcome label for a successful resolution
pub const OUTCOME_RESOLVED: &str = "resolved";

/// Operator metrics
#[derive(Clone)]
pub struct OperatorMetrics {
    registry: Registry,
    resolutions: IntCounterVec,
    hardware_versions: IntCounterVec,
    usage_events: IntCounterVec,
}

impl std::fmt::Debug for OperatorMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorMetrics").finish_non_exhaustive()
    }
}

impl OperatorMetrics {
    /// Create and register all collectors
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let resolutions = IntCounterVec::new(
            Opts::new("image_resolutions_total", "Image resolutions by outcome")
                .namespace(NAMESPACE),
            &["outcome"],
        )?;
        let hardware_versions = IntCounterVec::new(
            Opts::new(
                "hardware_version_determinations_total",
                "Hardware version determinations by resulting version",
            )
            .namespace(NAMESPACE),
            &["version"],
        )?;
        let usage_events = IntCounterVec::new(
            Opts::new(
                "storage_usage_events_total",
                "Storage usage events handed to the trigger",
            )
            .namespace(NAMESPACE),
            &["result"],
        )?;

        registry.register(Box::new(resolutions.clone()))?;
        registry.register(Box::new(hardware_versions.clone()))?;
        registry.register(Box::new(usage_events.clone()))?;

        Ok(Self {
            registry,
            resolutions,
            hardware_versions,
            usage_events,
        })
    }

    /// Count a resolution; failures are labelled by error kind
    pub fn record_resolution(&self, result: &Result<ImageRecord>) {
        let outcome = match result {
            Ok(_) => OUTCOME_RESOLVED.to_string(),
            Err(e) => e.kind().to_string(),
        };
        self.resolutions.with_label_values(&[&outcome]).inc();
    }

    pub fn record_hardware_version(&self, version: HardwareVersion) {
        let label = if version.is_set() {
            version.to_string()
        } else {
            "none".to_string()
        };
        self.hardware_versions.with_label_values(&[&label]).inc();
    }

    pub fn record_usage_event(&self, delivered: bool) {
        let result = if delivered { "delivered" } else { "failed" };
        self.usage_events.with_label_values(&[result]).inc();
    }

    /// Resolutions recorded with `outcome`
    pub fn resolutions(&self, outcome: &str) -> u64 {
        self.resolutions.with_label_values(&[outcome]).get()
    }

    /// Usage events recorded with `result` (`delivered` or `failed`)
    pub fn usage_events(&self, result: &str) -> u64 {
        self.usage_events.with_label_values(&[result]).get()
    }

    /// Render in the Prometheus text exposition format
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| Error::Internal(format!("Invalid metrics encoding: {}", e)))
    }

    /// Content type of [`encode`](Self::encode) output
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}
