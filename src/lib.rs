//! VM Image Policy
//!
//! Image resolution and virtual hardware version policy for a Kubernetes VM
//! operator.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                               REST API (axum)                                │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────────┐  │
//! │  │  Image          │  │  Hardware       │  │  Storage Usage              │  │
//! │  │  Resolver       │  │  Version Policy │  │  Notifier ──► Consumer      │  │
//! │  └────────┬────────┘  └─────────────────┘  └─────────────────────────────┘  │
//! │           │                                                                  │
//! │  ┌────────┴──────────────────────────┐  ┌─────────────────────────────────┐  │
//! │  │  ImageStore port                  │  │  Resource Policy Validation     │  │
//! │  │  (memory inventory / kube API)    │  │  Provider Config                │  │
//! │  └───────────────────────────────────┘  └─────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`image`]: Image resolution and image stores
//! - [`vm`]: VM spec predicates and hardware version policy
//! - [`usage`]: Storage usage notification queue
//! - [`provider`]: vSphere provider configuration
//! - [`webhooks`]: Admission field validation
//! - [`api`]: REST API
//! - [`crd`]: Custom Resource Definitions
//! - [`domain`]: Core domain types and traits
//! - [`error`]: Error types and handling

pub mod api;
pub mod crd;
pub mod domain;
pub mod error;
pub mod image;
pub mod metrics;
pub mod provider;
pub mod usage;
pub mod vm;
pub mod webhooks;

// Re-export commonly used types
pub use api::{ApiServer, ApiServerConfig, RestRouter};

pub use crd::{
    ClusterVirtualMachineImage, VirtualMachine, VirtualMachineImage, VirtualMachineImageStatus,
    VirtualMachineSetResourcePolicy, VirtualMachineSpec,
};

pub use domain::ports::{
    ImageRecord, ImageScope, ImageStore, ImageStoreRef, StorageUsageTrigger,
    StorageUsageTriggerRef,
};

pub use error::{ConflictScope, Error, ErrorAction, ErrorKind, Result};

pub use image::{ImageResolver, KubeImageStore, MemoryImageStore};

pub use metrics::OperatorMetrics;

pub use provider::{ProviderConfig, ProviderConfigLoader};

pub use usage::{
    storage_usage_queue, StorageUsageConsumer, StorageUsageEvent, StorageUsageNotifier,
    StorageUsageReceiver,
};

pub use vm::{determine_hardware_version, ConfigSpec, HardwareVersion};

pub use webhooks::ValidationResponse;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
