//! Domain Ports - Core trait definitions for image policy
//!
//! These traits define the boundaries between the resolution logic and the
//! systems that hold image records or consume storage-usage events.
//! Adapters implement these traits to provide concrete functionality.

use crate::crd::{ClusterVirtualMachineImage, VirtualMachineImage, VirtualMachineImageStatus};
use crate::error::Result;
use crate::usage::StorageUsageEvent;
use async_trait::async_trait;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// =============================================================================
// Image Scope
// =============================================================================

/// Lookup scope for image records
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageScope {
    /// Namespace-scoped images in the given namespace
    Namespace(String),
    /// Cluster-scoped images
    Cluster,
}

impl ImageScope {
    pub fn namespace(namespace: impl Into<String>) -> Self {
        ImageScope::Namespace(namespace.into())
    }

    /// Namespace of this scope, if any
    pub fn namespace_name(&self) -> Option<&str> {
        match self {
            ImageScope::Namespace(ns) => Some(ns),
            ImageScope::Cluster => None,
        }
    }

    /// Kubernetes kind of the records held in this scope
    pub fn kind(&self) -> &'static str {
        match self {
            ImageScope::Namespace(_) => "VirtualMachineImage",
            ImageScope::Cluster => "ClusterVirtualMachineImage",
        }
    }
}

impl std::fmt::Display for ImageScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageScope::Namespace(ns) => write!(f, "namespace/{}", ns),
            ImageScope::Cluster => write!(f, "cluster"),
        }
    }
}

// =============================================================================
// Image Record
// =============================================================================

/// An image of either scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    /// Scope the record lives in
    pub scope: ImageScope,
    /// Unique name within the scope
    pub name: String,
    /// Observed status, including the display name
    pub status: VirtualMachineImageStatus,
}

impl ImageRecord {
    pub fn new(scope: ImageScope, name: impl Into<String>, status: VirtualMachineImageStatus) -> Self {
        Self {
            scope,
            name: name.into(),
            status,
        }
    }

    /// Display name (`status.name`)
    pub fn display_name(&self) -> &str {
        &self.status.name
    }

    /// Recorded hardware version, if any
    pub fn hardware_version(&self) -> Option<i32> {
        self.status.hardware_version
    }

    pub fn kind(&self) -> &'static str {
        self.scope.kind()
    }
}

impl From<&VirtualMachineImage> for ImageRecord {
    fn from(img: &VirtualMachineImage) -> Self {
        Self {
            scope: ImageScope::Namespace(img.namespace().unwrap_or_default()),
            name: img.name_any(),
            status: img.status.clone().unwrap_or_default(),
        }
    }
}

impl From<&ClusterVirtualMachineImage> for ImageRecord {
    fn from(img: &ClusterVirtualMachineImage) -> Self {
        Self {
            scope: ImageScope::Cluster,
            name: img.name_any(),
            status: img.status.clone().unwrap_or_default(),
        }
    }
}

// =============================================================================
// Image Store Port
// =============================================================================

/// Port for image record lookups
///
/// Unique-name lookups return at most one record per scope. Display-name
/// lookups return every record in the scope whose `status.name` matches.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Fetch the record whose unique name equals `name` in `scope`
    async fn get_by_unique_name(&self, scope: &ImageScope, name: &str) -> Result<Option<ImageRecord>>;

    /// List all records in `scope` whose display name equals `display_name`
    async fn list_by_display_name(
        &self,
        scope: &ImageScope,
        display_name: &str,
    ) -> Result<Vec<ImageRecord>>;

    /// Get store name
    fn store_name(&self) -> &str;
}

// =============================================================================
// Storage Usage Trigger Port
// =============================================================================

/// Port for the out-of-band storage quota reconciliation trigger
#[async_trait]
pub trait StorageUsageTrigger: Send + Sync {
    /// React to a storage-class usage change in a namespace
    async fn trigger(&self, event: StorageUsageEvent) -> Result<()>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type ImageStoreRef = Arc<dyn ImageStore>;
pub type StorageUsageTriggerRef = Arc<dyn StorageUsageTrigger>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::VirtualMachineImageSpec;

    #[test]
    fn test_scope_display() {
        assert_eq!(format!("{}", ImageScope::namespace("my-ns")), "namespace/my-ns");
        assert_eq!(format!("{}", ImageScope::Cluster), "cluster");
        assert_eq!(ImageScope::Cluster.namespace_name(), None);
    }

    #[test]
    fn test_record_from_namespaced_image() {
        let mut img = VirtualMachineImage::new("vmi-1", VirtualMachineImageSpec::default());
        img.metadata.namespace = Some("my-namespace".into());
        img.status = Some(VirtualMachineImageStatus {
            name: "image-a".into(),
            hardware_version: Some(19),
        });

        let record = ImageRecord::from(&img);
        assert_eq!(record.scope, ImageScope::namespace("my-namespace"));
        assert_eq!(record.name, "vmi-1");
        assert_eq!(record.display_name(), "image-a");
        assert_eq!(record.hardware_version(), Some(19));
        assert_eq!(record.kind(), "VirtualMachineImage");
    }
}
