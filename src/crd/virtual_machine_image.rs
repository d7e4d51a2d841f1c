//! VirtualMachineImage and ClusterVirtualMachineImage CRDs
//!
//! The two kinds share one status shape. Namespace-scoped images are unique
//! per namespace, cluster-scoped images are unique globally; the display name
//! in `status.name` is unique in neither.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =============================================================================
// VirtualMachineImage CRD
// =============================================================================

/// VirtualMachineImage is a namespace-scoped image that VMs in the same
/// namespace may be deployed from.
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "vmoperator.vmware.com",
    version = "v1alpha3",
    kind = "VirtualMachineImage",
    plural = "virtualmachineimages",
    shortname = "vmi",
    status = "VirtualMachineImageStatus",
    printcolumn = r#"{"name": "Display Name", "type": "string", "jsonPath": ".status.name"}"#,
    printcolumn = r#"{"name": "Hardware Version", "type": "integer", "jsonPath": ".status.hardwareVersion"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineImageSpec {
    /// Reference to the content provider item backing this image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_ref: Option<ImageProviderRef>,
}

// =============================================================================
// ClusterVirtualMachineImage CRD
// =============================================================================

/// ClusterVirtualMachineImage is a cluster-scoped image available to VMs in
/// every namespace.
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "vmoperator.vmware.com",
    version = "v1alpha3",
    kind = "ClusterVirtualMachineImage",
    plural = "clustervirtualmachineimages",
    shortname = "cvmi",
    status = "VirtualMachineImageStatus",
    printcolumn = r#"{"name": "Display Name", "type": "string", "jsonPath": ".status.name"}"#,
    printcolumn = r#"{"name": "Hardware Version", "type": "integer", "jsonPath": ".status.hardwareVersion"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterVirtualMachineImageSpec {
    /// Reference to the content provider item backing this image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_ref: Option<ImageProviderRef>,
}

// =============================================================================
// Sub-Types
// =============================================================================

/// Reference to the object that provides an image's content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageProviderRef {
    #[serde(default)]
    pub api_version: String,
    pub kind: String,
    pub name: String,
}

// =============================================================================
// Status
// =============================================================================

/// Observed state shared by both image kinds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineImageStatus {
    /// Display name of the image
    #[serde(default)]
    pub name: String,

    /// Virtual hardware version the image was built with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_version: Option<i32>,
}

impl VirtualMachineImageStatus {
    /// Status with the given display name and no recorded hardware version
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hardware_version: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::Resource;

    #[test]
    fn test_image_kinds() {
        assert_eq!(VirtualMachineImage::kind(&()), "VirtualMachineImage");
        assert_eq!(
            ClusterVirtualMachineImage::kind(&()),
            "ClusterVirtualMachineImage"
        );
        assert_eq!(VirtualMachineImage::plural(&()), "virtualmachineimages");
    }

    #[test]
    fn test_status_deserialize() {
        let status: VirtualMachineImageStatus =
            serde_json::from_str(r#"{"name": "ubuntu-22.04", "hardwareVersion": 19}"#).unwrap();
        assert_eq!(status.name, "ubuntu-22.04");
        assert_eq!(status.hardware_version, Some(19));

        let status: VirtualMachineImageStatus = serde_json::from_str("{}").unwrap();
        assert_eq!(status, VirtualMachineImageStatus::default());
    }
}
