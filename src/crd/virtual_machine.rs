//! VirtualMachine CRD
//!
//! Only the spec fields that drive image resolution, hardware version
//! negotiation and storage accounting are modelled.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =============================================================================
// VirtualMachine CRD
// =============================================================================

/// VirtualMachine is the desired state of a VM in a namespace.
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "vmoperator.vmware.com",
    version = "v1alpha3",
    kind = "VirtualMachine",
    plural = "virtualmachines",
    shortname = "vm",
    printcolumn = r#"{"name": "Class", "type": "string", "jsonPath": ".spec.className"}"#,
    printcolumn = r#"{"name": "Image", "type": "string", "jsonPath": ".spec.imageName"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineSpec {
    /// Structured reference to the image the VM is deployed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<VirtualMachineImageRef>,

    /// Legacy image name; may be a unique name or a display name
    #[serde(default)]
    pub image_name: String,

    /// Name of the VirtualMachineClass; empty for classless VMs
    #[serde(default)]
    pub class_name: String,

    /// Minimum virtual hardware version; 0 means no floor
    #[serde(default)]
    pub min_hardware_version: i32,

    /// Volumes attached to the VM
    #[serde(default)]
    pub volumes: Vec<VirtualMachineVolume>,
}

// =============================================================================
// Sub-Types
// =============================================================================

/// Reference to a VirtualMachineImage or ClusterVirtualMachineImage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineImageRef {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
}

/// A volume attached to the VM
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineVolume {
    pub name: String,

    /// Set when the volume is backed by a PersistentVolumeClaim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<PersistentVolumeClaimVolumeSource>,
}

/// PersistentVolumeClaim volume source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeClaimVolumeSource {
    #[serde(default)]
    pub claim_name: String,
    #[serde(default)]
    pub read_only: bool,
}

impl VirtualMachineVolume {
    /// Volume backed by the named claim
    pub fn with_claim(name: impl Into<String>, claim_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: claim_name.into(),
                read_only: false,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_defaults() {
        let spec: VirtualMachineSpec = serde_json::from_str("{}").unwrap();
        assert_eq!(spec.min_hardware_version, 0);
        assert!(spec.class_name.is_empty());
        assert!(spec.image.is_none());
        assert!(spec.volumes.is_empty());
    }

    #[test]
    fn test_spec_camel_case() {
        let spec: VirtualMachineSpec = serde_json::from_str(
            r#"{
                "className": "best-effort-small",
                "imageName": "vmi-0a0044d7c690bcbea",
                "minHardwareVersion": 17,
                "volumes": [
                    {"name": "data", "persistentVolumeClaim": {"claimName": "data-pvc"}}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(spec.class_name, "best-effort-small");
        assert_eq!(spec.min_hardware_version, 17);
        assert_eq!(
            spec.volumes[0],
            VirtualMachineVolume::with_claim("data", "data-pvc")
        );
    }
}
