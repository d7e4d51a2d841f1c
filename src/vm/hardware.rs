//! Virtual Hardware Version Policy
//!
//! Combines independent floor constraints into the minimum hardware version
//! a VM must be created with. Every constraint can only raise the result.

use crate::crd::{VirtualMachineImageStatus, VirtualMachineSpec};
use crate::vm::inspect::has_pvc;
use serde::{Deserialize, Serialize};

// =============================================================================
// Hardware Version
// =============================================================================

/// Virtual hardware version; 0 means no constraint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HardwareVersion(pub u32);

/// Minimum hardware version for VMs with PersistentVolumeClaim volumes
pub const MIN_SUPPORTED_HW_VERSION_FOR_PVC: HardwareVersion = HardwareVersion(15);

/// Minimum hardware version for VMs with PCI passthrough devices
pub const MIN_SUPPORTED_HW_VERSION_FOR_PCI_PASSTHRU_DEVICES: HardwareVersion = HardwareVersion(17);

impl HardwareVersion {
    pub const fn new(version: u32) -> Self {
        Self(version)
    }

    /// Parse a `vmx-<N>` token. Anything else yields `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let digits = s.strip_prefix("vmx-")?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(Self)
    }

    /// Version from a signed API field; negative values carry no constraint
    pub fn from_i32(version: i32) -> Self {
        Self(u32::try_from(version).unwrap_or(0))
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_set(self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for HardwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "vmx-{}", self.0)
    }
}

// =============================================================================
// Config Spec
// =============================================================================

/// Target virtual hardware configuration for a VM
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSpec {
    /// Hardware version token, e.g. `vmx-19`
    #[serde(default)]
    pub version: String,

    /// Device additions, removals and edits
    #[serde(default)]
    pub device_change: Vec<DeviceConfigSpec>,
}

/// A single device change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfigSpec {
    #[serde(default)]
    pub operation: DeviceOperation,
    pub device: VirtualDevice,
}

/// Device change operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceOperation {
    #[default]
    Add,
    Remove,
    Edit,
}

/// Virtual devices that may appear in a config spec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum VirtualDevice {
    /// PCI passthrough (dynamic DirectPath I/O or vGPU)
    PciPassthrough {
        #[serde(default)]
        label: String,
    },
    Disk {
        #[serde(default)]
        capacity: u64,
    },
    EthernetCard {
        #[serde(default)]
        network: String,
    },
    Cdrom,
}

impl ConfigSpec {
    /// Config spec that only carries a version token
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            device_change: Vec::new(),
        }
    }

    /// True if any device change carries a PCI passthrough device
    pub fn has_pci_passthrough_device(&self) -> bool {
        self.device_change
            .iter()
            .any(|c| matches!(c.device, VirtualDevice::PciPassthrough { .. }))
    }
}

// =============================================================================
// Floors
// =============================================================================

/// The independent floor constraints behind a required version
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareVersionFloors {
    /// `spec.minHardwareVersion`
    pub spec: HardwareVersion,
    /// Version recorded on the image
    pub image: HardwareVersion,
    /// Version token from the config spec
    pub config_spec: HardwareVersion,
    /// PCI passthrough devices
    pub devices: HardwareVersion,
    /// PersistentVolumeClaim volumes
    pub volumes: HardwareVersion,
}

impl HardwareVersionFloors {
    /// Collect the floors for a VM, its config spec and its image
    pub fn collect(
        vm: &VirtualMachineSpec,
        config_spec: &ConfigSpec,
        image_status: &VirtualMachineImageStatus,
    ) -> Self {
        let devices = if config_spec.has_pci_passthrough_device() {
            MIN_SUPPORTED_HW_VERSION_FOR_PCI_PASSTHRU_DEVICES
        } else {
            HardwareVersion::default()
        };

        let volumes = if has_pvc(vm) {
            MIN_SUPPORTED_HW_VERSION_FOR_PVC
        } else {
            HardwareVersion::default()
        };

        Self {
            spec: HardwareVersion::from_i32(vm.min_hardware_version),
            image: image_status
                .hardware_version
                .map(HardwareVersion::from_i32)
                .unwrap_or_default(),
            config_spec: HardwareVersion::parse(&config_spec.version).unwrap_or_default(),
            devices,
            volumes,
        }
    }

    /// The highest floor
    pub fn required(&self) -> HardwareVersion {
        [
            self.spec,
            self.image,
            self.config_spec,
            self.devices,
            self.volumes,
        ]
        .into_iter()
        .max()
        .unwrap_or_default()
    }
}

/// Minimum hardware version a VM must be created with.
///
/// Returns 0 when nothing constrains the version.
pub fn determine_hardware_version(
    vm: &VirtualMachineSpec,
    config_spec: &ConfigSpec,
    image_status: &VirtualMachineImageStatus,
) -> HardwareVersion {
    HardwareVersionFloors::collect(vm, config_spec, image_status).required()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::VirtualMachineVolume;

    fn vm(min: i32) -> VirtualMachineSpec {
        VirtualMachineSpec {
            min_hardware_version: min,
            ..Default::default()
        }
    }

    fn vm_with_pvc(min: i32) -> VirtualMachineSpec {
        VirtualMachineSpec {
            min_hardware_version: min,
            volumes: vec![VirtualMachineVolume::with_claim("data", "data-pvc")],
            ..Default::default()
        }
    }

    fn pci_config_spec() -> ConfigSpec {
        ConfigSpec {
            version: String::new(),
            device_change: vec![DeviceConfigSpec {
                operation: DeviceOperation::Add,
                device: VirtualDevice::PciPassthrough {
                    label: "vgpu".into(),
                },
            }],
        }
    }

    fn image(version: i32) -> VirtualMachineImageStatus {
        VirtualMachineImageStatus {
            name: "image".into(),
            hardware_version: Some(version),
        }
    }

    #[test]
    fn test_parse_hardware_version() {
        assert_eq!(HardwareVersion::parse("vmx-13"), Some(HardwareVersion(13)));
        assert_eq!(HardwareVersion::parse("vmx-21"), Some(HardwareVersion(21)));
        assert_eq!(HardwareVersion::parse("invalid"), None);
        assert_eq!(HardwareVersion::parse(""), None);
        assert_eq!(HardwareVersion::parse("vmx-"), None);
        assert_eq!(HardwareVersion::parse("vmx-13a"), None);
        assert_eq!(HardwareVersion::parse("vmx--1"), None);
        assert_eq!(HardwareVersion::parse("13"), None);
        assert_eq!(HardwareVersion::parse("vmx-99999999999"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(HardwareVersion(19).to_string(), "vmx-19");
    }

    #[test]
    fn test_empty_inputs() {
        let v = determine_hardware_version(
            &VirtualMachineSpec::default(),
            &ConfigSpec::default(),
            &VirtualMachineImageStatus::default(),
        );
        assert_eq!(v, HardwareVersion(0));
    }

    #[test]
    fn test_spec_min_version() {
        let v = determine_hardware_version(&vm(11), &ConfigSpec::default(), &Default::default());
        assert_eq!(v, HardwareVersion(11));
    }

    #[test]
    fn test_config_spec_version() {
        let v = determine_hardware_version(
            &vm(11),
            &ConfigSpec::with_version("vmx-13"),
            &Default::default(),
        );
        assert_eq!(v, HardwareVersion(13));
    }

    #[test]
    fn test_invalid_config_spec_version() {
        let v = determine_hardware_version(
            &vm(11),
            &ConfigSpec::with_version("invalid"),
            &Default::default(),
        );
        assert_eq!(v, HardwareVersion(11));
    }

    #[test]
    fn test_pci_passthrough() {
        let v = determine_hardware_version(&vm(11), &pci_config_spec(), &Default::default());
        assert_eq!(v, MIN_SUPPORTED_HW_VERSION_FOR_PCI_PASSTHRU_DEVICES);
    }

    #[test]
    fn test_pvc() {
        let v = determine_hardware_version(&vm_with_pvc(11), &ConfigSpec::default(), &Default::default());
        assert_eq!(v, MIN_SUPPORTED_HW_VERSION_FOR_PVC);
    }

    #[test]
    fn test_image_version_wins() {
        let v = determine_hardware_version(&vm(11), &pci_config_spec(), &image(20));
        assert_eq!(v, HardwareVersion(20));

        let v = determine_hardware_version(&vm_with_pvc(11), &ConfigSpec::default(), &image(20));
        assert_eq!(v, HardwareVersion(20));
    }

    #[test]
    fn test_negative_inputs_carry_no_constraint() {
        let v = determine_hardware_version(&vm(-1), &ConfigSpec::default(), &image(-5));
        assert_eq!(v, HardwareVersion(0));
    }

    #[test]
    fn test_monotone_under_added_constraints() {
        let base = determine_hardware_version(&vm(11), &ConfigSpec::default(), &Default::default());

        let mut config_spec = pci_config_spec();
        config_spec.version = "vmx-12".into();
        let more = determine_hardware_version(&vm_with_pvc(11), &config_spec, &image(10));

        assert!(more >= base);
        assert_eq!(more, HardwareVersion(17));
    }

    #[test]
    fn test_floors_breakdown() {
        let floors = HardwareVersionFloors::collect(
            &vm_with_pvc(11),
            &ConfigSpec::with_version("vmx-13"),
            &image(20),
        );
        assert_eq!(floors.spec, HardwareVersion(11));
        assert_eq!(floors.config_spec, HardwareVersion(13));
        assert_eq!(floors.devices, HardwareVersion(0));
        assert_eq!(floors.volumes, MIN_SUPPORTED_HW_VERSION_FOR_PVC);
        assert_eq!(floors.required(), HardwareVersion(20));
    }

    #[test]
    fn test_config_spec_deserialize() {
        let spec: ConfigSpec = serde_json::from_str(
            r#"{
                "version": "vmx-19",
                "deviceChange": [
                    {"operation": "add", "device": {"type": "pciPassthrough", "label": "gpu0"}},
                    {"device": {"type": "ethernetCard", "network": "vm-network"}}
                ]
            }"#,
        )
        .unwrap();
        assert!(spec.has_pci_passthrough_device());
        assert_eq!(spec.device_change[1].operation, DeviceOperation::Add);
    }
}
