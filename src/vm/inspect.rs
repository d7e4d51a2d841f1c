//! VM spec predicates

use crate::crd::VirtualMachineSpec;

/// True if any volume is backed by a PersistentVolumeClaim
pub fn has_pvc(spec: &VirtualMachineSpec) -> bool {
    spec.volumes
        .iter()
        .any(|v| v.persistent_volume_claim.is_some())
}

/// True if the VM does not name a VirtualMachineClass
pub fn is_classless(spec: &VirtualMachineSpec) -> bool {
    spec.class_name.is_empty()
}

/// True if the VM references no image, structured or legacy
pub fn is_imageless(spec: &VirtualMachineSpec) -> bool {
    spec.image.is_none() && spec.image_name.is_empty()
}

/// Name of the image the VM references; the structured reference wins over
/// the legacy field
pub fn image_name(spec: &VirtualMachineSpec) -> Option<&str> {
    spec.image
        .as_ref()
        .map(|image| image.name.as_str())
        .filter(|name| !name.is_empty())
        .or_else(|| Some(spec.image_name.as_str()).filter(|name| !name.is_empty()))
}
