//! Custom Resource Definitions
//!
//! This module contains the CRD types read by the policy layer:
//! - VirtualMachine: desired VM state (image, class, volumes, hardware floor)
//! - VirtualMachineImage / ClusterVirtualMachineImage: the two image scopes
//! - VirtualMachineSetResourcePolicy: shared placement settings

pub mod resource_policy;
pub mod virtual_machine;
pub mod virtual_machine_image;

pub use resource_policy::*;
pub use virtual_machine::*;
pub use virtual_machine_image::*;
