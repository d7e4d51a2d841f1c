//! VirtualMachineSetResourcePolicy CRD
//!
//! Groups VMs under a shared resource pool, folder and set of cluster
//! module groups.

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// VirtualMachineSetResourcePolicy describes the placement and resource
/// settings shared by a set of VMs.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "vmoperator.vmware.com",
    version = "v1alpha4",
    kind = "VirtualMachineSetResourcePolicy",
    plural = "virtualmachinesetresourcepolicies",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineSetResourcePolicySpec {
    #[serde(default)]
    pub resource_pool: ResourcePoolSpec,

    #[serde(default)]
    pub folder: String,

    #[serde(default)]
    pub cluster_module_groups: Vec<String>,
}

/// Resource pool settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePoolSpec {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub reservations: VirtualMachineResourceSpec,

    #[serde(default)]
    pub limits: VirtualMachineResourceSpec,
}

/// CPU and memory quantities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineResourceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub cpu: Option<Quantity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub memory: Option<Quantity>,
}
