//! vSphere Provider Module
//!
//! Provider configuration stored in the operator's namespace: the provider
//! ConfigMap, its credentials Secret and the network (DNS) ConfigMap.

pub mod config;
pub mod loader;

pub use config::*;
pub use loader::ProviderConfigLoader;
