//! Provider Configuration
//!
//! Conversion between the provider ConfigMap and [`ProviderConfig`].

use crate::error::{Error, Result};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::{json, Value};
use std::collections::BTreeMap;

// =============================================================================
// Keys
// =============================================================================

/// Name of the provider ConfigMap in the operator namespace
pub const PROVIDER_CONFIG_MAP_NAME: &str = "vsphere.provider.config.vmoperator.vmware.com";

/// Name of the network ConfigMap in the operator namespace
pub const NETWORK_CONFIG_MAP_NAME: &str = "vmoperator-network-config";

pub const DEFAULT_VC_PORT: &str = "443";

pub const VC_PNID_KEY: &str = "VcPNID";
pub const VC_PORT_KEY: &str = "VcPort";
pub const VC_CREDS_SECRET_NAME_KEY: &str = "VcCredsSecretName";
pub const DATACENTER_KEY: &str = "Datacenter";
pub const RESOURCE_POOL_KEY: &str = "ResourcePool";
pub const FOLDER_KEY: &str = "Folder";
pub const DATASTORE_KEY: &str = "Datastore";
pub const NETWORK_KEY: &str = "Network";
pub const STORAGE_CLASS_REQUIRED_KEY: &str = "StorageClassRequired";
pub const USE_INVENTORY_KEY: &str = "UseInventoryAsContentSource";
pub const INSECURE_SKIP_TLS_VERIFY_KEY: &str = "InsecureSkipTLSVerify";
pub const CA_FILE_PATH_KEY: &str = "CAFilePath";

pub const NAMESERVERS_KEY: &str = "nameservers";
pub const SEARCH_SUFFIXES_KEY: &str = "searchsuffixes";

/// Placeholder left in the network ConfigMap until DNS is configured
const WORKER_DNS_PLACEHOLDER: &str = "<worker_dns>";

// =============================================================================
// Credentials
// =============================================================================

/// vCenter credentials read from the credentials Secret
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl ProviderCredentials {
    /// Read `username` and `password` from a Secret
    pub fn from_secret(secret: &Secret) -> Result<Self> {
        let field = |key: &str| -> String {
            secret
                .data
                .as_ref()
                .and_then(|data| data.get(key))
                .map(|bytes| String::from_utf8_lossy(&bytes.0).into_owned())
                .or_else(|| {
                    secret
                        .string_data
                        .as_ref()
                        .and_then(|data| data.get(key))
                        .cloned()
                })
                .unwrap_or_default()
        };

        let username = field("username");
        let password = field("password");

        if username.is_empty() || password.is_empty() {
            return Err(Error::Configuration(format!(
                "vCenter username and password are missing from secret {}",
                secret.metadata.name.as_deref().unwrap_or_default()
            )));
        }

        Ok(Self { username, password })
    }
}

// =============================================================================
// Provider Config
// =============================================================================

/// Settings for talking to the backing vCenter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub vc_pnid: String,
    pub vc_port: String,
    pub vc_creds: Option<ProviderCredentials>,
    pub datacenter: String,
    pub storage_class_required: bool,
    pub use_inventory_as_content_source: bool,
    /// Only set when TLS verification is enabled
    pub ca_file_path: String,
    pub insecure_skip_tls_verify: bool,
    pub resource_pool: String,
    pub folder: String,
    pub datastore: String,
    pub network: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            vc_pnid: String::new(),
            vc_port: DEFAULT_VC_PORT.to_string(),
            vc_creds: None,
            datacenter: String::new(),
            storage_class_required: false,
            use_inventory_as_content_source: false,
            ca_file_path: String::new(),
            insecure_skip_tls_verify: false,
            resource_pool: String::new(),
            folder: String::new(),
            datastore: String::new(),
            network: String::new(),
        }
    }
}

impl ProviderConfig {
    /// Build from the provider ConfigMap
    pub fn from_config_map(config_map: &ConfigMap, creds: Option<ProviderCredentials>) -> Result<Self> {
        let empty = BTreeMap::new();
        let data = config_map.data.as_ref().unwrap_or(&empty);
        let text = |key: &str| data.get(key).cloned().unwrap_or_default();

        let vc_pnid = data
            .get(VC_PNID_KEY)
            .cloned()
            .ok_or_else(|| Error::Configuration("missing configMap data field VcPNID".into()))?;

        let vc_port = data
            .get(VC_PORT_KEY)
            .cloned()
            .unwrap_or_else(|| DEFAULT_VC_PORT.to_string());

        let storage_class_required = parse_bool_key(data, STORAGE_CLASS_REQUIRED_KEY)?;
        let use_inventory_as_content_source = parse_bool_key(data, USE_INVENTORY_KEY)?;
        let insecure_skip_tls_verify = parse_bool_key(data, INSECURE_SKIP_TLS_VERIFY_KEY)?;

        let ca_file_path = if insecure_skip_tls_verify {
            String::new()
        } else {
            text(CA_FILE_PATH_KEY)
        };

        Ok(Self {
            vc_pnid,
            vc_port,
            vc_creds: creds,
            datacenter: text(DATACENTER_KEY),
            storage_class_required,
            use_inventory_as_content_source,
            ca_file_path,
            insecure_skip_tls_verify,
            resource_pool: text(RESOURCE_POOL_KEY),
            folder: text(FOLDER_KEY),
            datastore: text(DATASTORE_KEY),
            network: text(NETWORK_KEY),
        })
    }

    /// Render as the provider ConfigMap
    pub fn to_config_map(&self, namespace: &str, creds_secret_name: &str) -> ConfigMap {
        let data = BTreeMap::from([
            (VC_PNID_KEY.to_string(), self.vc_pnid.clone()),
            (VC_PORT_KEY.to_string(), self.vc_port.clone()),
            (VC_CREDS_SECRET_NAME_KEY.to_string(), creds_secret_name.to_string()),
            (DATACENTER_KEY.to_string(), self.datacenter.clone()),
            (RESOURCE_POOL_KEY.to_string(), self.resource_pool.clone()),
            (FOLDER_KEY.to_string(), self.folder.clone()),
            (DATASTORE_KEY.to_string(), self.datastore.clone()),
            (NETWORK_KEY.to_string(), self.network.clone()),
            (
                STORAGE_CLASS_REQUIRED_KEY.to_string(),
                self.storage_class_required.to_string(),
            ),
            (
                USE_INVENTORY_KEY.to_string(),
                self.use_inventory_as_content_source.to_string(),
            ),
            (CA_FILE_PATH_KEY.to_string(), self.ca_file_path.clone()),
            (
                INSECURE_SKIP_TLS_VERIFY_KEY.to_string(),
                self.insecure_skip_tls_verify.to_string(),
            ),
        ]);

        ConfigMap {
            metadata: ObjectMeta {
                name: Some(PROVIDER_CONFIG_MAP_NAME.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            data: Some(data),
            ..Default::default()
        }
    }

    /// vCenter endpoint as `host:port`
    pub fn vc_endpoint(&self) -> String {
        format!("{}:{}", self.vc_pnid, self.vc_port)
    }
}

/// Merge patch pointing `config_map` at a new vCenter endpoint.
///
/// `None` when the ConfigMap already carries both `vc_pnid` and `vc_port`.
pub fn vc_endpoint_patch(config_map: &ConfigMap, vc_pnid: &str, vc_port: &str) -> Option<Value> {
    let current = |key: &str| {
        config_map
            .data
            .as_ref()
            .and_then(|data| data.get(key))
            .map(String::as_str)
    };

    if current(VC_PNID_KEY) == Some(vc_pnid) && current(VC_PORT_KEY) == Some(vc_port) {
        return None;
    }

    Some(json!({
        "data": {
            VC_PNID_KEY: vc_pnid,
            VC_PORT_KEY: vc_port,
        }
    }))
}

/// Parse an optional boolean key; absent means false
fn parse_bool_key(data: &BTreeMap<String, String>, key: &str) -> Result<bool> {
    match data.get(key) {
        None => Ok(false),
        Some(value) => parse_bool(value).ok_or_else(|| {
            Error::Configuration(format!("unable to parse value of {}: {:?}", key, value))
        }),
    }
}

/// Accepts the usual boolean spellings used in ConfigMaps
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

// =============================================================================
// Network Config
// =============================================================================

/// DNS settings from the network ConfigMap
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsConfig {
    pub nameservers: Vec<String>,
    pub search_suffixes: Vec<String>,
}

/// Read DNS settings from the network ConfigMap
pub fn dns_from_config_map(config_map: &ConfigMap) -> Result<DnsConfig> {
    let mut dns = DnsConfig::default();
    let Some(data) = config_map.data.as_ref() else {
        return Ok(dns);
    };

    if let Some(nameservers) = data.get(NAMESERVERS_KEY) {
        dns.nameservers = nameservers.split_whitespace().map(String::from).collect();

        if dns.nameservers.len() == 1 && dns.nameservers[0] == WORKER_DNS_PLACEHOLDER {
            return Err(Error::Configuration(format!(
                "no valid nameservers in {} ConfigMap. It still contains {} key",
                NETWORK_CONFIG_MAP_NAME, WORKER_DNS_PLACEHOLDER
            )));
        }
    }

    if let Some(suffixes) = data.get(SEARCH_SUFFIXES_KEY) {
        dns.search_suffixes = suffixes.split_whitespace().map(String::from).collect();
    }

    Ok(dns)
}
