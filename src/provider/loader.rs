//! Provider Config Loader
//!
//! Reads and updates the provider ConfigMaps in the operator namespace.

use crate::error::{Error, Result};
use crate::provider::config::{
    dns_from_config_map, vc_endpoint_patch, DnsConfig, ProviderConfig, ProviderCredentials,
    NETWORK_CONFIG_MAP_NAME, PROVIDER_CONFIG_MAP_NAME, VC_CREDS_SECRET_NAME_KEY,
};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use tracing::{debug, error, info};

/// Loads provider configuration from the operator namespace
#[derive(Clone)]
pub struct ProviderConfigLoader {
    client: Client,
    namespace: String,
}

impl ProviderConfigLoader {
    pub fn new(client: Client, pod_namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: pod_namespace.into(),
        }
    }

    fn config_maps(&self) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    async fn config_map(&self, name: &str) -> Result<ConfigMap> {
        self.config_maps()
            .get_opt(name)
            .await?
            .ok_or_else(|| Error::ResourceNotFound {
                kind: "ConfigMap".into(),
                name: format!("{}/{}", self.namespace, name),
            })
    }

    /// Credentials from the Secret named by the provider ConfigMap
    async fn credentials(&self, config_map: &ConfigMap) -> Result<ProviderCredentials> {
        let secret_name = config_map
            .data
            .as_ref()
            .and_then(|data| data.get(VC_CREDS_SECRET_NAME_KEY))
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "{} creds secret not set in vmop system namespace",
                    VC_CREDS_SECRET_NAME_KEY
                ))
            })?;

        let secret = Api::<Secret>::namespaced(self.client.clone(), &self.namespace)
            .get_opt(secret_name)
            .await?
            .ok_or_else(|| Error::ResourceNotFound {
                kind: "Secret".into(),
                name: format!("{}/{}", self.namespace, secret_name),
            })?;

        ProviderCredentials::from_secret(&secret)
    }

    /// Load the provider config together with its credentials
    pub async fn load(&self) -> Result<ProviderConfig> {
        let config_map = self.config_map(PROVIDER_CONFIG_MAP_NAME).await?;
        let creds = self.credentials(&config_map).await?;
        let config = ProviderConfig::from_config_map(&config_map, Some(creds))?;

        info!(
            namespace = %self.namespace,
            endpoint = %config.vc_endpoint(),
            "Loaded provider config"
        );
        Ok(config)
    }

    /// Load DNS settings from the network ConfigMap
    pub async fn dns(&self) -> Result<DnsConfig> {
        let config_map = self.config_map(NETWORK_CONFIG_MAP_NAME).await?;
        dns_from_config_map(&config_map)
    }

    /// Point the provider ConfigMap at a new vCenter endpoint.
    ///
    /// Returns `false` when the ConfigMap already carries the endpoint.
    pub async fn update_vc_endpoint(&self, vc_pnid: &str, vc_port: &str) -> Result<bool> {
        let config_map = self.config_map(PROVIDER_CONFIG_MAP_NAME).await?;
        let Some(patch) = vc_endpoint_patch(&config_map, vc_pnid, vc_port) else {
            debug!("Provider ConfigMap already points at {}:{}", vc_pnid, vc_port);
            return Ok(false);
        };

        if let Err(e) = self
            .config_maps()
            .patch(PROVIDER_CONFIG_MAP_NAME, &PatchParams::default(), &Patch::Merge(&patch))
            .await
        {
            error!(error = %e, "Failed to update provider ConfigMap {}", PROVIDER_CONFIG_MAP_NAME);
            return Err(e.into());
        }

        info!("Updated provider ConfigMap to {}:{}", vc_pnid, vc_port);
        Ok(true)
    }
}
