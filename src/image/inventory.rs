//! Image Inventory Decoding
//!
//! Decodes image manifests (as produced by `kubectl get -o yaml`) into
//! image records. Each supported kind has its own decode arm; anything else
//! is rejected rather than guessed at.

use crate::crd::{ClusterVirtualMachineImage, VirtualMachineImage};
use crate::domain::ports::{ImageRecord, ImageScope};
use crate::error::{Error, Result};
use crate::image::MemoryImageStore;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// A decoded image object of one of the known kinds
#[derive(Debug, Clone)]
pub enum ImageObject {
    Namespaced(VirtualMachineImage),
    Cluster(ClusterVirtualMachineImage),
}

impl ImageObject {
    /// Decode a single manifest by its `kind`
    pub fn from_value(value: Value) -> Result<Self> {
        let kind = value
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Decode("manifest has no kind".into()))?
            .to_string();

        match kind.as_str() {
            "VirtualMachineImage" => Ok(ImageObject::Namespaced(serde_json::from_value(value)?)),
            "ClusterVirtualMachineImage" => Ok(ImageObject::Cluster(serde_json::from_value(value)?)),
            _ => Err(Error::UnsupportedKind(kind)),
        }
    }

    /// Convert to a record; namespaced objects without a namespace land in
    /// `default_namespace`
    pub fn into_record(self, default_namespace: &str) -> ImageRecord {
        match self {
            ImageObject::Namespaced(img) => {
                let mut record = ImageRecord::from(&img);
                if img.metadata.namespace.is_none() {
                    record.scope = ImageScope::namespace(default_namespace);
                }
                record
            }
            ImageObject::Cluster(img) => ImageRecord::from(&img),
        }
    }
}

/// Parse a multi-document YAML stream of image manifests.
///
/// `kind: List` documents are expanded into their items.
pub fn parse_inventory(yaml: &str, default_namespace: &str) -> Result<Vec<ImageRecord>> {
    let mut records = Vec::new();

    for document in serde_yaml::Deserializer::from_str(yaml) {
        let value = Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }

        let items = match value.get("kind").and_then(Value::as_str) {
            Some("List") => match value.get("items") {
                Some(Value::Array(items)) => items.clone(),
                _ => Vec::new(),
            },
            _ => vec![value],
        };

        for item in items {
            records.push(ImageObject::from_value(item)?.into_record(default_namespace));
        }
    }

    Ok(records)
}

/// Load an inventory file into a new memory store
pub fn load_inventory(path: impl AsRef<Path>, default_namespace: &str) -> Result<MemoryImageStore> {
    let path = path.as_ref();
    let yaml = std::fs::read_to_string(path)?;
    let records = parse_inventory(&yaml, default_namespace)?;

    info!(
        "Loaded {} image records from {}",
        records.len(),
        path.display()
    );

    Ok(MemoryImageStore::from_records(records))
}
