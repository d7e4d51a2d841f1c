//! Storage Usage Events
//!
//! Events submitted when a namespace's usage of a storage class changes.

use serde::{Deserialize, Serialize};

/// Identifies a storage class whose usage changed in a namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageUsageEvent {
    /// Namespace whose usage changed
    pub namespace: String,
    /// Storage class name
    pub name: String,
}

impl StorageUsageEvent {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// `namespace/name` key
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl std::fmt::Display for StorageUsageEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_key() {
        let event = StorageUsageEvent::new("my-namespace", "my-storage-class");
        assert_eq!(event.key(), "my-namespace/my-storage-class");
        assert_eq!(event.to_string(), event.key());
    }
}
