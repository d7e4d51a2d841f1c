//! In-Memory Image Store
//!
//! Holds image records for both scopes together with an explicit secondary
//! index from display name to unique names. The primary map and the index
//! live behind one lock so a reader never sees them disagree.

use crate::domain::ports::{ImageRecord, ImageScope, ImageStore};
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Scope Entries
// =============================================================================

/// Records and display-name index for a single scope
#[derive(Debug, Default)]
struct ScopeEntries {
    /// Records by unique name
    records: HashMap<String, ImageRecord>,
    /// Display name -> unique names carrying it
    by_display_name: HashMap<String, BTreeSet<String>>,
}

impl ScopeEntries {
    fn insert(&mut self, record: ImageRecord) -> Option<ImageRecord> {
        let previous = self.records.remove(&record.name);
        if let Some(prev) = &previous {
            self.unindex(prev.display_name(), &prev.name);
        }

        self.by_display_name
            .entry(record.display_name().to_string())
            .or_default()
            .insert(record.name.clone());
        self.records.insert(record.name.clone(), record);

        previous
    }

    fn remove(&mut self, name: &str) -> Option<ImageRecord> {
        let removed = self.records.remove(name)?;
        self.unindex(removed.display_name(), name);
        Some(removed)
    }

    fn unindex(&mut self, display_name: &str, name: &str) {
        if let Some(names) = self.by_display_name.get_mut(display_name) {
            names.remove(name);
            if names.is_empty() {
                self.by_display_name.remove(display_name);
            }
        }
    }

    fn by_display_name(&self, display_name: &str) -> Vec<ImageRecord> {
        self.by_display_name
            .get(display_name)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|name| self.records.get(name).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

// =============================================================================
// Store Statistics
// =============================================================================

/// Lookup counters
#[derive(Debug, Default)]
pub struct StoreStats {
    pub unique_name_lookups: AtomicU64,
    pub display_name_lookups: AtomicU64,
    pub inserts: AtomicU64,
    pub removals: AtomicU64,
}

impl StoreStats {
    pub fn snapshot(&self) -> StoreStatsSnapshot {
        StoreStatsSnapshot {
            unique_name_lookups: self.unique_name_lookups.load(Ordering::Relaxed),
            display_name_lookups: self.display_name_lookups.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of store statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStatsSnapshot {
    pub unique_name_lookups: u64,
    pub display_name_lookups: u64,
    pub inserts: u64,
    pub removals: u64,
}

// =============================================================================
// Memory Image Store
// =============================================================================

/// Image store backed by process memory
#[derive(Debug, Default)]
pub struct MemoryImageStore {
    scopes: RwLock<HashMap<ImageScope, ScopeEntries>>,
    stats: StoreStats,
}

impl MemoryImageStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the given records
    pub fn from_records(records: impl IntoIterator<Item = ImageRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    /// Insert or replace a record, returning the one it replaced
    pub fn insert(&self, record: ImageRecord) -> Option<ImageRecord> {
        self.stats.inserts.fetch_add(1, Ordering::Relaxed);
        self.scopes
            .write()
            .entry(record.scope.clone())
            .or_default()
            .insert(record)
    }

    /// Remove a record by unique name
    pub fn remove(&self, scope: &ImageScope, name: &str) -> Option<ImageRecord> {
        let mut scopes = self.scopes.write();
        let entries = scopes.get_mut(scope)?;
        let removed = entries.remove(name);
        if entries.records.is_empty() {
            scopes.remove(scope);
        }
        if removed.is_some() {
            self.stats.removals.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Replace every scope matching `in_scope` with `records`.
    ///
    /// Scopes that match but receive no records are emptied.
    pub fn replace_scopes(
        &self,
        in_scope: impl Fn(&ImageScope) -> bool,
        records: impl IntoIterator<Item = ImageRecord>,
    ) {
        let mut fresh: HashMap<ImageScope, ScopeEntries> = HashMap::new();
        for record in records {
            self.stats.inserts.fetch_add(1, Ordering::Relaxed);
            fresh.entry(record.scope.clone()).or_default().insert(record);
        }

        let mut scopes = self.scopes.write();
        scopes.retain(|scope, _| !in_scope(scope));
        scopes.extend(fresh.into_iter().filter(|(scope, _)| in_scope(scope)));
    }

    /// Total number of records across scopes
    pub fn len(&self) -> usize {
        self.scopes.read().values().map(|e| e.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lookup statistics
    pub fn stats(&self) -> StoreStatsSnapshot {
        self.stats.snapshot()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn get_by_unique_name(&self, scope: &ImageScope, name: &str) -> Result<Option<ImageRecord>> {
        self.stats.unique_name_lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .scopes
            .read()
            .get(scope)
            .and_then(|entries| entries.records.get(name).cloned()))
    }

    async fn list_by_display_name(
        &self,
        scope: &ImageScope,
        display_name: &str,
    ) -> Result<Vec<ImageRecord>> {
        self.stats.display_name_lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .scopes
            .read()
            .get(scope)
            .map(|entries| entries.by_display_name(display_name))
            .unwrap_or_default())
    }

    fn store_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::VirtualMachineImageStatus;

    fn ns_image(ns: &str, name: &str, display: &str) -> ImageRecord {
        ImageRecord::new(
            ImageScope::namespace(ns),
            name,
            VirtualMachineImageStatus::named(display),
        )
    }

    #[tokio::test]
    async fn test_unique_name_lookup_is_scoped() {
        let store = MemoryImageStore::from_records([
            ns_image("ns-a", "vmi-1", "image-a"),
            ns_image("ns-b", "vmi-2", "image-a"),
        ]);

        let found = store
            .get_by_unique_name(&ImageScope::namespace("ns-a"), "vmi-1")
            .await
            .unwrap();
        assert_eq!(found.map(|r| r.name), Some("vmi-1".to_string()));

        let missing = store
            .get_by_unique_name(&ImageScope::namespace("ns-b"), "vmi-1")
            .await
            .unwrap();
        assert!(missing.is_none());

        let cluster = store
            .get_by_unique_name(&ImageScope::Cluster, "vmi-1")
            .await
            .unwrap();
        assert!(cluster.is_none());
    }

    #[tokio::test]
    async fn test_display_name_index() {
        let store = MemoryImageStore::from_records([
            ns_image("ns-a", "vmi-2", "image-b"),
            ns_image("ns-a", "vmi-3", "image-b"),
            ns_image("ns-a", "vmi-4", "image-c"),
        ]);

        let matches = store
            .list_by_display_name(&ImageScope::namespace("ns-a"), "image-b")
            .await
            .unwrap();
        let names: Vec<_> = matches.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["vmi-2", "vmi-3"]);

        let none = store
            .list_by_display_name(&ImageScope::Cluster, "image-b")
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_replace_moves_index_entry() {
        let store = MemoryImageStore::new();
        store.insert(ns_image("ns-a", "vmi-1", "old-name"));
        let replaced = store.insert(ns_image("ns-a", "vmi-1", "new-name"));
        assert_eq!(replaced.map(|r| r.status.name), Some("old-name".to_string()));

        let scope = ImageScope::namespace("ns-a");
        assert!(store
            .list_by_display_name(&scope, "old-name")
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            store.list_by_display_name(&scope, "new-name").await.unwrap().len(),
            1
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_replace_scopes_leaves_other_scopes() {
        let store = MemoryImageStore::from_records([
            ns_image("ns-a", "vmi-1", "image-a"),
            ns_image("ns-b", "vmi-2", "image-b"),
            ImageRecord::new(
                ImageScope::Cluster,
                "vmi-3",
                VirtualMachineImageStatus::named("image-a"),
            ),
        ]);

        store.replace_scopes(
            |scope| matches!(scope, ImageScope::Namespace(_)),
            [ns_image("ns-a", "vmi-4", "image-a")],
        );

        assert_eq!(store.len(), 2);
        assert!(store
            .get_by_unique_name(&ImageScope::namespace("ns-b"), "vmi-2")
            .await
            .unwrap()
            .is_none());
        let names: Vec<_> = store
            .list_by_display_name(&ImageScope::namespace("ns-a"), "image-a")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["vmi-4"]);
        assert!(store
            .get_by_unique_name(&ImageScope::Cluster, "vmi-3")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_remove_clears_index() {
        let store = MemoryImageStore::from_records([ns_image("ns-a", "vmi-1", "image-a")]);
        let scope = ImageScope::namespace("ns-a");

        assert!(store.remove(&scope, "vmi-1").is_some());
        assert!(store.remove(&scope, "vmi-1").is_none());
        assert!(store.is_empty());
        assert!(store
            .list_by_display_name(&scope, "image-a")
            .await
            .unwrap()
            .is_empty());

        let stats = store.stats();
        assert_eq!(stats.inserts, 1);
        assert_eq!(stats.removals, 1);
        assert_eq!(stats.display_name_lookups, 1);
    }
}
