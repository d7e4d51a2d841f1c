//! Kubernetes Image Store
//!
//! Watches VirtualMachineImage and ClusterVirtualMachineImage objects and
//! mirrors them into an [`ImageCache`]. Lookups are served from the cache's
//! unique-name map and display-name index; nothing is listed per request.

use crate::crd::{ClusterVirtualMachineImage, VirtualMachineImage};
use crate::domain::ports::{ImageRecord, ImageScope, ImageStore};
use crate::error::{Error, Result};
use crate::image::memory::MemoryImageStore;
use async_trait::async_trait;
use futures::StreamExt;
use kube::runtime::watcher;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pause after a watch error before polling the stream again
const WATCH_RETRY_DELAY: Duration = Duration::from_secs(2);

// =============================================================================
// Image Cache
// =============================================================================

/// Watch-fed image cache.
///
/// A scope reports [`Error::StoreUnavailable`] until its first full listing
/// has been applied.
#[derive(Debug, Default)]
pub struct ImageCache {
    images: MemoryImageStore,
    namespaced_synced: AtomicBool,
    cluster_synced: AtomicBool,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a VirtualMachineImage watch event
    pub fn apply_namespaced(&self, event: watcher::Event<VirtualMachineImage>) {
        self.apply(event, is_namespaced, &self.namespaced_synced);
    }

    /// Apply a ClusterVirtualMachineImage watch event
    pub fn apply_cluster(&self, event: watcher::Event<ClusterVirtualMachineImage>) {
        self.apply(event, is_cluster, &self.cluster_synced);
    }

    fn apply<K>(&self, event: watcher::Event<K>, in_scope: fn(&ImageScope) -> bool, synced: &AtomicBool)
    where
        for<'a> ImageRecord: From<&'a K>,
    {
        match event {
            watcher::Event::Applied(obj) => {
                let record = ImageRecord::from(&obj);
                debug!(scope = %record.scope, name = %record.name, "Image applied");
                self.images.insert(record);
            }
            watcher::Event::Deleted(obj) => {
                let record = ImageRecord::from(&obj);
                debug!(scope = %record.scope, name = %record.name, "Image deleted");
                self.images.remove(&record.scope, &record.name);
            }
            watcher::Event::Restarted(objs) => {
                debug!(count = objs.len(), "Image watch restarted");
                self.images
                    .replace_scopes(in_scope, objs.iter().map(ImageRecord::from));
                synced.store(true, Ordering::Release);
            }
        }
    }

    /// True once both image kinds have been listed
    pub fn is_synced(&self) -> bool {
        self.namespaced_synced.load(Ordering::Acquire) && self.cluster_synced.load(Ordering::Acquire)
    }

    /// Number of cached images across scopes
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    fn ensure_synced(&self, scope: &ImageScope) -> Result<()> {
        let synced = match scope {
            ImageScope::Namespace(_) => &self.namespaced_synced,
            ImageScope::Cluster => &self.cluster_synced,
        };
        if synced.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::StoreUnavailable(format!(
                "{} cache has not synced",
                scope.kind()
            )))
        }
    }
}

fn is_namespaced(scope: &ImageScope) -> bool {
    matches!(scope, ImageScope::Namespace(_))
}

fn is_cluster(scope: &ImageScope) -> bool {
    matches!(scope, ImageScope::Cluster)
}

#[async_trait]
impl ImageStore for ImageCache {
    async fn get_by_unique_name(&self, scope: &ImageScope, name: &str) -> Result<Option<ImageRecord>> {
        self.ensure_synced(scope)?;
        self.images.get_by_unique_name(scope, name).await
    }

    async fn list_by_display_name(
        &self,
        scope: &ImageScope,
        display_name: &str,
    ) -> Result<Vec<ImageRecord>> {
        self.ensure_synced(scope)?;
        self.images.list_by_display_name(scope, display_name).await
    }

    fn store_name(&self) -> &str {
        "kubernetes"
    }
}

// =============================================================================
// Kubernetes Image Store
// =============================================================================

/// Keeps an [`ImageCache`] in step with the API server
#[derive(Clone)]
pub struct KubeImageStore {
    client: Client,
    cache: Arc<ImageCache>,
}

impl KubeImageStore {
    /// Create a store using the given client
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: Arc::new(ImageCache::new()),
        }
    }

    /// Cache the resolver reads from
    pub fn cache(&self) -> Arc<ImageCache> {
        self.cache.clone()
    }

    /// Watch both image kinds until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        info!("Starting image watchers");

        let namespaced = watch(
            Api::<VirtualMachineImage>::all(self.client.clone()),
            self.cache.clone(),
            ImageCache::apply_namespaced,
        );
        let cluster = watch(
            Api::<ClusterVirtualMachineImage>::all(self.client.clone()),
            self.cache.clone(),
            ImageCache::apply_cluster,
        );

        tokio::select! {
            _ = cancel.cancelled() => info!("Image watchers stopped"),
            _ = futures::future::join(namespaced, cluster) => warn!("Image watch streams ended"),
        }
    }
}

async fn watch<K>(api: Api<K>, cache: Arc<ImageCache>, apply: fn(&ImageCache, watcher::Event<K>))
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + 'static,
{
    let kind = K::kind(&());
    let mut stream = Box::pin(watcher(api, watcher::Config::default()));

    while let Some(event) = stream.next().await {
        match event {
            Ok(event) => apply(&cache, event),
            Err(e) => {
                warn!(%kind, error = %e, "Image watch failed, retrying");
                tokio::time::sleep(WATCH_RETRY_DELAY).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{
        ClusterVirtualMachineImageSpec, VirtualMachineImageSpec, VirtualMachineImageStatus,
    };
    use assert_matches::assert_matches;

    fn ns_image(ns: &str, name: &str, display: &str) -> VirtualMachineImage {
        let mut img = VirtualMachineImage::new(name, VirtualMachineImageSpec::default());
        img.metadata.namespace = Some(ns.to_string());
        img.status = Some(VirtualMachineImageStatus::named(display));
        img
    }

    fn cluster_image(name: &str, display: &str) -> ClusterVirtualMachineImage {
        let mut img = ClusterVirtualMachineImage::new(name, ClusterVirtualMachineImageSpec::default());
        img.status = Some(VirtualMachineImageStatus::named(display));
        img
    }

    fn synced_cache() -> ImageCache {
        let cache = ImageCache::new();
        cache.apply_namespaced(watcher::Event::Restarted(vec![]));
        cache.apply_cluster(watcher::Event::Restarted(vec![]));
        cache
    }

    #[tokio::test]
    async fn test_lookups_fail_before_sync() {
        let cache = ImageCache::new();
        let err = cache
            .get_by_unique_name(&ImageScope::Cluster, "vmi-1")
            .await
            .unwrap_err();
        assert_matches!(err, Error::StoreUnavailable(_));

        cache.apply_cluster(watcher::Event::Restarted(vec![cluster_image("vmi-1", "image-a")]));
        assert!(!cache.is_synced());
        assert!(cache
            .get_by_unique_name(&ImageScope::Cluster, "vmi-1")
            .await
            .unwrap()
            .is_some());

        let err = cache
            .list_by_display_name(&ImageScope::namespace("ns-a"), "image-a")
            .await
            .unwrap_err();
        assert_matches!(err, Error::StoreUnavailable(_));
    }

    #[tokio::test]
    async fn test_watch_events_feed_both_lookups() {
        let cache = synced_cache();
        assert!(cache.is_synced());

        cache.apply_namespaced(watcher::Event::Applied(ns_image("ns-a", "vmi-1", "image-a")));
        cache.apply_namespaced(watcher::Event::Applied(ns_image("ns-a", "vmi-2", "image-a")));
        cache.apply_cluster(watcher::Event::Applied(cluster_image("vmi-3", "image-a")));

        let scope = ImageScope::namespace("ns-a");
        let found = cache.get_by_unique_name(&scope, "vmi-1").await.unwrap();
        assert_eq!(found.map(|r| r.name), Some("vmi-1".to_string()));

        let names: Vec<_> = cache
            .list_by_display_name(&scope, "image-a")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["vmi-1", "vmi-2"]);
        assert_eq!(
            cache
                .list_by_display_name(&ImageScope::Cluster, "image-a")
                .await
                .unwrap()
                .len(),
            1
        );

        // Status rename moves the index entry
        cache.apply_namespaced(watcher::Event::Applied(ns_image("ns-a", "vmi-2", "image-b")));
        cache.apply_namespaced(watcher::Event::Deleted(ns_image("ns-a", "vmi-1", "image-a")));

        assert!(cache
            .list_by_display_name(&scope, "image-a")
            .await
            .unwrap()
            .is_empty());
        assert_eq!(cache.list_by_display_name(&scope, "image-b").await.unwrap().len(), 1);
        assert!(cache.get_by_unique_name(&scope, "vmi-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restart_replaces_only_its_kind() {
        let cache = synced_cache();
        cache.apply_namespaced(watcher::Event::Applied(ns_image("ns-a", "vmi-1", "image-a")));
        cache.apply_cluster(watcher::Event::Applied(cluster_image("vmi-2", "image-a")));

        cache.apply_namespaced(watcher::Event::Restarted(vec![ns_image("ns-b", "vmi-3", "image-c")]));

        assert_eq!(cache.len(), 2);
        assert!(cache
            .get_by_unique_name(&ImageScope::namespace("ns-a"), "vmi-1")
            .await
            .unwrap()
            .is_none());
        assert!(cache
            .get_by_unique_name(&ImageScope::namespace("ns-b"), "vmi-3")
            .await
            .unwrap()
            .is_some());
        assert!(cache
            .get_by_unique_name(&ImageScope::Cluster, "vmi-2")
            .await
            .unwrap()
            .is_some());
    }
}
