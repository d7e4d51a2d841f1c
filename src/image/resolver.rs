//! Image Resolver
//!
//! Resolves a user-supplied image name to exactly one image record.
//!
//! Resolution runs in two phases:
//!
//! 1. Exact lookup by unique name, namespace scope first, then cluster scope.
//!    The first hit wins, so a namespace image shadows a cluster image that
//!    happens to share its unique name.
//! 2. Display-name lookup in both scopes. The name must match exactly one
//!    record across both scopes, otherwise the request is ambiguous.

use crate::domain::ports::{ImageRecord, ImageScope, ImageStoreRef};
use crate::error::{ConflictScope, Error, Result};
use crate::metrics::OperatorMetrics;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Resolves image names against an [`ImageStore`](crate::domain::ports::ImageStore)
#[derive(Clone)]
pub struct ImageResolver {
    store: ImageStoreRef,
    metrics: Option<Arc<OperatorMetrics>>,
}

impl std::fmt::Debug for ImageResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageResolver")
            .field("store", &self.store.store_name())
            .finish()
    }
}

impl ImageResolver {
    /// Create a resolver over the given store
    pub fn new(store: ImageStoreRef) -> Self {
        Self {
            store,
            metrics: None,
        }
    }

    /// Record resolution outcomes in `metrics`
    pub fn with_metrics(mut self, metrics: Arc<OperatorMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Resolve `name` in `namespace` to a single image record.
    ///
    /// `name` may be either the unique name of a namespace or cluster image,
    /// or the display name of exactly one image across both scopes.
    #[instrument(level = "debug", skip(self), fields(store = self.store.store_name()))]
    pub async fn resolve(&self, namespace: &str, name: &str) -> Result<ImageRecord> {
        let result = self.resolve_inner(namespace, name).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_resolution(&result);
        }
        result
    }

    async fn resolve_inner(&self, namespace: &str, name: &str) -> Result<ImageRecord> {
        if name.is_empty() {
            return Err(Error::EmptyImageName);
        }

        let ns_scope = ImageScope::namespace(namespace);

        for scope in [&ns_scope, &ImageScope::Cluster] {
            if let Some(record) = self.store.get_by_unique_name(scope, name).await? {
                debug!(scope = %scope, "Resolved image by unique name");
                return Ok(record);
            }
        }

        let (ns_matches, cl_matches) = futures::try_join!(
            self.store.list_by_display_name(&ns_scope, name),
            self.store.list_by_display_name(&ImageScope::Cluster, name),
        )?;

        debug!(
            namespace_matches = ns_matches.len(),
            cluster_matches = cl_matches.len(),
            "Looked up image by display name"
        );

        select_display_name_match(name, ns_matches, cl_matches)
    }
}

/// Pick the single display-name match across both scopes.
///
/// A match in both scopes is a conflict no matter how many records each
/// scope holds.
pub fn select_display_name_match(
    name: &str,
    ns_matches: Vec<ImageRecord>,
    cl_matches: Vec<ImageRecord>,
) -> Result<ImageRecord> {
    let conflict = |scope| Error::ImageConflict {
        name: name.to_string(),
        scope,
    };

    let mut ns_matches = ns_matches.into_iter();
    let mut cl_matches = cl_matches.into_iter();

    match (ns_matches.len(), cl_matches.len()) {
        (0, 0) => Err(Error::ImageNotFound {
            name: name.to_string(),
        }),
        (1, 0) => ns_matches.next().ok_or_else(|| conflict(ConflictScope::Namespace)),
        (0, 1) => cl_matches.next().ok_or_else(|| conflict(ConflictScope::Cluster)),
        (_, 0) => Err(conflict(ConflictScope::Namespace)),
        (0, _) => Err(conflict(ConflictScope::Cluster)),
        _ => Err(conflict(ConflictScope::NamespaceAndCluster)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::VirtualMachineImageStatus;
    use crate::domain::ports::ImageStore;
    use crate::image::MemoryImageStore;
    use assert_matches::assert_matches;
    use async_trait::async_trait;

    const NAMESPACE: &str = "my-namespace";

    fn ns_image(name: &str, display: &str) -> ImageRecord {
        ImageRecord::new(
            ImageScope::namespace(NAMESPACE),
            name,
            VirtualMachineImageStatus::named(display),
        )
    }

    fn cl_image(name: &str, display: &str) -> ImageRecord {
        ImageRecord::new(
            ImageScope::Cluster,
            name,
            VirtualMachineImageStatus::named(display),
        )
    }

    fn resolver() -> ImageResolver {
        let store = MemoryImageStore::from_records([
            ns_image("vmi-1", "image-a"),
            ns_image("vmi-2", "image-b"),
            ns_image("vmi-3", "image-b"),
            ns_image("vmi-4", "image-c"),
            cl_image("vmi-5", "image-d"),
            cl_image("vmi-6", "image-e"),
            cl_image("vmi-7", "image-e"),
            cl_image("vmi-8", "image-c"),
        ]);
        ImageResolver::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_resolve_namespace_unique_name() {
        let record = resolver().resolve(NAMESPACE, "vmi-1").await.unwrap();
        assert_eq!(record.name, "vmi-1");
        assert_eq!(record.kind(), "VirtualMachineImage");
    }

    #[tokio::test]
    async fn test_resolve_cluster_unique_name() {
        let record = resolver().resolve(NAMESPACE, "vmi-5").await.unwrap();
        assert_eq!(record.name, "vmi-5");
        assert_eq!(record.kind(), "ClusterVirtualMachineImage");
    }

    #[tokio::test]
    async fn test_resolve_missing_unique_name() {
        let err = resolver().resolve(NAMESPACE, "vmi-9999999").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            r#"no VM image exists for "vmi-9999999" in namespace or cluster scope"#
        );
    }

    #[tokio::test]
    async fn test_resolve_namespace_display_name() {
        let record = resolver().resolve(NAMESPACE, "image-a").await.unwrap();
        assert_eq!(record.name, "vmi-1");
        assert_eq!(record.scope, ImageScope::namespace(NAMESPACE));
    }

    #[tokio::test]
    async fn test_resolve_cluster_display_name() {
        let record = resolver().resolve(NAMESPACE, "image-d").await.unwrap();
        assert_eq!(record.name, "vmi-5");
        assert_eq!(record.scope, ImageScope::Cluster);
    }

    #[tokio::test]
    async fn test_resolve_empty_name() {
        let err = resolver().resolve(NAMESPACE, "").await.unwrap_err();
        assert_matches!(err, Error::EmptyImageName);
        assert_eq!(err.to_string(), "name is empty");
    }

    #[tokio::test]
    async fn test_resolve_multiple_namespace_matches() {
        let err = resolver().resolve(NAMESPACE, "image-b").await.unwrap_err();
        assert_matches!(
            err,
            Error::ImageConflict {
                scope: ConflictScope::Namespace,
                ..
            }
        );
        assert_eq!(
            err.to_string(),
            r#"multiple VM images exist for "image-b" in namespace scope"#
        );
    }

    #[tokio::test]
    async fn test_resolve_multiple_cluster_matches() {
        let err = resolver().resolve(NAMESPACE, "image-e").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"multiple VM images exist for "image-e" in cluster scope"#
        );
    }

    #[tokio::test]
    async fn test_resolve_matches_in_both_scopes() {
        let err = resolver().resolve(NAMESPACE, "image-c").await.unwrap_err();
        assert_matches!(
            err,
            Error::ImageConflict {
                scope: ConflictScope::NamespaceAndCluster,
                ..
            }
        );
        assert_eq!(
            err.to_string(),
            r#"multiple VM images exist for "image-c" in namespace and cluster scope"#
        );
    }

    #[tokio::test]
    async fn test_resolve_no_match() {
        let err = resolver().resolve(NAMESPACE, "invalid").await.unwrap_err();
        assert_matches!(err, Error::ImageNotFound { ref name } if name == "invalid");
    }

    #[tokio::test]
    async fn test_resolve_other_namespace_is_invisible() {
        let err = resolver().resolve("other-namespace", "image-a").await.unwrap_err();
        assert!(err.is_not_found());

        // Cluster images remain visible from every namespace.
        let record = resolver().resolve("other-namespace", "image-c").await.unwrap();
        assert_eq!(record.name, "vmi-8");
    }

    #[tokio::test]
    async fn test_namespace_unique_name_shadows_cluster() {
        let store = MemoryImageStore::from_records([
            ns_image("vmi-shared", "ns-display"),
            cl_image("vmi-shared", "cl-display"),
        ]);
        let record = ImageResolver::new(Arc::new(store))
            .resolve(NAMESPACE, "vmi-shared")
            .await
            .unwrap();
        assert_eq!(record.scope, ImageScope::namespace(NAMESPACE));
    }

    #[test]
    fn test_cross_scope_conflict_ignores_counts() {
        let err = select_display_name_match(
            "img",
            vec![ns_image("a", "img"), ns_image("b", "img")],
            vec![cl_image("c", "img")],
        )
        .unwrap_err();
        assert_matches!(
            err,
            Error::ImageConflict {
                scope: ConflictScope::NamespaceAndCluster,
                ..
            }
        );
    }

    struct UnavailableStore;

    #[async_trait]
    impl ImageStore for UnavailableStore {
        async fn get_by_unique_name(&self, _: &ImageScope, _: &str) -> Result<Option<ImageRecord>> {
            Err(Error::StoreUnavailable("connection refused".into()))
        }

        async fn list_by_display_name(&self, _: &ImageScope, _: &str) -> Result<Vec<ImageRecord>> {
            Ok(Vec::new())
        }

        fn store_name(&self) -> &str {
            "unavailable"
        }
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let err = ImageResolver::new(Arc::new(UnavailableStore))
            .resolve(NAMESPACE, "vmi-1")
            .await
            .unwrap_err();
        assert_matches!(err, Error::StoreUnavailable(ref msg) if msg == "connection refused");
        assert!(err.is_transient());
    }
}
