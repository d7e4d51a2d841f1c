//! REST API Handlers
//!
//! Implements the REST API endpoints for image resolution, hardware version
//! determination, storage usage notification and resource policy validation.

use crate::crd::{VirtualMachineImageStatus, VirtualMachineSpec};
use crate::domain::ports::ImageRecord;
use crate::error::{Error, ErrorKind};
use crate::image::ImageResolver;
use crate::metrics::OperatorMetrics;
use crate::usage::StorageUsageNotifier;
use crate::vm::{image_name, ConfigSpec, HardwareVersionFloors};
use crate::webhooks::{self, ValidationResponse};
use axum::{
    extract::{Json, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Resolved image
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    pub name: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware_version: Option<i32>,
}

impl From<ImageRecord> for ImageResponse {
    fn from(record: ImageRecord) -> Self {
        Self {
            kind: record.kind().to_string(),
            namespace: record.scope.namespace_name().map(String::from),
            display_name: record.status.name,
            hardware_version: record.status.hardware_version,
            name: record.name,
        }
    }
}

/// Hardware version request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareVersionRequest {
    /// VM spec
    #[serde(default)]
    pub vm: VirtualMachineSpec,
    /// Target config spec
    #[serde(default)]
    pub config_spec: ConfigSpec,
    /// Namespace used to resolve the image
    #[serde(default)]
    pub namespace: Option<String>,
    /// Image to resolve; defaults to the image the VM references
    #[serde(default)]
    pub image_name: Option<String>,
}

/// Hardware version response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareVersionResponse {
    /// Numeric version, 0 when unconstrained
    pub hardware_version: u32,
    /// `vmx-<N>` token, empty when unconstrained
    pub version: String,
    pub floors: HardwareVersionFloors,
}

/// Resource policy validation request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub operation: ValidateOperation,
    #[serde(default)]
    pub object: serde_json::Value,
    #[serde(default)]
    pub old_object: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidateOperation {
    Create,
    Update,
    Delete,
}

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiErrorResponse {
    fn from_error(e: &Error) -> (StatusCode, Self) {
        let status = match e.kind() {
            ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let response = Self {
            error: e.kind().to_string(),
            message: e.to_string(),
            details: None,
        };
        (status, response)
    }
}

fn error_response(e: &Error) -> Response {
    let (status, body) = ApiErrorResponse::from_error(e);
    (status, Json(body)).into_response()
}

// =============================================================================
// REST Router
// =============================================================================

/// REST API router builder
pub struct RestRouter {
    resolver: ImageResolver,
    notifier: StorageUsageNotifier,
    metrics: Arc<OperatorMetrics>,
    cancel: CancellationToken,
}

impl RestRouter {
    /// Create a new REST router
    pub fn new(
        resolver: ImageResolver,
        notifier: StorageUsageNotifier,
        metrics: Arc<OperatorMetrics>,
    ) -> Self {
        Self {
            resolver,
            notifier,
            metrics,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort pending usage notifications when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        let state = AppState {
            resolver: self.resolver,
            notifier: self.notifier,
            metrics: self.metrics,
            cancel: self.cancel,
        };

        Router::new()
            // Image endpoints
            .route("/v1/namespaces/:namespace/images/:name", get(resolve_image))
            .route("/v1/hardware-version", post(hardware_version))
            // Storage usage endpoint
            .route(
                "/v1/namespaces/:namespace/storage-usage/:storage_class",
                post(notify_storage_usage),
            )
            // Validation endpoint
            .route("/v1/validate/resource-policy", post(validate_resource_policy))
            // Health and metrics endpoints
            .route("/healthz", get(health_check))
            .route("/readyz", get(readiness_check))
            .route("/metrics", get(metrics))
            .with_state(state)
    }
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    resolver: ImageResolver,
    notifier: StorageUsageNotifier,
    metrics: Arc<OperatorMetrics>,
    cancel: CancellationToken,
}

// =============================================================================
// Handlers
// =============================================================================

/// Resolve an image name
async fn resolve_image(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Response {
    match state.resolver.resolve(&namespace, &name).await {
        Ok(record) => (StatusCode::OK, Json(ImageResponse::from(record))).into_response(),
        Err(e) => {
            debug!(%namespace, %name, error = %e, "Image resolution failed");
            error_response(&e)
        }
    }
}

/// Determine the hardware version for a VM
async fn hardware_version(
    State(state): State<AppState>,
    Json(request): Json<HardwareVersionRequest>,
) -> Response {
    let image = request
        .image_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .or_else(|| image_name(&request.vm));

    let image_status = match image {
        None => VirtualMachineImageStatus::default(),
        Some(image) => {
            let Some(namespace) = request.namespace.as_deref().filter(|ns| !ns.is_empty()) else {
                return error_response(&Error::InvalidArgument(
                    "namespace is required to resolve an image".into(),
                ));
            };
            match state.resolver.resolve(namespace, image).await {
                Ok(record) => record.status,
                Err(e) => return error_response(&e),
            }
        }
    };

    let floors = HardwareVersionFloors::collect(&request.vm, &request.config_spec, &image_status);
    let version = floors.required();
    state.metrics.record_hardware_version(version);

    debug!(%version, "Determined hardware version");

    (
        StatusCode::OK,
        Json(HardwareVersionResponse {
            hardware_version: version.get(),
            version: if version.is_set() {
                version.to_string()
            } else {
                String::new()
            },
            floors,
        }),
    )
        .into_response()
}

/// Report a storage usage change
async fn notify_storage_usage(
    State(state): State<AppState>,
    Path((namespace, storage_class)): Path<(String, String)>,
) -> impl IntoResponse {
    debug!(%namespace, %storage_class, "Storage usage change received");
    state
        .notifier
        .notify(&state.cancel, &namespace, &storage_class)
        .await;
    StatusCode::ACCEPTED
}

/// Validate a VirtualMachineSetResourcePolicy
async fn validate_resource_policy(Json(request): Json<ValidateRequest>) -> Response {
    let result = match request.operation {
        ValidateOperation::Create => webhooks::validate_create(&request.object),
        ValidateOperation::Update => match &request.old_object {
            Some(old) => webhooks::validate_update(&request.object, old),
            None => Err(Error::InvalidArgument("oldObject is required for UPDATE".into())),
        },
        ValidateOperation::Delete => Ok(webhooks::validate_delete(&request.object)),
    };

    match result {
        Ok(response) => {
            if !response.allowed {
                debug!(errors = ?response.errors, "Resource policy rejected");
            }
            (StatusCode::OK, Json::<ValidationResponse>(response)).into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// Health check
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness check
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.notifier.is_closed() {
        (StatusCode::SERVICE_UNAVAILABLE, "storage usage consumer stopped")
    } else {
        (StatusCode::OK, "ready")
    }
}

/// Prometheus metrics
async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, state.metrics.content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            error_response(&e)
        }
    }
}
