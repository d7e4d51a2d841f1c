//! Error types for VM image policy
//!
//! Provides structured error types for image resolution, provider
//! configuration, admission validation and the storage-usage pipeline.

use std::time::Duration;
use thiserror::Error;

/// Scope description carried by an image conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictScope {
    /// More than one match in the namespace scope
    Namespace,
    /// More than one match in the cluster scope
    Cluster,
    /// At least one match in each scope
    NamespaceAndCluster,
}

impl std::fmt::Display for ConflictScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictScope::Namespace => write!(f, "namespace scope"),
            ConflictScope::Cluster => write!(f, "cluster scope"),
            ConflictScope::NamespaceAndCluster => write!(f, "namespace and cluster scope"),
        }
    }
}

/// Unified error type
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // =========================================================================
    // Image Resolution Errors
    // =========================================================================
    #[error("name is empty")]
    EmptyImageName,

    #[error("no VM image exists for {name:?} in namespace or cluster scope")]
    ImageNotFound { name: String },

    #[error("multiple VM images exist for {name:?} in {scope}")]
    ImageConflict { name: String, scope: ConflictScope },

    #[error("Image store unavailable: {0}")]
    StoreUnavailable(String),

    // =========================================================================
    // Kubernetes Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Resource not found: {kind}/{name}")]
    ResourceNotFound { kind: String, name: String },

    // =========================================================================
    // Decode / Validation Errors
    // =========================================================================
    #[error("Unsupported object kind: {0}")]
    UnsupportedKind(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Quantity parse error: {0}")]
    QuantityParse(String),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // =========================================================================
    // IO / Metrics Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Classification surfaced to callers regardless of the concrete variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    Conflict,
    Unavailable,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidArgument => write!(f, "invalid_argument"),
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::Unavailable => write!(f, "unavailable"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

/// Action to take on error during reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Requeue with exponential backoff
    RequeueWithBackoff,
    /// Requeue after specific duration
    RequeueAfter(Duration),
    /// Don't requeue, wait for changes
    NoRequeue,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::EmptyImageName
            | Error::InvalidArgument(_)
            | Error::UnsupportedKind(_)
            | Error::Decode(_)
            | Error::QuantityParse(_)
            | Error::JsonParse(_)
            | Error::YamlParse(_) => ErrorKind::InvalidArgument,

            Error::ImageNotFound { .. } | Error::ResourceNotFound { .. } => ErrorKind::NotFound,

            Error::ImageConflict { .. } => ErrorKind::Conflict,

            Error::Kube(_) | Error::StoreUnavailable(_) => ErrorKind::Unavailable,

            Error::Internal(_)
            | Error::Configuration(_)
            | Error::Io(_)
            | Error::Metrics(_) => ErrorKind::Internal,
        }
    }

    /// Determine what action to take for this error
    pub fn action(&self) -> ErrorAction {
        match self {
            // Transient errors - retry with backoff
            Error::Kube(_) | Error::StoreUnavailable(_) => ErrorAction::RequeueWithBackoff,

            // The image may still show up
            Error::ImageNotFound { .. } | Error::ResourceNotFound { .. } => {
                ErrorAction::RequeueAfter(Duration::from_secs(30))
            }

            // Configuration/validation errors - don't retry automatically
            Error::ImageConflict { .. }
            | Error::EmptyImageName
            | Error::InvalidArgument(_)
            | Error::Configuration(_)
            | Error::UnsupportedKind(_)
            | Error::Decode(_)
            | Error::QuantityParse(_) => ErrorAction::NoRequeue,

            // All other errors - retry with backoff
            _ => ErrorAction::RequeueWithBackoff,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(self.action(), ErrorAction::NoRequeue)
    }

    /// Check if this error is transient
    pub fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::Unavailable)
    }

    /// Equivalent of the API server's not-found check
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
