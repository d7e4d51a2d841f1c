//! Admission Validation
//!
//! Field-level validation for admitted objects. Request envelopes are left to
//! the caller; validators take decoded JSON objects and return a
//! [`ValidationResponse`].

pub mod quantity;
pub mod resource_policy;

pub use quantity::parse_quantity;
pub use resource_policy::*;

use serde::Serialize;

/// Outcome of validating one object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ValidationResponse {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            errors: Vec::new(),
        }
    }

    /// Allowed only when `errors` is empty
    pub fn from_errors(errors: Vec<FieldError>) -> Self {
        Self {
            allowed: errors.is_empty(),
            errors: errors.iter().map(ToString::to_string).collect(),
        }
    }
}

/// A field-scoped validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    Invalid {
        path: String,
        value: String,
        detail: String,
    },
    Duplicate {
        path: String,
        value: String,
    },
}

impl FieldError {
    pub fn invalid(path: impl Into<String>, value: impl Into<String>, detail: impl Into<String>) -> Self {
        FieldError::Invalid {
            path: path.into(),
            value: value.into(),
            detail: detail.into(),
        }
    }

    pub fn duplicate(path: impl Into<String>, value: impl Into<String>) -> Self {
        FieldError::Duplicate {
            path: path.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldError::Invalid { path, value, detail } => {
                write!(f, "{}: Invalid value: {}: {}", path, value, detail)
            }
            FieldError::Duplicate { path, value } => {
                write!(f, "{}: Duplicate value: {}", path, value)
            }
        }
    }
}
