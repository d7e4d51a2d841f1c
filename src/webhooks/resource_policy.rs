//! VirtualMachineSetResourcePolicy Validation
//!
//! Create checks reservations against limits and rejects duplicate cluster
//! module groups. Update only checks that placement fields stay unchanged.

use crate::crd::{ResourcePoolSpec, VirtualMachineSetResourcePolicy};
use crate::error::{Error, Result};
use crate::webhooks::quantity::quantity_value;
use crate::webhooks::{FieldError, ValidationResponse};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

const KIND: &str = "VirtualMachineSetResourcePolicy";

/// Decode a resource policy from a raw admission object
pub fn decode_resource_policy(value: &Value) -> Result<VirtualMachineSetResourcePolicy> {
    match value.get("kind").and_then(Value::as_str) {
        Some(KIND) | None => {}
        Some(other) => return Err(Error::UnsupportedKind(other.to_string())),
    }

    serde_json::from_value(value.clone())
        .map_err(|e| Error::Decode(format!("invalid {}: {}", KIND, e)))
}

/// Validate a new resource policy.
///
/// Fails only when the object cannot be decoded; field problems are reported
/// in the response.
pub fn validate_create(obj: &Value) -> Result<ValidationResponse> {
    let policy = decode_resource_policy(obj)?;
    let errors = validate_spec(&policy);
    debug!(errors = errors.len(), "Validated {} create", KIND);
    Ok(ValidationResponse::from_errors(errors))
}

/// Validate a change to an existing resource policy
pub fn validate_update(obj: &Value, old_obj: &Value) -> Result<ValidationResponse> {
    let policy = decode_resource_policy(obj)?;
    let old = decode_resource_policy(old_obj)?;
    let errors = validate_allowed_changes(&policy, &old);
    debug!(errors = errors.len(), "Validated {} update", KIND);
    Ok(ValidationResponse::from_errors(errors))
}

/// Deletes are always allowed
pub fn validate_delete(_obj: &Value) -> ValidationResponse {
    ValidationResponse::allowed()
}

fn validate_spec(policy: &VirtualMachineSetResourcePolicy) -> Vec<FieldError> {
    let mut errors = validate_resource_pool("spec.resourcePool", &policy.spec.resource_pool);
    errors.extend(validate_cluster_modules(
        "spec.clusterModuleGroups",
        &policy.spec.cluster_module_groups,
    ));
    errors
}

fn validate_resource_pool(path: &str, pool: &ResourcePoolSpec) -> Vec<FieldError> {
    [
        validate_reservation_and_limit(
            path,
            "cpu",
            pool.reservations.cpu.as_ref(),
            pool.limits.cpu.as_ref(),
        ),
        validate_reservation_and_limit(
            path,
            "memory",
            pool.reservations.memory.as_ref(),
            pool.limits.memory.as_ref(),
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Reservation must not exceed limit; unset or zero on either side skips the check
fn validate_reservation_and_limit(
    path: &str,
    resource: &str,
    reservation: Option<&Quantity>,
    limit: Option<&Quantity>,
) -> Option<FieldError> {
    let (Some(reservation), Some(limit)) = (reservation, limit) else {
        return None;
    };

    let reservation_path = format!("{}.reservations.{}", path, resource);
    let limit_path = format!("{}.limits.{}", path, resource);

    let parsed = |q: &Quantity| quantity_value(&q.0);
    let (reservation_value, limit_value) = match (parsed(reservation), parsed(limit)) {
        (Ok(r), Ok(l)) => (r, l),
        (Err(e), _) => {
            return Some(FieldError::invalid(reservation_path, quoted(&reservation.0), e.to_string()))
        }
        (_, Err(e)) => return Some(FieldError::invalid(limit_path, quoted(&limit.0), e.to_string())),
    };

    if reservation_value == 0 || limit_value == 0 || reservation_value <= limit_value {
        return None;
    }

    Some(FieldError::invalid(
        reservation_path,
        quoted(&reservation.0),
        "reservation value cannot exceed the limit value",
    ))
}

fn validate_cluster_modules(path: &str, groups: &[String]) -> Vec<FieldError> {
    let mut seen = HashSet::new();
    groups
        .iter()
        .enumerate()
        .filter(|(_, name)| !seen.insert(name.as_str()))
        .map(|(i, name)| FieldError::duplicate(format!("{}[{}]", path, i), quoted(name)))
        .collect()
}

fn validate_allowed_changes(
    policy: &VirtualMachineSetResourcePolicy,
    old: &VirtualMachineSetResourcePolicy,
) -> Vec<FieldError> {
    let (new, old) = (&policy.spec, &old.spec);
    [
        immutable("spec.resourcePool", &new.resource_pool, &old.resource_pool),
        immutable("spec.folder", &new.folder, &old.folder),
        immutable(
            "spec.clusterModuleGroups",
            &new.cluster_module_groups,
            &old.cluster_module_groups,
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn immutable<T: PartialEq + Serialize>(path: &str, new: &T, old: &T) -> Option<FieldError> {
    if new == old {
        return None;
    }
    let value = serde_json::to_string(new).unwrap_or_default();
    Some(FieldError::invalid(path, value, "field is immutable"))
}

fn quoted(s: &str) -> String {
    format!("{:?}", s)
}
