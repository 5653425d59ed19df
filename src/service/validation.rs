//! Payload validation against per-operation field sets.

use crate::error::{ApiError, ErrorCode};
use crate::model::{EntityMeta, FieldKind};
use crate::service::decode::coerce;
use crate::service::Payload;
use serde_json::Value;

/// Zero value in the loose sense: null, "", 0, false, empty collections,
/// and objects whose members are all zero.
fn is_zero_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.values().all(is_zero_value),
    }
}

/// Kind-aware zero check. A non-null pointer is never zero, even if it points at a zero value.
pub fn is_zero(kind: FieldKind, v: &Value) -> bool {
    let coerced = coerce(kind, v);
    let v = coerced.as_ref().unwrap_or(v);
    match kind {
        FieldKind::Pointer => v.is_null(),
        FieldKind::Collection => match v {
            Value::Array(a) => a.is_empty(),
            Value::Object(o) => o.is_empty(),
            other => other.is_null(),
        },
        _ => is_zero_value(v),
    }
}

/// Every key must be settable on create.
pub fn check_create_fields(meta: &EntityMeta, payload: &Payload) -> Result<(), ApiError> {
    match payload.keys().find(|k| !meta.creatable.contains(k.as_str())) {
        Some(k) => Err(ApiError::with_message(
            ErrorCode::CreateInvalidField,
            format!("field '{}' cannot be set on create", k),
        )),
        None => Ok(()),
    }
}

/// Every `required_on_create` field must be present and non-zero.
pub fn check_required(meta: &EntityMeta, payload: &Payload) -> Result<(), ApiError> {
    for name in &meta.required_on_create {
        let kind = meta.field(name).map(|f| f.kind).unwrap_or(FieldKind::Pointer);
        let missing = payload.get(name).map_or(true, |v| is_zero(kind, v));
        if missing {
            return Err(ApiError::with_message(
                ErrorCode::CreateMissingField,
                format!("missing required field '{}'", name),
            ));
        }
    }
    Ok(())
}

/// Update payloads must be non-empty and touch only `partial_update` fields.
/// Fields stored in store-managed columns (primary key, timestamps, soft-delete
/// marker) are never client-writable, whatever their tags say.
pub fn check_update_fields(meta: &EntityMeta, payload: &Payload) -> Result<(), ApiError> {
    if payload.is_empty() {
        return Err(ApiError::with_message(ErrorCode::UpdateMissingField, "update payload is empty"));
    }
    let writable = |k: &str| {
        meta.partial_update.contains(k) && !meta.column_of(k).is_some_and(|c| meta.is_system_column(c))
    };
    match payload.keys().find(|k| !writable(k.as_str())) {
        Some(k) => Err(ApiError::with_message(
            ErrorCode::UpdateInvalidField,
            format!("field '{}' cannot be updated", k),
        )),
        None => Ok(()),
    }
}
