//! Weak decoding: loose JSON payloads coerced per field kind, then decoded onto
//! entity types; plus the name <-> storage column mapping of rows.

use crate::error::{ApiError, ErrorCode};
use crate::model::{Entity, EntityMeta, FieldKind};
use crate::service::{Payload, Record};
use crate::store::Row;
use serde_json::{Number, Value};

/// Parse a request body that must be a JSON object.
pub fn parse_payload(body: &[u8]) -> Result<Payload, ApiError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ApiError::with_message(
            ErrorCode::InvalidRequest,
            "request body must be a JSON object",
        )),
        Err(e) => Err(ApiError::with_message(ErrorCode::InvalidRequest, "malformed JSON body").caused_by(e)),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" => Some(true),
        "false" | "f" | "0" => Some(false),
        _ => None,
    }
}

/// Coerce a value to a field kind. `None` means the value cannot represent it.
pub fn coerce(kind: FieldKind, v: &Value) -> Option<Value> {
    if v.is_null() {
        return Some(Value::Null);
    }
    match kind {
        FieldKind::String => match v {
            Value::String(_) => Some(v.clone()),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
        FieldKind::Integer => match v {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(Value::from),
            Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
            Value::Bool(b) => Some(Value::from(i64::from(*b))),
            _ => None,
        },
        FieldKind::Float => match v {
            Value::Number(_) => Some(v.clone()),
            Value::String(s) => s.trim().parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number),
            Value::Bool(b) => Some(Value::from(if *b { 1.0 } else { 0.0 })),
            _ => None,
        },
        FieldKind::Bool => match v {
            Value::Bool(_) => Some(v.clone()),
            Value::String(s) => parse_bool(s).map(Value::Bool),
            Value::Number(n) => n.as_f64().map(|f| Value::Bool(f != 0.0)),
            _ => None,
        },
        FieldKind::Struct => v.is_object().then(|| v.clone()),
        FieldKind::Collection => (v.is_array() || v.is_object()).then(|| v.clone()),
        FieldKind::Pointer => Some(v.clone()),
    }
}

/// Coerce every payload value to its field's kind. Returns the first key that
/// names no field or whose value cannot be coerced.
pub fn coerce_payload(meta: &EntityMeta, payload: &Payload) -> Result<Payload, String> {
    let mut out = Payload::new();
    for (key, v) in payload {
        let field = meta.field(key).filter(|f| f.is_column()).ok_or_else(|| key.clone())?;
        let coerced = coerce(field.kind, v).ok_or_else(|| key.clone())?;
        out.insert(key.clone(), coerced);
    }
    Ok(out)
}

/// Fill absent (or null) fields that declare a `default:` tag.
pub fn apply_defaults(meta: &EntityMeta, payload: &mut Payload) {
    for field in meta.columns() {
        let Some(raw) = field.default_value.as_deref() else { continue };
        if payload.get(&field.name).is_some_and(|v| !v.is_null()) {
            continue;
        }
        let parsed = match field.kind {
            FieldKind::Struct | FieldKind::Collection | FieldKind::Pointer => {
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
            }
            _ => Value::String(raw.to_string()),
        };
        match coerce(field.kind, &parsed) {
            Some(v) => {
                payload.insert(field.name.clone(), v);
            }
            None => tracing::warn!(entity = %meta.entity_name, field = %field.name, default = raw, "default value does not fit field kind"),
        }
    }
}

/// Overlay `values` onto `T::default()` and decode. Nulls on non-pointer
/// fields keep the default.
fn overlay<T: Entity>(meta: &EntityMeta, values: &Payload) -> Result<T, serde_json::Error> {
    let mut base = match serde_json::to_value(T::default())? {
        Value::Object(map) => map,
        _ => Payload::new(),
    };
    for (key, v) in values {
        let pointer = meta.field(key).map_or(true, |f| f.kind == FieldKind::Pointer);
        if v.is_null() && !pointer {
            continue;
        }
        base.insert(key.clone(), v.clone());
    }
    serde_json::from_value(Value::Object(base))
}

/// Decode a create payload onto a fresh entity.
pub fn decode_entity<T: Entity>(meta: &EntityMeta, payload: &Payload) -> Result<T, ApiError> {
    let coerced = coerce_payload(meta, payload).map_err(|field| {
        ApiError::with_message(ErrorCode::CreateInvalidField, format!("invalid value for field '{}'", field))
    })?;
    overlay(meta, &coerced).map_err(|e| ApiError::new(ErrorCode::CreateInvalidField).caused_by(e))
}

/// Decode a stored row onto an entity.
pub fn entity_from_row<T: Entity>(meta: &EntityMeta, row: &Row) -> Result<T, serde_json::Error> {
    overlay(meta, &record_from_row(meta, row))
}

/// Serialize an entity into a storage row.
pub fn entity_to_row<T: Entity>(meta: &EntityMeta, entity: &T) -> Result<Row, serde_json::Error> {
    let value = serde_json::to_value(entity)?;
    let mut row = Row::new();
    let Value::Object(obj) = value else { return Ok(row) };
    if let Some(id) = obj.get(&meta.primary_key) {
        row.insert(meta.primary_key.clone(), id.clone());
    }
    for field in meta.columns() {
        if let Some(v) = obj.get(&field.name) {
            row.insert(field.storage_name.clone(), v.clone());
        }
    }
    Ok(row)
}

/// Logical field names -> storage columns. Keys naming no column are dropped.
pub fn payload_to_row(meta: &EntityMeta, payload: &Payload) -> Row {
    payload
        .iter()
        .filter_map(|(k, v)| meta.column_of(k).map(|c| (c.to_string(), v.clone())))
        .collect()
}

/// Storage columns -> logical field names. Columns without a field keep
/// their name; the soft-delete marker is dropped.
pub fn record_from_row(meta: &EntityMeta, row: &Row) -> Record {
    row.iter()
        .filter(|(c, _)| **c != meta.soft_delete_column)
        .map(|(c, v)| {
            let key = meta.field_by_column(c).map_or(c.as_str(), |f| f.name.as_str());
            (key.to_string(), v.clone())
        })
        .collect()
}

/// Logical key a column appears under in a record.
pub fn record_key<'a>(meta: &'a EntityMeta, column: &'a str) -> &'a str {
    meta.field_by_column(column).map_or(column, |f| f.name.as_str())
}
