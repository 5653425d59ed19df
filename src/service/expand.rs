//! One-level association expansion and record projection for read and list.

use crate::model::{EntityMeta, Registry};
use crate::query::ReadPlan;
use crate::service::decode::{record_from_row, record_key};
use crate::service::Record;
use crate::store::{Row, Session};
use serde_json::Value;

/// Columns to fetch for a plan. Never empty, so the store never widens the selection.
pub(crate) fn plan_columns(meta: &EntityMeta, plan: &ReadPlan) -> Vec<String> {
    let cols = plan.columns(meta);
    if cols.is_empty() {
        vec![meta.primary_key.clone()]
    } else {
        cols
    }
}

/// Record holding only the planned fields and expansion helper columns.
pub(crate) fn project(meta: &EntityMeta, plan: &ReadPlan, row: &Row) -> Record {
    let full = record_from_row(meta, row);
    let mut out = Record::new();
    for name in &plan.fields {
        if let Some(v) = full.get(name) {
            out.insert(name.clone(), v.clone());
        }
    }
    for exp in &plan.expand {
        let key = record_key(meta, &exp.column);
        if let Some(v) = full.get(key) {
            out.entry(key.to_string()).or_insert_with(|| v.clone());
        }
    }
    out
}

/// Remove foreign-key columns fetched only to support expansion.
pub(crate) fn strip_helpers(meta: &EntityMeta, plan: &ReadPlan, record: &mut Record) {
    for exp in plan.expand.iter().filter(|e| e.helper) {
        record.remove(record_key(meta, &exp.column));
    }
}

fn as_id(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Inline each planned association under its name. Lookup failures leave the key null.
pub(crate) async fn expand_record(
    session: &mut dyn Session,
    registry: &Registry,
    meta: &EntityMeta,
    plan: &ReadPlan,
    record: &mut Record,
) {
    for exp in &plan.expand {
        let fk = record.get(record_key(meta, &exp.column)).and_then(as_id);
        let value = match (fk, registry.lookup(&exp.name)) {
            (Some(id), Some(related)) => fetch_related(session, related, id).await,
            (None, _) => Value::Null,
            (Some(_), None) => {
                tracing::warn!(association = %exp.name, "related entity is not registered");
                Value::Null
            }
        };
        record.insert(exp.name.clone(), value);
    }
}

async fn fetch_related(session: &mut dyn Session, related: &EntityMeta, id: i64) -> Value {
    let mut columns: Vec<String> = related
        .readable_fields()
        .filter(|f| f.is_column())
        .map(|f| f.storage_name.clone())
        .collect();
    // The key is always selected so a dangling reference yields null, not `{}`.
    let hidden_pk = !columns.contains(&related.primary_key);
    if hidden_pk {
        columns.push(related.primary_key.clone());
    }
    match session.find_by_id(related, id, &columns).await {
        Ok(Some(mut row)) => {
            if hidden_pk {
                row.remove(&related.primary_key);
            }
            Value::Object(record_from_row(related, &row))
        }
        Ok(None) => Value::Null,
        Err(e) => {
            tracing::warn!(association = %related.entity_name, id, error = %e, "expansion failed");
            Value::Null
        }
    }
}
