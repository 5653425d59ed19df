//! Bind serde_json::Value parameters with concrete PostgreSQL types.

use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;

pub type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// Bind one value by its JSON type. Builder placeholders carry the column cast,
/// so the bound type only has to convert explicitly to the column type.
pub fn bind_value<'q>(query: PgQuery<'q>, v: &Value) -> PgQuery<'q> {
    match v {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => query.bind(s.clone()),
        Value::Array(_) | Value::Object(_) => query.bind(sqlx::types::Json(v.clone())),
    }
}

pub fn bind_all<'q>(sql: &'q str, params: &[Value]) -> PgQuery<'q> {
    params.iter().fold(sqlx::query(sql), bind_value)
}
