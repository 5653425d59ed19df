//! Builds parameterized SELECT, INSERT, UPDATE and soft-delete statements from entity metadata.

use crate::model::{EntityMeta, FieldKind};
use crate::query::Filter;
use crate::store::{Row, SelectQuery};
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from resolved metadata).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf::default()
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }

    /// Placeholder for `v` with a cast for `column`. Nulls become a literal
    /// `NULL` so no typed parameter meets an incompatible column.
    fn placeholder(&mut self, meta: &EntityMeta, column: &str, v: &Value) -> String {
        if v.is_null() {
            return "NULL".to_string();
        }
        let cast = cast_for(meta, column, v);
        let n = self.push_param(v.clone());
        match cast {
            Some(t) => format!("${}::{}", n, t),
            None => format!("${}", n),
        }
    }
}

/// SQL cast for a value bound against `column`: the `type:` tag if present,
/// else derived from the field kind. Pointer fields follow the value's JSON type.
fn cast_for(meta: &EntityMeta, column: &str, v: &Value) -> Option<String> {
    if column == meta.primary_key {
        return Some("bigint".to_string());
    }
    let field = meta.field_by_column(column)?;
    if let Some(t) = &field.sql_type {
        return Some(t.clone());
    }
    let t = match field.kind {
        FieldKind::Integer => "bigint",
        FieldKind::Float => "double precision",
        FieldKind::Bool => "boolean",
        FieldKind::String => "text",
        FieldKind::Struct | FieldKind::Collection => "jsonb",
        FieldKind::Pointer => match v {
            Value::Bool(_) => "boolean",
            Value::Number(n) if n.is_i64() || n.is_u64() => "bigint",
            Value::Number(_) => "double precision",
            Value::String(_) => "text",
            Value::Array(_) | Value::Object(_) => "jsonb",
            Value::Null => return None,
        },
    };
    Some(t.to_string())
}

fn table(meta: &EntityMeta) -> String {
    quoted(&meta.entity_name)
}

fn live(meta: &EntityMeta) -> String {
    format!("{} IS NULL", quoted(&meta.soft_delete_column))
}

/// Column list; an empty request selects the primary key and every column.
fn column_list(meta: &EntityMeta, columns: &[String]) -> String {
    if columns.is_empty() {
        return all_columns(meta);
    }
    columns.iter().map(|c| quoted(c)).collect::<Vec<_>>().join(", ")
}

fn all_columns(meta: &EntityMeta) -> String {
    let mut cols = vec![quoted(&meta.primary_key)];
    cols.extend(
        meta.columns()
            .filter(|f| f.storage_name != meta.primary_key)
            .map(|f| quoted(&f.storage_name)),
    );
    cols.join(", ")
}

fn where_clause(q: &mut QueryBuf, meta: &EntityMeta, filters: &[Filter]) -> String {
    let mut parts = vec![live(meta)];
    for f in filters {
        match f.like_pattern() {
            Some(pattern) => {
                let n = q.push_param(Value::String(pattern));
                parts.push(format!("{}::text LIKE ${} ESCAPE '\\'", quoted(&f.column), n));
            }
            None => {
                let ph = q.placeholder(meta, &f.column, &f.value);
                parts.push(format!("{} = {}", quoted(&f.column), ph));
            }
        }
    }
    format!(" WHERE {}", parts.join(" AND "))
}

/// SELECT one live row by primary key.
pub fn select_by_id(meta: &EntityMeta, id: i64, columns: &[String]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(Value::from(id));
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = ${}::bigint AND {}",
        column_list(meta, columns),
        table(meta),
        quoted(&meta.primary_key),
        n,
        live(meta)
    );
    q
}

/// Probe for any live row with `column = value`.
pub fn select_exists(meta: &EntityMeta, column: &str, value: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(meta, column, value);
    let cond = if ph == "NULL" {
        format!("{} IS NULL", quoted(column))
    } else {
        format!("{} = {}", quoted(column), ph)
    };
    q.sql = format!(
        "SELECT 1 AS found FROM {} WHERE {} AND {} LIMIT 1",
        table(meta),
        cond,
        live(meta)
    );
    q
}

pub fn select_count(meta: &EntityMeta, filters: &[Filter]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let wc = where_clause(&mut q, meta, filters);
    q.sql = format!("SELECT COUNT(*) AS total FROM {}{}", table(meta), wc);
    q
}

/// SELECT with filters, ORDER BY the sort column (primary key as tie-break), LIMIT/OFFSET.
/// Without a sort the order is primary key ascending; `sort_order` only applies to `sort_by`.
pub fn select_list(meta: &EntityMeta, query: &SelectQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let wc = where_clause(&mut q, meta, &query.filters);
    let pk = quoted(&meta.primary_key);
    let order = match &query.sort {
        Some(s) if s.column != meta.primary_key => {
            format!(" ORDER BY {} {}, {} ASC", quoted(&s.column), s.order.as_sql(), pk)
        }
        Some(s) => format!(" ORDER BY {} {}", pk, s.order.as_sql()),
        None => format!(" ORDER BY {} ASC", pk),
    };
    let limit = query.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset = if query.offset > 0 {
        format!(" OFFSET {}", query.offset)
    } else {
        String::new()
    };
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}{}",
        column_list(meta, &query.columns),
        table(meta),
        wc,
        order,
        limit,
        offset
    );
    q
}

/// INSERT the known, non-system columns of `row`. A non-zero primary key is
/// kept; null values are omitted so column defaults apply. Timestamps are set by the database.
pub fn insert(meta: &EntityMeta, row: &Row) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut values = Vec::new();
    if let Some(id) = row.get(&meta.primary_key).filter(|v| v.as_i64().is_some_and(|n| n != 0)) {
        let ph = q.placeholder(meta, &meta.primary_key, id);
        cols.push(quoted(&meta.primary_key));
        values.push(ph);
    }
    for field in meta.columns() {
        let name = &field.storage_name;
        if meta.is_system_column(name) {
            continue;
        }
        let Some(v) = row.get(name).filter(|v| !v.is_null()) else { continue };
        let ph = q.placeholder(meta, name, v);
        cols.push(quoted(name));
        values.push(ph);
    }
    for (flag, column) in [(meta.has_created_at, "created_at"), (meta.has_updated_at, "updated_at")] {
        if flag {
            cols.push(quoted(column));
            values.push("NOW()".to_string());
        }
    }
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table(meta), all_columns(meta))
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table(meta),
            cols.join(", "),
            values.join(", "),
            all_columns(meta)
        )
    };
    q
}

/// UPDATE a live row: SET only the known, non-system columns present in `row`.
/// Returns `None` when nothing would be set.
pub fn update(meta: &EntityMeta, id: i64, row: &Row) -> Option<QueryBuf> {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for (column, v) in row {
        if meta.is_system_column(column) || meta.field_by_column(column).is_none() {
            continue;
        }
        let rhs = q.placeholder(meta, column, v);
        sets.push(format!("{} = {}", quoted(column), rhs));
    }
    if sets.is_empty() {
        return None;
    }
    if meta.has_updated_at {
        sets.push(format!("{} = NOW()", quoted("updated_at")));
    }
    let n = q.push_param(Value::from(id));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${}::bigint AND {}",
        table(meta),
        sets.join(", "),
        quoted(&meta.primary_key),
        n,
        live(meta)
    );
    Some(q)
}

/// Mark a live row deleted.
pub fn soft_delete(meta: &EntityMeta, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(Value::from(id));
    q.sql = format!(
        "UPDATE {} SET {} = NOW() WHERE {} = ${}::bigint AND {}",
        table(meta),
        quoted(&meta.soft_delete_column),
        quoted(&meta.primary_key),
        n,
        live(meta)
    );
    q
}
