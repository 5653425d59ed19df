//! In-process store for tests and demos.
//!
//! Tables are created on first use and keyed by entity name; primary keys are
//! assigned sequentially. A transactional session holds the database lock for
//! its whole life and restores a snapshot on rollback, so concurrent
//! transactions are serialized.

use crate::model::EntityMeta;
use crate::query::{Filter, FilterOp, SortOrder};
use crate::store::{Row, SelectQuery, Session, Store, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone, Debug, Default)]
struct Table {
    rows: BTreeMap<i64, Row>,
    last_id: i64,
}

#[derive(Clone, Debug, Default)]
struct MemoryDb {
    tables: HashMap<String, Table>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    db: Arc<Mutex<MemoryDb>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows of a table including soft-deleted ones, in key order.
    pub async fn raw_rows(&self, table: &str) -> Vec<Row> {
        let db = self.db.lock().await;
        db.tables
            .get(table)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn session(&self, transactional: bool) -> Result<Box<dyn Session>, StoreError> {
        if transactional {
            let guard = self.db.clone().lock_owned().await;
            let snapshot = guard.clone();
            Ok(Box::new(MemorySession::Tx { guard, snapshot }))
        } else {
            Ok(Box::new(MemorySession::Direct(self.db.clone())))
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

enum MemorySession {
    Direct(Arc<Mutex<MemoryDb>>),
    Tx {
        guard: OwnedMutexGuard<MemoryDb>,
        snapshot: MemoryDb,
    },
}

impl MemorySession {
    async fn with_db<R>(&mut self, f: impl FnOnce(&mut MemoryDb) -> R + Send) -> R {
        match self {
            MemorySession::Direct(db) => {
                let mut guard = db.lock().await;
                f(&mut guard)
            }
            MemorySession::Tx { guard, .. } => f(guard),
        }
    }
}

fn now() -> Value {
    Value::String(chrono::Utc::now().to_rfc3339())
}

fn is_live(meta: &EntityMeta, row: &Row) -> bool {
    row.get(&meta.soft_delete_column).map_or(true, Value::is_null)
}

fn project(meta: &EntityMeta, row: &Row, columns: &[String]) -> Row {
    if columns.is_empty() {
        let mut out = Row::new();
        for (k, v) in row {
            if k != &meta.soft_delete_column {
                out.insert(k.clone(), v.clone());
            }
        }
        return out;
    }
    columns
        .iter()
        .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
        .collect()
}

fn as_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(_), _) | (_, Value::String(_)) => as_text(a) == as_text(b),
        _ => a == b,
    }
}

fn matches(row: &Row, filter: &Filter) -> bool {
    let cell = row.get(&filter.column).unwrap_or(&Value::Null);
    if filter.op == FilterOp::Eq {
        return loose_eq(cell, &filter.value);
    }
    if cell.is_null() {
        return false;
    }
    let hay = as_text(cell);
    let needle = as_text(&filter.value);
    match filter.op {
        FilterOp::Contains => hay.contains(&needle),
        FilterOp::StartsWith => hay.starts_with(&needle),
        FilterOp::EndsWith => hay.ends_with(&needle),
        FilterOp::Eq => false,
    }
}

fn rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or_default()
            .partial_cmp(&y.as_f64().unwrap_or_default())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)).then_with(|| as_text(a).cmp(&as_text(b))),
    }
}

fn live_matching<'a>(meta: &'a EntityMeta, table: Option<&'a Table>, filters: &'a [Filter]) -> impl Iterator<Item = &'a Row> {
    table
        .into_iter()
        .flat_map(|t| t.rows.values())
        .filter(move |r| is_live(meta, r) && filters.iter().all(|f| matches(r, f)))
}

#[async_trait]
impl Session for MemorySession {
    async fn find_by_id(&mut self, meta: &EntityMeta, id: i64, columns: &[String]) -> Result<Option<Row>, StoreError> {
        Ok(self
            .with_db(|db| {
                db.tables
                    .get(&meta.entity_name)
                    .and_then(|t| t.rows.get(&id))
                    .filter(|r| is_live(meta, r))
                    .map(|r| project(meta, r, columns))
            })
            .await)
    }

    async fn exists_by(&mut self, meta: &EntityMeta, column: &str, value: &Value) -> Result<bool, StoreError> {
        Ok(self
            .with_db(|db| {
                live_matching(meta, db.tables.get(&meta.entity_name), &[])
                    .any(|r| loose_eq(r.get(column).unwrap_or(&Value::Null), value))
            })
            .await)
    }

    async fn count(&mut self, meta: &EntityMeta, filters: &[Filter]) -> Result<u64, StoreError> {
        Ok(self
            .with_db(|db| live_matching(meta, db.tables.get(&meta.entity_name), filters).count() as u64)
            .await)
    }

    async fn select(&mut self, meta: &EntityMeta, query: &SelectQuery) -> Result<Vec<Row>, StoreError> {
        Ok(self
            .with_db(|db| {
                let mut rows: Vec<&Row> = live_matching(meta, db.tables.get(&meta.entity_name), &query.filters).collect();
                // Rows iterate in key order, which is also the unsorted order.
                if let Some(sort) = &query.sort {
                    rows.sort_by(|a, b| {
                        let ord = compare(
                            a.get(&sort.column).unwrap_or(&Value::Null),
                            b.get(&sort.column).unwrap_or(&Value::Null),
                        );
                        match sort.order {
                            SortOrder::Asc => ord,
                            SortOrder::Desc => ord.reverse(),
                        }
                    });
                }
                rows.into_iter()
                    .skip(query.offset as usize)
                    .take(query.limit.map_or(usize::MAX, |n| n as usize))
                    .map(|r| project(meta, r, &query.columns))
                    .collect()
            })
            .await)
    }

    async fn insert(&mut self, meta: &EntityMeta, row: &Row) -> Result<Row, StoreError> {
        Ok(self
            .with_db(|db| {
                let table = db.tables.entry(meta.entity_name.clone()).or_default();
                let requested = row
                    .get(&meta.primary_key)
                    .and_then(Value::as_i64)
                    .filter(|id| *id != 0 && !table.rows.contains_key(id));
                let id = requested.unwrap_or(table.last_id + 1);
                table.last_id = table.last_id.max(id);

                let mut stored = Row::new();
                stored.insert(meta.primary_key.clone(), Value::from(id));
                for field in meta.columns() {
                    let name = &field.storage_name;
                    if meta.is_system_column(name) {
                        continue;
                    }
                    stored.insert(name.clone(), row.get(name).cloned().unwrap_or(Value::Null));
                }
                if meta.has_created_at {
                    stored.insert("created_at".into(), now());
                }
                if meta.has_updated_at {
                    stored.insert("updated_at".into(), now());
                }
                stored.insert(meta.soft_delete_column.clone(), Value::Null);
                table.rows.insert(id, stored.clone());
                stored.remove(&meta.soft_delete_column);
                stored
            })
            .await)
    }

    async fn update(&mut self, meta: &EntityMeta, id: i64, row: &Row) -> Result<u64, StoreError> {
        Ok(self
            .with_db(|db| {
                let Some(stored) = db
                    .tables
                    .get_mut(&meta.entity_name)
                    .and_then(|t| t.rows.get_mut(&id))
                    .filter(|r| is_live(meta, r))
                else {
                    return 0;
                };
                let mut changed = false;
                for (column, v) in row {
                    if meta.is_system_column(column) || meta.field_by_column(column).is_none() {
                        continue;
                    }
                    stored.insert(column.clone(), v.clone());
                    changed = true;
                }
                if !changed {
                    return 0;
                }
                if meta.has_updated_at {
                    stored.insert("updated_at".into(), now());
                }
                1
            })
            .await)
    }

    async fn soft_delete(&mut self, meta: &EntityMeta, id: i64) -> Result<u64, StoreError> {
        Ok(self
            .with_db(|db| {
                match db
                    .tables
                    .get_mut(&meta.entity_name)
                    .and_then(|t| t.rows.get_mut(&id))
                    .filter(|r| is_live(meta, r))
                {
                    Some(stored) => {
                        stored.insert(meta.soft_delete_column.clone(), now());
                        1
                    }
                    None => 0,
                }
            })
            .await)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        if let MemorySession::Tx { mut guard, snapshot } = *self {
            *guard = snapshot;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{resolve_entity, EntitySource, FieldDef, FieldKind};
    use crate::query::Sort;
    use serde_json::json;

    fn fields() -> &'static [FieldDef] {
        const FIELDS: &[FieldDef] = &[
            FieldDef::new("id", "id", FieldKind::Integer).crud("allow_get"),
            FieldDef::new("name", "name", FieldKind::String).crud("required_on_create,allow_get"),
            FieldDef::new("score", "score", FieldKind::Integer).crud("partial_update,allow_get"),
        ];
        FIELDS
    }

    fn meta() -> EntityMeta {
        resolve_entity(&EntitySource {
            table: "players",
            primary_key: "id",
            soft_delete_column: "deleted_at",
            fields,
        })
        .unwrap()
    }

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    async fn seed(store: &MemoryStore, m: &EntityMeta, names: &[(&str, i64)]) {
        let mut s = store.session(false).await.unwrap();
        for (name, score) in names {
            s.insert(m, &row(json!({"id": 0, "name": name, "score": score}))).await.unwrap();
        }
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let m = meta();
        let mut s = store.session(false).await.unwrap();
        let a = s.insert(&m, &row(json!({"name": "a", "score": 1}))).await.unwrap();
        let b = s.insert(&m, &row(json!({"name": "b", "score": 2}))).await.unwrap();
        assert_eq!(a["id"], json!(1));
        assert_eq!(b["id"], json!(2));
        assert!(!b.contains_key("deleted_at"));
    }

    #[tokio::test]
    async fn soft_deleted_rows_are_hidden_but_kept() {
        let store = MemoryStore::new();
        let m = meta();
        seed(&store, &m, &[("a", 1), ("b", 2)]).await;
        let mut s = store.session(false).await.unwrap();
        assert_eq!(s.soft_delete(&m, 1).await.unwrap(), 1);
        assert_eq!(s.soft_delete(&m, 1).await.unwrap(), 0);
        assert!(s.find_by_id(&m, 1, &[]).await.unwrap().is_none());
        assert!(!s.exists_by(&m, "name", &json!("a")).await.unwrap());
        assert_eq!(s.count(&m, &[]).await.unwrap(), 1);
        let raw = store.raw_rows("players").await;
        assert_eq!(raw.len(), 2);
        assert!(raw[0]["deleted_at"].is_string());
    }

    #[tokio::test]
    async fn select_filters_sorts_and_pages() {
        let store = MemoryStore::new();
        let m = meta();
        seed(&store, &m, &[("alpha", 5), ("beta", 9), ("alphabet", 1), ("gamma", 7)]).await;
        let mut s = store.session(false).await.unwrap();
        let query = SelectQuery {
            columns: vec!["name".into()],
            filters: vec![Filter {
                field: "name".into(),
                column: "name".into(),
                op: FilterOp::StartsWith,
                value: json!("alpha"),
            }],
            sort: Some(Sort {
                field: "score".into(),
                column: "score".into(),
                order: SortOrder::Asc,
            }),
            limit: Some(10),
            offset: 0,
        };
        let rows = s.select(&m, &query).await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r["name"].clone()).collect();
        assert_eq!(names, vec![json!("alphabet"), json!("alpha")]);

        let page = SelectQuery {
            limit: Some(2),
            offset: 2,
            ..SelectQuery::default()
        };
        let rows = s.select(&m, &page).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], json!(3));
    }

    #[tokio::test]
    async fn rollback_restores_snapshot() {
        let store = MemoryStore::new();
        let m = meta();
        seed(&store, &m, &[("a", 1)]).await;
        let mut tx = store.session(true).await.unwrap();
        tx.insert(&m, &row(json!({"name": "b", "score": 2}))).await.unwrap();
        tx.update(&m, 1, &row(json!({"score": 50}))).await.unwrap();
        tx.rollback().await.unwrap();

        let mut s = store.session(false).await.unwrap();
        assert_eq!(s.count(&m, &[]).await.unwrap(), 1);
        let a = s.find_by_id(&m, 1, &["score".into()]).await.unwrap().unwrap();
        assert_eq!(a["score"], json!(1));
    }

    #[tokio::test]
    async fn commit_keeps_writes() {
        let store = MemoryStore::new();
        let m = meta();
        let mut tx = store.session(true).await.unwrap();
        tx.insert(&m, &row(json!({"name": "b", "score": 2}))).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.raw_rows("players").await.len(), 1);
    }
}
