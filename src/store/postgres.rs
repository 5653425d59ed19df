//! PostgreSQL store over a shared `sqlx::PgPool`. Tables must already exist.

use crate::model::EntityMeta;
use crate::query::Filter;
use crate::sql::{self, bind_all, QueryBuf};
use crate::store::{Row, SelectQuery, Session, Store, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow, Postgres};
use sqlx::Transaction;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(PgStore { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn session(&self, transactional: bool) -> Result<Box<dyn Session>, StoreError> {
        if transactional {
            let tx = self.pool.begin().await?;
            tracing::debug!("transaction started");
            Ok(Box::new(PgSession::Tx(tx)))
        } else {
            Ok(Box::new(PgSession::Direct(self.pool.clone())))
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Statements run either straight on the pool or inside one open transaction.
enum PgSession {
    Direct(PgPool),
    Tx(Transaction<'static, Postgres>),
}

impl PgSession {
    async fn fetch_optional(&mut self, q: &QueryBuf) -> Result<Option<Row>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let query = bind_all(&q.sql, &q.params);
        let row = match self {
            PgSession::Direct(pool) => query.fetch_optional(&*pool).await?,
            PgSession::Tx(tx) => query.fetch_optional(&mut **tx).await?,
        };
        Ok(row.map(|r| row_to_map(&r)))
    }

    async fn fetch_all(&mut self, q: &QueryBuf) -> Result<Vec<Row>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let query = bind_all(&q.sql, &q.params);
        let rows = match self {
            PgSession::Direct(pool) => query.fetch_all(&*pool).await?,
            PgSession::Tx(tx) => query.fetch_all(&mut **tx).await?,
        };
        Ok(rows.iter().map(row_to_map).collect())
    }

    async fn execute(&mut self, q: &QueryBuf) -> Result<u64, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let query = bind_all(&q.sql, &q.params);
        let done = match self {
            PgSession::Direct(pool) => query.execute(&*pool).await?,
            PgSession::Tx(tx) => query.execute(&mut **tx).await?,
        };
        Ok(done.rows_affected())
    }
}

#[async_trait]
impl Session for PgSession {
    async fn find_by_id(&mut self, meta: &EntityMeta, id: i64, columns: &[String]) -> Result<Option<Row>, StoreError> {
        self.fetch_optional(&sql::select_by_id(meta, id, columns)).await
    }

    async fn exists_by(&mut self, meta: &EntityMeta, column: &str, value: &Value) -> Result<bool, StoreError> {
        Ok(self.fetch_optional(&sql::select_exists(meta, column, value)).await?.is_some())
    }

    async fn count(&mut self, meta: &EntityMeta, filters: &[Filter]) -> Result<u64, StoreError> {
        let row = self.fetch_optional(&sql::select_count(meta, filters)).await?;
        Ok(row
            .and_then(|r| r.get("total").and_then(Value::as_u64))
            .unwrap_or(0))
    }

    async fn select(&mut self, meta: &EntityMeta, query: &SelectQuery) -> Result<Vec<Row>, StoreError> {
        self.fetch_all(&sql::select_list(meta, query)).await
    }

    async fn insert(&mut self, meta: &EntityMeta, row: &Row) -> Result<Row, StoreError> {
        self.fetch_optional(&sql::insert(meta, row))
            .await?
            .ok_or_else(|| StoreError::NoRowReturned(meta.entity_name.clone()))
    }

    async fn update(&mut self, meta: &EntityMeta, id: i64, row: &Row) -> Result<u64, StoreError> {
        match sql::update(meta, id, row) {
            Some(q) => self.execute(&q).await,
            None => Ok(0),
        }
    }

    async fn soft_delete(&mut self, meta: &EntityMeta, id: i64) -> Result<u64, StoreError> {
        self.execute(&sql::soft_delete(meta, id)).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if let PgSession::Tx(tx) = *self {
            tx.commit().await?;
            tracing::debug!("transaction committed");
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        if let PgSession::Tx(tx) = *self {
            tx.rollback().await?;
            tracing::debug!("transaction rolled back");
        }
        Ok(())
    }
}

fn row_to_map(row: &PgRow) -> Row {
    use sqlx::Column;
    use sqlx::Row as _;
    let mut map = Row::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row as _;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
