//! Persistence seam. The pipeline talks to a [`Store`] through [`Session`]s;
//! rows are JSON maps keyed by storage column.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::model::EntityMeta;
use crate::query::{Filter, Sort};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub type Row = serde_json::Map<String, Value>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("insert into {0} returned no row")]
    NoRowReturned(String),
}

/// One list/count query over live rows.
#[derive(Clone, Debug, Default)]
pub struct SelectQuery {
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub sort: Option<Sort>,
    pub limit: Option<u64>,
    pub offset: u64,
}

#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Open a session. A transactional session sees its own writes and
    /// persists them only on [`Session::commit`].
    async fn session(&self, transactional: bool) -> Result<Box<dyn Session>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Every read ignores soft-deleted rows.
#[async_trait]
pub trait Session: Send {
    async fn find_by_id(&mut self, meta: &EntityMeta, id: i64, columns: &[String]) -> Result<Option<Row>, StoreError>;

    async fn exists_by(&mut self, meta: &EntityMeta, column: &str, value: &Value) -> Result<bool, StoreError>;

    async fn count(&mut self, meta: &EntityMeta, filters: &[Filter]) -> Result<u64, StoreError>;

    async fn select(&mut self, meta: &EntityMeta, query: &SelectQuery) -> Result<Vec<Row>, StoreError>;

    /// Insert and return the stored row, primary key included.
    async fn insert(&mut self, meta: &EntityMeta, row: &Row) -> Result<Row, StoreError>;

    /// Returns the number of rows affected.
    async fn update(&mut self, meta: &EntityMeta, id: i64, row: &Row) -> Result<u64, StoreError>;

    /// Sets the soft-delete marker. Returns the number of rows affected.
    async fn soft_delete(&mut self, meta: &EntityMeta, id: i64) -> Result<u64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
