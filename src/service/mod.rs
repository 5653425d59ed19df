//! Generic operation pipeline: one [`EntityService`] per registered entity
//! runs create, read, list, update and delete against the store.

mod create;
pub mod decode;
mod delete;
mod expand;
mod list;
mod read;
mod state;
pub mod unique;
mod update;
pub mod validation;

pub use state::{RequestState, Stage, Verb};

use crate::config::RouteOptions;
use crate::error::ConfigError;
use crate::model::{Entity, EntityMeta, Registry};
use crate::state::CrudCore;
use crate::store::Store;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Loose client payload keyed by logical field name.
pub type Payload = serde_json::Map<String, Value>;

/// Output record keyed by logical field name.
pub type Record = serde_json::Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub per_page: u64,
    pub current_page: u64,
    pub total_pages: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ListPage {
    pub data: Vec<Record>,
    pub pagination: Pagination,
}

pub struct EntityService<T> {
    store: Arc<dyn Store>,
    registry: Arc<Registry>,
    meta: Arc<EntityMeta>,
    options: Arc<RouteOptions<T>>,
}

impl<T> Clone for EntityService<T> {
    fn clone(&self) -> Self {
        EntityService {
            store: self.store.clone(),
            registry: self.registry.clone(),
            meta: self.meta.clone(),
            options: self.options.clone(),
        }
    }
}

impl<T: Entity> EntityService<T> {
    /// Bind `T` to its resolved metadata. `T` must have been registered.
    pub fn new(core: &CrudCore, options: RouteOptions<T>) -> Result<Self, ConfigError> {
        let meta = core.lookup(T::TABLE)?;
        Ok(EntityService {
            store: core.store.clone(),
            registry: core.registry.clone(),
            meta,
            options: Arc::new(options),
        })
    }

    pub fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    pub fn options(&self) -> &RouteOptions<T> {
        &self.options
    }
}
