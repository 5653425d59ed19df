//! Shared core for all routes: the store and the frozen entity registry.

use crate::error::ConfigError;
use crate::model::{EntityMeta, RegistryBuilder, Registry};
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct CrudCore {
    pub store: Arc<dyn Store>,
    pub registry: Arc<Registry>,
}

impl CrudCore {
    /// Resolve every registered entity once and bind the store. Call before
    /// building any routes.
    pub fn init<S: Store>(store: S, entities: RegistryBuilder) -> Result<Self, ConfigError> {
        let registry = entities.resolve()?;
        tracing::info!(entities = registry.len(), "crud core initialized");
        Ok(CrudCore {
            store: Arc::new(store),
            registry: Arc::new(registry),
        })
    }

    pub fn lookup(&self, entity: &str) -> Result<Arc<EntityMeta>, ConfigError> {
        self.registry
            .lookup(entity)
            .cloned()
            .ok_or_else(|| ConfigError::UnregisteredEntity(entity.to_string()))
    }
}
