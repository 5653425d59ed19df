//! Entity metadata registry: register entity types, resolve once, then read-only.

use crate::case::to_snake_case;
use crate::error::ConfigError;
use crate::model::{
    association_name, extract_field, is_identifier, Association, Capability, Entity, EntityMeta, EntitySource,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Collects entity types before resolution. [`RegistryBuilder::resolve`] consumes
/// the builder, so nothing can be registered into a resolved registry.
#[derive(Default)]
pub struct RegistryBuilder {
    sources: Vec<EntitySource>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Entity>(self) -> Self {
        self.register_source(EntitySource::of::<T>())
    }

    pub fn register_source(mut self, source: EntitySource) -> Self {
        self.sources.push(source);
        self
    }

    /// Extract every registered entity exactly once and freeze the result.
    pub fn resolve(self) -> Result<Registry, ConfigError> {
        let mut entities = HashMap::with_capacity(self.sources.len());
        for source in &self.sources {
            if entities.contains_key(source.table) {
                return Err(ConfigError::DuplicateEntity(source.table.to_string()));
            }
            let meta = resolve_entity(source)?;
            tracing::debug!(
                entity = %meta.entity_name,
                fields = meta.fields.len(),
                readable = meta.readable.len(),
                associations = meta.associations.len(),
                "entity resolved"
            );
            entities.insert(source.table.to_string(), Arc::new(meta));
        }
        Ok(Registry { entities })
    }
}

/// Frozen metadata for all registered entities, keyed by table name.
#[derive(Debug, Default)]
pub struct Registry {
    entities: HashMap<String, Arc<EntityMeta>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn lookup(&self, name: &str) -> Option<&Arc<EntityMeta>> {
        self.entities.get(name)
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Build one entity's metadata from its static field list.
pub fn resolve_entity(source: &EntitySource) -> Result<EntityMeta, ConfigError> {
    let entity = source.table;
    for ident in [source.table, source.primary_key, source.soft_delete_column] {
        if !is_identifier(ident) {
            return Err(ConfigError::InvalidIdentifier {
                entity: entity.to_string(),
                identifier: ident.to_string(),
            });
        }
    }

    let defs = (source.fields)();
    let mut fields = Vec::with_capacity(defs.len());
    for def in defs {
        let mut field = extract_field(entity, def)?;
        if fields.iter().any(|f: &crate::model::FieldDescriptor| f.name == field.name) {
            return Err(ConfigError::DuplicateField {
                entity: entity.to_string(),
                field: field.name,
            });
        }
        if field.foreign_key.is_some() && !field.capabilities.is_empty() {
            tracing::warn!(entity, field = %field.name, "capability tags on association field ignored");
            field.capabilities.clear();
        }
        fields.push(field);
    }

    let mut associations = BTreeMap::new();
    for holder in fields.iter().filter(|f| !f.is_column()) {
        let Some(fk) = holder.foreign_key.as_deref() else { continue };
        let name = association_name(entity, &holder.name, fk)?;
        let fk_snake = to_snake_case(fk);
        let local = fields
            .iter()
            .filter(|f| f.is_column())
            .find(|f| f.ident == fk || f.name == fk || f.storage_name == fk_snake);
        let association = Association {
            name: name.clone(),
            foreign_key: fk.to_string(),
            column: local.map(|f| f.storage_name.clone()).unwrap_or(fk_snake),
            field: local.map(|f| f.name.clone()),
        };
        associations.insert(name, association);
    }

    let mut rules: BTreeMap<&'static str, BTreeMap<String, &'static str>> = ["create", "update", "get"]
        .into_iter()
        .map(|op| (op, BTreeMap::new()))
        .collect();
    let mut required_on_create = BTreeSet::new();
    let mut partial_update = BTreeSet::new();
    let mut readable = BTreeSet::new();
    for field in &fields {
        for cap in &field.capabilities {
            if let Some(rule) = rules.get_mut(cap.operation()) {
                rule.insert(field.name.clone(), cap.tag());
            }
            let set = match cap {
                Capability::RequiredOnCreate => &mut required_on_create,
                Capability::PartialUpdate => &mut partial_update,
                Capability::AllowGet => &mut readable,
            };
            set.insert(field.name.clone());
        }
    }
    let creatable = required_on_create.union(&partial_update).cloned().collect();

    let has_column = |name: &str| fields.iter().any(|f| f.is_column() && f.storage_name == name);
    let has_created_at = has_column("created_at");
    let has_updated_at = has_column("updated_at");

    Ok(EntityMeta {
        entity_name: entity.to_string(),
        primary_key: source.primary_key.to_string(),
        soft_delete_column: source.soft_delete_column.to_string(),
        fields,
        required_on_create,
        partial_update,
        readable,
        creatable,
        associations,
        rules,
        has_created_at,
        has_updated_at,
    })
}
