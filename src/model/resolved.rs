//! Resolved entity metadata: field descriptors flattened into per-operation sets.

use crate::model::FieldKind;
use std::collections::{BTreeMap, BTreeSet};

/// Per-operation permission flag on a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    RequiredOnCreate,
    PartialUpdate,
    AllowGet,
}

impl Capability {
    pub fn tag(self) -> &'static str {
        match self {
            Capability::RequiredOnCreate => "required_on_create",
            Capability::PartialUpdate => "partial_update",
            Capability::AllowGet => "allow_get",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "required_on_create" => Some(Capability::RequiredOnCreate),
            "partial_update" => Some(Capability::PartialUpdate),
            "allow_get" => Some(Capability::AllowGet),
            _ => None,
        }
    }

    /// Rule-map key of the operation this capability governs.
    pub fn operation(self) -> &'static str {
        match self {
            Capability::RequiredOnCreate => "create",
            Capability::PartialUpdate => "update",
            Capability::AllowGet => "get",
        }
    }
}

/// Normalized metadata for one entity field.
#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    pub ident: String,
    pub name: String,
    pub storage_name: String,
    pub kind: FieldKind,
    pub unique: bool,
    pub default_value: Option<String>,
    /// Explicit SQL type from a `type:` tag; otherwise derived from `kind`.
    pub sql_type: Option<String>,
    pub capabilities: BTreeSet<Capability>,
    /// Set on association-holder fields; such fields are not columns.
    pub foreign_key: Option<String>,
}

impl FieldDescriptor {
    pub fn has(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }

    pub fn is_column(&self) -> bool {
        self.foreign_key.is_none()
    }
}

/// Single-hop relation: this entity holds `foreign_key` pointing at `name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Association {
    /// Related entity (table) name; also the key the expansion is inlined under.
    pub name: String,
    /// Local foreign-key field name as declared in the tag.
    pub foreign_key: String,
    /// Storage column holding the foreign key.
    pub column: String,
    /// Logical name of the local foreign-key field, if declared.
    pub field: Option<String>,
}

#[derive(Clone, Debug)]
pub struct EntityMeta {
    pub entity_name: String,
    pub primary_key: String,
    pub soft_delete_column: String,
    pub fields: Vec<FieldDescriptor>,
    pub required_on_create: BTreeSet<String>,
    pub partial_update: BTreeSet<String>,
    pub readable: BTreeSet<String>,
    /// Keys a client may send on create.
    pub creatable: BTreeSet<String>,
    pub associations: BTreeMap<String, Association>,
    /// operation ("create" | "update" | "get") -> field name -> capability tag.
    pub rules: BTreeMap<&'static str, BTreeMap<String, &'static str>>,
    pub has_created_at: bool,
    pub has_updated_at: bool,
}

impl EntityMeta {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_by_column(&self, column: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.is_column() && f.storage_name == column)
    }

    /// Storage column of a logical field name.
    pub fn column_of(&self, name: &str) -> Option<&str> {
        self.field(name)
            .filter(|f| f.is_column())
            .map(|f| f.storage_name.as_str())
    }

    pub fn kind_of_column(&self, column: &str) -> Option<FieldKind> {
        if column == self.primary_key {
            return Some(FieldKind::Integer);
        }
        self.field_by_column(column).map(|f| f.kind)
    }

    pub fn columns(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_column())
    }

    /// Readable fields in declaration order.
    pub fn readable_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| self.readable.contains(&f.name))
    }

    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.unique && f.is_column())
    }

    pub fn association(&self, name: &str) -> Option<&Association> {
        self.associations.get(name)
    }

    pub fn rules(&self, operation: &str) -> Option<&BTreeMap<String, &'static str>> {
        self.rules.get(operation)
    }

    pub fn has_column(&self, column: &str) -> bool {
        column == self.primary_key || self.field_by_column(column).is_some()
    }

    /// Columns the store manages itself; clients and decoded entities never write them.
    pub fn is_system_column(&self, column: &str) -> bool {
        column == self.primary_key
            || column == self.soft_delete_column
            || column == "created_at"
            || column == "updated_at"
    }
}
