//! Static schema types each entity supplies: one [`FieldDef`] per struct field.

use serde::{de::DeserializeOwned, Serialize};

/// Semantic kind of a field, used for zero-value checks and value coercion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Float,
    Bool,
    Struct,
    Pointer,
    Collection,
}

/// Annotated field of an entity.
///
/// `crud` holds the comma-separated capability tags
/// (`required_on_create`, `partial_update`, `allow_get`); `storage` holds the
/// semicolon-separated storage tags (`column:<name>`, `unique`,
/// `default:<value>`, `foreignKey:<FieldName>`).
#[derive(Clone, Copy, Debug)]
pub struct FieldDef {
    /// Rust field identifier.
    pub ident: &'static str,
    /// Logical (JSON) name.
    pub name: &'static str,
    pub kind: FieldKind,
    pub crud: &'static str,
    pub storage: &'static str,
}

impl FieldDef {
    pub const fn new(ident: &'static str, name: &'static str, kind: FieldKind) -> Self {
        FieldDef {
            ident,
            name,
            kind,
            crud: "",
            storage: "",
        }
    }

    pub const fn crud(mut self, tags: &'static str) -> Self {
        self.crud = tags;
        self
    }

    pub const fn storage(mut self, tags: &'static str) -> Self {
        self.storage = tags;
        self
    }
}

/// A record type exposed through the generic CRUD verbs.
///
/// ```ignore
/// #[derive(Default, Serialize, Deserialize)]
/// struct User { id: i64, email: String, role_id: i64 }
///
/// impl Entity for User {
///     const TABLE: &'static str = "users";
///     fn fields() -> &'static [FieldDef] {
///         const FIELDS: &[FieldDef] = &[
///             FieldDef::new("id", "id", FieldKind::Integer).crud("allow_get").storage("column:id"),
///             FieldDef::new("email", "email", FieldKind::String)
///                 .crud("required_on_create,allow_get")
///                 .storage("column:email;unique"),
///             FieldDef::new("role_id", "role_id", FieldKind::Integer).crud("partial_update,allow_get"),
///             FieldDef::new("role", "role", FieldKind::Pointer).storage("foreignKey:RoleID"),
///         ];
///         FIELDS
///     }
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    /// Table name; also the registry key and association target name.
    const TABLE: &'static str;
    const PRIMARY_KEY: &'static str = "id";
    /// Timestamp column set on soft delete; rows with it set are invisible.
    const SOFT_DELETE_COLUMN: &'static str = "deleted_at";

    fn fields() -> &'static [FieldDef];
}

/// Type-erased registration record for one entity.
#[derive(Clone, Copy, Debug)]
pub struct EntitySource {
    pub table: &'static str,
    pub primary_key: &'static str,
    pub soft_delete_column: &'static str,
    pub fields: fn() -> &'static [FieldDef],
}

impl EntitySource {
    pub fn of<T: Entity>() -> Self {
        EntitySource {
            table: T::TABLE,
            primary_key: T::PRIMARY_KEY,
            soft_delete_column: T::SOFT_DELETE_COLUMN,
            fields: T::fields,
        }
    }
}
