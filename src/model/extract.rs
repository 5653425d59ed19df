//! Field descriptor extraction: annotation strings -> [`FieldDescriptor`].

use crate::case::{strip_id_suffix, to_snake_case};
use crate::error::ConfigError;
use crate::model::{Capability, FieldDef, FieldDescriptor};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn matches(cell: &'static OnceLock<Option<Regex>>, pattern: &str, s: &str) -> bool {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(s))
}

/// Storage names end up in SQL text, so only plain identifiers are accepted.
pub fn is_identifier(s: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    matches(&RE, r"^[A-Za-z_][A-Za-z0-9_]*$", s)
}

/// SQL type names for `type:` tags, e.g. `timestamptz`, `double precision`, `text[]`.
fn is_sql_type(s: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    matches(&RE, r"^[A-Za-z_][A-Za-z0-9_ ]*(\[\])?$", s)
}

/// Parse one field's annotations. Unrecognized tokens are ignored.
pub fn extract_field(entity: &str, def: &FieldDef) -> Result<FieldDescriptor, ConfigError> {
    let capabilities: BTreeSet<Capability> = def
        .crud
        .split(',')
        .map(str::trim)
        .filter_map(Capability::from_tag)
        .collect();

    let mut storage_name = None;
    let mut unique = false;
    let mut default_value = None;
    let mut foreign_key = None;
    let mut sql_type = None;
    for token in def.storage.split(';').map(str::trim).filter(|t| !t.is_empty()) {
        let (key, value) = match token.split_once(':') {
            Some((k, v)) => (k.trim(), Some(v.trim())),
            None => (token, None),
        };
        match (key, value) {
            ("column", Some(v)) if !v.is_empty() => storage_name = Some(v.to_string()),
            ("unique" | "uniqueIndex", _) => unique = true,
            ("default", Some(v)) => default_value = Some(v.to_string()),
            ("foreignKey", Some(v)) if !v.is_empty() => foreign_key = Some(v.to_string()),
            ("type", Some(v)) => {
                if !is_sql_type(v) {
                    return Err(ConfigError::InvalidIdentifier {
                        entity: entity.to_string(),
                        identifier: v.to_string(),
                    });
                }
                sql_type = Some(v.to_string());
            }
            _ => {}
        }
    }

    let storage_name = storage_name.unwrap_or_else(|| to_snake_case(def.ident));
    if !is_identifier(&storage_name) {
        return Err(ConfigError::InvalidIdentifier {
            entity: entity.to_string(),
            identifier: storage_name,
        });
    }

    Ok(FieldDescriptor {
        ident: def.ident.to_string(),
        name: def.name.to_string(),
        storage_name,
        kind: def.kind,
        unique,
        default_value,
        sql_type,
        capabilities,
        foreign_key,
    })
}

/// Related entity name for a foreign-key field name: `RoleID` -> `role`,
/// `owner_id` -> `owner`. A name without the identifier suffix is a model error.
pub fn association_name(entity: &str, field: &str, foreign_key: &str) -> Result<String, ConfigError> {
    strip_id_suffix(foreign_key)
        .map(to_snake_case)
        .ok_or_else(|| ConfigError::MalformedForeignKey {
            entity: entity.to_string(),
            field: field.to_string(),
            foreign_key: foreign_key.to_string(),
        })
}
