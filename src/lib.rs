//! Schema CRUD: metadata-driven REST endpoints for annotated entities.
//!
//! Register entity types with a [`RegistryBuilder`], bind a [`Store`] through
//! [`CrudCore::init`], then mount [`entity_routes`] per entity and
//! [`common_routes`] once.

pub mod case;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod model;
pub mod query;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{HookResult, Interceptor, RouteOptions, Settings};
pub use error::{ApiError, BoxError, ConfigError, ErrorCode};
pub use model::{Entity, FieldDef, FieldKind, Registry, RegistryBuilder};
pub use routes::{common_routes, entity_routes};
pub use service::{EntityService, ListPage, Pagination, Payload, Record, Verb};
pub use state::CrudCore;
pub use store::{MemoryStore, PgStore, Session, Store, StoreError};
