//! Routers: per-entity CRUD routes and the ambient health/readiness/version routes.

mod common;
mod entity;

pub use common::common_routes;
pub use entity::entity_routes;
