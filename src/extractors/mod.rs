//! Request extractors.

mod id;
pub use id::{parse_id, EntityId};
