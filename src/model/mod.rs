//! Entity schema description, field descriptor extraction, and the frozen registry.

pub mod types;
pub mod extract;
pub mod resolved;
pub mod registry;

pub use types::*;
pub use extract::*;
pub use resolved::*;
pub use registry::*;
