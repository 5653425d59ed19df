//! Dynamic query builder: untrusted query parameters -> whitelisted plan.
//!
//! Only column names taken from entity metadata ever reach SQL text; client
//! values stay in [`Filter::value`] and are bound as parameters.

mod filter;
mod plan;
pub use filter::*;
pub use plan::*;
pub(crate) use plan::first_param;
