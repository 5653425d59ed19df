//! Configuration: per-registration route options and process settings.

mod options;
mod settings;

pub use options::{HookResult, Interceptor, RouteOptions};
pub(crate) use options::Hooks;
pub use settings::{Settings, DEFAULT_BIND_ADDR, DEFAULT_MAX_CONNECTIONS};
