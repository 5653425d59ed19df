//! Per-registration route options: transaction mode, interceptors and typed hooks.

use crate::error::{ApiError, BoxError};
use crate::query::{ListPlan, ReadPlan};
use crate::service::{Payload, Record, Verb};
use axum::http::request::Parts;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub type HookResult = Result<(), BoxError>;

/// Runs before the pipeline; an `Err` short-circuits with that error's envelope.
pub type Interceptor = Arc<dyn Fn(&mut Parts) -> Result<(), ApiError> + Send + Sync>;

pub(crate) type EntityHook<T> = Arc<dyn Fn(&T) -> HookResult + Send + Sync>;
pub(crate) type EntityMutHook<T> = Arc<dyn Fn(&mut T) -> HookResult + Send + Sync>;
pub(crate) type ReadPlanHook = Arc<dyn Fn(&ReadPlan) -> HookResult + Send + Sync>;
pub(crate) type ListPlanHook = Arc<dyn Fn(&ListPlan) -> HookResult + Send + Sync>;
pub(crate) type RecordHook = Arc<dyn Fn(&mut Record) -> HookResult + Send + Sync>;
pub(crate) type RecordsHook = Arc<dyn Fn(&mut [Record]) -> HookResult + Send + Sync>;
pub(crate) type PayloadHook = Arc<dyn Fn(&Payload) -> HookResult + Send + Sync>;

/// Hook error text is discarded; the client sees the verb's hook-failure code.
pub(crate) struct Hooks<T> {
    pub before_create: Option<EntityMutHook<T>>,
    pub after_create: Option<EntityHook<T>>,
    pub before_get: Option<ReadPlanHook>,
    pub after_get: Option<RecordHook>,
    pub before_list: Option<ListPlanHook>,
    pub after_list: Option<RecordsHook>,
    pub before_update: Option<PayloadHook>,
    pub after_update: Option<PayloadHook>,
    pub before_delete: Option<EntityHook<T>>,
    pub after_delete: Option<EntityHook<T>>,
}

impl<T> Default for Hooks<T> {
    fn default() -> Self {
        Hooks {
            before_create: None,
            after_create: None,
            before_get: None,
            after_get: None,
            before_list: None,
            after_list: None,
            before_update: None,
            after_update: None,
            before_delete: None,
            after_delete: None,
        }
    }
}

/// Options for one entity's routes.
///
/// ```ignore
/// let options = RouteOptions::<User>::new()
///     .transactional(true)
///     .intercept(Verb::Delete, |parts| require_admin(parts))
///     .before_create(|user| {
///         user.email = user.email.to_lowercase();
///         Ok(())
///     });
/// ```
pub struct RouteOptions<T> {
    pub(crate) transactional: bool,
    pub(crate) interceptors: BTreeMap<Verb, Vec<Interceptor>>,
    pub(crate) hooks: Hooks<T>,
}

impl<T> Default for RouteOptions<T> {
    fn default() -> Self {
        RouteOptions {
            transactional: false,
            interceptors: BTreeMap::new(),
            hooks: Hooks::default(),
        }
    }
}

impl<T> fmt::Debug for RouteOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteOptions")
            .field("transactional", &self.transactional)
            .field(
                "interceptors",
                &self.interceptors.iter().map(|(v, c)| (*v, c.len())).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl<T> RouteOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run create, update and delete inside one transaction each. Without it
    /// every statement autocommits and a later failure leaves earlier writes in place.
    pub fn transactional(mut self, enabled: bool) -> Self {
        self.transactional = enabled;
        self
    }

    pub fn is_transactional(&self) -> bool {
        self.transactional
    }

    /// Append an interceptor for one verb; interceptors run in insertion order.
    pub fn intercept<F>(mut self, verb: Verb, f: F) -> Self
    where
        F: Fn(&mut Parts) -> Result<(), ApiError> + Send + Sync + 'static,
    {
        self.interceptors.entry(verb).or_default().push(Arc::new(f));
        self
    }

    pub fn interceptors(&self, verb: Verb) -> &[Interceptor] {
        self.interceptors.get(&verb).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn before_create<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut T) -> HookResult + Send + Sync + 'static,
    {
        self.hooks.before_create = Some(Arc::new(f));
        self
    }

    pub fn after_create<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> HookResult + Send + Sync + 'static,
    {
        self.hooks.after_create = Some(Arc::new(f));
        self
    }

    pub fn before_get<F>(mut self, f: F) -> Self
    where
        F: Fn(&ReadPlan) -> HookResult + Send + Sync + 'static,
    {
        self.hooks.before_get = Some(Arc::new(f));
        self
    }

    pub fn after_get<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Record) -> HookResult + Send + Sync + 'static,
    {
        self.hooks.after_get = Some(Arc::new(f));
        self
    }

    pub fn before_list<F>(mut self, f: F) -> Self
    where
        F: Fn(&ListPlan) -> HookResult + Send + Sync + 'static,
    {
        self.hooks.before_list = Some(Arc::new(f));
        self
    }

    pub fn after_list<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut [Record]) -> HookResult + Send + Sync + 'static,
    {
        self.hooks.after_list = Some(Arc::new(f));
        self
    }

    pub fn before_update<F>(mut self, f: F) -> Self
    where
        F: Fn(&Payload) -> HookResult + Send + Sync + 'static,
    {
        self.hooks.before_update = Some(Arc::new(f));
        self
    }

    pub fn after_update<F>(mut self, f: F) -> Self
    where
        F: Fn(&Payload) -> HookResult + Send + Sync + 'static,
    {
        self.hooks.after_update = Some(Arc::new(f));
        self
    }

    pub fn before_delete<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> HookResult + Send + Sync + 'static,
    {
        self.hooks.before_delete = Some(Arc::new(f));
        self
    }

    pub fn after_delete<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> HookResult + Send + Sync + 'static,
    {
        self.hooks.after_delete = Some(Arc::new(f));
        self
    }
}
