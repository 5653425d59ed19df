//! Entity CRUD routes for one registered entity type.

use crate::config::{Interceptor, RouteOptions};
use crate::error::ConfigError;
use crate::handlers;
use crate::model::{is_identifier, Entity};
use crate::service::{EntityService, Verb};
use crate::state::CrudCore;
use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, MethodRouter},
    Router,
};
use std::sync::Arc;

type Chain = Arc<Vec<Interceptor>>;

async fn run_interceptors(State(chain): State<Chain>, req: Request, next: Next) -> Response {
    let (mut parts, body) = req.into_parts();
    for interceptor in chain.iter() {
        if let Err(err) = interceptor(&mut parts) {
            tracing::warn!(code = err.code.code(), path = %parts.uri.path(), "request stopped by interceptor");
            return err.into_response();
        }
    }
    next.run(Request::from_parts(parts, body)).await
}

fn guarded<T: Entity>(
    route: MethodRouter<EntityService<T>>,
    options: &RouteOptions<T>,
    verb: Verb,
) -> MethodRouter<EntityService<T>> {
    let chain = options.interceptors(verb);
    if chain.is_empty() {
        return route;
    }
    let chain: Chain = Arc::new(chain.to_vec());
    route.layer(middleware::from_fn_with_state(chain, run_interceptors))
}

/// `POST /{segment}`, `GET /{segment}`, `GET|PATCH|DELETE /{segment}/:id` for `T`.
/// Fails if `T` was not registered with the core or the segment is not a plain name.
pub fn entity_routes<T: Entity, S>(core: &CrudCore, segment: &str, options: RouteOptions<T>) -> Result<Router<S>, ConfigError>
where
    S: Clone + Send + Sync + 'static,
{
    let segment = segment.trim_matches('/');
    if !segment.split('/').all(|part| is_identifier(&part.replace('-', "_"))) {
        return Err(ConfigError::InvalidSegment(segment.to_string()));
    }

    let collection = guarded(post(handlers::create::<T>), &options, Verb::Create)
        .merge(guarded(get(handlers::list::<T>), &options, Verb::List));
    let item = guarded(get(handlers::read::<T>), &options, Verb::Read)
        .merge(guarded(patch(handlers::update::<T>), &options, Verb::Update))
        .merge(guarded(delete(handlers::delete::<T>), &options, Verb::Delete));

    let service = EntityService::new(core, options)?;
    tracing::info!(entity = T::TABLE, segment, transactional = service.options().is_transactional(), "entity routes mounted");
    Ok(Router::new()
        .route(&format!("/{}", segment), collection)
        .route(&format!("/{}/:id", segment), item)
        .with_state(service))
}
