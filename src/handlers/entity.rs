//! Entity CRUD handlers: thin adapters from axum extractors to [`EntityService`].

use crate::error::{ApiError, ErrorCode};
use crate::extractors::EntityId;
use crate::model::Entity;
use crate::response;
use crate::service::EntityService;
use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    response::{IntoResponse, Response},
};

type Params = Vec<(String, String)>;

fn query_params(query: Result<Query<Params>, QueryRejection>) -> Result<Params, ApiError> {
    query
        .map(|Query(params)| params)
        .map_err(|e| ApiError::with_message(ErrorCode::InvalidRequest, "malformed query string").caused_by(e))
}

pub async fn create<T: Entity>(State(service): State<EntityService<T>>, body: Bytes) -> Result<Response, ApiError> {
    service.create(&body).await?;
    Ok(response::created().into_response())
}

pub async fn read<T: Entity>(
    State(service): State<EntityService<T>>,
    EntityId(id): EntityId,
    query: Result<Query<Params>, QueryRejection>,
) -> Result<Response, ApiError> {
    let params = query_params(query)?;
    let record = service.read(id, &params).await?;
    Ok(response::ok(record).into_response())
}

pub async fn list<T: Entity>(
    State(service): State<EntityService<T>>,
    query: Result<Query<Params>, QueryRejection>,
) -> Result<Response, ApiError> {
    let params = query_params(query)?;
    let page = service.list(&params).await?;
    Ok(response::ok(page).into_response())
}

pub async fn update<T: Entity>(
    State(service): State<EntityService<T>>,
    EntityId(id): EntityId,
    body: Bytes,
) -> Result<Response, ApiError> {
    let record = service.update(id, &body).await?;
    Ok(response::ok(record).into_response())
}

pub async fn delete<T: Entity>(
    State(service): State<EntityService<T>>,
    EntityId(id): EntityId,
) -> Result<Response, ApiError> {
    service.delete(id).await?;
    Ok(response::no_content())
}
