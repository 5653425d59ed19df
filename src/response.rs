//! Standard response envelope: `{code, message?, data?}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Serialize)]
pub struct Envelope<T> {
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// Success envelope whose `code` mirrors the HTTP status.
pub fn success<T: Serialize>(status: StatusCode, data: T) -> (StatusCode, Json<Envelope<T>>) {
    (
        status,
        Json(Envelope {
            code: status.as_u16(),
            message: None,
            data: Some(data),
        }),
    )
}

pub fn ok<T: Serialize>(data: T) -> (StatusCode, Json<Envelope<T>>) {
    success(StatusCode::OK, data)
}

/// 201 with `data: true`.
pub fn created() -> (StatusCode, Json<Envelope<bool>>) {
    success(StatusCode::CREATED, true)
}

/// 204, empty body.
pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}
