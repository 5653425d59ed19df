//! Typed errors and HTTP mapping.
//!
//! Public failures carry a numeric [`ErrorCode`] grouped by operation family.
//! Internal causes ride along in [`ApiError`] for server-side logging only and
//! never reach the response body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("entity '{entity}': foreign key '{foreign_key}' on field '{field}' must end in ID or _id")]
    MalformedForeignKey {
        entity: String,
        field: String,
        foreign_key: String,
    },
    #[error("entity '{entity}': '{identifier}' is not a valid storage identifier")]
    InvalidIdentifier { entity: String, identifier: String },
    #[error("entity '{entity}': field '{field}' declared twice")]
    DuplicateField { entity: String, field: String },
    #[error("entity '{0}' registered twice")]
    DuplicateEntity(String),
    #[error("entity '{0}' is not registered")]
    UnregisteredEntity(String),
    #[error("invalid route segment '{0}'")]
    InvalidSegment(String),
    #[error("settings: {0}")]
    Settings(String),
}

macro_rules! error_codes {
    ($($name:ident = $code:literal => ($status:ident, $message:literal),)*) => {
        /// Public error codes. Families: 1xxx generic, 2xxx database, 3xxx create,
        /// 4xxx read, 5xxx update, 6xxx delete, 7xxx validation, 8xxx business.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum ErrorCode {
            $($name = $code,)*
        }

        impl ErrorCode {
            /// Look up a code; unknown codes fall back to [`ErrorCode::Internal`].
            pub fn from_code(code: u16) -> Self {
                match code {
                    $($code => ErrorCode::$name,)*
                    _ => ErrorCode::Internal,
                }
            }

            pub fn status(self) -> StatusCode {
                match self {
                    $(ErrorCode::$name => StatusCode::$status,)*
                }
            }

            pub fn message(self) -> &'static str {
                match self {
                    $(ErrorCode::$name => $message,)*
                }
            }
        }
    };
}

error_codes! {
    Internal = 1000 => (INTERNAL_SERVER_ERROR, "internal server error"),
    InvalidRequest = 1001 => (BAD_REQUEST, "invalid request"),
    Unauthorized = 1002 => (UNAUTHORIZED, "unauthorized"),
    Forbidden = 1003 => (FORBIDDEN, "forbidden"),
    Timeout = 1004 => (GATEWAY_TIMEOUT, "operation timed out"),
    TooManyRequests = 1005 => (TOO_MANY_REQUESTS, "too many requests"),
    InvalidConfig = 1006 => (INTERNAL_SERVER_ERROR, "invalid configuration"),

    DbConnection = 2000 => (INTERNAL_SERVER_ERROR, "database connection error"),
    DbQuery = 2001 => (INTERNAL_SERVER_ERROR, "database query error"),
    DbExecution = 2002 => (INTERNAL_SERVER_ERROR, "database execution error"),
    DbTransaction = 2003 => (INTERNAL_SERVER_ERROR, "database transaction error"),
    DbLock = 2004 => (INTERNAL_SERVER_ERROR, "database lock error"),
    DbTimeout = 2005 => (INTERNAL_SERVER_ERROR, "database operation timed out"),
    DbConstraint = 2006 => (BAD_REQUEST, "database constraint violated"),

    CreateGeneral = 3000 => (INTERNAL_SERVER_ERROR, "failed to create resource"),
    CreateDuplicate = 3001 => (CONFLICT, "resource already exists"),
    CreateValidation = 3002 => (BAD_REQUEST, "create validation failed"),
    CreateMissingField = 3003 => (BAD_REQUEST, "missing required field"),
    CreateInvalidField = 3004 => (BAD_REQUEST, "invalid field value"),
    CreateRelation = 3005 => (BAD_REQUEST, "failed to create relation"),
    CreateHookFailure = 3006 => (INTERNAL_SERVER_ERROR, "create hook failed"),

    ReadGeneral = 4000 => (INTERNAL_SERVER_ERROR, "failed to read resource"),
    ReadNotFound = 4001 => (NOT_FOUND, "resource not found"),
    ReadPermission = 4002 => (FORBIDDEN, "not allowed to read resource"),
    ReadInvalidId = 4003 => (BAD_REQUEST, "invalid resource id"),
    ReadFilter = 4004 => (BAD_REQUEST, "invalid filter"),
    ReadPagination = 4005 => (BAD_REQUEST, "invalid pagination"),
    ReadSort = 4006 => (BAD_REQUEST, "invalid sort parameter"),
    ReadRelation = 4007 => (BAD_REQUEST, "unknown relation"),
    ReadHookFailure = 4008 => (INTERNAL_SERVER_ERROR, "read hook failed"),
    ReadMissingField = 4009 => (BAD_REQUEST, "missing required field"),
    ReadInvalidField = 4010 => (BAD_REQUEST, "field cannot be read"),

    UpdateGeneral = 5000 => (INTERNAL_SERVER_ERROR, "failed to update resource"),
    UpdateNotFound = 5001 => (NOT_FOUND, "update target not found"),
    UpdateValidation = 5002 => (BAD_REQUEST, "update validation failed"),
    UpdateConflict = 5003 => (CONFLICT, "update conflict"),
    UpdateInvalidField = 5004 => (BAD_REQUEST, "field cannot be updated"),
    UpdateRelation = 5005 => (BAD_REQUEST, "failed to update relation"),
    UpdateConcurrency = 5006 => (CONFLICT, "concurrent update conflict"),
    UpdateHookFailure = 5007 => (INTERNAL_SERVER_ERROR, "update hook failed"),
    UpdateMissingField = 5008 => (BAD_REQUEST, "missing required field"),

    DeleteGeneral = 6000 => (INTERNAL_SERVER_ERROR, "failed to delete resource"),
    DeleteNotFound = 6001 => (NOT_FOUND, "delete target not found"),
    DeleteConstraint = 6002 => (BAD_REQUEST, "delete constraint violated"),
    DeletePermission = 6003 => (FORBIDDEN, "not allowed to delete resource"),
    DeleteRelation = 6004 => (BAD_REQUEST, "failed to delete relation"),
    DeleteProtected = 6005 => (FORBIDDEN, "resource is protected"),
    DeleteHookFailure = 6006 => (INTERNAL_SERVER_ERROR, "delete hook failed"),
    DeleteMissingField = 6007 => (BAD_REQUEST, "missing required field"),

    ValidationGeneral = 7000 => (BAD_REQUEST, "validation failed"),
    ValidationRequired = 7001 => (BAD_REQUEST, "required field missing"),
    ValidationFormat = 7002 => (BAD_REQUEST, "invalid field format"),
    ValidationRange = 7003 => (BAD_REQUEST, "field value out of range"),
    ValidationUnique = 7004 => (BAD_REQUEST, "field value must be unique"),
    ValidationReference = 7005 => (BAD_REQUEST, "reference validation failed"),
    ValidationCustom = 7006 => (BAD_REQUEST, "custom validation failed"),

    BusinessGeneral = 8000 => (BAD_REQUEST, "business rule violated"),
    BusinessState = 8001 => (BAD_REQUEST, "invalid state"),
    BusinessFlow = 8002 => (BAD_REQUEST, "invalid flow"),
    BusinessLimit = 8003 => (BAD_REQUEST, "limit exceeded"),
    BusinessDependency = 8004 => (BAD_REQUEST, "dependency error"),
    BusinessLogic = 8005 => (BAD_REQUEST, "business logic error"),
}

impl ErrorCode {
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Server-side faults are logged at error level with their internal cause.
    pub fn is_internal(self) -> bool {
        self.status().is_server_error()
    }
}

/// A request failure: public code and message, optional internal cause.
#[derive(Error, Debug)]
#[error("{} ({}): {message}", .code.code(), .code.message())]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[source]
    pub internal: Option<BoxError>,
}

impl ApiError {
    pub fn new(code: ErrorCode) -> Self {
        ApiError {
            code,
            message: code.message().to_string(),
            internal: None,
        }
    }

    /// Same code, caller-chosen public message.
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            internal: None,
        }
    }

    /// Attach an internal cause; it is logged, never serialized.
    pub fn caused_by(mut self, err: impl Into<BoxError>) -> Self {
        self.internal = Some(err.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }

    pub fn internal_detail(&self) -> Option<String> {
        self.internal.as_ref().map(|e| e.to_string())
    }
}

impl From<ErrorCode> for ApiError {
    fn from(code: ErrorCode) -> Self {
        ApiError::new(code)
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.code(),
            message: self.message,
        };
        (self.code.status(), Json(body)).into_response()
    }
}
