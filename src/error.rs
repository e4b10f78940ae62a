use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::auth::AccessError;
use crate::storage::StorageError;

/// StoreError
///
/// Opaque failures bubbling up from a `RecordStore` implementation. The model
/// layer never inspects these; it forwards them as `ModelError::Store`.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("column '{column}' cannot be used on table '{table}'")]
    UnknownColumn { table: &'static str, column: String },

    #[error("relation '{0}' does not support this operation")]
    Unsupported(&'static str),

    #[error("'{table}' already holds a row with this {key}")]
    Duplicate { table: &'static str, key: String },

    #[error("row {id} does not exist in '{table}'")]
    MissingRow { table: &'static str, id: i64 },

    #[error("{0}")]
    Backend(String),
}

/// ModelError
///
/// Every failure a domain entity, association loader or collection operation
/// can report.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("{entity} is not persisted yet")]
    NotPersisted { entity: &'static str },

    #[error("{entity} already exists with id {id}")]
    AlreadyExists { entity: &'static str, id: i64 },

    #[error("{entity} not found for {key} = {value}")]
    NotFound {
        entity: &'static str,
        key: String,
        value: String,
    },

    #[error("{member} is not a member of {collection}")]
    RelationViolation { collection: String, member: String },

    #[error("relation '{0}' must be loaded before it is read")]
    NotLoaded(&'static str),

    #[error("malformed {entity} row: {source}")]
    Malformed {
        entity: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ModelError {
    pub fn status(&self) -> StatusCode {
        match self {
            ModelError::NotFound { .. } => StatusCode::NOT_FOUND,
            ModelError::AlreadyExists { .. } | ModelError::Store(StoreError::Duplicate { .. }) => {
                StatusCode::CONFLICT
            }
            ModelError::NotPersisted { .. } | ModelError::RelationViolation { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ModelError::NotLoaded(_) | ModelError::Malformed { .. } | ModelError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// ApiError
///
/// The error type returned by HTTP handlers. Wraps the domain, storage and
/// authorization errors and renders them as `{ "error": "..." }` bodies.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Model(e) => e.status(),
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Access(e) => e.status(),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type ModelResult<T> = std::result::Result<T, ModelError>;
