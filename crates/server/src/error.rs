use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use memorial_core::MemorialError;
use thiserror::Error;

use crate::routes::ErrorResponse;

/// Message shown instead of the real cause when storage fails.
const STORAGE_UNAVAILABLE: &str = "storage unavailable, please retry";

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Memorial(#[from] MemorialError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Memorial(err) => match err {
                MemorialError::UnknownResource { .. } | MemorialError::NotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                MemorialError::Forbidden => StatusCode::FORBIDDEN,
                MemorialError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
        }
    }

    /// What the client gets to read. Server side failures stay in the logs.
    fn public_message(&self) -> String {
        match self {
            ServerError::Memorial(MemorialError::Storage { .. }) => STORAGE_UNAVAILABLE.to_string(),
            ServerError::Memorial(err) => err.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        } else {
            tracing::debug!("request rejected ({status}): {self}");
        }
        let body = ErrorResponse {
            ok: false,
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}
