//! HTTP mapping of panel errors and the success envelope

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;
use vpspanel_common::api::Envelope;
use vpspanel_common::{Error, ErrorKind};

/// Wraps a panel error for use as a handler error
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidAction | ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
        ErrorKind::DuplicateVps
        | ErrorKind::DuplicateUsername
        | ErrorKind::InvalidTransition
        | ErrorKind::NotRunning => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let message = if kind == ErrorKind::Internal {
            error!("Request failed: {}", self.0);
            "Internal error".to_string()
        } else {
            self.0.to_string()
        };

        let body = Envelope::<()> {
            success: false,
            data: None,
            error: Some(message),
            kind: Some(kind),
        };
        (status_for(kind), Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<Json<Envelope<T>>, ApiError>;

/// `{"success": true, "data": ...}`
pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(Envelope::ok(data)))
}
