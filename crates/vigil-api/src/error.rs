//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use vigil_core::ErrorKind;

/// An error returned by an API handler. Thin wrapper over the core taxonomy;
/// the status code follows the error's kind.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub vigil_core::Error);

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match self.0.kind() {
      ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
      ErrorKind::NotFound => StatusCode::NOT_FOUND,
      ErrorKind::Conflict => StatusCode::CONFLICT,
      ErrorKind::Forbidden => StatusCode::FORBIDDEN,
      ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    };

    // Storage details stay in the logs, not in responses.
    let message = match (&self.0, status) {
      (_, StatusCode::INTERNAL_SERVER_ERROR) => {
        tracing::error!(error = %self.0, "request failed");
        "internal error".to_string()
      }
      (e, _) => e.to_string(),
    };

    (status, Json(json!({ "error": message }))).into_response()
  }
}
