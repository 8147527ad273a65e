//! HTTP error mapping for the API handlers
//!
//! Every handler returns `Result<_, ApiError>`; the response body is always a
//! JSON object with a single `error` string so the frontend has one shape to
//! handle.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::llm::LlmError;
use crate::whoop::WhoopError;

#[derive(Error, Debug)]
pub enum ApiError {
  #[error(transparent)]
  Whoop(#[from] WhoopError),

  #[error(transparent)]
  Llm(#[from] LlmError),

  #[error("Database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("{0}")]
  BadRequest(String),
}

impl ApiError {
  fn status(&self) -> StatusCode {
    match self {
      ApiError::Whoop(WhoopError::NotAuthenticated) => StatusCode::UNAUTHORIZED,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
