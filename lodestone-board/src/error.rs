use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::render::RenderError;

/// API error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
  pub error: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub details: Option<String>,
}

impl ErrorResponse {
  pub fn new(error: impl Into<String>) -> Self {
    Self {
      error: error.into(),
      details: None,
    }
  }

  pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
    Self {
      error: error.into(),
      details: Some(details.into()),
    }
  }
}

/// Board error type
#[derive(Debug)]
pub enum AppError {
  ValidationError(String),
  RenderError(RenderError),
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    match self {
      AppError::ValidationError(msg) => {
        tracing::warn!(validation_error = %msg, "Validation failed");
        let error_response = ErrorResponse::with_details("Invalid request", msg);
        (StatusCode::BAD_REQUEST, Json(error_response)).into_response()
      }
      AppError::RenderError(render_err) => {
        // Keep image internals server-side
        tracing::error!(error = %render_err, "Board rendering failed");
        let error_response = ErrorResponse::new("Failed to render board");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(error_response)).into_response()
      }
    }
  }
}

impl From<crate::validation::ValidationError> for AppError {
  fn from(err: crate::validation::ValidationError) -> Self {
    AppError::ValidationError(err.to_string())
  }
}

impl From<RenderError> for AppError {
  fn from(err: RenderError) -> Self {
    AppError::RenderError(err)
  }
}
