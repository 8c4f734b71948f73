//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use colloquy_core::{Error, ErrorKind};
use serde_json::json;

/// A domain error crossing the HTTP boundary. The status code comes from
/// the error's [`ErrorKind`]; the message from its `Display`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
  fn from(e: Error) -> Self { Self(e) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match self.0.kind() {
      ErrorKind::NotFound => StatusCode::NOT_FOUND,
      ErrorKind::Conflict => StatusCode::CONFLICT,
      ErrorKind::Forbidden => StatusCode::FORBIDDEN,
      ErrorKind::Validation => StatusCode::BAD_REQUEST,
      ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": self.0.to_string() }))).into_response()
  }
}
