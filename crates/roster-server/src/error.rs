//! Error type and axum `IntoResponse` implementation.
//!
//! Outward messages are fixed strings. Details of what was missing or why a
//! backend call failed go to the log, never into the response.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// No valid credentials or token.
  #[error("unauthorized")]
  Unauthorized,

  /// Authenticated, but a policy check failed.
  #[error("forbidden")]
  Forbidden,

  #[error("not found")]
  NotFound,

  #[error("conflict")]
  Conflict,

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("internal error: {0}")]
  Internal(#[source] roster_core::Error),
}

impl From<roster_core::Error> for Error {
  fn from(e: roster_core::Error) -> Self {
    use roster_core::Error as Core;
    match e {
      Core::NotFound(what) => {
        tracing::debug!(%what, "not found");
        Error::NotFound
      }
      Core::DirectoryConflict(what) => {
        tracing::info!(%what, "directory conflict");
        Error::Conflict
      }
      Core::AuthenticationFailed => Error::Unauthorized,
      Core::Unauthorized => Error::Forbidden,
      Core::InvalidInput(msg) => Error::BadRequest(msg),
      other => Error::Internal(other),
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      Error::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_owned()),
      Error::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_owned()),
      Error::NotFound => (StatusCode::NOT_FOUND, "Not Found".to_owned()),
      Error::Conflict => (StatusCode::CONFLICT, "Conflict".to_owned()),
      Error::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      Error::Internal(e) => {
        tracing::error!(error = %e, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_owned())
      }
    };

    let mut res = (status, Json(json!({ "error": message }))).into_response();
    if matches!(self, Error::Unauthorized) {
      res
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    res
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
