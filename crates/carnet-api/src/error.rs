//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use carnet_core::{Error as CoreError, access::Denial};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] CoreError),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("password hashing failed: {0}")]
  Hashing(String),
}

impl ApiError {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Core(CoreError::StoreUnavailable(Box::new(e)))
  }

  pub fn status(&self) -> StatusCode {
    match self {
      Self::Core(e) => match e {
        CoreError::Denied(Denial::Unauthenticated) => StatusCode::UNAUTHORIZED,
        CoreError::Denied(_) => StatusCode::FORBIDDEN,
        CoreError::MissingPatientReference
        | CoreError::InvalidRecordType(_)
        | CoreError::InvalidField { .. } => StatusCode::BAD_REQUEST,
        CoreError::EmailTaken | CoreError::DuplicateLicense(_) => StatusCode::CONFLICT,
        CoreError::PatientNotFound(_) | CoreError::RecordNotFound(_) => StatusCode::NOT_FOUND,
        CoreError::ProfileMissing(_) | CoreError::RenderFailure(_) => {
          StatusCode::INTERNAL_SERVER_ERROR
        }
        CoreError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      },
      Self::BadRequest(_) => StatusCode::BAD_REQUEST,
      Self::Hashing(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// Stable snake_case identifier carried in the `error` field.
  pub fn code(&self) -> &'static str {
    match self {
      Self::Core(e) => e.code(),
      Self::BadRequest(_) => "bad_request",
      Self::Hashing(_) => "internal",
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    let mut res =
      (status, Json(json!({ "error": self.code(), "message": self.to_string() })))
        .into_response();
    if status == StatusCode::UNAUTHORIZED {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"carnet\""),
      );
    }
    res
  }
}
