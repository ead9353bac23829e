//! Error types for `carnet-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::access::Denial;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  /// The authorization engine refused the operation.
  #[error(transparent)]
  Denied(#[from] Denial),

  #[error("a patient identifier is required")]
  MissingPatientReference,

  #[error("patient not found: {0}")]
  PatientNotFound(Uuid),

  #[error("medical record not found: {0}")]
  RecordNotFound(Uuid),

  /// A patient- or doctor-role actor has no matching profile row.
  #[error("actor {0} has no profile for its role")]
  ProfileMissing(Uuid),

  #[error("invalid record type: {0:?}")]
  InvalidRecordType(String),

  #[error("invalid {field}: {reason}")]
  InvalidField {
    field:  &'static str,
    reason: String,
  },

  #[error("an account with this email already exists")]
  EmailTaken,

  #[error("medical license {0:?} is already registered")]
  DuplicateLicense(String),

  #[error("document rendering failed: {0}")]
  RenderFailure(#[source] BoxError),

  #[error("store unavailable: {0}")]
  StoreUnavailable(#[source] BoxError),
}

impl Error {
  /// Stable snake_case identifier for the error, suitable for API payloads.
  pub fn code(&self) -> &'static str {
    match self {
      Self::Denied(denial) => denial.code(),
      Self::MissingPatientReference => "missing_patient_reference",
      Self::PatientNotFound(_) => "patient_not_found",
      Self::RecordNotFound(_) => "record_not_found",
      Self::ProfileMissing(_) => "profile_missing",
      Self::InvalidRecordType(_) => "invalid_record_type",
      Self::InvalidField { .. } => "invalid_field",
      Self::EmailTaken => "email_taken",
      Self::DuplicateLicense(_) => "duplicate_license",
      Self::RenderFailure(_) => "render_failure",
      Self::StoreUnavailable(_) => "store_unavailable",
    }
  }

  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::StoreUnavailable(Box::new(e))
  }

  pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
    Self::InvalidField { field, reason: reason.into() }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
