//! The export interface handed to a document-rendering collaborator.
//!
//! The controller assembles read-only snapshots and passes them to a
//! [`Renderer`]; the rendered bytes are returned to the caller unmodified.

use bytes::Bytes;
use serde::Serialize;

use crate::{
  identity::{Actor, DoctorProfile, PatientProfile},
  record::{MedicalRecord, MedicalTest},
};

/// The patient whose records are being exported.
#[derive(Debug, Clone, Serialize)]
pub struct PatientSnapshot {
  pub actor:   Actor,
  pub profile: PatientProfile,
}

/// The doctor who authored a record.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorSnapshot {
  pub actor:   Actor,
  pub profile: DoctorProfile,
}

/// One record with everything a document needs to show for it.
#[derive(Debug, Clone, Serialize)]
pub struct RecordSnapshot {
  pub record: MedicalRecord,
  /// `None` when the record has no known author.
  pub author: Option<AuthorSnapshot>,
  pub tests:  Vec<MedicalTest>,
}

/// Opaque output of a renderer.
#[derive(Debug, Clone)]
pub struct Rendered {
  pub media_type: &'static str,
  /// File extension without the leading dot.
  pub extension:  &'static str,
  pub body:       Bytes,
}

/// A rendered document ready to be served as a download.
#[derive(Debug, Clone)]
pub struct Artifact {
  pub file_name:  String,
  pub media_type: &'static str,
  pub body:       Bytes,
}

/// A pure function from snapshots to a document. Failures must not have side
/// effects on persisted state.
pub trait Renderer: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn render(
    &self,
    patient: &PatientSnapshot,
    records: &[RecordSnapshot],
  ) -> Result<Rendered, Self::Error>;
}
