//! The record query scoper.
//!
//! Produces the predicate restricting which records a principal's list,
//! search and bulk-export operations may traverse. It narrows what the
//! authorization engine already allowed; it never replaces it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  identity::{Principal, Role},
  record::MedicalRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "patient_id", rename_all = "snake_case")]
pub enum RecordScope {
  /// Every record of every patient.
  All,
  /// Records whose subject is this patient profile.
  Patient(Uuid),
  /// The empty set.
  Nothing,
}

/// The scope for `principal`. A patient without a profile sees nothing
/// rather than an error.
pub fn scope_for(principal: &Principal) -> RecordScope {
  match principal.role {
    Role::Admin | Role::Doctor => RecordScope::All,
    Role::Patient => principal
      .patient_id()
      .map_or(RecordScope::Nothing, RecordScope::Patient),
  }
}

impl RecordScope {
  pub fn permits(&self, record: &MedicalRecord) -> bool {
    match self {
      Self::All => true,
      Self::Patient(id) => record.patient_id == *id,
      Self::Nothing => false,
    }
  }

  /// Intersect with an explicit patient filter.
  pub fn narrow(self, patient_id: Uuid) -> Self {
    match self {
      Self::All => Self::Patient(patient_id),
      Self::Patient(id) if id == patient_id => self,
      Self::Patient(_) | Self::Nothing => Self::Nothing,
    }
  }

  pub fn is_empty(&self) -> bool { matches!(self, Self::Nothing) }
}
