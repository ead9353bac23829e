//! The authorization engine.
//!
//! A single table-driven decision over `(principal, resource, operation)`.
//! Every operation in [`crate::service`] consults [`authorize`] before it
//! touches a record; collection operations additionally AND the decision with
//! the predicate from [`crate::scope`].
//!
//! | Role    | Create | Read / DownloadSingle | List / DownloadBulk | Update | Search |
//! |---------|--------|-----------------------|---------------------|--------|--------|
//! | admin   | allow  | allow                 | allow               | allow  | allow  |
//! | doctor  | allow  | allow                 | allow               | allow  | allow  |
//! | patient | deny   | own only              | allow, scoped       | deny   | deny   |
//!
//! A missing principal is always [`Denial::Unauthenticated`].

use thiserror::Error;
use uuid::Uuid;

use crate::{
  identity::{DoctorProfile, PatientProfile, Principal, Role},
  record::MedicalRecord,
};

// ─── Operations ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
  Read,
  List,
  Create,
  Update,
  DownloadSingle,
  DownloadBulk,
  /// Searching the patient population by identity fields.
  Search,
}

// ─── Ownership capability ────────────────────────────────────────────────────

/// Who a resource belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
  /// Owned through a patient profile (medical records, tests).
  Patient(Uuid),
  /// Owned directly by an actor (profiles).
  Actor(Uuid),
}

/// Implemented by every resource the engine can reason about. A resource
/// whose owner cannot be resolved returns `None` and is denied to patients.
pub trait OwnedResource {
  fn owner(&self) -> Option<Owner>;
}

impl OwnedResource for MedicalRecord {
  fn owner(&self) -> Option<Owner> { Some(Owner::Patient(self.patient_id)) }
}

impl OwnedResource for PatientProfile {
  fn owner(&self) -> Option<Owner> { Some(Owner::Actor(self.actor_id)) }
}

impl OwnedResource for DoctorProfile {
  fn owner(&self) -> Option<Owner> { None }
}

// ─── Decision ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Denial {
  #[error("authentication required")]
  Unauthenticated,

  #[error("patients may not create medical records")]
  ForbiddenCreate,

  #[error("only doctors may modify medical records")]
  ForbiddenUpdate,

  #[error("access to this resource is not permitted")]
  ForbiddenRead,

  #[error("resource ownership could not be resolved")]
  Unresolvable,
}

impl Denial {
  pub fn code(&self) -> &'static str {
    match self {
      Self::Unauthenticated => "unauthenticated",
      Self::ForbiddenCreate => "forbidden_create",
      Self::ForbiddenUpdate => "forbidden_update",
      Self::ForbiddenRead => "forbidden_read",
      Self::Unresolvable => "unresolvable",
    }
  }
}

/// Decide whether `principal` may perform `operation` on `resource`.
///
/// `resource` is `None` for collection operations and for creation, where no
/// resource exists yet.
pub fn authorize(
  principal: Option<&Principal>,
  resource: Option<&dyn OwnedResource>,
  operation: Operation,
) -> Result<(), Denial> {
  let Some(principal) = principal else {
    return Err(Denial::Unauthenticated);
  };

  match (principal.role, operation) {
    (Role::Admin, _) => Ok(()),
    // Doctors see every patient. Create authorizes the attempt only; the
    // controller validates the named patient.
    (Role::Doctor, _) => Ok(()),
    (Role::Patient, Operation::Create) => Err(Denial::ForbiddenCreate),
    (Role::Patient, Operation::Update) => Err(Denial::ForbiddenUpdate),
    (Role::Patient, Operation::Search) => Err(Denial::ForbiddenRead),
    (Role::Patient, Operation::List | Operation::DownloadBulk) => Ok(()),
    (Role::Patient, Operation::Read | Operation::DownloadSingle) => {
      owns(principal, resource)
    }
  }
}

/// Boolean form of [`authorize`].
pub fn can_access(
  principal: Option<&Principal>,
  resource: Option<&dyn OwnedResource>,
  operation: Operation,
) -> bool {
  authorize(principal, resource, operation).is_ok()
}

fn owns(
  principal: &Principal,
  resource: Option<&dyn OwnedResource>,
) -> Result<(), Denial> {
  let owner = resource
    .and_then(|r| r.owner())
    .ok_or(Denial::Unresolvable)?;

  let is_owner = match owner {
    Owner::Patient(id) => principal.patient_id() == Some(id),
    Owner::Actor(id) => principal.actor_id == id,
  };

  if is_owner { Ok(()) } else { Err(Denial::ForbiddenRead) }
}
