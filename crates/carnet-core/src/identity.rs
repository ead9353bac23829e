//! Actors, roles, and role profiles.
//!
//! An actor is the root identity. Patients and doctors additionally own
//! exactly one role profile; administrators own none. The [`Principal`] is
//! the resolved, authenticated handle threaded explicitly through every
//! operation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Role ────────────────────────────────────────────────────────────────────

/// The closed set of roles. Adding a role is a compile-checked change to the
/// decision table in [`crate::access`].
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
  strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  Patient,
  Doctor,
  Admin,
}

// ─── Actor ───────────────────────────────────────────────────────────────────

/// An identity with a unique email and exactly one role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
  pub actor_id:      Uuid,
  pub email:         String,
  pub role:          Role,
  pub first_name:    String,
  pub last_name:     String,
  pub phone_number:  String,
  pub date_of_birth: Option<NaiveDate>,
  pub address:       String,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

impl Actor {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
      .trim()
      .to_owned()
  }
}

// ─── Patient profile ─────────────────────────────────────────────────────────

/// Clinical metadata held by a patient profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalInfo {
  pub blood_type:         String,
  /// Height in centimetres.
  pub height_cm:          Option<f64>,
  /// Weight in kilograms.
  pub weight_kg:          Option<f64>,
  pub allergies:          String,
  pub chronic_conditions: String,
  pub emergency_contact:  String,
  pub emergency_phone:    String,
  pub insurance_number:   String,
}

impl ClinicalInfo {
  /// `weight / height_m²`, rounded to two decimals. `None` unless both
  /// measurements are present and the height is positive.
  pub fn body_mass_index(&self) -> Option<f64> {
    let height_cm = self.height_cm.filter(|h| *h > 0.0)?;
    let weight_kg = self.weight_kg?;
    let height_m = height_cm / 100.0;
    let bmi = weight_kg / (height_m * height_m);
    Some((bmi * 100.0).round() / 100.0)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
  pub patient_id: Uuid,
  pub actor_id:   Uuid,
  #[serde(flatten)]
  pub clinical:   ClinicalInfo,
}

impl PatientProfile {
  pub fn body_mass_index(&self) -> Option<f64> {
    self.clinical.body_mass_index()
  }
}

// ─── Doctor profile ──────────────────────────────────────────────────────────

/// Professional details supplied when a doctor registers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Practice {
  /// Globally unique.
  pub medical_license:     String,
  pub specialization:      String,
  #[serde(default)]
  pub hospital:            String,
  #[serde(default)]
  pub years_of_experience: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorProfile {
  pub doctor_id:   Uuid,
  pub actor_id:    Uuid,
  #[serde(flatten)]
  pub practice:    Practice,
  pub is_verified: bool,
}

// ─── Profile ─────────────────────────────────────────────────────────────────

/// The role profile owned by an actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Profile {
  Patient(PatientProfile),
  Doctor(DoctorProfile),
}

impl Profile {
  pub fn reference(&self) -> ProfileRef {
    match self {
      Self::Patient(p) => ProfileRef::Patient(p.patient_id),
      Self::Doctor(d) => ProfileRef::Doctor(d.doctor_id),
    }
  }

  pub fn actor_id(&self) -> Uuid {
    match self {
      Self::Patient(p) => p.actor_id,
      Self::Doctor(d) => d.actor_id,
    }
  }
}

/// A lightweight pointer to a role profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ProfileRef {
  Patient(Uuid),
  Doctor(Uuid),
}

// ─── Principal ───────────────────────────────────────────────────────────────

/// A resolved authenticated actor: `{id, role, profileRef}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
  pub actor_id: Uuid,
  pub role:     Role,
  profile:      Option<ProfileRef>,
}

impl Principal {
  /// Build a principal from an actor and whatever profile the store holds
  /// for it. A profile that does not match the actor's role is dropped, so a
  /// mis-provisioned actor behaves as if it had no profile at all.
  pub fn new(actor: &Actor, profile: Option<&Profile>) -> Self {
    let profile = profile
      .filter(|p| p.actor_id() == actor.actor_id)
      .map(Profile::reference)
      .filter(|r| {
        matches!(
          (actor.role, r),
          (Role::Patient, ProfileRef::Patient(_))
            | (Role::Doctor, ProfileRef::Doctor(_))
        )
      });
    Self { actor_id: actor.actor_id, role: actor.role, profile }
  }

  /// The role profile for this principal.
  ///
  /// `Ok(None)` for administrators, [`Error::ProfileMissing`] for a patient
  /// or doctor that has no profile.
  pub fn profile(&self) -> Result<Option<ProfileRef>> {
    match (self.role, self.profile) {
      (Role::Admin, _) => Ok(None),
      (_, Some(profile)) => Ok(Some(profile)),
      (_, None) => Err(Error::ProfileMissing(self.actor_id)),
    }
  }

  /// The caller's own patient profile id, if it is a provisioned patient.
  pub fn patient_id(&self) -> Option<Uuid> {
    match self.profile {
      Some(ProfileRef::Patient(id)) => Some(id),
      _ => None,
    }
  }

  /// The caller's own doctor profile id, if it is a provisioned doctor.
  pub fn doctor_id(&self) -> Option<Uuid> {
    match self.profile {
      Some(ProfileRef::Doctor(id)) => Some(id),
      _ => None,
    }
  }
}

pub fn role_of(principal: &Principal) -> Role { principal.role }

// ─── Read models ─────────────────────────────────────────────────────────────

/// The caller's own account, as returned by `GET /auth/me` and registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
  pub actor:           Actor,
  pub profile:         Option<Profile>,
  /// Present only for patients with both height and weight recorded.
  pub body_mass_index: Option<f64>,
}

impl Account {
  pub fn new(actor: Actor, profile: Option<Profile>) -> Self {
    let body_mass_index = match &profile {
      Some(Profile::Patient(p)) => p.body_mass_index(),
      _ => None,
    };
    Self { actor, profile, body_mass_index }
  }
}

/// A patient profile together with its owning actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientDetail {
  pub actor:           Actor,
  pub profile:         PatientProfile,
  pub body_mass_index: Option<f64>,
}

impl PatientDetail {
  pub fn new(actor: Actor, profile: PatientProfile) -> Self {
    let body_mass_index = profile.body_mass_index();
    Self { actor, profile, body_mass_index }
  }
}
