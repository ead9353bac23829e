//! Account registration: request validation and the store input it produces.
//!
//! Password hashing is the caller's concern; [`Registration::validate`]
//! returns the plaintext password separately so that it never reaches the
//! store.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  identity::{Account, ClinicalInfo, Practice, Role},
};

const MIN_PASSWORD_LEN: usize = 6;

/// Body of a self-service registration request.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
  pub email:            String,
  pub password:         String,
  pub password_confirm: String,
  #[serde(default)]
  pub first_name:       String,
  #[serde(default)]
  pub last_name:        String,
  pub role:             Role,
  #[serde(default)]
  pub phone_number:     String,
  #[serde(default)]
  pub date_of_birth:    Option<NaiveDate>,
  #[serde(default)]
  pub address:          String,
  /// Optional clinical details for patients.
  #[serde(default)]
  pub clinical:         Option<ClinicalInfo>,
  /// Required for doctors.
  #[serde(default)]
  pub practice:         Option<Practice>,
}

/// What the store persists for a new actor. The actor row and its profile
/// row are inserted together or not at all.
#[derive(Debug, Clone, Serialize)]
pub struct NewAccount {
  pub email:         String,
  pub role:          Role,
  pub first_name:    String,
  pub last_name:     String,
  pub phone_number:  String,
  pub date_of_birth: Option<NaiveDate>,
  pub address:       String,
  pub profile:       NewProfile,
}

impl NewAccount {
  /// An administrator account. Only reachable from server tooling, never
  /// from self-service registration.
  pub fn admin(email: &str, first_name: &str, last_name: &str) -> Result<Self> {
    Ok(Self {
      email:         normalize_email(email)?,
      role:          Role::Admin,
      first_name:    first_name.trim().to_owned(),
      last_name:     last_name.trim().to_owned(),
      phone_number:  String::new(),
      date_of_birth: None,
      address:       String::new(),
      profile:       NewProfile::None,
    })
  }
}

/// The role profile created alongside the actor.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NewProfile {
  Patient(ClinicalInfo),
  Doctor(Practice),
  None,
}

/// Outcome of [`crate::store::CarnetStore::register_actor`]. Uniqueness
/// conflicts are ordinary outcomes rather than backend errors.
#[derive(Debug, Clone)]
pub enum Registered {
  Created(Account),
  EmailTaken,
  DuplicateLicense(String),
}

impl Registration {
  /// Check the request and split it into the store input and the password.
  pub fn validate(self) -> Result<(NewAccount, String)> {
    let email = normalize_email(&self.email)?;

    if self.password.chars().count() < MIN_PASSWORD_LEN {
      return Err(Error::invalid(
        "password",
        format!("must be at least {MIN_PASSWORD_LEN} characters"),
      ));
    }
    if self.password != self.password_confirm {
      return Err(Error::invalid("password_confirm", "passwords do not match"));
    }

    let profile = match self.role {
      Role::Patient => NewProfile::Patient(self.clinical.unwrap_or_default()),
      Role::Doctor => {
        let practice = self
          .practice
          .ok_or_else(|| Error::invalid("practice", "required for doctors"))?;
        let medical_license = practice.medical_license.trim().to_owned();
        if medical_license.is_empty() {
          return Err(Error::invalid("medical_license", "must not be empty"));
        }
        if practice.specialization.trim().is_empty() {
          return Err(Error::invalid("specialization", "must not be empty"));
        }
        NewProfile::Doctor(Practice { medical_license, ..practice })
      }
      Role::Admin => {
        return Err(Error::invalid(
          "role",
          "administrators cannot self-register",
        ));
      }
    };

    let account = NewAccount {
      email,
      role: self.role,
      first_name: self.first_name.trim().to_owned(),
      last_name: self.last_name.trim().to_owned(),
      phone_number: self.phone_number.trim().to_owned(),
      date_of_birth: self.date_of_birth,
      address: self.address,
      profile,
    };
    Ok((account, self.password))
  }
}

/// Trim the address and lowercase its domain part.
pub fn normalize_email(email: &str) -> Result<String> {
  let email = email.trim();
  let (local, domain) = email
    .rsplit_once('@')
    .filter(|(l, d)| !l.is_empty() && !d.is_empty())
    .ok_or_else(|| Error::invalid("email", "must be a valid email address"))?;
  Ok(format!("{local}@{}", domain.to_lowercase()))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn registration(role: Role) -> Registration {
    Registration {
      email: " Jane.Doe@Example.COM ".into(),
      password: "s3cret!".into(),
      password_confirm: "s3cret!".into(),
      first_name: "Jane".into(),
      last_name: "Doe".into(),
      role,
      phone_number: String::new(),
      date_of_birth: None,
      address: String::new(),
      clinical: None,
      practice: None,
    }
  }

  #[test]
  fn email_domain_is_lowercased() {
    assert_eq!(
      normalize_email(" Jane.Doe@Example.COM ").unwrap(),
      "Jane.Doe@example.com"
    );
    assert!(normalize_email("no-at-sign").is_err());
    assert!(normalize_email("@example.com").is_err());
  }

  #[test]
  fn patient_gets_patient_profile() {
    let (account, password) = registration(Role::Patient).validate().unwrap();
    assert_eq!(account.email, "Jane.Doe@example.com");
    assert_eq!(password, "s3cret!");
    assert!(matches!(account.profile, NewProfile::Patient(_)));
  }

  #[test]
  fn password_rules() {
    let mut short = registration(Role::Patient);
    short.password = "abc".into();
    short.password_confirm = "abc".into();
    assert!(matches!(
      short.validate(),
      Err(Error::InvalidField { field: "password", .. })
    ));

    let mut mismatch = registration(Role::Patient);
    mismatch.password_confirm = "different".into();
    assert!(matches!(
      mismatch.validate(),
      Err(Error::InvalidField { field: "password_confirm", .. })
    ));
  }

  #[test]
  fn doctor_requires_license() {
    assert!(matches!(
      registration(Role::Doctor).validate(),
      Err(Error::InvalidField { field: "practice", .. })
    ));

    let mut doctor = registration(Role::Doctor);
    doctor.practice = Some(Practice {
      medical_license:     "  CI-4471 ".into(),
      specialization:      "Cardiology".into(),
      hospital:            "CHU de Cocody".into(),
      years_of_experience: 12,
    });
    let (account, _) = doctor.validate().unwrap();
    let NewProfile::Doctor(practice) = account.profile else {
      panic!("expected a doctor profile");
    };
    assert_eq!(practice.medical_license, "CI-4471");
  }

  #[test]
  fn admin_cannot_self_register() {
    assert!(matches!(
      registration(Role::Admin).validate(),
      Err(Error::InvalidField { field: "role", .. })
    ));
  }
}
