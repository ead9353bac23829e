//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with a fixed microsecond width so
//! that lexical order equals chronological order. Calendar dates are stored
//! as `YYYY-MM-DD`. UUIDs are stored as hyphenated lowercase strings.

use std::str::FromStr as _;

use carnet_core::{
  identity::{
    Actor, ClinicalInfo, DoctorProfile, PatientProfile, Practice, Role,
  },
  record::{MedicalRecord, MedicalTest, RecordContent, RecordType},
};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enumerations ────────────────────────────────────────────────────────────

pub fn encode_role(role: Role) -> &'static str {
  match role {
    Role::Patient => "patient",
    Role::Doctor => "doctor",
    Role::Admin => "admin",
  }
}

pub fn decode_role(s: &str) -> Result<Role> {
  Role::from_str(s).map_err(|_| Error::UnknownValue { column: "role", value: s.to_owned() })
}

pub fn encode_record_type(ty: RecordType) -> String { ty.to_string() }

pub fn decode_record_type(s: &str) -> Result<RecordType> {
  RecordType::from_str(s).map_err(|_| Error::UnknownValue {
    column: "record_type",
    value:  s.to_owned(),
  })
}

// ─── Column lists ────────────────────────────────────────────────────────────

pub const ACTOR_COLUMNS: &str = "actor_id, email, role, first_name, last_name, \
   phone_number, date_of_birth, address, created_at, updated_at";

pub const PATIENT_COLUMNS: &str = "patient_id, actor_id, blood_type, height_cm, \
   weight_kg, allergies, chronic_conditions, emergency_contact, emergency_phone, \
   insurance_number";

pub const DOCTOR_COLUMNS: &str = "doctor_id, actor_id, medical_license, \
   specialization, hospital, years_of_experience, is_verified";

pub const RECORD_COLUMNS: &str = "record_id, patient_id, created_by, created_at, \
   record_type, title, description, diagnosis, prescription, notes, attachment, \
   is_emergency";

pub const TEST_COLUMNS: &str = "test_id, record_id, test_name, test_date, result, \
   unit, normal_range, lab_name, attachment";

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from an `actors` row.
pub struct RawActor {
  pub actor_id:      String,
  pub email:         String,
  pub role:          String,
  pub first_name:    String,
  pub last_name:     String,
  pub phone_number:  String,
  pub date_of_birth: Option<String>,
  pub address:       String,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawActor {
  /// Read [`ACTOR_COLUMNS`] starting at column `at`.
  pub fn from_row(row: &rusqlite::Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      actor_id:      row.get(at)?,
      email:         row.get(at + 1)?,
      role:          row.get(at + 2)?,
      first_name:    row.get(at + 3)?,
      last_name:     row.get(at + 4)?,
      phone_number:  row.get(at + 5)?,
      date_of_birth: row.get(at + 6)?,
      address:       row.get(at + 7)?,
      created_at:    row.get(at + 8)?,
      updated_at:    row.get(at + 9)?,
    })
  }

  pub fn into_actor(self) -> Result<Actor> {
    Ok(Actor {
      actor_id:      decode_uuid(&self.actor_id)?,
      email:         self.email,
      role:          decode_role(&self.role)?,
      first_name:    self.first_name,
      last_name:     self.last_name,
      phone_number:  self.phone_number,
      date_of_birth: self.date_of_birth.as_deref().map(decode_date).transpose()?,
      address:       self.address,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `patients` row.
pub struct RawPatient {
  pub patient_id:         String,
  pub actor_id:           String,
  pub blood_type:         String,
  pub height_cm:          Option<f64>,
  pub weight_kg:          Option<f64>,
  pub allergies:          String,
  pub chronic_conditions: String,
  pub emergency_contact:  String,
  pub emergency_phone:    String,
  pub insurance_number:   String,
}

impl RawPatient {
  pub fn from_row(row: &rusqlite::Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      patient_id:         row.get(at)?,
      actor_id:           row.get(at + 1)?,
      blood_type:         row.get(at + 2)?,
      height_cm:          row.get(at + 3)?,
      weight_kg:          row.get(at + 4)?,
      allergies:          row.get(at + 5)?,
      chronic_conditions: row.get(at + 6)?,
      emergency_contact:  row.get(at + 7)?,
      emergency_phone:    row.get(at + 8)?,
      insurance_number:   row.get(at + 9)?,
    })
  }

  pub fn into_patient(self) -> Result<PatientProfile> {
    Ok(PatientProfile {
      patient_id: decode_uuid(&self.patient_id)?,
      actor_id:   decode_uuid(&self.actor_id)?,
      clinical:   ClinicalInfo {
        blood_type:         self.blood_type,
        height_cm:          self.height_cm,
        weight_kg:          self.weight_kg,
        allergies:          self.allergies,
        chronic_conditions: self.chronic_conditions,
        emergency_contact:  self.emergency_contact,
        emergency_phone:    self.emergency_phone,
        insurance_number:   self.insurance_number,
      },
    })
  }
}

/// Raw values read directly from a `doctors` row.
pub struct RawDoctor {
  pub doctor_id:           String,
  pub actor_id:            String,
  pub medical_license:     String,
  pub specialization:      String,
  pub hospital:            String,
  pub years_of_experience: u32,
  pub is_verified:         bool,
}

impl RawDoctor {
  pub fn from_row(row: &rusqlite::Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      doctor_id:           row.get(at)?,
      actor_id:            row.get(at + 1)?,
      medical_license:     row.get(at + 2)?,
      specialization:      row.get(at + 3)?,
      hospital:            row.get(at + 4)?,
      years_of_experience: row.get(at + 5)?,
      is_verified:         row.get(at + 6)?,
    })
  }

  pub fn into_doctor(self) -> Result<DoctorProfile> {
    Ok(DoctorProfile {
      doctor_id:   decode_uuid(&self.doctor_id)?,
      actor_id:    decode_uuid(&self.actor_id)?,
      practice:    Practice {
        medical_license:     self.medical_license,
        specialization:      self.specialization,
        hospital:            self.hospital,
        years_of_experience: self.years_of_experience,
      },
      is_verified: self.is_verified,
    })
  }
}

/// Raw values read directly from a `records` row.
pub struct RawRecord {
  pub record_id:    String,
  pub patient_id:   String,
  pub created_by:   Option<String>,
  pub created_at:   String,
  pub record_type:  String,
  pub title:        String,
  pub description:  String,
  pub diagnosis:    String,
  pub prescription: String,
  pub notes:        String,
  pub attachment:   Option<String>,
  pub is_emergency: bool,
}

impl RawRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:    row.get(0)?,
      patient_id:   row.get(1)?,
      created_by:   row.get(2)?,
      created_at:   row.get(3)?,
      record_type:  row.get(4)?,
      title:        row.get(5)?,
      description:  row.get(6)?,
      diagnosis:    row.get(7)?,
      prescription: row.get(8)?,
      notes:        row.get(9)?,
      attachment:   row.get(10)?,
      is_emergency: row.get(11)?,
    })
  }

  pub fn into_record(self) -> Result<MedicalRecord> {
    Ok(MedicalRecord {
      record_id:  decode_uuid(&self.record_id)?,
      patient_id: decode_uuid(&self.patient_id)?,
      created_by: self.created_by.as_deref().map(decode_uuid).transpose()?,
      created_at: decode_dt(&self.created_at)?,
      content:    RecordContent {
        record_type:  decode_record_type(&self.record_type)?,
        title:        self.title,
        description:  self.description,
        diagnosis:    self.diagnosis,
        prescription: self.prescription,
        notes:        self.notes,
        attachment:   self.attachment,
        is_emergency: self.is_emergency,
      },
    })
  }
}

/// Raw values read directly from a `medical_tests` row.
pub struct RawTest {
  pub test_id:      String,
  pub record_id:    String,
  pub test_name:    String,
  pub test_date:    String,
  pub result:       String,
  pub unit:         String,
  pub normal_range: String,
  pub lab_name:     String,
  pub attachment:   Option<String>,
}

impl RawTest {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      test_id:      row.get(0)?,
      record_id:    row.get(1)?,
      test_name:    row.get(2)?,
      test_date:    row.get(3)?,
      result:       row.get(4)?,
      unit:         row.get(5)?,
      normal_range: row.get(6)?,
      lab_name:     row.get(7)?,
      attachment:   row.get(8)?,
    })
  }

  pub fn into_test(self) -> Result<MedicalTest> {
    Ok(MedicalTest {
      test_id:      decode_uuid(&self.test_id)?,
      record_id:    decode_uuid(&self.record_id)?,
      test_name:    self.test_name,
      test_date:    decode_date(&self.test_date)?,
      result:       self.result,
      unit:         self.unit,
      normal_range: self.normal_range,
      lab_name:     self.lab_name,
      attachment:   self.attachment,
    })
  }
}

/// Lowercased identity fields, one per line, matched by patient search.
///
/// SQLite's `LIKE` only folds ASCII, so folding happens here and in
/// [`like_pattern`].
pub fn search_key(fields: &[&str]) -> String { fields.join("\n").to_lowercase() }

/// `%text%` for a LIKE clause over [`search_key`], with `\` as the escape
/// character.
pub fn like_pattern(text: &str) -> String {
  let escaped = text
    .to_lowercase()
    .replace('\\', "\\\\")
    .replace('%', "\\%")
    .replace('_', "\\_");
  format!("%{escaped}%")
}
