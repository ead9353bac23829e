//! Medical records and medical tests.
//!
//! A record belongs to exactly one patient profile and is optionally authored
//! by a doctor profile. The patient link, the author link and `created_at`
//! are stamped once at creation; only [`RecordContent`] ever changes.

use std::str::FromStr as _;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Record type ─────────────────────────────────────────────────────────────

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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordType {
  Consultation,
  Prescription,
  Test,
  Vaccination,
  Surgery,
  Hospitalization,
  Other,
}

impl RecordType {
  /// Parse a client-supplied tag.
  pub fn parse(tag: &str) -> Result<Self> {
    Self::from_str(tag.trim()).map_err(|_| Error::InvalidRecordType(tag.to_owned()))
  }

  /// Human-readable label used in rendered documents.
  pub fn label(&self) -> &'static str {
    match self {
      Self::Consultation => "Consultation",
      Self::Prescription => "Prescription",
      Self::Test => "Medical test",
      Self::Vaccination => "Vaccination",
      Self::Surgery => "Surgery",
      Self::Hospitalization => "Hospitalization",
      Self::Other => "Other",
    }
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// The editable part of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordContent {
  pub record_type:  RecordType,
  pub title:        String,
  pub description:  String,
  pub diagnosis:    String,
  pub prescription: String,
  pub notes:        String,
  /// Reference to an attached file; no binary data lives in the store.
  pub attachment:   Option<String>,
  pub is_emergency: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalRecord {
  pub record_id:  Uuid,
  /// The subject patient profile. Never changes.
  pub patient_id: Uuid,
  /// The authoring doctor profile. May become `None` when the doctor is
  /// removed, but is never reassigned.
  pub created_by: Option<Uuid>,
  /// Server-assigned; never changes after creation.
  pub created_at: DateTime<Utc>,
  #[serde(flatten)]
  pub content:    RecordContent,
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// The mutable fields submitted when creating a record. The record type is
/// kept as the raw tag so that validation happens in the controller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordFields {
  pub record_type:  String,
  pub title:        String,
  pub description:  String,
  pub diagnosis:    String,
  pub prescription: String,
  pub notes:        String,
  pub attachment:   Option<String>,
  pub is_emergency: bool,
}

impl RecordFields {
  pub fn validate(self) -> Result<RecordContent> {
    let record_type = RecordType::parse(&self.record_type)?;
    let content = RecordContent {
      record_type,
      title: self.title.trim().to_owned(),
      description: self.description,
      diagnosis: self.diagnosis,
      prescription: self.prescription,
      notes: self.notes,
      attachment: self.attachment.filter(|a| !a.trim().is_empty()),
      is_emergency: self.is_emergency,
    };
    check_content(&content)?;
    Ok(content)
  }
}

/// A partial update. Only the editable fields exist here, so the patient
/// link, the author and the creation time cannot be expressed at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordPatch {
  pub record_type:  Option<String>,
  pub title:        Option<String>,
  pub description:  Option<String>,
  pub diagnosis:    Option<String>,
  pub prescription: Option<String>,
  pub notes:        Option<String>,
  /// `Some(None)` clears the attachment; a missing key leaves it untouched.
  #[serde(with = "double_option")]
  pub attachment:   Option<Option<String>>,
  pub is_emergency: Option<bool>,
}

impl RecordPatch {
  /// Apply the patch to `current`, returning the validated new content.
  pub fn apply(self, current: &RecordContent) -> Result<RecordContent> {
    let record_type = match self.record_type {
      Some(tag) => RecordType::parse(&tag)?,
      None => current.record_type,
    };
    let content = RecordContent {
      record_type,
      title: self
        .title
        .map(|t| t.trim().to_owned())
        .unwrap_or_else(|| current.title.clone()),
      description: self.description.unwrap_or_else(|| current.description.clone()),
      diagnosis: self.diagnosis.unwrap_or_else(|| current.diagnosis.clone()),
      prescription: self
        .prescription
        .unwrap_or_else(|| current.prescription.clone()),
      notes: self.notes.unwrap_or_else(|| current.notes.clone()),
      attachment: match self.attachment {
        Some(a) => a.filter(|a| !a.trim().is_empty()),
        None => current.attachment.clone(),
      },
      is_emergency: self.is_emergency.unwrap_or(current.is_emergency),
    };
    check_content(&content)?;
    Ok(content)
  }
}

fn check_content(content: &RecordContent) -> Result<()> {
  if content.title.is_empty() {
    return Err(Error::invalid("title", "must not be empty"));
  }
  if content.title.chars().count() > 200 {
    return Err(Error::invalid("title", "must be at most 200 characters"));
  }
  if content.description.trim().is_empty() {
    return Err(Error::invalid("description", "must not be empty"));
  }
  Ok(())
}

mod double_option {
  use serde::{Deserialize, Deserializer, Serialize, Serializer};

  pub fn serialize<S, T>(value: &Option<Option<T>>, s: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
    T: Serialize,
  {
    match value {
      Some(inner) => inner.serialize(s),
      None => s.serialize_none(),
    }
  }

  pub fn deserialize<'de, D, T>(d: D) -> Result<Option<Option<T>>, D::Error>
  where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
  {
    Option::<T>::deserialize(d).map(Some)
  }
}

// ─── Medical tests ───────────────────────────────────────────────────────────

/// A lab result attached to a record. Deleted with its record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalTest {
  pub test_id:      Uuid,
  pub record_id:    Uuid,
  pub test_name:    String,
  pub test_date:    NaiveDate,
  pub result:       String,
  pub unit:         String,
  pub normal_range: String,
  pub lab_name:     String,
  pub attachment:   Option<String>,
}

/// Input to [`crate::service::RecordService::add_test`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTest {
  pub test_name:    String,
  pub test_date:    NaiveDate,
  pub result:       String,
  #[serde(default)]
  pub unit:         String,
  #[serde(default)]
  pub normal_range: String,
  #[serde(default)]
  pub lab_name:     String,
  #[serde(default)]
  pub attachment:   Option<String>,
}

impl NewTest {
  pub fn into_test(self, record_id: Uuid) -> Result<MedicalTest> {
    let test_name = self.test_name.trim().to_owned();
    if test_name.is_empty() {
      return Err(Error::invalid("test_name", "must not be empty"));
    }
    if self.result.trim().is_empty() {
      return Err(Error::invalid("result", "must not be empty"));
    }
    Ok(MedicalTest {
      test_id: Uuid::new_v4(),
      record_id,
      test_name,
      test_date: self.test_date,
      result: self.result,
      unit: self.unit,
      normal_range: self.normal_range,
      lab_name: self.lab_name,
      attachment: self.attachment.filter(|a| !a.trim().is_empty()),
    })
  }
}

// ─── Queries and read models ─────────────────────────────────────────────────

/// Optional filters for record listings. Always combined with a
/// [`crate::scope::RecordScope`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordQuery {
  pub patient_id:  Option<Uuid>,
  pub record_type: Option<RecordType>,
  pub emergency:   Option<bool>,
  pub limit:       Option<usize>,
  pub offset:      Option<usize>,
}

/// A record bundled with its tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDetail {
  #[serde(flatten)]
  pub record: MedicalRecord,
  pub tests:  Vec<MedicalTest>,
}
