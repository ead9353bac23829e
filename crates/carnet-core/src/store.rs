//! The `CarnetStore` trait: the persistence collaborator.
//!
//! The trait is implemented by storage backends (e.g. `carnet-store-sqlite`).
//! Higher layers (`carnet-api`, `carnet-server`) depend on this abstraction,
//! not on any concrete backend. Implementations must provide read-after-write
//! consistency and must persist each write method atomically.

use std::future::Future;

use uuid::Uuid;

use crate::{
  identity::{Actor, DoctorProfile, PatientProfile, Profile},
  record::{MedicalRecord, MedicalTest, RecordContent, RecordQuery},
  registration::{NewAccount, Registered},
  scope::RecordScope,
};

/// Abstraction over a Carnet store backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait CarnetStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Actors and profiles ───────────────────────────────────────────────

  /// Look up an actor by its normalized email.
  fn find_actor_by_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<Actor>, Self::Error>> + Send + 'a;

  fn find_actor_by_id(
    &self,
    actor_id: Uuid,
  ) -> impl Future<Output = Result<Option<Actor>, Self::Error>> + Send + '_;

  /// The actor together with its stored password hash (a PHC string).
  fn find_credentials<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<(Actor, String)>, Self::Error>> + Send + 'a;

  /// The role profile owned by `actor_id`, if any.
  fn find_profile_by_actor(
    &self,
    actor_id: Uuid,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;

  fn find_patient_by_id(
    &self,
    patient_id: Uuid,
  ) -> impl Future<Output = Result<Option<PatientProfile>, Self::Error>> + Send + '_;

  fn find_doctor_by_id(
    &self,
    doctor_id: Uuid,
  ) -> impl Future<Output = Result<Option<DoctorProfile>, Self::Error>> + Send + '_;

  /// Insert an actor and its role profile in one transaction.
  ///
  /// Uniqueness conflicts on the email or the medical license are reported
  /// through [`Registered`], not as errors.
  fn register_actor(
    &self,
    account: NewAccount,
    password_hash: String,
  ) -> impl Future<Output = Result<Registered, Self::Error>> + Send + '_;

  /// Patients whose first name, last name, email or phone number contains
  /// `text` (case-insensitive). An empty `text` matches every patient.
  fn search_patients<'a>(
    &'a self,
    text: &'a str,
  ) -> impl Future<Output = Result<Vec<(Actor, PatientProfile)>, Self::Error>> + Send + 'a;

  // ── Records ───────────────────────────────────────────────────────────

  fn find_record_by_id(
    &self,
    record_id: Uuid,
  ) -> impl Future<Output = Result<Option<MedicalRecord>, Self::Error>> + Send + '_;

  /// Records inside `scope` that match `query`, newest first.
  fn list_records_matching<'a>(
    &'a self,
    scope: &'a RecordScope,
    query: &'a RecordQuery,
  ) -> impl Future<Output = Result<Vec<MedicalRecord>, Self::Error>> + Send + 'a;

  /// Insert a fully-stamped record.
  fn save_record<'a>(
    &'a self,
    record: &'a MedicalRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Overwrite the editable fields of a record. The patient link, the author
  /// and the creation time are never written. Returns `None` if the record
  /// no longer exists.
  fn update_record(
    &self,
    record_id: Uuid,
    content: RecordContent,
  ) -> impl Future<Output = Result<Option<MedicalRecord>, Self::Error>> + Send + '_;

  // ── Tests ─────────────────────────────────────────────────────────────

  fn save_test<'a>(
    &'a self,
    test: &'a MedicalTest,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Tests attached to a record, in test-date order.
  fn list_tests(
    &self,
    record_id: Uuid,
  ) -> impl Future<Output = Result<Vec<MedicalTest>, Self::Error>> + Send + '_;
}
