//! The record lifecycle controller.
//!
//! [`RecordService`] is the only way higher layers touch records. Every
//! operation takes the caller's [`Principal`] explicitly (or `None` for an
//! unauthenticated caller), runs it through [`access::authorize`], narrows
//! collections with [`scope_for`], and only then reaches the store.

use std::sync::Arc;

use chrono::{SubsecRound as _, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  access::{self, Denial, Operation, OwnedResource},
  identity::{Account, Actor, PatientDetail, Principal, ProfileRef},
  record::{
    MedicalRecord, MedicalTest, NewTest, RecordDetail, RecordFields, RecordPatch,
    RecordQuery,
  },
  registration::{NewAccount, Registered},
  render::{Artifact, AuthorSnapshot, PatientSnapshot, RecordSnapshot, Renderer},
  scope::{RecordScope, scope_for},
  store::CarnetStore,
};

/// A patient returned by [`RecordService::search_patients`], with the
/// records the caller may see for them.
#[derive(Debug, Clone, Serialize)]
pub struct PatientMatch {
  pub patient: PatientDetail,
  pub records: Vec<MedicalRecord>,
}

pub struct RecordService<S, R> {
  store:    Arc<S>,
  renderer: Arc<R>,
}

impl<S, R> Clone for RecordService<S, R> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), renderer: Arc::clone(&self.renderer) }
  }
}

impl<S, R> RecordService<S, R>
where
  S: CarnetStore,
  R: Renderer,
{
  pub fn new(store: Arc<S>, renderer: Arc<R>) -> Self { Self { store, renderer } }

  pub fn store(&self) -> &Arc<S> { &self.store }

  // ── Identity ──────────────────────────────────────────────────────────

  /// Resolve an authenticated actor into a [`Principal`].
  pub async fn resolve_principal(&self, actor: &Actor) -> Result<Principal> {
    let profile = self
      .store
      .find_profile_by_actor(actor.actor_id)
      .await
      .map_err(Error::store)?;
    let principal = Principal::new(actor, profile.as_ref());
    if principal.profile().is_err() {
      warn!(actor_id = %actor.actor_id, role = %actor.role, "actor has no profile for its role");
    }
    Ok(principal)
  }

  /// Persist a validated account. The password must already be hashed.
  pub async fn register(
    &self,
    account: NewAccount,
    password_hash: String,
  ) -> Result<Account> {
    let role = account.role;
    match self
      .store
      .register_actor(account, password_hash)
      .await
      .map_err(Error::store)?
    {
      Registered::Created(account) => {
        info!(actor_id = %account.actor.actor_id, %role, "actor registered");
        Ok(account)
      }
      Registered::EmailTaken => Err(Error::EmailTaken),
      Registered::DuplicateLicense(license) => Err(Error::DuplicateLicense(license)),
    }
  }

  /// The caller's own account and profile.
  pub async fn account(&self, principal: Option<&Principal>) -> Result<Account> {
    let principal = require(principal)?;
    let actor = self
      .store
      .find_actor_by_id(principal.actor_id)
      .await
      .map_err(Error::store)?
      .ok_or(Denial::Unauthenticated)?;
    let profile = self
      .store
      .find_profile_by_actor(principal.actor_id)
      .await
      .map_err(Error::store)?;
    Ok(Account::new(actor, profile))
  }

  // ── Records ───────────────────────────────────────────────────────────

  /// Create a record for `patient_id`, authored by the calling doctor.
  ///
  /// The patient link, the author and `created_at` are stamped here and
  /// never change afterwards. Nothing is persisted unless every check
  /// passes.
  pub async fn create(
    &self,
    principal: Option<&Principal>,
    patient_id: Option<Uuid>,
    fields: RecordFields,
  ) -> Result<MedicalRecord> {
    let principal = check(principal, None, Operation::Create)?;

    let patient_id = patient_id.ok_or(Error::MissingPatientReference)?;
    let patient = self
      .store
      .find_patient_by_id(patient_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::PatientNotFound(patient_id))?;

    let created_by = match principal.profile()? {
      Some(ProfileRef::Doctor(doctor_id)) => Some(doctor_id),
      _ => None,
    };

    let content = fields.validate()?;
    let record = MedicalRecord {
      record_id: Uuid::new_v4(),
      patient_id: patient.patient_id,
      created_by,
      created_at: Utc::now().trunc_subsecs(6),
      content,
    };

    self.store.save_record(&record).await.map_err(Error::store)?;
    info!(
      record_id = %record.record_id,
      patient_id = %record.patient_id,
      record_type = %record.content.record_type,
      "medical record created"
    );
    Ok(record)
  }

  /// Apply `patch` to the editable fields of a record. Last writer wins.
  pub async fn update(
    &self,
    principal: Option<&Principal>,
    record_id: Uuid,
    patch: RecordPatch,
  ) -> Result<MedicalRecord> {
    require(principal)?;
    let record = self.load(record_id).await?;
    check(principal, Some(&record), Operation::Update)?;

    let content = patch.apply(&record.content)?;
    let updated = self
      .store
      .update_record(record_id, content)
      .await
      .map_err(Error::store)?
      .ok_or(Error::RecordNotFound(record_id))?;

    info!(record_id = %record_id, "medical record updated");
    Ok(updated)
  }

  /// A single record with its tests.
  pub async fn get(
    &self,
    principal: Option<&Principal>,
    record_id: Uuid,
  ) -> Result<RecordDetail> {
    require(principal)?;
    let record = self.load(record_id).await?;
    check(principal, Some(&record), Operation::Read)?;

    let tests = self
      .store
      .list_tests(record_id)
      .await
      .map_err(Error::store)?;
    Ok(RecordDetail { record, tests })
  }

  /// Every record the caller may enumerate that matches `query`.
  pub async fn list(
    &self,
    principal: Option<&Principal>,
    query: RecordQuery,
  ) -> Result<Vec<MedicalRecord>> {
    let principal = check(principal, None, Operation::List)?;

    let scope = match query.patient_id {
      Some(patient_id) => scope_for(principal).narrow(patient_id),
      None => scope_for(principal),
    };
    self.records_in(&scope, &query).await
  }

  /// Attach a lab result to an existing record.
  pub async fn add_test(
    &self,
    principal: Option<&Principal>,
    record_id: Uuid,
    new_test: NewTest,
  ) -> Result<MedicalTest> {
    require(principal)?;
    let record = self.load(record_id).await?;
    check(principal, Some(&record), Operation::Update)?;

    let test = new_test.into_test(record_id)?;
    self.store.save_test(&test).await.map_err(Error::store)?;
    info!(record_id = %record_id, test_id = %test.test_id, "medical test added");
    Ok(test)
  }

  // ── Patients ──────────────────────────────────────────────────────────

  /// A patient profile with its owner and BMI.
  pub async fn get_patient(
    &self,
    principal: Option<&Principal>,
    patient_id: Uuid,
  ) -> Result<PatientDetail> {
    require(principal)?;
    let profile = self
      .store
      .find_patient_by_id(patient_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::PatientNotFound(patient_id))?;
    check(principal, Some(&profile), Operation::Read)?;

    let actor = self
      .store
      .find_actor_by_id(profile.actor_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::PatientNotFound(patient_id))?;
    Ok(PatientDetail::new(actor, profile))
  }

  /// Patients whose identity fields contain `text`, each with the records
  /// the caller may see.
  pub async fn search_patients(
    &self,
    principal: Option<&Principal>,
    text: &str,
  ) -> Result<Vec<PatientMatch>> {
    let principal = check(principal, None, Operation::Search)?;
    let scope = scope_for(principal);

    let patients = self
      .store
      .search_patients(text.trim())
      .await
      .map_err(Error::store)?;

    let mut matches = Vec::with_capacity(patients.len());
    for (actor, profile) in patients {
      let records = self
        .records_in(&scope.narrow(profile.patient_id), &RecordQuery::default())
        .await?;
      matches.push(PatientMatch { patient: PatientDetail::new(actor, profile), records });
    }
    Ok(matches)
  }

  // ── Export ────────────────────────────────────────────────────────────

  /// Render a single record.
  pub async fn export_single(
    &self,
    principal: Option<&Principal>,
    record_id: Uuid,
  ) -> Result<Artifact> {
    require(principal)?;
    let record = self.load(record_id).await?;
    check(principal, Some(&record), Operation::DownloadSingle)?;

    let patient = self.patient_snapshot(record.patient_id).await?;
    let snapshot = self.record_snapshot(record).await?;
    let stem = format!(
      "dossier_medical_{}_{record_id}",
      file_slug(&patient.actor.last_name)
    );
    self.render(&patient, &[snapshot], stem)
  }

  /// Render every record of one patient.
  ///
  /// Doctors and administrators must name the patient. For a patient the
  /// target is always their own profile and `patient_id` is ignored.
  pub async fn export_bulk(
    &self,
    principal: Option<&Principal>,
    patient_id: Option<Uuid>,
  ) -> Result<Artifact> {
    let principal = check(principal, None, Operation::DownloadBulk)?;

    let target = match scope_for(principal) {
      RecordScope::Patient(own) => own,
      RecordScope::All => patient_id.ok_or(Error::MissingPatientReference)?,
      RecordScope::Nothing => return Err(Error::ProfileMissing(principal.actor_id)),
    };

    let patient = self.patient_snapshot(target).await?;
    let records = self
      .records_in(&scope_for(principal).narrow(target), &RecordQuery::default())
      .await?;

    let mut snapshots = Vec::with_capacity(records.len());
    for record in records {
      snapshots.push(self.record_snapshot(record).await?);
    }

    let stem = format!(
      "carnet_medical_complet_{}",
      file_slug(&patient.actor.last_name)
    );
    self.render(&patient, &snapshots, stem)
  }

  // ── Helpers ───────────────────────────────────────────────────────────

  async fn load(&self, record_id: Uuid) -> Result<MedicalRecord> {
    self
      .store
      .find_record_by_id(record_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::RecordNotFound(record_id))
  }

  async fn records_in(
    &self,
    scope: &RecordScope,
    query: &RecordQuery,
  ) -> Result<Vec<MedicalRecord>> {
    if scope.is_empty() {
      return Ok(Vec::new());
    }
    let mut records = self
      .store
      .list_records_matching(scope, query)
      .await
      .map_err(Error::store)?;
    records.retain(|r| scope.permits(r));
    Ok(records)
  }

  async fn patient_snapshot(&self, patient_id: Uuid) -> Result<PatientSnapshot> {
    let profile = self
      .store
      .find_patient_by_id(patient_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::PatientNotFound(patient_id))?;
    let actor = self
      .store
      .find_actor_by_id(profile.actor_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::PatientNotFound(patient_id))?;
    Ok(PatientSnapshot { actor, profile })
  }

  async fn record_snapshot(&self, record: MedicalRecord) -> Result<RecordSnapshot> {
    let tests = self
      .store
      .list_tests(record.record_id)
      .await
      .map_err(Error::store)?;

    let author = match record.created_by {
      Some(doctor_id) => self.author_snapshot(doctor_id).await?,
      None => None,
    };

    Ok(RecordSnapshot { record, author, tests })
  }

  async fn author_snapshot(&self, doctor_id: Uuid) -> Result<Option<AuthorSnapshot>> {
    let Some(profile) = self
      .store
      .find_doctor_by_id(doctor_id)
      .await
      .map_err(Error::store)?
    else {
      return Ok(None);
    };
    let actor = self
      .store
      .find_actor_by_id(profile.actor_id)
      .await
      .map_err(Error::store)?;
    Ok(actor.map(|actor| AuthorSnapshot { actor, profile }))
  }

  fn render(
    &self,
    patient: &PatientSnapshot,
    records: &[RecordSnapshot],
    stem: String,
  ) -> Result<Artifact> {
    let rendered = self.renderer.render(patient, records).map_err(|e| {
      warn!(error = %e, "document rendering failed");
      Error::RenderFailure(Box::new(e))
    })?;
    Ok(Artifact {
      file_name:  format!("{stem}.{}", rendered.extension),
      media_type: rendered.media_type,
      body:       rendered.body,
    })
  }
}

fn require(principal: Option<&Principal>) -> Result<&Principal> {
  principal.ok_or(Error::Denied(Denial::Unauthenticated))
}

/// Run the authorization engine and hand back the principal on success.
fn check<'p>(
  principal: Option<&'p Principal>,
  resource: Option<&dyn OwnedResource>,
  operation: Operation,
) -> Result<&'p Principal> {
  match access::authorize(principal, resource, operation) {
    Ok(()) => require(principal),
    Err(denial) => {
      debug!(
        actor_id = ?principal.map(|p| p.actor_id),
        %operation,
        ?denial,
        "access denied"
      );
      Err(denial.into())
    }
  }
}

/// Lowercase ASCII alphanumerics; everything else becomes `_`.
fn file_slug(name: &str) -> String {
  let slug: String = name
    .trim()
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
    .collect();
  if slug.is_empty() { "patient".to_owned() } else { slug }
}
