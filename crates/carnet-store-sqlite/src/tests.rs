//! Integration tests for `SqliteStore` and the record service running on it,
//! against an in-memory database.

use std::sync::Arc;

use bytes::Bytes;
use carnet_core::{
  Error as CoreError,
  access::{self, Denial, Operation},
  identity::{Account, ClinicalInfo, Practice, Principal, Profile, Role},
  record::{NewTest, RecordFields, RecordPatch, RecordQuery, RecordType},
  registration::{NewAccount, NewProfile, Registered},
  render::{PatientSnapshot, RecordSnapshot, Rendered, Renderer},
  scope::RecordScope,
  service::RecordService,
  store::CarnetStore,
};
use chrono::NaiveDate;
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

/// Renders one line per record: `patient|title|author-last-name|tests`.
struct LineRenderer;

impl Renderer for LineRenderer {
  type Error = std::fmt::Error;

  fn render(
    &self,
    patient: &PatientSnapshot,
    records: &[RecordSnapshot],
  ) -> Result<Rendered, Self::Error> {
    let body = records
      .iter()
      .map(|r| {
        format!(
          "{}|{}|{}|{}",
          patient.actor.last_name,
          r.record.content.title,
          r.author.as_ref().map_or("-", |a| a.actor.last_name.as_str()),
          r.tests.len(),
        )
      })
      .collect::<Vec<_>>()
      .join("\n");
    Ok(Rendered { media_type: "text/plain", extension: "txt", body: Bytes::from(body) })
  }
}

struct BrokenRenderer;

impl Renderer for BrokenRenderer {
  type Error = std::fmt::Error;

  fn render(&self, _: &PatientSnapshot, _: &[RecordSnapshot]) -> Result<Rendered, Self::Error> {
    Err(std::fmt::Error)
  }
}

fn account(email: &str, last_name: &str, role: Role, profile: NewProfile) -> NewAccount {
  NewAccount {
    email: email.to_owned(),
    role,
    first_name: "Test".to_owned(),
    last_name: last_name.to_owned(),
    phone_number: String::new(),
    date_of_birth: None,
    address: String::new(),
    profile,
  }
}

fn practice(license: &str) -> Practice {
  Practice {
    medical_license:     license.to_owned(),
    specialization:      "General medicine".to_owned(),
    hospital:            "CHU".to_owned(),
    years_of_experience: 7,
  }
}

fn fields(title: &str) -> RecordFields {
  RecordFields {
    record_type: "consultation".to_owned(),
    title: title.to_owned(),
    description: "Routine visit".to_owned(),
    ..RecordFields::default()
  }
}

fn blood_test() -> NewTest {
  NewTest {
    test_name:    "Glucose".to_owned(),
    test_date:    NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
    result:       "5.4".to_owned(),
    unit:         "mmol/L".to_owned(),
    normal_range: "3.9-5.6".to_owned(),
    lab_name:     String::new(),
    attachment:   None,
  }
}

struct World<R> {
  store:   Arc<SqliteStore>,
  service: RecordService<SqliteStore, R>,
}

impl<R: Renderer> World<R> {
  async fn with(renderer: R) -> Self {
    let store = Arc::new(store().await);
    let service = RecordService::new(Arc::clone(&store), Arc::new(renderer));
    Self { store, service }
  }

  async fn enroll(&self, new: NewAccount) -> (Account, Principal) {
    let account = self.service.register(new, "hash".to_owned()).await.unwrap();
    let principal = self.service.resolve_principal(&account.actor).await.unwrap();
    (account, principal)
  }

  async fn patient(&self, email: &str, last_name: &str) -> (Uuid, Principal) {
    let (_, p) = self
      .enroll(account(email, last_name, Role::Patient, NewProfile::Patient(ClinicalInfo::default())))
      .await;
    (p.patient_id().unwrap(), p)
  }

  async fn doctor(&self, email: &str, last_name: &str, license: &str) -> (Uuid, Principal) {
    let (_, p) = self
      .enroll(account(email, last_name, Role::Doctor, NewProfile::Doctor(practice(license))))
      .await;
    (p.doctor_id().unwrap(), p)
  }

  async fn admin(&self) -> Principal {
    let new = NewAccount::admin("root@clinic.test", "Ada", "Admin").unwrap();
    self.enroll(new).await.1
  }
}

async fn world() -> World<LineRenderer> { World::with(LineRenderer).await }

// ─── Store: actors and profiles ──────────────────────────────────────────────

#[tokio::test]
async fn register_patient_creates_actor_and_profile() {
  let s = store().await;
  let clinical = ClinicalInfo {
    blood_type: "O+".to_owned(),
    height_cm: Some(180.0),
    weight_kg: Some(81.0),
    ..ClinicalInfo::default()
  };
  let new = account("awa@example.test", "Kone", Role::Patient, NewProfile::Patient(clinical));

  let Registered::Created(created) = s.register_actor(new, "phc".to_owned()).await.unwrap()
  else {
    panic!("expected a new account");
  };
  assert_eq!(created.body_mass_index, Some(25.0));

  let actor = s.find_actor_by_email("awa@example.test").await.unwrap().unwrap();
  assert_eq!(actor.actor_id, created.actor.actor_id);
  assert_eq!(actor.role, Role::Patient);

  let (_, hash) = s.find_credentials("awa@example.test").await.unwrap().unwrap();
  assert_eq!(hash, "phc");

  let Some(Profile::Patient(profile)) = s.find_profile_by_actor(actor.actor_id).await.unwrap()
  else {
    panic!("expected a patient profile");
  };
  assert_eq!(profile.clinical.blood_type, "O+");
  let by_id = s.find_patient_by_id(profile.patient_id).await.unwrap().unwrap();
  assert_eq!(by_id, profile);
}

#[tokio::test]
async fn registration_timestamps_survive_a_reload() {
  let s = store().await;
  let new = account("awa@example.test", "Kone", Role::Patient, NewProfile::Patient(ClinicalInfo::default()));
  let Registered::Created(created) = s.register_actor(new, "phc".to_owned()).await.unwrap()
  else {
    panic!("expected a new account");
  };

  let reloaded = s.find_actor_by_id(created.actor.actor_id).await.unwrap().unwrap();
  assert_eq!(reloaded.created_at, created.actor.created_at);
  assert_eq!(reloaded.updated_at, created.actor.updated_at);
}

#[tokio::test]
async fn register_reports_uniqueness_conflicts() {
  let s = store().await;
  let doctor = |email: &str| {
    account(email, "Yao", Role::Doctor, NewProfile::Doctor(practice("LIC-1")))
  };

  assert!(matches!(
    s.register_actor(doctor("a@example.test"), "h".into()).await.unwrap(),
    Registered::Created(_)
  ));
  assert!(matches!(
    s.register_actor(doctor("a@example.test"), "h".into()).await.unwrap(),
    Registered::EmailTaken
  ));
  assert!(matches!(
    s.register_actor(doctor("b@example.test"), "h".into()).await.unwrap(),
    Registered::DuplicateLicense(license) if license == "LIC-1"
  ));
  // The refused registration left nothing behind.
  assert!(s.find_actor_by_email("b@example.test").await.unwrap().is_none());
}

#[tokio::test]
async fn admin_has_no_profile() {
  let s = store().await;
  let new = NewAccount::admin("root@example.test", "Ada", "Admin").unwrap();
  let Registered::Created(created) = s.register_actor(new, "h".into()).await.unwrap() else {
    panic!("expected a new account");
  };
  assert!(created.profile.is_none());
  assert!(s.find_profile_by_actor(created.actor.actor_id).await.unwrap().is_none());
}

#[tokio::test]
async fn missing_lookups_return_none() {
  let s = store().await;
  assert!(s.find_actor_by_id(Uuid::new_v4()).await.unwrap().is_none());
  assert!(s.find_credentials("nobody@example.test").await.unwrap().is_none());
  assert!(s.find_patient_by_id(Uuid::new_v4()).await.unwrap().is_none());
  assert!(s.find_doctor_by_id(Uuid::new_v4()).await.unwrap().is_none());
  assert!(s.find_record_by_id(Uuid::new_v4()).await.unwrap().is_none());
  assert!(s.list_tests(Uuid::new_v4()).await.unwrap().is_empty());
}

#[tokio::test]
async fn search_matches_identity_fields() {
  let w = world().await;
  w.patient("awa.kone@example.test", "Kone").await;
  w.patient("yao@example.test", "N'Guessan").await;
  w.doctor("kone.doc@example.test", "Kone", "LIC-9").await;

  let hits = w.store.search_patients("kone").await.unwrap();
  assert_eq!(hits.len(), 1, "doctors are not patients");
  assert_eq!(hits[0].0.last_name, "Kone");

  assert_eq!(w.store.search_patients("").await.unwrap().len(), 2);
  assert!(w.store.search_patients("%").await.unwrap().is_empty());
}

#[tokio::test]
async fn search_folds_accented_names() {
  let w = world().await;
  w.patient("emile@example.test", "Émile").await;
  w.patient("eloise@example.test", "ÉLOÏSE").await;

  for text in ["Émile", "émile", "ÉMILE"] {
    let hits = w.store.search_patients(text).await.unwrap();
    assert_eq!(hits.len(), 1, "{text}");
    assert_eq!(hits[0].0.last_name, "Émile");
  }

  let hits = w.store.search_patients("éloïse").await.unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].0.last_name, "ÉLOÏSE");
}

// ─── Store: records ──────────────────────────────────────────────────────────

#[tokio::test]
async fn listing_is_newest_first_and_filterable() {
  let w = world().await;
  let (p, _) = w.patient("p@example.test", "Kone").await;
  let (_, doc) = w.doctor("d@example.test", "Yao", "LIC-1").await;

  for title in ["first", "second", "third"] {
    w.service.create(Some(&doc), Some(p), fields(title)).await.unwrap();
  }
  let mut urgent = fields("urgent");
  urgent.record_type = "surgery".to_owned();
  urgent.is_emergency = true;
  w.service.create(Some(&doc), Some(p), urgent).await.unwrap();

  let all = w
    .store
    .list_records_matching(&RecordScope::All, &RecordQuery::default())
    .await
    .unwrap();
  let titles: Vec<_> = all.iter().map(|r| r.content.title.as_str()).collect();
  assert_eq!(titles, ["urgent", "third", "second", "first"]);

  let query = RecordQuery { record_type: Some(RecordType::Surgery), ..RecordQuery::default() };
  let surgeries = w.store.list_records_matching(&RecordScope::All, &query).await.unwrap();
  assert_eq!(surgeries.len(), 1);

  let query = RecordQuery { emergency: Some(false), limit: Some(2), offset: Some(1), ..RecordQuery::default() };
  let page = w.store.list_records_matching(&RecordScope::All, &query).await.unwrap();
  let titles: Vec<_> = page.iter().map(|r| r.content.title.as_str()).collect();
  assert_eq!(titles, ["second", "first"]);

  assert!(
    w.store
      .list_records_matching(&RecordScope::Nothing, &RecordQuery::default())
      .await
      .unwrap()
      .is_empty()
  );
}

#[tokio::test]
async fn schema_rejects_relinking_a_record() {
  let w = world().await;
  let (p, _) = w.patient("p@example.test", "Kone").await;
  let (q, _) = w.patient("q@example.test", "Traore").await;
  let (_, doc) = w.doctor("d@example.test", "Yao", "LIC-1").await;
  let record = w.service.create(Some(&doc), Some(p), fields("r")).await.unwrap();

  let id = record.record_id.hyphenated().to_string();
  let q = q.hyphenated().to_string();
  let outcome = w
    .store
    .conn
    .call(move |conn| {
      conn.execute(
        "UPDATE records SET patient_id = ?1 WHERE record_id = ?2",
        rusqlite::params![q, id],
      )?;
      Ok(())
    })
    .await;
  assert!(outcome.is_err());

  let stored = w.store.find_record_by_id(record.record_id).await.unwrap().unwrap();
  assert_eq!(stored.patient_id, p);
}

#[tokio::test]
async fn deleting_the_author_clears_created_by() {
  let w = world().await;
  let (p, _) = w.patient("p@example.test", "Kone").await;
  let (_, doc) = w.doctor("d@example.test", "Yao", "LIC-1").await;
  let record = w.service.create(Some(&doc), Some(p), fields("r")).await.unwrap();
  assert!(record.created_by.is_some());

  let actor_id = doc.actor_id.hyphenated().to_string();
  w.store
    .conn
    .call(move |conn| {
      conn.execute("DELETE FROM actors WHERE actor_id = ?1", rusqlite::params![actor_id])?;
      Ok(())
    })
    .await
    .unwrap();

  let stored = w.store.find_record_by_id(record.record_id).await.unwrap().unwrap();
  assert_eq!(stored.created_by, None);
  assert_eq!(stored.patient_id, p);
  assert_eq!(stored.created_at, record.created_at);
}

#[tokio::test]
async fn update_of_missing_record_returns_none() {
  let w = world().await;
  let (p, _) = w.patient("p@example.test", "Kone").await;
  let (_, doc) = w.doctor("d@example.test", "Yao", "LIC-1").await;
  let record = w.service.create(Some(&doc), Some(p), fields("r")).await.unwrap();

  let missing = w
    .store
    .update_record(Uuid::new_v4(), record.content.clone())
    .await
    .unwrap();
  assert!(missing.is_none());
}

// ─── Service: lifecycle ──────────────────────────────────────────────────────

#[tokio::test]
async fn doctor_create_stamps_links_and_patient_cannot_create() {
  let w = world().await;
  let (p, patient) = w.patient("p@example.test", "Kone").await;
  let (d, doc) = w.doctor("d@example.test", "Yao", "LIC-1").await;

  let record = w.service.create(Some(&doc), Some(p), fields("Checkup")).await.unwrap();
  assert_eq!(record.patient_id, p);
  assert_eq!(record.created_by, Some(d));

  let err = w.service.create(Some(&patient), Some(p), fields("Self")).await.unwrap_err();
  assert!(matches!(err, CoreError::Denied(Denial::ForbiddenCreate)));

  let err = w.service.create(None, Some(p), fields("Anon")).await.unwrap_err();
  assert!(matches!(err, CoreError::Denied(Denial::Unauthenticated)));

  let listed = w.service.list(Some(&doc), RecordQuery::default()).await.unwrap();
  assert_eq!(listed.len(), 1, "refused creations persisted nothing");
}

#[tokio::test]
async fn create_validates_patient_reference_and_fields() {
  let w = world().await;
  let (p, _) = w.patient("p@example.test", "Kone").await;
  let (_, doc) = w.doctor("d@example.test", "Yao", "LIC-1").await;

  let err = w.service.create(Some(&doc), None, fields("x")).await.unwrap_err();
  assert!(matches!(err, CoreError::MissingPatientReference));

  let ghost = Uuid::new_v4();
  let err = w.service.create(Some(&doc), Some(ghost), fields("x")).await.unwrap_err();
  assert!(matches!(err, CoreError::PatientNotFound(id) if id == ghost));

  let mut bad = fields("x");
  bad.record_type = "horoscope".to_owned();
  let err = w.service.create(Some(&doc), Some(p), bad).await.unwrap_err();
  assert!(matches!(err, CoreError::InvalidRecordType(_)));

  let listed = w.service.list(Some(&doc), RecordQuery::default()).await.unwrap();
  assert!(listed.is_empty());
}

#[tokio::test]
async fn admin_creates_records_without_author() {
  let w = world().await;
  let (p, _) = w.patient("p@example.test", "Kone").await;
  let admin = w.admin().await;

  let record = w.service.create(Some(&admin), Some(p), fields("Imported")).await.unwrap();
  assert_eq!(record.created_by, None);
}

#[tokio::test]
async fn visibility_follows_role_scope() {
  let w = world().await;
  let (p, patient_p) = w.patient("p@example.test", "Kone").await;
  let (q, patient_q) = w.patient("q@example.test", "Traore").await;
  let (_, doc) = w.doctor("d@example.test", "Yao", "LIC-1").await;
  let (_, doc2) = w.doctor("d2@example.test", "Bamba", "LIC-2").await;

  let r1 = w.service.create(Some(&doc), Some(p), fields("p-1")).await.unwrap();
  w.service.create(Some(&doc), Some(q), fields("q-1")).await.unwrap();

  // P sees only their record; Q sees none of P's.
  let for_p = w.service.list(Some(&patient_p), RecordQuery::default()).await.unwrap();
  assert_eq!(for_p.len(), 1);
  assert_eq!(for_p[0].record_id, r1.record_id);

  let for_q = w
    .service
    .list(Some(&patient_q), RecordQuery { patient_id: Some(p), ..RecordQuery::default() })
    .await
    .unwrap();
  assert!(for_q.is_empty());

  let err = w.service.get(Some(&patient_q), r1.record_id).await.unwrap_err();
  assert!(matches!(err, CoreError::Denied(Denial::ForbiddenRead)));

  // Any doctor sees every record.
  assert_eq!(w.service.list(Some(&doc2), RecordQuery::default()).await.unwrap().len(), 2);
  assert!(w.service.get(Some(&doc2), r1.record_id).await.is_ok());

  let err = w.service.list(None, RecordQuery::default()).await.unwrap_err();
  assert!(matches!(err, CoreError::Denied(Denial::Unauthenticated)));
}

#[tokio::test]
async fn listed_records_are_always_readable() {
  let w = world().await;
  let (p, patient_p) = w.patient("p@example.test", "Kone").await;
  let (q, patient_q) = w.patient("q@example.test", "Traore").await;
  let (_, doc) = w.doctor("d@example.test", "Yao", "LIC-1").await;
  let (_, doc2) = w.doctor("d2@example.test", "Bamba", "LIC-2").await;
  let admin = w.admin().await;

  let (orphan, _) = w
    .enroll(account("o@example.test", "Diallo", Role::Patient, NewProfile::Patient(ClinicalInfo::default())))
    .await;
  let unprovisioned = Principal::new(&orphan.actor, None);

  w.service.create(Some(&doc), Some(p), fields("p-1")).await.unwrap();
  w.service.create(Some(&doc2), Some(p), fields("p-2")).await.unwrap();
  w.service.create(Some(&doc), Some(q), fields("q-1")).await.unwrap();
  w.service.create(Some(&admin), Some(q), fields("q-2")).await.unwrap();

  for (who, expected) in [
    (admin, 4),
    (doc, 4),
    (doc2, 4),
    (patient_p, 2),
    (patient_q, 2),
    (unprovisioned, 0),
  ] {
    let listed = w.service.list(Some(&who), RecordQuery::default()).await.unwrap();
    assert_eq!(listed.len(), expected, "{:?}", who.role);
    for record in &listed {
      assert!(
        access::can_access(Some(&who), Some(record), Operation::Read),
        "{:?} listed unreadable record {}",
        who.role,
        record.content.title,
      );
    }
  }
}

#[tokio::test]
async fn updates_never_touch_links_and_last_writer_wins() {
  let w = world().await;
  let (p, patient) = w.patient("p@example.test", "Kone").await;
  let (d, doc) = w.doctor("d@example.test", "Yao", "LIC-1").await;
  let (_, doc2) = w.doctor("d2@example.test", "Bamba", "LIC-2").await;
  let record = w.service.create(Some(&doc), Some(p), fields("Checkup")).await.unwrap();

  let patch = RecordPatch { title: Some("Follow-up".to_owned()), ..RecordPatch::default() };
  w.service.update(Some(&doc2), record.record_id, patch).await.unwrap();
  let patch = RecordPatch {
    notes: Some("stable".to_owned()),
    attachment: Some(Some("scan.pdf".to_owned())),
    ..RecordPatch::default()
  };
  let updated = w.service.update(Some(&doc), record.record_id, patch).await.unwrap();

  assert_eq!(updated.content.title, "Follow-up");
  assert_eq!(updated.content.notes, "stable");
  assert_eq!(updated.content.attachment.as_deref(), Some("scan.pdf"));
  assert_eq!(updated.patient_id, p);
  assert_eq!(updated.created_by, Some(d));
  assert_eq!(updated.created_at, record.created_at);

  let err = w
    .service
    .update(Some(&patient), record.record_id, RecordPatch::default())
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Denied(Denial::ForbiddenUpdate)));

  let empty_title = RecordPatch { title: Some("  ".to_owned()), ..RecordPatch::default() };
  let err = w.service.update(Some(&doc), record.record_id, empty_title).await.unwrap_err();
  assert!(matches!(err, CoreError::InvalidField { field: "title", .. }));

  let stored = w.service.get(Some(&doc), record.record_id).await.unwrap();
  assert_eq!(stored.record.content.title, "Follow-up");
}

#[tokio::test]
async fn missing_record_is_not_found() {
  let w = world().await;
  let (_, doc) = w.doctor("d@example.test", "Yao", "LIC-1").await;
  let ghost = Uuid::new_v4();

  let err = w.service.get(Some(&doc), ghost).await.unwrap_err();
  assert!(matches!(err, CoreError::RecordNotFound(id) if id == ghost));
  let err = w.service.update(Some(&doc), ghost, RecordPatch::default()).await.unwrap_err();
  assert!(matches!(err, CoreError::RecordNotFound(_)));

  // Lookup precedes the ownership check, for patients as well.
  let (q, _) = w.patient("q@example.test", "Traore").await;
  let (_, patient_p) = w.patient("p@example.test", "Kone").await;
  let theirs = w.service.create(Some(&doc), Some(q), fields("q-1")).await.unwrap();
  let err = w.service.get(Some(&patient_p), ghost).await.unwrap_err();
  assert!(matches!(err, CoreError::RecordNotFound(_)));
  let err = w.service.get(Some(&patient_p), theirs.record_id).await.unwrap_err();
  assert!(matches!(err, CoreError::Denied(Denial::ForbiddenRead)));
}

#[tokio::test]
async fn tests_attach_to_records_doctors_can_edit() {
  let w = world().await;
  let (p, patient) = w.patient("p@example.test", "Kone").await;
  let (_, doc) = w.doctor("d@example.test", "Yao", "LIC-1").await;
  let record = w.service.create(Some(&doc), Some(p), fields("Labs")).await.unwrap();

  let test = w.service.add_test(Some(&doc), record.record_id, blood_test()).await.unwrap();
  assert_eq!(test.record_id, record.record_id);

  let err = w
    .service
    .add_test(Some(&patient), record.record_id, blood_test())
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Denied(Denial::ForbiddenUpdate)));

  let detail = w.service.get(Some(&patient), record.record_id).await.unwrap();
  assert_eq!(detail.tests, vec![test]);
}

// ─── Service: patients ───────────────────────────────────────────────────────

#[tokio::test]
async fn patient_profiles_are_private_to_their_owner() {
  let w = world().await;
  let (p, patient_p) = w.patient("p@example.test", "Kone").await;
  let (_, patient_q) = w.patient("q@example.test", "Traore").await;
  let (_, doc) = w.doctor("d@example.test", "Yao", "LIC-1").await;

  assert_eq!(w.service.get_patient(Some(&patient_p), p).await.unwrap().profile.patient_id, p);
  assert!(w.service.get_patient(Some(&doc), p).await.is_ok());
  let err = w.service.get_patient(Some(&patient_q), p).await.unwrap_err();
  assert!(matches!(err, CoreError::Denied(Denial::ForbiddenRead)));
}

#[tokio::test]
async fn search_is_for_staff_only() {
  let w = world().await;
  let (p, patient) = w.patient("p@example.test", "Kone").await;
  let (_, doc) = w.doctor("d@example.test", "Yao", "LIC-1").await;
  w.service.create(Some(&doc), Some(p), fields("r")).await.unwrap();

  let hits = w.service.search_patients(Some(&doc), "KON").await.unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].records.len(), 1);

  let err = w.service.search_patients(Some(&patient), "kone").await.unwrap_err();
  assert!(matches!(err, CoreError::Denied(Denial::ForbiddenRead)));
}

// ─── Service: export ─────────────────────────────────────────────────────────

#[tokio::test]
async fn export_single_follows_read_rules() {
  let w = world().await;
  let (p, patient_p) = w.patient("p@example.test", "Kone").await;
  let (_, patient_q) = w.patient("q@example.test", "Traore").await;
  let (_, doc) = w.doctor("d@example.test", "Yao", "LIC-1").await;
  let record = w.service.create(Some(&doc), Some(p), fields("Checkup")).await.unwrap();
  w.service.add_test(Some(&doc), record.record_id, blood_test()).await.unwrap();

  let artifact = w.service.export_single(Some(&patient_p), record.record_id).await.unwrap();
  assert_eq!(artifact.file_name, format!("dossier_medical_kone_{}.txt", record.record_id));
  assert_eq!(artifact.media_type, "text/plain");
  assert_eq!(artifact.body, Bytes::from("Kone|Checkup|Yao|1"));

  let err = w.service.export_single(Some(&patient_q), record.record_id).await.unwrap_err();
  assert!(matches!(err, CoreError::Denied(Denial::ForbiddenRead)));
}

#[tokio::test]
async fn bulk_export_targets() {
  let w = world().await;
  let (p, patient_p) = w.patient("p@example.test", "Kone").await;
  let (q, patient_q) = w.patient("q@example.test", "Traore").await;
  let (_, doc) = w.doctor("d@example.test", "Yao", "LIC-1").await;
  w.service.create(Some(&doc), Some(p), fields("p-1")).await.unwrap();
  w.service.create(Some(&doc), Some(p), fields("p-2")).await.unwrap();
  w.service.create(Some(&doc), Some(q), fields("q-1")).await.unwrap();

  // A patient always gets their own records, whatever they ask for.
  let own = w.service.export_bulk(Some(&patient_p), Some(q)).await.unwrap();
  assert_eq!(own.file_name, "carnet_medical_complet_kone.txt");
  assert_eq!(own.body, Bytes::from("Kone|p-2|Yao|0\nKone|p-1|Yao|0"));

  let theirs = w.service.export_bulk(Some(&patient_q), None).await.unwrap();
  assert_eq!(theirs.body, Bytes::from("Traore|q-1|Yao|0"));

  let by_doctor = w.service.export_bulk(Some(&doc), Some(q)).await.unwrap();
  assert_eq!(by_doctor.file_name, "carnet_medical_complet_traore.txt");

  let err = w.service.export_bulk(Some(&doc), None).await.unwrap_err();
  assert!(matches!(err, CoreError::MissingPatientReference));

  let err = w.service.export_bulk(Some(&doc), Some(Uuid::new_v4())).await.unwrap_err();
  assert!(matches!(err, CoreError::PatientNotFound(_)));

  let err = w.service.export_bulk(None, Some(p)).await.unwrap_err();
  assert!(matches!(err, CoreError::Denied(Denial::Unauthenticated)));
}

#[tokio::test]
async fn export_survives_a_deleted_author() {
  let w = world().await;
  let (p, patient) = w.patient("p@example.test", "Kone").await;
  let (_, doc) = w.doctor("d@example.test", "Yao", "LIC-1").await;
  w.service.create(Some(&doc), Some(p), fields("orphan")).await.unwrap();

  let actor_id = doc.actor_id.hyphenated().to_string();
  w.store
    .conn
    .call(move |conn| {
      conn.execute("DELETE FROM actors WHERE actor_id = ?1", rusqlite::params![actor_id])?;
      Ok(())
    })
    .await
    .unwrap();

  let artifact = w.service.export_bulk(Some(&patient), None).await.unwrap();
  assert_eq!(artifact.body, Bytes::from("Kone|orphan|-|0"));
}

#[tokio::test]
async fn render_failure_is_reported_and_harmless() {
  let w = World::with(BrokenRenderer).await;
  let (p, patient) = w.patient("p@example.test", "Kone").await;
  let (_, doc) = w.doctor("d@example.test", "Yao", "LIC-1").await;
  let record = w.service.create(Some(&doc), Some(p), fields("r")).await.unwrap();

  let err = w.service.export_single(Some(&patient), record.record_id).await.unwrap_err();
  assert!(matches!(err, CoreError::RenderFailure(_)));
  assert_eq!(w.service.get(Some(&doc), record.record_id).await.unwrap().record, record);
}
