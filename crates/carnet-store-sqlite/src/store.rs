//! [`SqliteStore`] — the SQLite implementation of [`CarnetStore`].

use std::path::Path;

use chrono::{SubsecRound as _, Utc};
use rusqlite::{OptionalExtension as _, types::Value};
use uuid::Uuid;

use carnet_core::{
  identity::{
    Account, Actor, DoctorProfile, PatientProfile, Profile,
  },
  record::{MedicalRecord, MedicalTest, RecordContent, RecordQuery},
  registration::{NewAccount, NewProfile, Registered},
  scope::RecordScope,
  store::CarnetStore,
};

use crate::{
  Result,
  encode::{
    ACTOR_COLUMNS, DOCTOR_COLUMNS, PATIENT_COLUMNS, RECORD_COLUMNS, RawActor,
    RawDoctor, RawPatient, RawRecord, RawTest, TEST_COLUMNS, encode_date,
    encode_dt, encode_record_type, encode_role, encode_uuid, like_pattern,
    search_key,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Carnet record store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn find_actor_where(
    &self,
    column: &'static str,
    value: String,
  ) -> Result<Option<Actor>> {
    let raw: Option<RawActor> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {ACTOR_COLUMNS} FROM actors WHERE {column} = ?1"),
            rusqlite::params![value],
            |row| RawActor::from_row(row, 0),
          )
          .optional()?)
      })
      .await?;

    raw.map(RawActor::into_actor).transpose()
  }
}

/// `a.x, a.y, …` for a column list, to disambiguate joined tables.
fn qualified(columns: &str, alias: &str) -> String {
  columns
    .split(',')
    .map(|c| format!("{alias}.{}", c.trim()))
    .collect::<Vec<_>>()
    .join(", ")
}

fn column_count(columns: &str) -> usize { columns.split(',').count() }

// ─── CarnetStore impl ────────────────────────────────────────────────────────

impl CarnetStore for SqliteStore {
  type Error = crate::Error;

  // ── Actors and profiles ───────────────────────────────────────────────────

  async fn find_actor_by_email(&self, email: &str) -> Result<Option<Actor>> {
    self.find_actor_where("email", email.to_owned()).await
  }

  async fn find_actor_by_id(&self, actor_id: Uuid) -> Result<Option<Actor>> {
    self.find_actor_where("actor_id", encode_uuid(actor_id)).await
  }

  async fn find_credentials(&self, email: &str) -> Result<Option<(Actor, String)>> {
    let email = email.to_owned();

    let raw: Option<(RawActor, String)> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {ACTOR_COLUMNS}, password_hash FROM actors WHERE email = ?1"
            ),
            rusqlite::params![email],
            |row| {
              Ok((
                RawActor::from_row(row, 0)?,
                row.get(column_count(ACTOR_COLUMNS))?,
              ))
            },
          )
          .optional()?)
      })
      .await?;

    raw
      .map(|(actor, hash)| Ok((actor.into_actor()?, hash)))
      .transpose()
  }

  async fn find_profile_by_actor(&self, actor_id: Uuid) -> Result<Option<Profile>> {
    let id_str = encode_uuid(actor_id);

    let (patient, doctor): (Option<RawPatient>, Option<RawDoctor>) = self
      .conn
      .call(move |conn| {
        let patient = conn
          .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE actor_id = ?1"),
            rusqlite::params![id_str],
            |row| RawPatient::from_row(row, 0),
          )
          .optional()?;
        if patient.is_some() {
          return Ok((patient, None));
        }
        let doctor = conn
          .query_row(
            &format!("SELECT {DOCTOR_COLUMNS} FROM doctors WHERE actor_id = ?1"),
            rusqlite::params![id_str],
            |row| RawDoctor::from_row(row, 0),
          )
          .optional()?;
        Ok((None, doctor))
      })
      .await?;

    if let Some(raw) = patient {
      return Ok(Some(Profile::Patient(raw.into_patient()?)));
    }
    doctor
      .map(|raw| raw.into_doctor().map(Profile::Doctor))
      .transpose()
  }

  async fn find_patient_by_id(&self, patient_id: Uuid) -> Result<Option<PatientProfile>> {
    let id_str = encode_uuid(patient_id);

    let raw: Option<RawPatient> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE patient_id = ?1"),
            rusqlite::params![id_str],
            |row| RawPatient::from_row(row, 0),
          )
          .optional()?)
      })
      .await?;

    raw.map(RawPatient::into_patient).transpose()
  }

  async fn find_doctor_by_id(&self, doctor_id: Uuid) -> Result<Option<DoctorProfile>> {
    let id_str = encode_uuid(doctor_id);

    let raw: Option<RawDoctor> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {DOCTOR_COLUMNS} FROM doctors WHERE doctor_id = ?1"),
            rusqlite::params![id_str],
            |row| RawDoctor::from_row(row, 0),
          )
          .optional()?)
      })
      .await?;

    raw.map(RawDoctor::into_doctor).transpose()
  }

  async fn register_actor(
    &self,
    account: NewAccount,
    password_hash: String,
  ) -> Result<Registered> {
    let now = Utc::now().trunc_subsecs(6);
    let actor = Actor {
      actor_id:      Uuid::new_v4(),
      email:         account.email,
      role:          account.role,
      first_name:    account.first_name,
      last_name:     account.last_name,
      phone_number:  account.phone_number,
      date_of_birth: account.date_of_birth,
      address:       account.address,
      created_at:    now,
      updated_at:    now,
    };
    let profile = match account.profile {
      NewProfile::Patient(clinical) => Some(Profile::Patient(PatientProfile {
        patient_id: Uuid::new_v4(),
        actor_id: actor.actor_id,
        clinical,
      })),
      NewProfile::Doctor(practice) => Some(Profile::Doctor(DoctorProfile {
        doctor_id: Uuid::new_v4(),
        actor_id: actor.actor_id,
        practice,
        is_verified: false,
      })),
      NewProfile::None => None,
    };

    let registered = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let email_taken = tx
          .query_row(
            "SELECT 1 FROM actors WHERE email = ?1",
            rusqlite::params![actor.email],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if email_taken {
          return Ok(Registered::EmailTaken);
        }

        if let Some(Profile::Doctor(d)) = &profile {
          let license_taken = tx
            .query_row(
              "SELECT 1 FROM doctors WHERE medical_license = ?1",
              rusqlite::params![d.practice.medical_license],
              |_| Ok(()),
            )
            .optional()?
            .is_some();
          if license_taken {
            return Ok(Registered::DuplicateLicense(d.practice.medical_license.clone()));
          }
        }

        let actor_id_str = encode_uuid(actor.actor_id);
        tx.execute(
          "INSERT INTO actors (
             actor_id, email, password_hash, role, first_name, last_name,
             phone_number, date_of_birth, address, created_at, updated_at,
             search_key
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
          rusqlite::params![
            actor_id_str,
            actor.email,
            password_hash,
            encode_role(actor.role),
            actor.first_name,
            actor.last_name,
            actor.phone_number,
            actor.date_of_birth.map(encode_date),
            actor.address,
            encode_dt(actor.created_at),
            encode_dt(actor.updated_at),
            search_key(&[
              &actor.first_name,
              &actor.last_name,
              &actor.email,
              &actor.phone_number,
            ]),
          ],
        )?;

        match &profile {
          Some(Profile::Patient(p)) => {
            let c = &p.clinical;
            tx.execute(
              &format!(
                "INSERT INTO patients ({PATIENT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
              ),
              rusqlite::params![
                encode_uuid(p.patient_id),
                actor_id_str,
                c.blood_type,
                c.height_cm,
                c.weight_kg,
                c.allergies,
                c.chronic_conditions,
                c.emergency_contact,
                c.emergency_phone,
                c.insurance_number,
              ],
            )?;
          }
          Some(Profile::Doctor(d)) => {
            let pr = &d.practice;
            tx.execute(
              &format!(
                "INSERT INTO doctors ({DOCTOR_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
              ),
              rusqlite::params![
                encode_uuid(d.doctor_id),
                actor_id_str,
                pr.medical_license,
                pr.specialization,
                pr.hospital,
                pr.years_of_experience,
                d.is_verified,
              ],
            )?;
          }
          None => {}
        }

        tx.commit()?;
        Ok(Registered::Created(Account::new(actor, profile)))
      })
      .await?;

    Ok(registered)
  }

  async fn search_patients(&self, text: &str) -> Result<Vec<(Actor, PatientProfile)>> {
    let pattern = like_pattern(text);

    let raws: Vec<(RawActor, RawPatient)> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {}, {}
             FROM patients p JOIN actors a ON a.actor_id = p.actor_id
            WHERE a.search_key LIKE ?1 ESCAPE '\\'
            ORDER BY a.last_name, a.first_name, a.email",
          qualified(ACTOR_COLUMNS, "a"),
          qualified(PATIENT_COLUMNS, "p"),
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![pattern], |row| {
            Ok((
              RawActor::from_row(row, 0)?,
              RawPatient::from_row(row, column_count(ACTOR_COLUMNS))?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(a, p)| Ok((a.into_actor()?, p.into_patient()?)))
      .collect()
  }

  // ── Records ───────────────────────────────────────────────────────────────

  async fn find_record_by_id(&self, record_id: Uuid) -> Result<Option<MedicalRecord>> {
    let id_str = encode_uuid(record_id);

    let raw: Option<RawRecord> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM records WHERE record_id = ?1"),
            rusqlite::params![id_str],
            RawRecord::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }

  async fn list_records_matching(
    &self,
    scope: &RecordScope,
    query: &RecordQuery,
  ) -> Result<Vec<MedicalRecord>> {
    let mut sql = format!("SELECT {RECORD_COLUMNS} FROM records WHERE 1 = 1");
    let mut params: Vec<Value> = Vec::new();

    match scope {
      RecordScope::All => {}
      RecordScope::Patient(id) => {
        sql.push_str(" AND patient_id = ?");
        params.push(Value::Text(encode_uuid(*id)));
      }
      RecordScope::Nothing => return Ok(Vec::new()),
    }
    if let Some(id) = query.patient_id {
      sql.push_str(" AND patient_id = ?");
      params.push(Value::Text(encode_uuid(id)));
    }
    if let Some(ty) = query.record_type {
      sql.push_str(" AND record_type = ?");
      params.push(Value::Text(encode_record_type(ty)));
    }
    if let Some(emergency) = query.emergency {
      sql.push_str(" AND is_emergency = ?");
      params.push(Value::Integer(i64::from(emergency)));
    }

    sql.push_str(" ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?");
    params.push(Value::Integer(
      query.limit.and_then(|l| i64::try_from(l).ok()).unwrap_or(-1),
    ));
    params.push(Value::Integer(
      query.offset.and_then(|o| i64::try_from(o).ok()).unwrap_or(0),
    ));

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }

  async fn save_record(&self, record: &MedicalRecord) -> Result<()> {
    let record_id_str  = encode_uuid(record.record_id);
    let patient_id_str = encode_uuid(record.patient_id);
    let created_by_str = record.created_by.map(encode_uuid);
    let created_at_str = encode_dt(record.created_at);
    let content        = record.content.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO records ({RECORD_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
          ),
          rusqlite::params![
            record_id_str,
            patient_id_str,
            created_by_str,
            created_at_str,
            encode_record_type(content.record_type),
            content.title,
            content.description,
            content.diagnosis,
            content.prescription,
            content.notes,
            content.attachment,
            content.is_emergency,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn update_record(
    &self,
    record_id: Uuid,
    content: RecordContent,
  ) -> Result<Option<MedicalRecord>> {
    let id_str = encode_uuid(record_id);

    let raw: Option<RawRecord> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE records
              SET record_type = ?2, title = ?3, description = ?4, diagnosis = ?5,
                  prescription = ?6, notes = ?7, attachment = ?8, is_emergency = ?9
            WHERE record_id = ?1",
          rusqlite::params![
            id_str,
            encode_record_type(content.record_type),
            content.title,
            content.description,
            content.diagnosis,
            content.prescription,
            content.notes,
            content.attachment,
            content.is_emergency,
          ],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        let raw = tx.query_row(
          &format!("SELECT {RECORD_COLUMNS} FROM records WHERE record_id = ?1"),
          rusqlite::params![id_str],
          RawRecord::from_row,
        )?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }

  // ── Tests ─────────────────────────────────────────────────────────────────

  async fn save_test(&self, test: &MedicalTest) -> Result<()> {
    let test = test.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO medical_tests ({TEST_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
          ),
          rusqlite::params![
            encode_uuid(test.test_id),
            encode_uuid(test.record_id),
            test.test_name,
            encode_date(test.test_date),
            test.result,
            test.unit,
            test.normal_range,
            test.lab_name,
            test.attachment,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn list_tests(&self, record_id: Uuid) -> Result<Vec<MedicalTest>> {
    let id_str = encode_uuid(record_id);

    let raws: Vec<RawTest> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {TEST_COLUMNS} FROM medical_tests
            WHERE record_id = ?1
            ORDER BY test_date, rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawTest::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTest::into_test).collect()
  }
}
