//! Handlers for `/records` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/records` | `?patient_id=&record_type=&emergency=&limit=&offset=` |
//! | `POST` | `/records` | Body: record fields plus `patient_id`; 201 |
//! | `GET`  | `/records/{id}` | Record with its tests |
//! | `PUT`/`PATCH` | `/records/{id}` | Partial update; omitted fields keep their value |
//! | `POST` | `/records/{id}/tests` | Attach a lab result; 201 |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use carnet_core::{
  record::{
    MedicalRecord, NewTest, RecordDetail, RecordFields, RecordPatch, RecordQuery,
    RecordType,
  },
  render::Renderer,
  store::CarnetStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, auth::CurrentActor, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub patient_id:  Option<Uuid>,
  pub record_type: Option<String>,
  pub emergency:   Option<bool>,
  pub limit:       Option<usize>,
  pub offset:      Option<usize>,
}

impl ListParams {
  fn into_query(self) -> Result<RecordQuery, ApiError> {
    Ok(RecordQuery {
      patient_id:  self.patient_id,
      record_type: self.record_type.as_deref().map(RecordType::parse).transpose()?,
      emergency:   self.emergency,
      limit:       self.limit,
      offset:      self.offset,
    })
  }
}

/// `GET /records`
pub async fn list<S, R>(
  State(state): State<AppState<S, R>>,
  caller: CurrentActor,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<MedicalRecord>>, ApiError>
where
  S: CarnetStore + 'static,
  R: Renderer + 'static,
{
  let query = params.into_query()?;
  Ok(Json(state.service.list(caller.principal(), query).await?))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  #[serde(default)]
  pub patient_id: Option<Uuid>,
  #[serde(flatten)]
  pub fields:     RecordFields,
}

/// `POST /records`
pub async fn create<S, R>(
  State(state): State<AppState<S, R>>,
  caller: CurrentActor,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CarnetStore + 'static,
  R: Renderer + 'static,
{
  let record = state
    .service
    .create(caller.principal(), body.patient_id, body.fields)
    .await?;
  Ok((StatusCode::CREATED, Json(record)))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /records/{id}`
pub async fn get_one<S, R>(
  State(state): State<AppState<S, R>>,
  caller: CurrentActor,
  Path(id): Path<Uuid>,
) -> Result<Json<RecordDetail>, ApiError>
where
  S: CarnetStore + 'static,
  R: Renderer + 'static,
{
  Ok(Json(state.service.get(caller.principal(), id).await?))
}

// ─── Update ──────────────────────────────────────────────────────────────────

/// `PUT /records/{id}` and `PATCH /records/{id}`
///
/// Both verbs apply a [`RecordPatch`]: a `PUT` does not replace the record,
/// and fields missing from the body are left unchanged.
pub async fn update<S, R>(
  State(state): State<AppState<S, R>>,
  caller: CurrentActor,
  Path(id): Path<Uuid>,
  Json(patch): Json<RecordPatch>,
) -> Result<Json<MedicalRecord>, ApiError>
where
  S: CarnetStore + 'static,
  R: Renderer + 'static,
{
  Ok(Json(state.service.update(caller.principal(), id, patch).await?))
}

// ─── Tests ───────────────────────────────────────────────────────────────────

/// `POST /records/{id}/tests`
pub async fn add_test<S, R>(
  State(state): State<AppState<S, R>>,
  caller: CurrentActor,
  Path(id): Path<Uuid>,
  Json(body): Json<NewTest>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CarnetStore + 'static,
  R: Renderer + 'static,
{
  let test = state.service.add_test(caller.principal(), id, body).await?;
  Ok((StatusCode::CREATED, Json(test)))
}
