//! Handlers for `/patients` endpoints.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use carnet_core::{
  identity::PatientDetail,
  render::Renderer,
  service::PatientMatch,
  store::CarnetStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, auth::CurrentActor, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
  #[serde(default)]
  pub q: String,
}

/// `GET /patients/search?q=<text>` — doctors and administrators only.
pub async fn search<S, R>(
  State(state): State<AppState<S, R>>,
  caller: CurrentActor,
  Query(params): Query<SearchParams>,
) -> Result<Json<Vec<PatientMatch>>, ApiError>
where
  S: CarnetStore + 'static,
  R: Renderer + 'static,
{
  Ok(Json(
    state.service.search_patients(caller.principal(), &params.q).await?,
  ))
}

/// `GET /patients/{id}`
pub async fn get_one<S, R>(
  State(state): State<AppState<S, R>>,
  caller: CurrentActor,
  Path(id): Path<Uuid>,
) -> Result<Json<PatientDetail>, ApiError>
where
  S: CarnetStore + 'static,
  R: Renderer + 'static,
{
  Ok(Json(state.service.get_patient(caller.principal(), id).await?))
}
