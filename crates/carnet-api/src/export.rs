//! Document downloads.
//!
//! Both endpoints return the rendered bytes untouched, with
//! `Content-Disposition: attachment` and a content-derived `ETag`. A matching
//! `If-None-Match` yields `304 Not Modified` without a body.

use axum::{
  extract::{Path, Query, State},
  http::{HeaderMap, HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use carnet_core::{render::{Artifact, Renderer}, store::CarnetStore};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState,
  auth::CurrentActor,
  error::ApiError,
  etag::{compute_etag, if_none_match},
};

/// `GET /records/{id}/export`
pub async fn single<S, R>(
  State(state): State<AppState<S, R>>,
  caller: CurrentActor,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
) -> Result<Response, ApiError>
where
  S: CarnetStore + 'static,
  R: Renderer + 'static,
{
  let artifact = state.service.export_single(caller.principal(), id).await?;
  artifact_response(artifact, &headers)
}

#[derive(Debug, Deserialize)]
pub struct BulkParams {
  pub patient_id: Option<Uuid>,
}

/// `GET /records/export[?patient_id=<uuid>]`
pub async fn bulk<S, R>(
  State(state): State<AppState<S, R>>,
  caller: CurrentActor,
  Query(params): Query<BulkParams>,
  headers: HeaderMap,
) -> Result<Response, ApiError>
where
  S: CarnetStore + 'static,
  R: Renderer + 'static,
{
  let artifact = state
    .service
    .export_bulk(caller.principal(), params.patient_id)
    .await?;
  artifact_response(artifact, &headers)
}

fn artifact_response(artifact: Artifact, request: &HeaderMap) -> Result<Response, ApiError> {
  let etag = compute_etag(&artifact.body);
  let etag_value = header_value(&etag)?;

  if if_none_match(request, &etag) {
    return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag_value)]).into_response());
  }

  let disposition = header_value(&format!("attachment; filename=\"{}\"", artifact.file_name))?;
  Ok(
    (
      StatusCode::OK,
      [
        (header::CONTENT_TYPE, HeaderValue::from_static(artifact.media_type)),
        (header::CONTENT_DISPOSITION, disposition),
        (header::ETAG, etag_value),
      ],
      artifact.body,
    )
      .into_response(),
  )
}

fn header_value(value: &str) -> Result<HeaderValue, ApiError> {
  HeaderValue::from_str(value).map_err(|e| ApiError::BadRequest(e.to_string()))
}
