//! Handlers for `/auth` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/auth/register` | 201 with the new account; admins cannot self-register |
//! | `POST` | `/auth/login` | Body: `{"email":…,"password":…}`; 401 on mismatch |
//! | `GET`  | `/auth/me` | Requires Basic credentials |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use carnet_core::{
  Error as CoreError,
  access::Denial,
  identity::Account,
  registration::Registration,
  render::Renderer,
  store::CarnetStore,
};
use serde::Deserialize;

use crate::{
  AppState,
  auth::{CurrentActor, authenticate, hash_password},
  error::ApiError,
};

// ─── Register ────────────────────────────────────────────────────────────────

/// `POST /auth/register`
pub async fn register<S, R>(
  State(state): State<AppState<S, R>>,
  Json(body): Json<Registration>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CarnetStore + 'static,
  R: Renderer + 'static,
{
  let (account, password) = body.validate()?;
  let hash = hash_password(&password)?;
  let account = state.service.register(account, hash).await?;
  Ok((StatusCode::CREATED, Json(account)))
}

// ─── Login ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub email:    String,
  pub password: String,
}

/// `POST /auth/login`
pub async fn login<S, R>(
  State(state): State<AppState<S, R>>,
  Json(body): Json<LoginBody>,
) -> Result<Json<Account>, ApiError>
where
  S: CarnetStore + 'static,
  R: Renderer + 'static,
{
  let actor = authenticate(state.service.store().as_ref(), &body.email, &body.password)
    .await?
    .ok_or(CoreError::Denied(Denial::Unauthenticated))?;
  let principal = state.service.resolve_principal(&actor).await?;
  let account = state.service.account(Some(&principal)).await?;
  tracing::info!(actor_id = %account.actor.actor_id, "login");
  Ok(Json(account))
}

// ─── Me ──────────────────────────────────────────────────────────────────────

/// `GET /auth/me`
pub async fn me<S, R>(
  State(state): State<AppState<S, R>>,
  caller: CurrentActor,
) -> Result<Json<Account>, ApiError>
where
  S: CarnetStore + 'static,
  R: Renderer + 'static,
{
  Ok(Json(state.service.account(caller.principal()).await?))
}
