//! JSON REST API for Carnet.
//!
//! Exposes an axum [`Router`] backed by any [`CarnetStore`] and [`Renderer`].
//! Every handler authenticates the caller with HTTP Basic credentials and
//! delegates to [`RecordService`]; role checks never happen here. TLS and
//! transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", carnet_api::api_router(service.clone()))
//! ```

pub mod accounts;
pub mod auth;
pub mod error;
pub mod etag;
pub mod export;
pub mod patients;
pub mod records;

use axum::{
  Router,
  routing::{get, post},
};
use carnet_core::{render::Renderer, service::RecordService, store::CarnetStore};

pub use error::ApiError;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, R> {
  pub service: RecordService<S, R>,
}

impl<S, R> Clone for AppState<S, R> {
  fn clone(&self) -> Self { Self { service: self.service.clone() } }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router around `service`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, R>(service: RecordService<S, R>) -> Router<()>
where
  S: CarnetStore + 'static,
  R: Renderer + 'static,
{
  Router::new()
    // Accounts
    .route("/auth/register", post(accounts::register::<S, R>))
    .route("/auth/login", post(accounts::login::<S, R>))
    .route("/auth/me", get(accounts::me::<S, R>))
    // Records
    .route("/records", get(records::list::<S, R>).post(records::create::<S, R>))
    .route("/records/export", get(export::bulk::<S, R>))
    .route(
      "/records/{id}",
      get(records::get_one::<S, R>)
        .put(records::update::<S, R>)
        .patch(records::update::<S, R>),
    )
    .route("/records/{id}/tests", post(records::add_test::<S, R>))
    .route("/records/{id}/export", get(export::single::<S, R>))
    // Patients
    .route("/patients/search", get(patients::search::<S, R>))
    .route("/patients/{id}", get(patients::get_one::<S, R>))
    .with_state(AppState { service })
}
