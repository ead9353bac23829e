//! HTTP Basic authentication against stored argon2 password hashes.
//!
//! Credentials are `email:password`. The [`CurrentActor`] extractor never
//! rejects a request for bad credentials: it yields `CurrentActor(None)` and
//! lets the record service decide whether the operation needs a caller.

use argon2::{
  Argon2, PasswordHash, PasswordHasher as _, PasswordVerifier as _,
  password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use carnet_core::{
  identity::{Actor, Principal},
  registration::normalize_email,
  render::Renderer,
  store::CarnetStore,
};
use rand_core::OsRng;

use crate::{AppState, error::ApiError};

/// The authenticated caller, if any.
pub struct CurrentActor(pub Option<Principal>);

impl CurrentActor {
  pub fn principal(&self) -> Option<&Principal> { self.0.as_ref() }
}

/// Hash `password` into an argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| ApiError::Hashing(e.to_string()))
}

/// `true` if `password` matches the PHC string `hash`.
pub fn verify_password(password: &str, hash: &str) -> bool {
  PasswordHash::new(hash)
    .map(|parsed| {
      Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
    })
    .unwrap_or(false)
}

/// Decode `Authorization: Basic …` into `(user, password)`.
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
  let encoded = headers
    .get(header::AUTHORIZATION)?
    .to_str()
    .ok()?
    .strip_prefix("Basic ")?;
  let decoded = B64.decode(encoded.trim()).ok()?;
  let creds = String::from_utf8(decoded).ok()?;
  let (user, password) = creds.split_once(':')?;
  Some((user.to_owned(), password.to_owned()))
}

/// Look up `email` and check `password`. `Ok(None)` for unknown accounts and
/// wrong passwords alike.
pub async fn authenticate<S>(
  store: &S,
  email: &str,
  password: &str,
) -> Result<Option<Actor>, ApiError>
where
  S: CarnetStore,
{
  let Ok(email) = normalize_email(email) else {
    return Ok(None);
  };
  let Some((actor, hash)) = store
    .find_credentials(&email)
    .await
    .map_err(ApiError::store)?
  else {
    return Ok(None);
  };
  Ok(verify_password(password, &hash).then_some(actor))
}

impl<S, R> FromRequestParts<AppState<S, R>> for CurrentActor
where
  S: CarnetStore + 'static,
  R: Renderer + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, R>,
  ) -> Result<Self, Self::Rejection> {
    let Some((email, password)) = basic_credentials(&parts.headers) else {
      return Ok(Self(None));
    };
    let Some(actor) = authenticate(state.service.store().as_ref(), &email, &password).await?
    else {
      tracing::debug!("basic credentials rejected");
      return Ok(Self(None));
    };
    let principal = state.service.resolve_principal(&actor).await?;
    Ok(Self(Some(principal)))
  }
}
