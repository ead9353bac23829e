//! ETags for exported documents.
//!
//! Rendering is deterministic, so the SHA-256 of the body identifies the
//! document; any change to the patient, a record, its author or its tests
//! changes the bytes and therefore the tag.

use axum::http::{HeaderMap, header};
use sha2::{Digest, Sha256};

/// Strong ETag (quoted hex digest) for `body`.
pub fn compute_etag(body: &[u8]) -> String {
  let hash = Sha256::digest(body);
  format!("\"{}\"", hex::encode(hash))
}

/// `true` if the request's `If-None-Match` lists `etag` (or `*`).
pub fn if_none_match(headers: &HeaderMap, etag: &str) -> bool {
  headers
    .get_all(header::IF_NONE_MATCH)
    .iter()
    .filter_map(|v| v.to_str().ok())
    .flat_map(|v| v.split(','))
    .map(|tag| tag.trim().trim_start_matches("W/"))
    .any(|tag| tag == "*" || tag == etag)
}
