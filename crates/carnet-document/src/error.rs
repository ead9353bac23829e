//! Error types for the document renderer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("XML write error: {0}")]
  Xml(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
