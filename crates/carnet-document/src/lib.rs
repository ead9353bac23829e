//! Printable medical record documents for Carnet.
//!
//! [`XhtmlRenderer`] turns the snapshots assembled by the record service into
//! a self-contained XHTML page: patient details, every record with its author
//! and lab results, and a confidentiality notice. Rendering is pure and
//! deterministic, so identical inputs always produce identical bytes.

pub mod error;
mod xhtml;

use bytes::Bytes;
use carnet_core::render::{PatientSnapshot, RecordSnapshot, Rendered, Renderer};

pub use error::{Error, Result};

pub const MEDIA_TYPE: &str = "application/xhtml+xml";
pub const EXTENSION: &str = "xhtml";

/// Renders records as a standalone XHTML document.
#[derive(Debug, Clone)]
pub struct XhtmlRenderer {
  title: String,
}

impl XhtmlRenderer {
  /// `title` heads every generated document.
  pub fn new(title: impl Into<String>) -> Self { Self { title: title.into() } }
}

impl Default for XhtmlRenderer {
  fn default() -> Self { Self::new("Carnet - Medical Record") }
}

impl Renderer for XhtmlRenderer {
  type Error = Error;

  fn render(&self, patient: &PatientSnapshot, records: &[RecordSnapshot]) -> Result<Rendered> {
    let body = xhtml::Document::new().write(&self.title, patient, records)?;
    Ok(Rendered { media_type: MEDIA_TYPE, extension: EXTENSION, body: Bytes::from(body) })
  }
}
