//! XHTML generation on top of `quick-xml`'s writer API.

use std::io::Cursor;

use carnet_core::{
  identity::{Actor, ClinicalInfo},
  render::{PatientSnapshot, RecordSnapshot},
};
use chrono::{DateTime, Utc};
use quick_xml::{
  Writer,
  events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};

use crate::error::{Error, Result};

pub const NS_XHTML: &str = "http://www.w3.org/1999/xhtml";

const STYLE: &str = "body{font-family:sans-serif;margin:2em;color:#222}\
h1{color:#1a5276;text-align:center}\
h2{color:#1a5276;border-bottom:1px solid #1a5276}\
table{border-collapse:collapse;margin-bottom:1em}\
th,td{border:1px solid #ccc;padding:4px 8px;text-align:left}\
th{background:#eaf2f8}\
.emergency{color:#b03a2e;font-weight:bold}\
.confidential{text-align:center;font-style:italic;margin-top:2em}";

const NOT_PROVIDED: &str = "Not provided";

// ─── Document ────────────────────────────────────────────────────────────────

/// Writes a complete medical record document for one patient.
pub(crate) struct Document {
  w: Writer<Cursor<Vec<u8>>>,
}

impl Document {
  pub fn new() -> Self {
    Self { w: Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2) }
  }

  pub fn write(
    mut self,
    title: &str,
    patient: &PatientSnapshot,
    records: &[RecordSnapshot],
  ) -> Result<Vec<u8>> {
    self.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut html = BytesStart::new("html");
    html.push_attribute(("xmlns", NS_XHTML));
    html.push_attribute(("xml:lang", "en"));
    self.event(Event::Start(html))?;

    self.start("head")?;
    self.text_elem(
      "title",
      &format!("{title} - {}", patient.actor.full_name()),
    )?;
    self.text_elem("style", STYLE)?;
    self.end("head")?;

    self.start("body")?;
    self.text_elem("h1", title)?;

    self.text_elem("h2", "Patient information")?;
    self.patient_table(&patient.actor, &patient.profile.clinical)?;

    self.text_elem("h2", "Medical history")?;
    if records.is_empty() {
      self.text_elem("p", "No medical records found.")?;
    }
    for snapshot in records {
      self.record_section(snapshot)?;
    }

    self.text_elem_with_class(
      "p",
      "confidential",
      "This document is confidential and protected by medical secrecy.",
    )?;
    self.end("body")?;
    self.end("html")?;

    Ok(self.w.into_inner().into_inner())
  }

  fn patient_table(&mut self, actor: &Actor, clinical: &ClinicalInfo) -> Result<()> {
    let mut rows: Vec<(&str, String)> = vec![
      ("Name", actor.full_name()),
      ("Email", actor.email.clone()),
      ("Phone", or_missing(&actor.phone_number)),
      (
        "Date of birth",
        actor
          .date_of_birth
          .map_or_else(|| NOT_PROVIDED.to_owned(), |d| d.format("%d/%m/%Y").to_string()),
      ),
      ("Address", or_missing(&actor.address)),
      ("Blood type", or_missing(&clinical.blood_type)),
      ("Height", clinical.height_cm.map_or_else(|| NOT_PROVIDED.to_owned(), |h| format!("{h} cm"))),
      ("Weight", clinical.weight_kg.map_or_else(|| NOT_PROVIDED.to_owned(), |w| format!("{w} kg"))),
    ];
    if let Some(bmi) = clinical.body_mass_index() {
      rows.push(("Body mass index", format!("{bmi:.2}")));
    }
    rows.extend([
      ("Allergies", or_missing(&clinical.allergies)),
      ("Chronic conditions", or_missing(&clinical.chronic_conditions)),
      ("Emergency contact", emergency_contact(clinical)),
      ("Insurance number", or_missing(&clinical.insurance_number)),
    ]);
    self.key_value_table("patient", &rows)
  }

  fn record_section(&mut self, snapshot: &RecordSnapshot) -> Result<()> {
    let record = &snapshot.record;
    let content = &record.content;

    let mut section = BytesStart::new("div");
    section.push_attribute(("class", "record"));
    section.push_attribute(("id", format!("record-{}", record.record_id).as_str()));
    self.event(Event::Start(section))?;

    self.text_elem("h3", &content.title)?;

    let mut rows = vec![
      ("Type", content.record_type.label().to_owned()),
      ("Date", format_dt(record.created_at)),
      (
        "Created by",
        snapshot
          .author
          .as_ref()
          .map_or_else(|| "Unknown".to_owned(), |a| {
            format!("Dr. {} ({})", a.actor.full_name(), a.profile.practice.specialization)
          }),
      ),
    ];
    if let Some(attachment) = &content.attachment {
      rows.push(("Attachment", attachment.clone()));
    }
    self.key_value_table("record-info", &rows)?;

    if content.is_emergency {
      self.text_elem_with_class("p", "emergency", "Emergency")?;
    }

    for (label, text) in [
      ("Description", &content.description),
      ("Diagnosis", &content.diagnosis),
      ("Prescription", &content.prescription),
      ("Notes", &content.notes),
    ] {
      if text.trim().is_empty() {
        continue;
      }
      self.start("p")?;
      self.text_elem("strong", &format!("{label}:"))?;
      self.text(&format!(" {text}"))?;
      self.end("p")?;
    }

    if !snapshot.tests.is_empty() {
      self.text_elem("h4", "Medical tests")?;
      self.start("table")?;
      self.start("tr")?;
      for header in ["Test", "Date", "Result", "Normal range"] {
        self.text_elem("th", header)?;
      }
      self.end("tr")?;
      for test in &snapshot.tests {
        let result = if test.unit.is_empty() {
          test.result.clone()
        } else {
          format!("{} {}", test.result, test.unit)
        };
        self.start("tr")?;
        self.text_elem("td", &test.test_name)?;
        self.text_elem("td", &test.test_date.format("%d/%m/%Y").to_string())?;
        self.text_elem("td", &result)?;
        self.text_elem("td", &test.normal_range)?;
        self.end("tr")?;
      }
      self.end("table")?;
    }

    self.end("div")
  }

  // ── Writer helpers ────────────────────────────────────────────────────

  fn key_value_table(&mut self, class: &str, rows: &[(&str, String)]) -> Result<()> {
    let mut table = BytesStart::new("table");
    table.push_attribute(("class", class));
    self.event(Event::Start(table))?;
    for (key, value) in rows {
      self.start("tr")?;
      self.text_elem("th", key)?;
      self.text_elem("td", value)?;
      self.end("tr")?;
    }
    self.end("table")
  }

  fn event(&mut self, event: Event<'_>) -> Result<()> {
    self.w.write_event(event).map_err(|e| Error::Xml(e.to_string()))
  }

  fn start(&mut self, tag: &str) -> Result<()> {
    self.event(Event::Start(BytesStart::new(tag)))
  }

  fn end(&mut self, tag: &str) -> Result<()> { self.event(Event::End(BytesEnd::new(tag))) }

  fn text(&mut self, text: &str) -> Result<()> { self.event(Event::Text(BytesText::new(text))) }

  fn text_elem(&mut self, tag: &str, text: &str) -> Result<()> {
    self.start(tag)?;
    self.text(text)?;
    self.end(tag)
  }

  fn text_elem_with_class(&mut self, tag: &str, class: &str, text: &str) -> Result<()> {
    let mut el = BytesStart::new(tag);
    el.push_attribute(("class", class));
    self.event(Event::Start(el))?;
    self.text(text)?;
    self.end(tag)
  }
}

fn or_missing(value: &str) -> String {
  if value.trim().is_empty() { NOT_PROVIDED.to_owned() } else { value.to_owned() }
}

fn emergency_contact(clinical: &ClinicalInfo) -> String {
  match (clinical.emergency_contact.trim(), clinical.emergency_phone.trim()) {
    ("", "") => NOT_PROVIDED.to_owned(),
    (name, "") => name.to_owned(),
    ("", phone) => phone.to_owned(),
    (name, phone) => format!("{name} ({phone})"),
  }
}

fn format_dt(dt: DateTime<Utc>) -> String { dt.format("%d/%m/%Y %H:%M UTC").to_string() }
