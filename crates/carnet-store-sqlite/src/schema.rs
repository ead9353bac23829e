//! SQL schema for the Carnet SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS actors (
    actor_id       TEXT PRIMARY KEY,
    email          TEXT NOT NULL UNIQUE,
    password_hash  TEXT NOT NULL,          -- argon2 PHC string
    role           TEXT NOT NULL,          -- 'patient' | 'doctor' | 'admin'
    first_name     TEXT NOT NULL DEFAULT '',
    last_name      TEXT NOT NULL DEFAULT '',
    phone_number   TEXT NOT NULL DEFAULT '',
    date_of_birth  TEXT,                   -- YYYY-MM-DD or NULL
    address        TEXT NOT NULL DEFAULT '',
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    search_key     TEXT NOT NULL DEFAULT ''  -- lowercased names, email, phone
);

CREATE TABLE IF NOT EXISTS patients (
    patient_id         TEXT PRIMARY KEY,
    actor_id           TEXT NOT NULL UNIQUE
                       REFERENCES actors(actor_id) ON DELETE CASCADE,
    blood_type         TEXT NOT NULL DEFAULT '',
    height_cm          REAL,
    weight_kg          REAL,
    allergies          TEXT NOT NULL DEFAULT '',
    chronic_conditions TEXT NOT NULL DEFAULT '',
    emergency_contact  TEXT NOT NULL DEFAULT '',
    emergency_phone    TEXT NOT NULL DEFAULT '',
    insurance_number   TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS doctors (
    doctor_id           TEXT PRIMARY KEY,
    actor_id            TEXT NOT NULL UNIQUE
                        REFERENCES actors(actor_id) ON DELETE CASCADE,
    medical_license     TEXT NOT NULL UNIQUE,
    specialization      TEXT NOT NULL,
    hospital            TEXT NOT NULL DEFAULT '',
    years_of_experience INTEGER NOT NULL DEFAULT 0,
    is_verified         INTEGER NOT NULL DEFAULT 0
);

-- A record outlives its author: removing the doctor clears created_by.
CREATE TABLE IF NOT EXISTS records (
    record_id    TEXT PRIMARY KEY,
    patient_id   TEXT NOT NULL
                 REFERENCES patients(patient_id) ON DELETE CASCADE,
    created_by   TEXT
                 REFERENCES doctors(doctor_id) ON DELETE SET NULL,
    created_at   TEXT NOT NULL,   -- RFC 3339 UTC, fixed microsecond width
    record_type  TEXT NOT NULL,
    title        TEXT NOT NULL,
    description  TEXT NOT NULL,
    diagnosis    TEXT NOT NULL DEFAULT '',
    prescription TEXT NOT NULL DEFAULT '',
    notes        TEXT NOT NULL DEFAULT '',
    attachment   TEXT,
    is_emergency INTEGER NOT NULL DEFAULT 0
);

-- patient_id and created_at are written once.
CREATE TRIGGER IF NOT EXISTS records_links_immutable
BEFORE UPDATE OF patient_id, created_at ON records
WHEN NEW.patient_id IS NOT OLD.patient_id
  OR NEW.created_at IS NOT OLD.created_at
BEGIN
    SELECT RAISE(ABORT, 'patient_id and created_at are immutable');
END;

-- created_by may only ever be cleared.
CREATE TRIGGER IF NOT EXISTS records_author_immutable
BEFORE UPDATE OF created_by ON records
WHEN NEW.created_by IS NOT NULL
 AND NEW.created_by IS NOT OLD.created_by
BEGIN
    SELECT RAISE(ABORT, 'created_by cannot be reassigned');
END;

CREATE TABLE IF NOT EXISTS medical_tests (
    test_id      TEXT PRIMARY KEY,
    record_id    TEXT NOT NULL
                 REFERENCES records(record_id) ON DELETE CASCADE,
    test_name    TEXT NOT NULL,
    test_date    TEXT NOT NULL,   -- YYYY-MM-DD
    result       TEXT NOT NULL,
    unit         TEXT NOT NULL DEFAULT '',
    normal_range TEXT NOT NULL DEFAULT '',
    lab_name     TEXT NOT NULL DEFAULT '',
    attachment   TEXT
);

CREATE INDEX IF NOT EXISTS records_patient_idx ON records(patient_id);
CREATE INDEX IF NOT EXISTS records_created_idx ON records(created_at);
CREATE INDEX IF NOT EXISTS tests_record_idx    ON medical_tests(record_id);

PRAGMA user_version = 1;
";
