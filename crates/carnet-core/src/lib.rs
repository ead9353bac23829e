//! Core types and trait definitions for the Carnet medical record service.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! holds the identity model, the authorization engine, the record query
//! scoper and the record lifecycle controller. Storage and document
//! rendering are reached through the [`store::CarnetStore`] and
//! [`render::Renderer`] traits.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod access;
pub mod error;
pub mod identity;
pub mod record;
pub mod registration;
pub mod render;
pub mod scope;
pub mod service;
pub mod store;

pub use error::{Error, Result};
