//! # chronicle-core
//!
//! Core types, traits, and abstractions for the chronicle personal
//! spatiotemporal database.
//!
//! This crate provides the foundational data structures and trait
//! definitions that the other chronicle crates depend on: the unified
//! entity model, query request/response types, the error enum, shared
//! default constants, and the seam traits between the ingestion engine and
//! the store.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
