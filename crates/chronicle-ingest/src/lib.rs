//! # chronicle-ingest
//!
//! Incremental ingestion for chronicle.
//!
//! This crate provides:
//! - The [`SourcePlugin`] contract adapting origin systems to the engine
//! - An explicit [`SourceRegistry`] populated at startup
//! - The [`IngestEngine`] run protocol with per-source watermarks and
//!   cross-source location enrichment
//! - A background [`IngestWorker`] that runs sources on a periodic tick
//! - The [`PlaceDetector`], which synthesizes `place` and `place.visit`
//!   entities from the GPS backbone
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use chronicle_db::Database;
//! use chronicle_ingest::{IngestEngine, IngestWorker, SourceRegistry, WorkerConfig};
//!
//! let db = Database::connect("postgres://...").await?;
//! let mut registry = SourceRegistry::new();
//! registry.register(Arc::new(my_source))?;
//!
//! let engine = Arc::new(IngestEngine::new(
//!     Arc::new(db.clone()),
//!     Arc::new(db.resolver.clone()),
//!     Arc::new(registry),
//! ));
//! let handle = IngestWorker::new(engine, WorkerConfig::from_env()).start();
//! // ...
//! handle.shutdown().await?;
//! ```

pub mod detector;
pub mod engine;
pub mod registry;
pub mod source;
pub mod worker;

// Re-export core types
pub use chronicle_core::*;

pub use detector::{ClusterParams, DetectorReport, PlaceDetector, VisitParams};
pub use engine::{IngestEngine, RunReport};
pub use registry::SourceRegistry;
pub use source::{RawRecord, SourcePlugin, StaticSource};
pub use worker::{IngestEvent, IngestWorker, WorkerConfig, WorkerHandle};
