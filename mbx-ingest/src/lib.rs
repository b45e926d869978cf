//! mbx-ingest library interface
//!
//! Turns a raw mobile-device backup container into validated records:
//! unwrap, categorize, decode, prospect embedded databases, normalize,
//! deduplicate, validate, persist. Exposed as a library for the binary and
//! for integration testing.

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod heuristics;
pub mod jobs;
pub mod models;
pub mod prospector;
pub mod services;
pub mod storage;
pub mod validators;
pub mod workflow;

pub use crate::config::IngestConfig;
pub use crate::error::{IngestError, IngestResult};
pub use crate::jobs::JobRunner;
pub use crate::models::{RunId, RunSummary};
pub use crate::workflow::IngestPipeline;
