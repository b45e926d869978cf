//! Test Helper Utilities
//!
//! Shared fixture builders for mbx-ingest integration tests

#![allow(dead_code)]

pub mod archives;
pub mod pipeline;

pub use archives::{android_backup, apk_with_manifest, tar_archive, tar_with_raw_name, zlib};
pub use pipeline::{create_sqlite_fixture, native_config, test_pipeline, test_pipeline_with, TestPipeline};
