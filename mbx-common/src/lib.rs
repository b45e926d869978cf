//! # MBX Common Library
//!
//! Shared code for the mobile-backup extraction workspace:
//! - Error and result types
//! - Configuration loading and root folder resolution
//! - Extracted record data model
//! - Phone and timestamp normalization
//! - Database initialization for the record store

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod phone;
pub mod records;
pub mod time;
pub mod value;

pub use error::{Error, Result};
pub use phone::PhoneRules;
pub use value::RawValue;
