//! Database access for the record store

pub mod init;

pub use init::{create_schema, init_database, init_in_memory, record_table};
