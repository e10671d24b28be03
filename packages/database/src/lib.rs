#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! `DuckDB` storage for preprocessed gazetteer tables.
//!
//! Each focus area owns up to four tables (`<focus>_admin`, `<focus>_poly`,
//! `<focus>_line`, `<focus>_point`) holding one location per row with its
//! geometry as WKT text and its OSM tags as a JSON object. The store is
//! only read once, while the location cache is built.

pub mod gazetteer_db;
pub mod paths;

pub use duckdb::Connection;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` query or connection error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// Filesystem error while preparing the database location.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A table name that is not a plain `[a-z0-9_]` identifier.
    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    /// The requested table does not exist.
    #[error("Table not found: {0}")]
    TableNotFound(String),
}
