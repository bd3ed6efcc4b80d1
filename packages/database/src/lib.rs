#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Database connection, queries, and risk table persistence.
//!
//! Input fetches and the risk upsert go through `switchy_database` raw SQL
//! with `$n` placeholders via `query_raw_params()` / `exec_raw_params()`.
//! The one table this crate owns (`street_segment_risk`) is created with
//! idempotent inline DDL; the segment and incident tables belong to the
//! upstream ETL and are only ever read.

pub mod db;
pub mod queries;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },

    /// A caller-supplied bounding box was inverted.
    #[error("Invalid bounding box: {message}")]
    InvalidBounds {
        /// Which bound constraint failed.
        message: String,
    },
}
