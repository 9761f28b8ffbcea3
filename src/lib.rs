//! Metadata layer for data-pipeline feeds.
//!
//! - [`graph`]: typed entity views (feeds, categories, SLAs, ...) over the node store.
//! - [`db`]: the SQLite-backed node store.
//! - [`schema`]: table schema model and derivation of DDL fragments.
//! - [`status`]: lazily built cluster manager status client.

pub mod db;
pub mod error;
pub mod graph;
pub mod models;
pub mod schema;
pub mod status;
