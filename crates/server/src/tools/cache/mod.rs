//! Store inspection MCP tools.
//!
//! This module provides tools for reading the SQLite-backed stores.

pub mod get;

pub use get::{CacheGetParams, get_impl};
