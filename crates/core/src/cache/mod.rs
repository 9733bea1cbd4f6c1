//! SQLite-backed named stores for response snapshots.
//!
//! This module provides persistent stores keyed by request identity using
//! SQLite with async access via tokio-rusqlite. It supports:
//!
//! - One named store per generation, all in one database
//! - Request identity keys derived with SHA-256
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Whole-store deletion with cascading entries

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CacheEntry;
pub use storage::CacheStorage;
