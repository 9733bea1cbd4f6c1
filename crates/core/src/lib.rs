//! Core types and shared functionality for shellcache.
//!
//! This crate provides:
//! - Request routing and the four caching strategies
//! - Generation lifecycle (install, activate, skip-waiting, claim)
//! - Named response stores with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod exchange;
pub mod interceptor;
pub mod network;
pub mod registration;

#[cfg(test)]
mod test_support;

pub use cache::{CacheDb, CacheEntry, CacheStorage};
pub use config::AppConfig;
pub use error::Error;
pub use exchange::{Destination, Request, RequestMode, Response};
pub use interceptor::{Command, FetchOutcome, Interceptor, Served, Source, Strategy, WorkerScope};
pub use network::Network;
pub use registration::{ClientId, Dispatch, Registration, RegistrationStatus, WorkerState};
