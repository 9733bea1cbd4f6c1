//! Client code for shellcache.
//!
//! This crate provides the HTTP network seam the interceptor fetches through,
//! and URL helpers shared by the server.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, UrlError, parse_origin, resolve};
