//! The named-store seam the interceptor reads and writes through.

use async_trait::async_trait;

use crate::Error;
use crate::exchange::{Request, Response};

/// A set of named, persistent request-to-response stores.
///
/// Stores are created on open or on first write and destroyed only by
/// [`CacheStorage::delete`]. Writes to the same key overwrite.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the named store if it does not exist yet.
    async fn open(&self, name: &str) -> Result<(), Error>;

    /// Whether a store with this name exists.
    async fn has(&self, name: &str) -> Result<bool, Error>;

    /// Names of every existing store, in creation order.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Delete a store and all its entries. Returns false if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// Write a response for a request, creating the store if needed.
    async fn put(&self, name: &str, request: &Request, response: &Response) -> Result<(), Error>;

    /// Look up the response stored for a request.
    async fn match_request(&self, name: &str, request: &Request) -> Result<Option<Response>, Error>;
}
