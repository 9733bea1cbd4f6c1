//! The network seam.

use async_trait::async_trait;

use crate::Error;
use crate::exchange::{Request, Response};

/// Performs a real network fetch.
///
/// Any HTTP status is a successful fetch; `Err` means the request never got
/// a response (offline, refused, timed out).
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}
