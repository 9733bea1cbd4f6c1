//! cache_get tool implementation.
//!
//! Retrieves a stored response by store name and request identity.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::resolve;
use shellcache_core::{CacheEntry, Error, Request};

use crate::state::AppState;
use crate::tools::body::{BodyEncoding, encode_body, header_pairs};
use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Store name, e.g. `shell-v2`.
    pub store: String,
    /// Request URL; relative references resolve against the controlled origin.
    pub url: String,
    /// Request method (default: GET).
    #[serde(default)]
    pub method: Option<String>,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CacheGetOutput {
    /// The stored entry's metadata.
    pub entry: CacheEntry,
    /// Stored headers in order; non-UTF-8 bytes are shown lossily.
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub body_encoding: BodyEncoding,
}

pub async fn get(state: &AppState, params: CacheGetParams) -> Result<CacheGetOutput, McpError> {
    let url = resolve(&state.origin, &params.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", params.url)))?;
    let method = params.method.as_deref().unwrap_or("GET");
    let key_url = Request::get(url).key_url();

    let entry = state
        .db
        .get_entry(&params.store, method, &key_url)
        .await?
        .ok_or_else(|| Error::CacheMiss(format!("{} {method} {key_url}", params.store)))?;

    let headers = header_pairs(&entry.to_response()?.headers);
    let (body, body_encoding) = encode_body(&entry.body);
    Ok(CacheGetOutput { entry, headers, body, body_encoding })
}

/// Implementation of the cache_get tool.
pub async fn get_impl(state: &AppState, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    json_result(&get(state, params).await?)
}
