//! sw_fetch tool implementation.
//!
//! Dispatches a page request through the registration: the controlling
//! generation serves it with its caching strategy, or it goes straight to
//! the network.

use std::collections::BTreeMap;

use chrono::Utc;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::resolve;
use shellcache_core::{ClientId, Destination, Dispatch, Error, Request, RequestMode, Source, Strategy};

use super::body::{BodyEncoding, encode_body, header_pairs};
use super::json_result;
use crate::error::ToolError;
use crate::state::AppState;

/// Parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// URL to request; relative references resolve against the controlled origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default)]
    pub method: Option<String>,

    /// Request mode (default: cors; navigate for page loads).
    #[serde(default)]
    pub mode: Option<RequestMode>,

    /// Request destination (default: empty; document for navigations).
    #[serde(default)]
    pub destination: Option<Destination>,

    /// Page issuing the request. Navigations ignore it.
    #[serde(default)]
    pub client_id: Option<ClientId>,

    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Output from the sw_fetch tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SwFetchOutput {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub body_encoding: BodyEncoding,
    /// Generation that served the request; `None` when it went straight to the network.
    pub handled_by: Option<String>,
    pub strategy: Option<Strategy>,
    pub source: Option<Source>,
    /// ISO8601 timestamp of when the response was produced.
    pub fetched_at: String,
}

fn build_request(state: &AppState, params: &SwFetchParams) -> Result<Request, McpError> {
    let url = resolve(&state.origin, &params.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", params.url)))?;

    let method = match params.method.as_deref() {
        Some(m) => Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| ToolError::InvalidInput(format!("invalid method: {m}")))?,
        None => Method::GET,
    };

    let mut headers = HeaderMap::new();
    for (name, value) in &params.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ToolError::InvalidInput(format!("invalid header name {name}: {e}")))?;
        let value =
            HeaderValue::from_str(value).map_err(|e| ToolError::InvalidInput(format!("invalid header value: {e}")))?;
        headers.append(name, value);
    }

    let mut request = match params.mode {
        Some(RequestMode::Navigate) => Request::navigate(url),
        Some(mode) => Request::get(url).with_mode(mode),
        None => Request::get(url),
    };
    if let Some(destination) = params.destination {
        request = request.with_destination(destination);
    }
    request.method = method;
    request.headers = headers;
    Ok(request)
}

pub async fn fetch(state: &AppState, params: SwFetchParams) -> Result<SwFetchOutput, McpError> {
    let request = build_request(state, &params)?;
    let dispatch = state.registration.fetch(params.client_id, &request).await?;

    let (handled_by, strategy, source) = match &dispatch {
        Dispatch::Network(_) => (None, None, None),
        Dispatch::Intercepted { version, served } => (Some(version.clone()), Some(served.strategy), Some(served.source)),
    };
    let response = dispatch.response();
    let (body, body_encoding) = encode_body(&response.body);

    Ok(SwFetchOutput {
        url: request.url.to_string(),
        status: response.status.as_u16(),
        headers: header_pairs(&response.headers),
        body,
        body_encoding,
        handled_by,
        strategy,
        source,
        fetched_at: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    })
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(state: &AppState, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    json_result(&fetch(state, params).await?)
}
