//! client_open and client_close tool implementations.
//!
//! Pages opening and closing drive when a waiting generation may activate.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::{ClientId, RegistrationStatus};

use super::json_result;
use crate::state::AppState;

/// Output from the client_open tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ClientOpenOutput {
    pub client_id: ClientId,
    /// Version controlling the new page, if any generation is active.
    pub controller: Option<String>,
}

/// Parameters for the client_close tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientCloseParams {
    pub client_id: ClientId,
}

/// Output from the client_close tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ClientCloseOutput {
    /// Whether the page was open.
    pub closed: bool,
    pub status: RegistrationStatus,
}

pub async fn open(state: &AppState) -> ClientOpenOutput {
    let client_id = state.registration.open_client().await;
    let controller = state.registration.controller_of(client_id).await;
    tracing::debug!(client_id, ?controller, "client opened");
    ClientOpenOutput { client_id, controller }
}

pub async fn close(state: &AppState, params: ClientCloseParams) -> Result<ClientCloseOutput, McpError> {
    let closed = state.registration.close_client(params.client_id).await?;
    tracing::debug!(client_id = params.client_id, closed, "client closed");
    Ok(ClientCloseOutput { closed, status: state.registration.status().await })
}

/// Implementation of the client_open tool.
pub async fn open_impl(state: &AppState) -> Result<CallToolResult, McpError> {
    json_result(&open(state).await)
}

/// Implementation of the client_close tool.
pub async fn close_impl(state: &AppState, params: ClientCloseParams) -> Result<CallToolResult, McpError> {
    json_result(&close(state, params).await?)
}
