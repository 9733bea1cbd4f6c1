//! sw_message tool implementation.
//!
//! Posts a page message to the waiting generation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::{Command, RegistrationStatus};

use super::json_result;
use crate::state::AppState;

/// Parameters for the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageParams {
    /// Message payload, e.g. `{"type": "SKIP_WAITING"}`.
    pub payload: serde_json::Value,
}

/// Output from the sw_message tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SwMessageOutput {
    /// Version the message was delivered to; `None` when nothing was waiting.
    pub delivered_to: Option<String>,
    /// Recognized command, if any.
    pub command: Option<String>,
    pub status: RegistrationStatus,
}

fn command_name(command: Command) -> &'static str {
    match command {
        Command::SkipWaiting => "SKIP_WAITING",
    }
}

pub async fn message(state: &AppState, params: SwMessageParams) -> Result<SwMessageOutput, McpError> {
    let delivered_to = state.registration.status().await.waiting.map(|w| w.version);
    let command = state.registration.post_message(&params.payload).await?;

    Ok(SwMessageOutput {
        delivered_to,
        command: command.map(|c| command_name(c).to_string()),
        status: state.registration.status().await,
    })
}

/// Implementation of the sw_message tool.
pub async fn message_impl(state: &AppState, params: SwMessageParams) -> Result<CallToolResult, McpError> {
    json_result(&message(state, params).await?)
}
