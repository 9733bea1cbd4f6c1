//! sw_status tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::Serialize;
use shellcache_core::{CacheStorage, RegistrationStatus};

use super::json_result;
use crate::state::AppState;

/// One named store and its size.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct StoreSummary {
    pub name: String,
    pub entries: u64,
}

/// Output from the sw_status tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SwStatusOutput {
    pub origin: String,
    pub registration: RegistrationStatus,
    /// Every store in creation order, including ones this system does not own.
    pub stores: Vec<StoreSummary>,
}

pub async fn status(state: &AppState) -> Result<SwStatusOutput, McpError> {
    let mut stores = Vec::new();
    for name in state.db.keys().await? {
        let entries = state.db.count_entries(&name).await?;
        stores.push(StoreSummary { name, entries });
    }

    Ok(SwStatusOutput {
        origin: state.origin.to_string(),
        registration: state.registration.status().await,
        stores,
    })
}

/// Implementation of the sw_status tool.
pub async fn status_impl(state: &AppState) -> Result<CallToolResult, McpError> {
    json_result(&status(state).await?)
}
