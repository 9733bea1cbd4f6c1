//! sw_install tool implementation.
//!
//! Installs a generation into the registration, activating it when allowed.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::RegistrationStatus;

use super::json_result;
use crate::state::AppState;

/// Parameters for the sw_install tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SwInstallParams {
    /// Generation token to install. Defaults to the configured version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Output from the sw_install tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SwInstallOutput {
    /// The version that was installed.
    pub version: String,
    /// Store the generation writes to.
    pub cache_name: String,
    /// Registration state after install and any activation.
    pub status: RegistrationStatus,
}

pub async fn install(state: &AppState, params: SwInstallParams) -> Result<SwInstallOutput, McpError> {
    let interceptor = state.generation(params.version.as_deref())?;
    let version = interceptor.version().to_string();
    let cache_name = interceptor.cache_name().to_string();

    state.registration.install(interceptor).await?;

    Ok(SwInstallOutput { version, cache_name, status: state.registration.status().await })
}

/// Implementation of the sw_install tool.
pub async fn install_impl(state: &AppState, params: SwInstallParams) -> Result<CallToolResult, McpError> {
    json_result(&install(state, params).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing;
    use shellcache_core::{CacheStorage, WorkerState};

    #[tokio::test]
    async fn test_install_default_version() {
        let (state, _network) = testing::state().await;

        let output = install(&state, SwInstallParams::default()).await.unwrap();
        assert_eq!(output.version, "2");
        assert_eq!(output.cache_name, "shell-v2");

        let active = output.status.active.unwrap();
        assert_eq!(active.state, WorkerState::Activated);
        assert_eq!(state.db.count_entries("shell-v2").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_install_override_replaces_old_store() {
        let (state, _network) = testing::state().await;
        install(&state, SwInstallParams { version: Some("1".into()) }).await.unwrap();
        install(&state, SwInstallParams { version: Some("2".into()) }).await.unwrap();

        assert_eq!(state.db.keys().await.unwrap(), vec!["shell-v2"]);
    }

    #[tokio::test]
    async fn test_install_failure_reports_code() {
        let (state, network) = testing::state().await;
        network.set_online(false);

        let err = install(&state, SwInstallParams::default()).await.unwrap_err();
        assert_eq!(err.code.0, -32013);
        assert!(err.message.starts_with("INSTALL_FAILED"));
        assert!(state.registration.status().await.active.is_none());
    }

    #[tokio::test]
    async fn test_install_rejects_blank_version() {
        let (state, _network) = testing::state().await;
        let err = install(&state, SwInstallParams { version: Some("  ".into()) }).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }

    #[tokio::test]
    async fn test_install_impl_renders_json() {
        let (state, _network) = testing::state().await;
        let result = install_impl(&state, SwInstallParams::default()).await;
        assert!(result.is_ok());
    }
}
