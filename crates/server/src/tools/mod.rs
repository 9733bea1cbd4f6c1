//! MCP tool implementations.
//!
//! This module contains all tools exposed by the shellcache server. Each tool
//! has a typed function returning its output and an `_impl` wrapper that
//! renders it as a tool result.

pub mod body;
pub mod cache;
pub mod clients;
pub mod sw_fetch;
pub mod sw_install;
pub mod sw_message;
pub mod sw_status;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::error::ToolError;

pub use cache::{CacheGetParams, get_impl};
pub use clients::{ClientCloseParams, close_impl, open_impl};
pub use sw_fetch::{SwFetchParams, fetch_impl};
pub use sw_install::{SwInstallParams, install_impl};
pub use sw_message::{SwMessageParams, message_impl};
pub use sw_status::status_impl;

/// Render a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(|e| ToolError::EncodeFailed(e.to_string()))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use shellcache_core::{AppConfig, CacheDb, Error, Network, Request, Response};

    use crate::state::AppState;

    /// Network double keyed by path.
    pub(crate) struct PathNetwork {
        routes: Mutex<HashMap<String, Response>>,
        online: AtomicBool,
    }

    impl PathNetwork {
        pub(crate) fn serve(&self, path: &str, response: Response) {
            self.routes.lock().unwrap().insert(path.to_string(), response);
        }

        pub(crate) fn set_online(&self, online: bool) {
            self.online.store(online, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Network for PathNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response, Error> {
            if !self.online.load(Ordering::SeqCst) {
                return Err(Error::Network(format!("offline: {}", request.url)));
            }
            self.routes
                .lock()
                .unwrap()
                .get(request.url.path())
                .cloned()
                .ok_or_else(|| Error::Network(format!("connection refused: {}", request.url)))
        }
    }

    /// State over an in-memory store with the default static manifest served.
    pub(crate) async fn state() -> (Arc<AppState>, Arc<PathNetwork>) {
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let network = Arc::new(PathNetwork { routes: Mutex::default(), online: AtomicBool::new(true) });
        network.serve("/manifest.json", Response::ok("{\"name\":\"shell\"}"));
        network.serve("/favicon.svg", Response::ok("<svg/>"));
        network.serve("/favicon.png", Response::ok(vec![0x89, b'P', b'N', b'G', 0xff]));

        let state = AppState::new(AppConfig::default(), db, network.clone()).unwrap();
        (Arc::new(state), network)
    }
}
