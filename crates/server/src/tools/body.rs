//! Rendering response bodies and headers for tool output.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::HeaderMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How `body` is encoded in a tool output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BodyEncoding {
    Text,
    Base64,
}

/// UTF-8 bodies are returned as text; anything else as base64.
pub fn encode_body(body: &[u8]) -> (String, BodyEncoding) {
    match std::str::from_utf8(body) {
        Ok(text) => (text.to_string(), BodyEncoding::Text),
        Err(_) => (STANDARD.encode(body), BodyEncoding::Base64),
    }
}

/// Header pairs in order, with lossy value decoding.
pub fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
        .collect()
}
