//! Control commands posted to a generation by its pages.

use serde::Deserialize;

/// A recognized control command.
///
/// Payloads are objects tagged by `type`; anything else is not a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    /// Promote the waiting generation without waiting for old pages to close.
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,
}

impl Command {
    /// Parse a message payload, returning `None` for unrecognized payloads.
    pub fn parse(payload: &serde_json::Value) -> Option<Self> {
        Self::deserialize(payload).ok()
    }
}
