//! Inbound chat endpoint types

use serde::Deserialize;

/// Body of `POST /chat`.
///
/// History entries arrive as raw JSON so that structural validation happens
/// in the assembler with a typed error, instead of a generic deserialization
/// failure at the extractor.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatInput {
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<serde_json::Value>,
}
