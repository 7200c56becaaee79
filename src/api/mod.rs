//! API type definitions

mod chat;
mod openai;

pub use chat::ChatInput;
pub use openai::{ChatMessage, CompletionRequest, Delta, Role, StreamChoice, StreamChunk};
