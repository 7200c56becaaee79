//! chat-relay: streaming chat-completion proxy
//!
//! Accepts a chat message plus prior conversation turns, trims the
//! conversation to a token budget, forwards the assembled prompt to an
//! OpenAI-compatible completion service, and re-streams the incremental
//! text deltas back to the caller.

pub mod api;
pub mod assembler;
pub mod config;
pub mod relay;
pub mod server;

pub use config::AppConfig;
pub use server::run_server;
