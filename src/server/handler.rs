//! The chat endpoint: assemble, relay, re-stream.

use axum::{
    body::Body,
    extract::{Json, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::StreamExt;

use super::AppState;
use crate::api::ChatInput;
use crate::assembler::assemble;
use crate::relay::FragmentStream;

/// Handle `POST /chat`.
///
/// On success the response is a 200 `text/event-stream` whose body is the
/// concatenation of fragment texts in decode order. Any failure before the
/// first fragment maps to a 500 JSON `{"detail": ...}`. A failure after
/// streaming has begun can only truncate the body; the 200 status is
/// already on the wire by then.
pub async fn chat(State(state): State<AppState>, Json(input): Json<ChatInput>) -> Response {
    let chat_config = &state.config.chat;

    let messages = match assemble(
        &chat_config.system_prompt,
        &input.conversation_history,
        &input.message,
        chat_config.token_budget,
        state.counter.as_ref(),
    ) {
        Ok(messages) => messages,
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting malformed conversation");
            return error_response(&e.to_string());
        }
    };

    tracing::info!(
        message_chars = input.message.chars().count(),
        history_len = input.conversation_history.len(),
        assembled_len = messages.len(),
        trimmed = input.conversation_history.len() + 2 - messages.len(),
        "Handling chat request"
    );

    let fragments = match state.relay.open(messages).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(error = %e, "Failed to open upstream stream");
            return error_response(&e.to_string());
        }
    };

    stream_response(fragments)
}

/// Build the streamed 200 response over a fragment stream.
fn stream_response(fragments: FragmentStream) -> Response {
    let body = Body::from_stream(fragments.map(|item| match item {
        Ok(text) => Ok(Bytes::from(text)),
        Err(e) => {
            // Status and headers are already sent; all we can do is end
            // the body early.
            tracing::error!(error = %e, "Stream interrupted mid-response");
            Err(e)
        }
    }));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// 500 with a JSON `{"detail": ...}` body, matching the error contract of
/// the chat endpoint.
fn error_response(detail: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "detail": detail })),
    )
        .into_response()
}
