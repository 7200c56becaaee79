//! Streaming relay to the upstream completion service.
//!
//! Opens a streamed `POST /chat/completions`, decodes the SSE response
//! incrementally, and exposes the text deltas as a pull-based stream of
//! fragments. The stream is not restartable; dropping it closes the
//! upstream connection.

mod sse;

pub use sse::{decode_line, LineBuffer, LineEvent};

use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::api::{ChatMessage, CompletionRequest};
use crate::config::UpstreamConfig;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("No API key available; set upstream.api_key or the OPENAI_API_KEY environment variable")]
    MissingApiKey,

    #[error("Failed to connect to upstream: {0}")]
    Connect(#[source] reqwest::Error),

    #[error("Upstream returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Upstream stream interrupted: {0}")]
    StreamInterrupted(String),
}

/// Lazy sequence of text fragments decoded from the upstream stream.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, RelayError>> + Send>>;

/// Client for the upstream completion service.
///
/// Holds an explicit configuration (endpoint, model, key) rather than any
/// process-wide state, so concurrent instances stay isolated.
#[derive(Clone)]
pub struct Relay {
    client: reqwest::Client,
    config: UpstreamConfig,
}

impl Relay {
    pub fn new(client: reqwest::Client, config: UpstreamConfig) -> Self {
        Self { client, config }
    }

    /// Send the assembled prompt upstream and return the live fragment
    /// stream.
    ///
    /// Fails before yielding anything if no API key is available, the
    /// connection cannot be established, or the upstream answers with a
    /// non-success status. Once streaming has begun, transport failures
    /// surface as a `StreamInterrupted` item after any fragments already
    /// decoded.
    pub async fn open(&self, messages: Vec<ChatMessage>) -> Result<FragmentStream, RelayError> {
        let api_key = self
            .config
            .resolve_api_key()
            .ok_or(RelayError::MissingApiKey)?;

        let request = CompletionRequest {
            model: self.config.model.clone(),
            messages,
            stream: true,
        };

        tracing::debug!(
            url = %self.config.completions_url(),
            model = %request.model,
            message_count = request.messages.len(),
            "Opening upstream completion stream"
        );

        let response = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(RelayError::Connect)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Upstream rejected completion request");
            return Err(RelayError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(fragment_stream(response.bytes_stream()))
    }
}

/// Wrap a byte stream in the SSE fragment decoder.
///
/// Generic over the byte source so the decoding state machine can be driven
/// by a fabricated stream in tests.
pub fn fragment_stream<S, E>(bytes: S) -> FragmentStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    Box::pin(async_stream::try_stream! {
        let mut buffer = LineBuffer::new();
        let mut done = false;

        futures::pin_mut!(bytes);

        while !done {
            let Some(chunk) = bytes.next().await else {
                break;
            };
            let chunk = chunk.map_err(|e| {
                tracing::error!(error = %e, "Error reading upstream stream chunk");
                RelayError::StreamInterrupted(e.to_string())
            })?;

            for line in buffer.push(&chunk) {
                match decode_line(&line) {
                    LineEvent::Fragment(text) => yield text,
                    LineEvent::Done => {
                        done = true;
                        break;
                    }
                    LineEvent::Skip => {}
                }
            }
        }

        // Upstream closed without a trailing newline; decode the tail.
        if !done {
            if let Some(tail) = buffer.take_remainder() {
                if let LineEvent::Fragment(text) = decode_line(&tail) {
                    yield text;
                }
            }
        }
    })
}
