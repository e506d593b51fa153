//! A model provider for the Anthropic Messages API.
//!
//! Requests are always streamed. The response body is read line by line
//! and text fragments are handed out as soon as they are decoded.

#[macro_use]
extern crate tracing;

mod config;
mod decoder;
mod io;
mod proto;
mod response;

use std::sync::Arc;

use klod_model::{ErrorKind, ModelProvider, ModelProviderError, ModelRequest};
use mime::Mime;
use reqwest::{Client, header};

pub use config::{
    AnthropicConfig, AnthropicConfigBuilder, DEFAULT_BASE_URL,
    DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
};
use decoder::StreamDecoder;
pub use io::ChunksError;
use io::{Chunks, Lines};
pub use response::AnthropicResponse;

/// The protocol version sent with every request.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Error type for [`AnthropicProvider`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request never got a response.
    #[error("failed to send request: {0}")]
    Transport(#[source] reqwest::Error),
    /// The server rejected the request.
    #[error("API error (status {status}): {body}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The raw response body.
        body: String,
    },
    /// The stream carried an `error` event.
    #[error("API error: {kind} - {message}")]
    Api {
        /// The machine-readable error type, e.g. `overloaded_error`.
        kind: String,
        /// The human-readable message.
        message: String,
    },
    /// Reading the stream failed before it ended.
    #[error("failed to read stream: {0}")]
    Stream(#[source] ChunksError),
}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(_) => ErrorKind::Transport,
            Error::Status { .. } => ErrorKind::Status,
            Error::Api { .. } => ErrorKind::Api,
            Error::Stream(_) => ErrorKind::Stream,
        }
    }
}

/// Anthropic Messages API provider.
#[derive(Clone, Debug)]
pub struct AnthropicProvider {
    client: Client,
    config: Arc<AnthropicConfig>,
}

impl AnthropicProvider {
    /// Creates a new `AnthropicProvider` with the given configuration.
    #[inline]
    pub fn new(config: AnthropicConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    /// Returns the configuration of this provider.
    #[inline]
    pub fn config(&self) -> &AnthropicConfig {
        &self.config
    }
}

impl ModelProvider for AnthropicProvider {
    type Error = Error;
    type Response = AnthropicResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let messages_req = proto::create_request(req, &self.config);
        let resp_fut = self
            .client
            .post(self.config.messages_url())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "text/event-stream")
            .json(&messages_req)
            .send();

        async move {
            let resp = resp_fut.await.map_err(Error::Transport)?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                error!("request failed with status {status}");
                return Err(Error::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_event_stream = content_type
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| m.subtype().as_str() == "event-stream")
                .unwrap_or(false);
            if !is_event_stream {
                // Decoding is line based, so try anyway.
                warn!("unexpected content type: {content_type:?}");
            }

            // Here we got a successful response.
            let lines = Lines::new(Chunks::from_response(resp));
            Ok(AnthropicResponse::from_decoder(StreamDecoder::new(lines)))
        }
    }
}
