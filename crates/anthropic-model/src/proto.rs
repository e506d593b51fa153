use klod_model::{Message, ModelRequest};
use serde::{Deserialize, Serialize};

use crate::AnthropicConfig;

// ------------------------------
// Types received from the server
// ------------------------------

/// The `type` of an event carrying an incremental content fragment.
pub const CONTENT_BLOCK_DELTA: &str = "content_block_delta";
/// The `type` of an event carrying message-level changes.
pub const MESSAGE_DELTA: &str = "message_delta";
/// The `delta.type` of a plain text fragment.
pub const TEXT_DELTA: &str = "text_delta";

/// One `data:` record of the response stream.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct StreamEvent {
    pub r#type: Option<String>,
    pub delta: Option<Delta>,
    pub error: Option<StreamError>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Delta {
    pub r#type: Option<String>,
    pub text: Option<String>,
    pub stop_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct StreamError {
    pub r#type: Option<String>,
    pub message: Option<String>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct MessagesRequest {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    messages: Vec<Message>,
    stream: bool,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(
    req: &ModelRequest,
    config: &AnthropicConfig,
) -> MessagesRequest {
    MessagesRequest {
        model: config.model.clone(),
        system: req.system.clone().filter(|s| !s.is_empty()),
        max_tokens: config.max_tokens,
        messages: req.messages.clone(),
        stream: true,
    }
}
