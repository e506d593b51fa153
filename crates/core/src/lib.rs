//! Core logic including the conversation loop, the transcript, and the
//! streaming model client.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod conversation;
mod model_client;
pub mod transcript;

pub use conversation::{
    Conversation, ConversationBuilder, Frontend, SessionLog, is_exit_input,
};
pub use model_client::{ModelClient, ModelClientResponse};
pub use transcript::Transcript;
