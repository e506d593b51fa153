//! An abstraction layer between the conversation loop and the model API.
//!
//! This crate defines the message types that make up a transcript and the
//! protocol a model provider has to follow, so that the conversation loop
//! can be driven by the real API client or by a scripted provider in tests.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
