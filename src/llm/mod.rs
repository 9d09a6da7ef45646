//! LLM provider abstraction layer
//!
//! A provider-agnostic completion interface, the OpenAI-compatible backend, and
//! the `AnswerReasoner` that turns a prompt into a short answer string.

pub mod provider;
pub mod providers;
pub mod reasoner;

pub use provider::*;
pub use providers::*;
pub use reasoner::{AnswerReasoner, LlmReasoner};
