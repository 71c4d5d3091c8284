//! x.ai Grok chat-completions client.

mod client;
mod dto;

pub use client::GrokClient;
pub use dto::{GrokChoice, GrokMessage, GrokRequest, GrokRequestBuilder, GrokResponse};
