//! LLM integration for the harness.
//!
//! The role-playing society talks to chat models through [`LlmProvider`].
//! [`ChatClient`] implements it for OpenAI-compatible and Azure OpenAI
//! endpoints:
//!
//! ```ignore
//! use gaia_harness::llm::{ChatClient, GenerationRequest, LlmProvider, Message};
//!
//! let client = ChatClient::from_env("ARK", "doubao-1.5-pro")?;
//! let request = GenerationRequest::new("", vec![Message::user("Hello")])
//!     .with_temperature(0.4);
//! let response = client.generate(request).await?;
//! ```

pub mod client;

pub use client::{
    ApiFlavor, ChatClient, Choice, GenerationRequest, GenerationResponse, LlmProvider, Message,
    Usage, DEFAULT_AZURE_API_VERSION,
};
