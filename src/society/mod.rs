//! Agent society interface.
//!
//! A society takes a natural-language query and works on it until it is
//! done, returning an answer, the chat history and a token count. The
//! harness never looks inside: it constructs one society per attempt through
//! a [`SocietyFactory`] and runs it to completion.
//!
//! Two backends are provided:
//! - [`CommandSociety`]: an external agent program (e.g. an OWL/CAMEL runner)
//! - [`RolePlayingSociety`]: a user/assistant role-play over a chat model

pub mod command;
pub mod role_playing;
pub mod schema;
pub mod tools;

pub use command::{CommandSociety, CommandSocietyConfig, CommandSocietyFactory};
pub use role_playing::{RolePlayingConfig, RolePlayingFactory, RolePlayingSociety};
pub use schema::sanitize_tool_schema;
pub use tools::{ToolCall, WriteFileTool};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SocietyError;

/// One round of the conversation between the two roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub user: String,
    pub assistant: String,
}

/// What a society produces when it runs to completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocietyOutcome {
    pub answer: String,
    #[serde(default)]
    pub chat_history: Vec<ChatTurn>,
    #[serde(default)]
    pub token_count: u64,
}

/// A constructed society, ready to run once.
#[async_trait]
pub trait Society: Send + Sync {
    async fn run(&self) -> Result<SocietyOutcome, SocietyError>;
}

/// Builds a society for a query.
pub trait SocietyFactory: Send + Sync {
    fn construct(&self, query: &str) -> Result<Box<dyn Society>, SocietyError>;

    /// Short label for logs.
    fn name(&self) -> &str;
}

/// Shared handle passed to the runner's worker threads.
pub type SharedFactory = Arc<dyn SocietyFactory>;
