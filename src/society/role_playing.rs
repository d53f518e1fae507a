//! Two-role society over a chat model.
//!
//! A "user" agent breaks the task into instructions and an "assistant" agent
//! carries them out, optionally calling local tools. The conversation ends
//! when the user agent replies with `TASK_DONE` or after `round_limit`
//! rounds. The answer is the last assistant reply.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::schema::sanitize_tool_schema;
use super::tools::{parse_tool_call, WriteFileTool};
use super::{ChatTurn, Society, SocietyFactory, SocietyOutcome};
use crate::error::{LlmError, SocietyError};
use crate::llm::{ApiFlavor, ChatClient, GenerationRequest, LlmProvider, Message};

/// Token the user agent emits once the task is complete.
pub const TASK_DONE: &str = "TASK_DONE";

const USER_SYSTEM_PROMPT: &str = r#"Never forget you are a user and I am an assistant. Never flip roles! You will always instruct me.
We share a common interest in collaborating to successfully complete a task.
I must help you to complete the task.
Here is the task: {task}. Never forget our task!
You must instruct me based on my expertise and your needs to solve the task ONLY in the following two ways:

1. Instruct with a necessary input:
Instruction: <YOUR_INSTRUCTION>
Input: <YOUR_INPUT>

2. Instruct without any input:
Instruction: <YOUR_INSTRUCTION>
Input: None

You must give me one instruction at a time.
I must write a response that appropriately solves the requested instruction.
You should instruct me, not ask me questions.
Keep giving me instructions until you think the task is completed.
If the task asks for a file to be written, make sure I have written it before finishing.
When the task is completed, you must only reply with a single word <TASK_DONE>.
Never say <TASK_DONE> unless my responses have solved your task."#;

const ASSISTANT_SYSTEM_PROMPT: &str = r#"Never forget you are an assistant and I am a user. Never flip roles! Never instruct me!
We share a common interest in collaborating to successfully complete a task.
You must help me to complete the task.
Here is the task: {task}. Never forget our task!
I must instruct you based on your expertise and my needs to complete the task.

You have access to the following tools. To use a tool, reply with a single JSON object containing "tool" and "arguments" keys. You will receive the tool result in the next message.

Tools:
{tools}

Unless I say the task is completed, you should always start with:
Solution: <YOUR_SOLUTION>
<YOUR_SOLUTION> should be very specific, include detailed explanations and provide preferable detailed implementations and examples and lists for task-solving.
Always end <YOUR_SOLUTION> with: Next request."#;

const KICKOFF_MESSAGE: &str =
    "Now please give me instructions to solve the overall task step by step. Only reply with Instruction and Input.";

/// Model settings of the role-playing society.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolePlayingConfig {
    /// Environment prefix for `<PREFIX>_API_BASE_URL` / `<PREFIX>_API_KEY`.
    #[serde(default = "default_env_prefix")]
    pub env_prefix: String,
    #[serde(default)]
    pub flavor: ApiFlavor,
    pub model: String,
    /// Model for the user role; defaults to `model`.
    #[serde(default)]
    pub user_model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_round_limit")]
    pub round_limit: usize,
    /// Tool calls the assistant may chain within one round.
    #[serde(default = "default_max_tool_steps")]
    pub max_tool_steps: usize,
}

fn default_env_prefix() -> String {
    "OPENAI".to_string()
}

fn default_temperature() -> f64 {
    0.4
}

fn default_max_tokens() -> u32 {
    16384
}

fn default_round_limit() -> usize {
    15
}

fn default_max_tool_steps() -> usize {
    5
}

impl RolePlayingConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            env_prefix: default_env_prefix(),
            flavor: ApiFlavor::OpenAi,
            model: model.into(),
            user_model: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            round_limit: default_round_limit(),
            max_tool_steps: default_max_tool_steps(),
        }
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn with_round_limit(mut self, rounds: usize) -> Self {
        self.round_limit = rounds;
        self
    }

    fn user_model(&self) -> &str {
        self.user_model.as_deref().unwrap_or(&self.model)
    }
}

/// Builds role-playing societies.
///
/// Without an injected provider, a fresh [`ChatClient`] is created from the
/// environment for every society, so no HTTP connection pool outlives the
/// runtime of the task that created it.
pub struct RolePlayingFactory {
    config: RolePlayingConfig,
    provider: Option<Arc<dyn LlmProvider>>,
}

impl RolePlayingFactory {
    pub fn new(config: RolePlayingConfig) -> Self {
        Self {
            config,
            provider: None,
        }
    }

    pub fn with_provider(config: RolePlayingConfig, provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            config,
            provider: Some(provider),
        }
    }

    fn provider(&self) -> Result<Arc<dyn LlmProvider>, LlmError> {
        if let Some(provider) = &self.provider {
            return Ok(Arc::clone(provider));
        }
        let client = ChatClient::from_env(&self.config.env_prefix, self.config.model.clone())?
            .with_flavor(self.config.flavor.clone());
        Ok(Arc::new(client))
    }
}

impl SocietyFactory for RolePlayingFactory {
    fn construct(&self, query: &str) -> Result<Box<dyn Society>, SocietyError> {
        let provider = self.provider()?;
        Ok(Box::new(RolePlayingSociety::new(
            provider,
            self.config.clone(),
            query,
        )))
    }

    fn name(&self) -> &str {
        "role-playing"
    }
}

/// A user/assistant pair working on one task.
pub struct RolePlayingSociety {
    provider: Arc<dyn LlmProvider>,
    config: RolePlayingConfig,
    task_prompt: String,
    write_file: WriteFileTool,
    tool_schemas: Vec<Value>,
}

impl RolePlayingSociety {
    pub fn new(provider: Arc<dyn LlmProvider>, config: RolePlayingConfig, task_prompt: &str) -> Self {
        let write_file = WriteFileTool::new();
        let mut schema = write_file.schema();
        let amended = sanitize_tool_schema(&mut schema);
        if !amended.is_empty() {
            debug!(properties = ?amended, "Sanitized nullable tool parameters");
        }

        Self {
            provider,
            config,
            task_prompt: task_prompt.to_string(),
            write_file,
            tool_schemas: vec![schema],
        }
    }

    fn assistant_system_prompt(&self) -> String {
        let tools = serde_json::to_string_pretty(&self.tool_schemas).unwrap_or_default();
        ASSISTANT_SYSTEM_PROMPT
            .replace("{tools}", &tools)
            .replace("{task}", &self.task_prompt)
    }

    async fn step(&self, model: &str, conversation: &[Message], tokens: &mut u64) -> Result<String, SocietyError> {
        let request = GenerationRequest::new(model, conversation.to_vec())
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);
        let response = self.provider.generate(request).await?;
        *tokens += u64::from(response.usage.total_tokens);
        response
            .first_content()
            .map(str::to_string)
            .ok_or_else(|| SocietyError::ExecutionFailed("Empty LLM response".to_string()))
    }

    /// Let the assistant answer one instruction, executing tool calls until it
    /// replies without one.
    async fn assistant_turn(
        &self,
        conversation: &mut Vec<Message>,
        tokens: &mut u64,
    ) -> Result<String, SocietyError> {
        let mut reply = String::new();
        for _ in 0..=self.config.max_tool_steps {
            reply = self.step(&self.config.model, conversation, tokens).await?;
            conversation.push(Message::assistant(&reply));

            let Some(call) = parse_tool_call(&reply) else {
                return Ok(reply);
            };

            let observation = if call.name == WriteFileTool::NAME {
                match self.write_file.execute(&call.arguments) {
                    Ok(output) => format!("Tool '{}' succeeded:\n{}", call.name, output),
                    Err(error) => format!("Tool '{}' failed:\n{}", call.name, error),
                }
            } else {
                warn!(tool = %call.name, "Assistant called an unknown tool");
                format!("Tool '{}' is not available.", call.name)
            };
            conversation.push(Message::user(observation));
        }

        warn!(
            max_tool_steps = self.config.max_tool_steps,
            "Assistant kept calling tools; ending its turn"
        );
        Ok(reply)
    }
}

#[async_trait]
impl Society for RolePlayingSociety {
    async fn run(&self) -> Result<SocietyOutcome, SocietyError> {
        let mut tokens = 0u64;
        let mut history: Vec<ChatTurn> = Vec::new();

        let mut user_conversation = vec![
            Message::system(USER_SYSTEM_PROMPT.replace("{task}", &self.task_prompt)),
            Message::user(KICKOFF_MESSAGE),
        ];
        let mut assistant_conversation = vec![Message::system(self.assistant_system_prompt())];

        for round in 0..self.config.round_limit {
            let instruction = self
                .step(self.config.user_model(), &user_conversation, &mut tokens)
                .await?;
            user_conversation.push(Message::assistant(&instruction));

            if instruction.contains(TASK_DONE) {
                info!(round, "User agent marked the task as done");
                break;
            }

            assistant_conversation.push(Message::user(&instruction));
            let solution = self
                .assistant_turn(&mut assistant_conversation, &mut tokens)
                .await?;
            debug!(round, instruction = %instruction, solution = %solution, "Round finished");

            user_conversation.push(Message::user(&solution));
            history.push(ChatTurn {
                user: instruction,
                assistant: solution,
            });
        }

        let answer = history
            .last()
            .map(|turn| turn.assistant.clone())
            .unwrap_or_default();

        info!(rounds = history.len(), token_count = tokens, "Role-playing finished");
        Ok(SocietyOutcome {
            answer,
            chat_history: history,
            token_count: tokens,
        })
    }
}
