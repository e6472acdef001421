//! Turn-bounded conversation between the driver and the assistant.
//!
//! ```text
//! AwaitingAssistant --tool calls--> AwaitingToolResult --results--> AwaitingAssistant
//! AwaitingAssistant --sentinel | turn budget--> Terminated
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use super::decision::decide;
use super::termination::TerminationPolicy;
use super::transcript::{ToolCall, ToolResult, Transcript};
use crate::llm::{ChatModel, ChatRequest, LlmError};
use crate::tools::ToolRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    Sentinel,
    TurnBudget,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    AwaitingAssistant,
    AwaitingToolResult(Vec<ToolCall>),
    Terminated(TerminationReason),
}

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error(transparent)]
    Upstream(#[from] LlmError),
}

#[derive(Debug, Clone)]
pub struct ConversationConfig {
    pub system_prompt: String,
    /// Driver message sent after a plain reply that did not finish.
    pub continue_prompt: String,
    pub max_turns: usize,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub llm_timeout: Duration,
    pub termination: TerminationPolicy,
}

#[derive(Debug, Clone)]
pub struct ConversationOutcome {
    pub transcript: Transcript,
    /// The sentinel-bearing reply, when the assistant finished on its own.
    pub summary: Option<String>,
    pub termination: TerminationReason,
    pub turns: usize,
}

/// One conversation. Built fresh for every research request and consumed by
/// `run`, so no transcript outlives its question.
pub struct ConversationLoop {
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolRegistry>,
    config: ConversationConfig,
    transcript: Transcript,
    state: LoopState,
    turns: usize,
    summary: Option<String>,
}

impl ConversationLoop {
    pub fn new(
        model: Arc<dyn ChatModel>,
        tools: Arc<ToolRegistry>,
        config: ConversationConfig,
        opening: impl Into<String>,
    ) -> Self {
        let mut transcript = Transcript::new();
        transcript.push_driver(opening);
        Self {
            model,
            tools,
            config,
            transcript,
            state: LoopState::AwaitingAssistant,
            turns: 0,
            summary: None,
        }
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn turns(&self) -> usize {
        self.turns
    }

    /// Advances the state machine by one transition.
    pub async fn step(&mut self) -> Result<&LoopState, ConversationError> {
        let next = match std::mem::replace(&mut self.state, LoopState::AwaitingAssistant) {
            LoopState::AwaitingAssistant => self.assistant_turn().await?,
            LoopState::AwaitingToolResult(calls) => {
                self.run_tools(calls).await;
                LoopState::AwaitingAssistant
            }
            LoopState::Terminated(reason) => LoopState::Terminated(reason),
        };
        self.state = next;
        Ok(&self.state)
    }

    pub async fn run(mut self) -> Result<ConversationOutcome, ConversationError> {
        loop {
            let state = self.step().await?.clone();
            if let LoopState::Terminated(termination) = state {
                return Ok(ConversationOutcome {
                    transcript: self.transcript,
                    summary: self.summary,
                    termination,
                    turns: self.turns,
                });
            }
        }
    }

    async fn assistant_turn(&mut self) -> Result<LoopState, ConversationError> {
        if self.turns >= self.config.max_turns {
            tracing::info!("Turn budget of {} exhausted", self.config.max_turns);
            return Ok(LoopState::Terminated(TerminationReason::TurnBudget));
        }

        let mut request = ChatRequest::new(self.transcript.to_chat_messages(&self.config.system_prompt))
            .with_tools(self.tools.specs())
            .with_max_tokens(self.config.max_tokens);
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }

        let reply = match tokio::time::timeout(self.config.llm_timeout, self.model.complete(request)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(err)) => {
                tracing::error!("Assistant call failed on turn {}: {}", self.turns + 1, err);
                return Err(err.into());
            }
            Err(_) => {
                tracing::error!(
                    "Assistant call timed out on turn {} after {:?}",
                    self.turns + 1,
                    self.config.llm_timeout
                );
                return Err(LlmError::Timeout(self.config.llm_timeout).into());
            }
        };

        self.turns += 1;
        let decision = decide(reply);
        tracing::info!(
            "Assistant turn {}/{}: {} chars, {} tool call(s)",
            self.turns,
            self.config.max_turns,
            decision.content.len(),
            decision.tool_calls.len()
        );

        let finished = self.config.termination.is_terminal(&decision.content);
        if finished {
            self.summary = Some(decision.content.clone());
        }
        let calls = decision.tool_calls.clone();
        self.transcript.push_assistant(decision.content, decision.tool_calls);

        if finished {
            tracing::info!("Assistant emitted the termination sentinel");
            return Ok(LoopState::Terminated(TerminationReason::Sentinel));
        }
        if !calls.is_empty() {
            return Ok(LoopState::AwaitingToolResult(calls));
        }

        let nudge = self
            .config
            .continue_prompt
            .replace("{sentinel}", self.config.termination.sentinel());
        self.transcript.push_driver(nudge);
        Ok(LoopState::AwaitingAssistant)
    }

    async fn run_tools(&mut self, calls: Vec<ToolCall>) {
        for call in calls {
            tracing::info!("Executing tool `{}`", call.name);
            let content = match self.tools.execute(&call.name, &call.argument).await {
                Ok(output) => output,
                Err(err) => {
                    tracing::warn!("Rejected tool call: {}", err);
                    format!("Error: {}", err)
                }
            };
            self.transcript.push_tool_result(ToolResult {
                call_id: call.id,
                content,
            });
        }
    }
}
