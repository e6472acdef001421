//! Answers one question by running a fresh conversation and cleaning up the
//! final reply.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use super::conversation::{
    ConversationConfig, ConversationError, ConversationLoop, TerminationReason,
};
use super::termination::TerminationPolicy;
use super::transcript::Transcript;
use crate::core::config::Settings;
use crate::llm::{ChatModel, LlmError};
use crate::tools::ToolRegistry;

pub const NO_ANSWER: &str = "I couldn't find a specific answer.";
pub const GUIDANCE: &str = "I couldn't produce a useful answer. Try asking a more specific \
question, or check that the relevant documents have been ingested.";

const USER_MESSAGE_LIMIT: usize = 300;

#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("invalid research request: {0}")]
    InvalidRequest(String),

    #[error("language model failure: {0}")]
    Upstream(#[source] LlmError),
}

impl From<ConversationError> for ResearchError {
    fn from(err: ConversationError) -> Self {
        match err {
            ConversationError::Upstream(inner) => ResearchError::Upstream(inner),
        }
    }
}

impl ResearchError {
    /// Client-facing description, bounded in length.
    pub fn user_message(&self) -> String {
        let full = match self {
            ResearchError::InvalidRequest(reason) => reason.clone(),
            ResearchError::Upstream(err) => format!("The research agent failed: {}", err),
        };
        truncate_chars(&full, USER_MESSAGE_LIMIT)
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct ResearchConfig {
    pub system_prompt: String,
    pub question_template: Option<String>,
    pub continue_prompt: String,
    pub termination: TerminationPolicy,
    pub default_max_turns: usize,
    pub max_turns_limit: usize,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    pub llm_timeout: Duration,
    pub min_answer_chars: usize,
}

impl ResearchConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let agent = &settings.agent;
        Self {
            system_prompt: agent.system_prompt.clone(),
            question_template: agent.question_template.clone(),
            continue_prompt: agent.continue_prompt.clone(),
            termination: TerminationPolicy::new(agent.sentinel.clone(), agent.sentinel_match),
            default_max_turns: agent.max_turns,
            max_turns_limit: agent.max_turns_limit,
            temperature: settings.llm.temperature,
            max_tokens: settings.llm.max_tokens,
            llm_timeout: Duration::from_secs(settings.llm.timeout_secs),
            min_answer_chars: agent.min_answer_chars,
        }
    }

    fn opening_message(&self, question: &str) -> String {
        match &self.question_template {
            Some(template) => template
                .replace("{sentinel}", self.termination.sentinel())
                .replace("{question}", question),
            None => question.to_string(),
        }
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

#[derive(Debug, Clone)]
pub struct ResearchRequest {
    pub question: String,
    pub max_turns: Option<usize>,
}

impl ResearchRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            max_turns: None,
        }
    }

    pub fn with_max_turns(mut self, max_turns: Option<usize>) -> Self {
        self.max_turns = max_turns;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResearchOutcome {
    pub answer: String,
    pub termination: TerminationReason,
    pub turns: usize,
    #[serde(skip)]
    pub transcript: Transcript,
}

pub struct ResearchService {
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolRegistry>,
    config: ResearchConfig,
}

impl ResearchService {
    pub fn new(model: Arc<dyn ChatModel>, tools: Arc<ToolRegistry>, config: ResearchConfig) -> Self {
        Self {
            model,
            tools,
            config,
        }
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    pub async fn start_research(
        &self,
        question: &str,
        max_turns: Option<usize>,
    ) -> Result<String, ResearchError> {
        let outcome = self
            .run(ResearchRequest::new(question).with_max_turns(max_turns))
            .await?;
        Ok(outcome.answer)
    }

    pub async fn run(&self, request: ResearchRequest) -> Result<ResearchOutcome, ResearchError> {
        let max_turns = request.max_turns.unwrap_or(self.config.default_max_turns);
        if max_turns == 0 || max_turns > self.config.max_turns_limit {
            return Err(ResearchError::InvalidRequest(format!(
                "max_turns must be between 1 and {}",
                self.config.max_turns_limit
            )));
        }

        let conversation = ConversationLoop::new(
            self.model.clone(),
            self.tools.clone(),
            ConversationConfig {
                system_prompt: self.config.system_prompt.clone(),
                continue_prompt: self.config.continue_prompt.clone(),
                max_turns,
                temperature: Some(self.config.temperature),
                max_tokens: self.config.max_tokens,
                llm_timeout: self.config.llm_timeout,
                termination: self.config.termination.clone(),
            },
            self.config.opening_message(&request.question),
        );

        let outcome = conversation.run().await?;

        let raw = outcome
            .summary
            .clone()
            .or_else(|| {
                outcome
                    .transcript
                    .last_assistant()
                    .map(|message| message.content.clone())
            })
            .unwrap_or_else(|| NO_ANSWER.to_string());
        let answer = self.sanitize_answer(&raw);

        tracing::info!(
            "Research finished after {} turn(s) ({:?}), answer of {} chars",
            outcome.turns,
            outcome.termination,
            answer.chars().count()
        );

        Ok(ResearchOutcome {
            answer,
            termination: outcome.termination,
            turns: outcome.turns,
            transcript: outcome.transcript,
        })
    }

    /// Removes the sentinel and replaces answers too short to be useful.
    pub fn sanitize_answer(&self, raw: &str) -> String {
        let cleaned = self.config.termination.strip(raw);
        if cleaned.chars().count() < self.config.min_answer_chars {
            return GUIDANCE.to_string();
        }
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::{ScriptedModel, StaticTool};
    use crate::agent::transcript::Role;
    use crate::llm::{AssistantReply, ChatToolCall, HashingEmbedder};
    use crate::rag::{KnowledgeBase, SqliteRagStore, StoredChunk};
    use crate::tools::{RetrievalTool, NO_RESULTS};

    fn lookup_call() -> AssistantReply {
        AssistantReply::with_tool_calls(vec![ChatToolCall::function(
            "call_1",
            "query_knowledge_base",
            r#"{"question":"What is the capital of France?"}"#,
        )])
    }

    async fn knowledge(texts: &[&str]) -> (Arc<KnowledgeBase>, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let store = SqliteRagStore::with_path(tmp.path().join("knowledge.db"))
            .await
            .unwrap();
        let kb = Arc::new(KnowledgeBase::new(
            Arc::new(store),
            Arc::new(HashingEmbedder::new(256)),
        ));
        if !texts.is_empty() {
            let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
            let vectors = kb.embed_all(&owned, 8).await.unwrap();
            let items = owned
                .into_iter()
                .enumerate()
                .map(|(i, content)| StoredChunk {
                    chunk_id: format!("c{i}"),
                    content,
                    source: "facts.pdf".to_string(),
                    chunk_index: i,
                    metadata: None,
                })
                .zip(vectors)
                .collect();
            kb.replace_all(items).await.unwrap();
        }
        (kb, tmp)
    }

    fn retrieval_registry(kb: Arc<KnowledgeBase>) -> Arc<ToolRegistry> {
        Arc::new(ToolRegistry::new().with_tool(Arc::new(RetrievalTool::new(
            kb,
            2,
            Duration::from_secs(5),
        ))))
    }

    fn service(model: Arc<ScriptedModel>, tools: Arc<ToolRegistry>) -> ResearchService {
        ResearchService::new(model, tools, ResearchConfig::default())
    }

    #[tokio::test]
    async fn answers_from_retrieved_chunk() {
        let (kb, _tmp) = knowledge(&[
            "The capital of France is Paris.",
            "Photosynthesis converts light into chemical energy.",
        ])
        .await;
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(lookup_call()),
            Ok(AssistantReply::text(
                "According to the documents, the capital of France is Paris. TERMINATE",
            )),
        ]));
        let outcome = service(model.clone(), retrieval_registry(kb))
            .run(ResearchRequest::new("What is the capital of France?"))
            .await
            .unwrap();

        let tool_message = &outcome.transcript.messages()[2];
        assert_eq!(tool_message.role, Role::Tool);
        assert!(tool_message.content.contains("Paris"));
        assert_eq!(
            outcome.answer,
            "According to the documents, the capital of France is Paris."
        );
        assert!(!outcome.answer.contains("TERMINATE"));
        assert_eq!(outcome.termination, TerminationReason::Sentinel);
    }

    #[tokio::test]
    async fn empty_store_leads_to_not_found_answer() {
        let (kb, _tmp) = knowledge(&[]).await;
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(lookup_call()),
            Ok(AssistantReply::text(
                "The documents do not contain this information. TERMINATE",
            )),
        ]));
        let outcome = service(model, retrieval_registry(kb))
            .run(ResearchRequest::new("Who won the 1998 World Cup?"))
            .await
            .unwrap();

        assert_eq!(outcome.transcript.messages()[2].content, NO_RESULTS);
        assert_eq!(outcome.answer, "The documents do not contain this information.");
    }

    #[tokio::test]
    async fn single_turn_without_answer_returns_guidance() {
        let model = Arc::new(ScriptedModel::repeating(AssistantReply::text("Hmm")));
        let tools = Arc::new(ToolRegistry::new().with_tool(Arc::new(StaticTool::new(
            "query_knowledge_base",
            "unused",
        ))));
        let outcome = service(model.clone(), tools)
            .run(ResearchRequest::new("Anything?").with_max_turns(Some(1)))
            .await
            .unwrap();

        assert_eq!(outcome.termination, TerminationReason::TurnBudget);
        assert_eq!(outcome.turns, 1);
        assert_eq!(model.calls(), 1);
        assert_eq!(outcome.answer, GUIDANCE);
    }

    #[tokio::test]
    async fn falls_back_to_last_assistant_message() {
        let model = Arc::new(ScriptedModel::repeating(AssistantReply::text(
            "Paris is mentioned in the report.",
        )));
        let answer = service(model, Arc::new(ToolRegistry::new()))
            .start_research("capital?", Some(2))
            .await
            .unwrap();
        assert_eq!(answer, "Paris is mentioned in the report.");
    }

    #[tokio::test]
    async fn bare_sentinel_reply_becomes_guidance() {
        let model = Arc::new(ScriptedModel::repeating(AssistantReply::text("TERMINATE")));
        let answer = service(model, Arc::new(ToolRegistry::new()))
            .start_research("capital?", None)
            .await
            .unwrap();
        assert_eq!(answer, GUIDANCE);
    }

    #[tokio::test]
    async fn nested_sentinel_does_not_survive_cleanup() {
        let model = Arc::new(ScriptedModel::repeating(AssistantReply::text(
            "The answer is Paris. TERMTERMINATEINATE",
        )));
        let answer = service(model, Arc::new(ToolRegistry::new()))
            .start_research("capital?", None)
            .await
            .unwrap();
        assert!(!answer.contains("TERMINATE"));
        assert_eq!(answer, "The answer is Paris.");
    }

    #[tokio::test]
    async fn rejects_turn_budget_outside_limit() {
        let model = Arc::new(ScriptedModel::new(Vec::new()));
        let svc = service(model.clone(), Arc::new(ToolRegistry::new()));
        for bad in [0, 11] {
            let err = svc.start_research("q", Some(bad)).await.unwrap_err();
            assert!(matches!(err, ResearchError::InvalidRequest(_)));
        }
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn upstream_failure_surfaces_truncated_message() {
        let model = Arc::new(ScriptedModel::new(vec![Err(LlmError::Status {
            status: 429,
            body: "x".repeat(1000),
        })]));
        let err = service(model.clone(), Arc::new(ToolRegistry::new()))
            .start_research("q", None)
            .await
            .unwrap_err();

        assert!(matches!(err, ResearchError::Upstream(_)));
        assert_eq!(model.calls(), 1);
        let message = err.user_message();
        assert!(message.starts_with("The research agent failed:"));
        assert_eq!(message.chars().count(), USER_MESSAGE_LIMIT + 3);
    }

    #[tokio::test]
    async fn concurrent_requests_keep_separate_transcripts() {
        let tools = Arc::new(ToolRegistry::new());
        let model = Arc::new(
            ScriptedModel::repeating(AssistantReply::text("Answer for this question. TERMINATE"))
                .with_delay(Duration::from_millis(10)),
        );
        let svc = Arc::new(service(model, tools));

        let (first, second) = tokio::join!(
            svc.run(ResearchRequest::new("What is the capital of France?")),
            svc.run(ResearchRequest::new("How does photosynthesis work?")),
        );
        let first = first.unwrap();
        let second = second.unwrap();

        let mentions = |outcome: &ResearchOutcome, needle: &str| {
            outcome
                .transcript
                .messages()
                .iter()
                .any(|m| m.content.contains(needle))
        };
        assert!(mentions(&first, "France"));
        assert!(!mentions(&first, "photosynthesis"));
        assert!(mentions(&second, "photosynthesis"));
        assert!(!mentions(&second, "France"));
    }

    #[test]
    fn opening_message_fills_template() {
        let config = ResearchConfig {
            question_template: Some("Q: {question} -> end with {sentinel}".to_string()),
            ..ResearchConfig::default()
        };
        assert_eq!(
            config.opening_message("Why?"),
            "Q: Why? -> end with TERMINATE"
        );

        let bare = ResearchConfig {
            question_template: None,
            ..ResearchConfig::default()
        };
        assert_eq!(bare.opening_message("Why?"), "Why?");
    }

    #[test]
    fn sanitize_strips_every_sentinel() {
        let svc = service(
            Arc::new(ScriptedModel::new(Vec::new())),
            Arc::new(ToolRegistry::new()),
        );
        assert_eq!(
            svc.sanitize_answer("TERMINATE Paris is the capital. TERMINATE"),
            "Paris is the capital."
        );
    }
}
