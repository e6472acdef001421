use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Use the tool to answer questions. End with TERMINATE.";

pub const DEFAULT_QUESTION_TEMPLATE: &str = "Research the following question using the \
query_knowledge_base tool and write a detailed summary of what the documents say. \
End your final reply with {sentinel}.\n\nQuestion: {question}";

pub const DEFAULT_CONTINUE_PROMPT: &str = "Continue. If the answer is complete, reply with the \
final summary followed by {sentinel}.";

/// Full service configuration. Every section falls back to its defaults, so a
/// partial `config.yml` is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: AppSettings,
    pub llm: LlmSettings,
    pub agent: AgentSettings,
    pub rag: RagSettings,
    pub server: ServerSettings,
    pub client: ClientSettings,
    pub sandbox: SandboxSettings,
    pub paths: PathSettings,
}

impl Settings {
    pub fn api_token(&self) -> Option<&str> {
        self.llm
            .api_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub name: String,
    pub debug: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "Enterprise Research Agent".to_string(),
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    #[default]
    OpenAi,
    Hashing,
}

impl EmbeddingProviderKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "openai" | "open_ai" | "http" => Some(Self::OpenAi),
            "hashing" | "local" => Some(Self::Hashing),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Read from `API_TOKEN`/`GITHUB_TOKEN`; never written back.
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
    pub api_base_url: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
    pub embedding_provider: EmbeddingProviderKind,
    pub embedding_model: String,
    /// Only used by the hashing embedder.
    pub embedding_dimensions: usize,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_token: None,
            api_base_url: "https://models.inference.ai.azure.com".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.2,
            max_tokens: None,
            timeout_secs: 120,
            embedding_provider: EmbeddingProviderKind::OpenAi,
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: 384,
        }
    }
}

/// How the sentinel is matched against an assistant reply. Matching is
/// always case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SentinelMatch {
    #[default]
    Contains,
    Suffix,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub max_turns: usize,
    pub max_turns_limit: usize,
    pub sentinel: String,
    pub sentinel_match: SentinelMatch,
    pub system_prompt: String,
    /// `{question}` and `{sentinel}` are substituted. `None` sends the bare question.
    pub question_template: Option<String>,
    pub continue_prompt: String,
    pub min_answer_chars: usize,
    pub top_k: usize,
    pub tool_timeout_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_turns: 3,
            max_turns_limit: 10,
            sentinel: "TERMINATE".to_string(),
            sentinel_match: SentinelMatch::Contains,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            question_template: Some(DEFAULT_QUESTION_TEMPLATE.to_string()),
            continue_prompt: DEFAULT_CONTINUE_PROMPT.to_string(),
            min_answer_chars: 10,
            top_k: 2,
            tool_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embed_batch_size: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
            embed_batch_size: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub max_input_length: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_allowed_origins: Vec::new(),
            max_input_length: 4000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub api_url: String,
    pub timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSettings {
    pub use_docker: bool,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self { use_docker: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub data_dir: Option<PathBuf>,
    pub db_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}
