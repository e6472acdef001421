use std::fmt::Display;

use super::error::ConfigError;
use super::settings::Settings;

pub fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    let agent = &settings.agent;
    validate_range("agent.max_turns_limit", agent.max_turns_limit, 1, 50)?;
    validate_range("agent.max_turns", agent.max_turns, 1, agent.max_turns_limit)?;
    validate_range("agent.top_k", agent.top_k, 1, 20)?;
    validate_range("agent.tool_timeout_secs", agent.tool_timeout_secs, 1, 3_600)?;
    validate_non_empty("agent.sentinel", &agent.sentinel)?;
    validate_non_empty("agent.system_prompt", &agent.system_prompt)?;
    if let Some(template) = &agent.question_template {
        if !template.contains("{question}") {
            return Err(ConfigError::Invalid(
                "agent.question_template must contain {question}".to_string(),
            ));
        }
    }

    let llm = &settings.llm;
    validate_range("llm.temperature", llm.temperature, 0.0, 2.0)?;
    validate_range("llm.timeout_secs", llm.timeout_secs, 1, 3_600)?;
    validate_non_empty("llm.api_base_url", &llm.api_base_url)?;
    validate_non_empty("llm.model", &llm.model)?;
    validate_range("llm.embedding_dimensions", llm.embedding_dimensions, 8, 8_192)?;

    let rag = &settings.rag;
    validate_range("rag.chunk_size", rag.chunk_size, 1, 100_000)?;
    if rag.chunk_overlap >= rag.chunk_size {
        return Err(ConfigError::Invalid(format!(
            "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
            rag.chunk_overlap, rag.chunk_size
        )));
    }
    validate_range("rag.embed_batch_size", rag.embed_batch_size, 1, 2_048)?;

    validate_range(
        "server.max_input_length",
        settings.server.max_input_length,
        1,
        1_000_000,
    )?;
    validate_range("client.timeout_secs", settings.client.timeout_secs, 1, 3_600)?;
    validate_non_empty("client.api_url", &settings.client.api_url)?;

    Ok(())
}

fn validate_range<T>(path: &str, value: T, min: T, max: T) -> Result<(), ConfigError>
where
    T: PartialOrd + Display,
{
    if value < min || value > max {
        return Err(ConfigError::Invalid(format!(
            "{} must be between {} and {} (got {})",
            path, min, max, value
        )));
    }
    Ok(())
}

fn validate_non_empty(path: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{} must not be empty", path)));
    }
    Ok(())
}
