use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to prepare data directories: {0}")]
    Directories(#[source] anyhow::Error),

    #[error("Failed to initialize knowledge store: {0}")]
    Knowledge(#[source] anyhow::Error),

    #[error("Failed to initialize embedding provider: {0}")]
    Embedder(#[source] anyhow::Error),

    #[error("Failed to initialize language model client: {0}")]
    Llm(#[source] anyhow::Error),
}
