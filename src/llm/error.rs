use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request to language model failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("language model returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("language model did not answer within {0:?}")]
    Timeout(Duration),

    #[error("invalid response from language model: {0}")]
    InvalidResponse(String),

    #[error("missing API token for the language model provider")]
    MissingCredential,
}
