//! Error types for the catalog agent orchestrator

use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Core Pipeline Errors
    // =============================

    /// The language model endpoint could not be reached. This is the only
    /// error a responder is allowed to surface to the workflow engine.
    #[error("LLM gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Malformed LLM response: {0}")]
    MalformedResponse(String),

    #[error("Knowledge base error: {0}")]
    KnowledgeBase(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
