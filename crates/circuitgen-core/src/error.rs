use thiserror::Error;

#[derive(Error, Debug)]
pub enum CircuitGenError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unreadable or missing prompt template. Fatal for the affected
    /// entity's generation; never swallowed.
    #[error("Template error at {path}: {message}")]
    Template { path: String, message: String },

    /// The LLM call itself failed (network, quota, malformed reply body).
    /// Retryable; distinct from an extraction miss.
    #[error("LLM client error: {0}")]
    Client(String),

    #[error("LLM call timed out: {0}")]
    Timeout(String),

    /// The reply parsed cleanly but carried no segment for this leader.
    /// Retryable; the entity stays in its pre-transition state.
    #[error("no `{leader}` segment in response for entity `{entity}`")]
    Extraction { entity: String, leader: String },

    #[error("entity not found in registry: {0}")]
    EntityNotFound(String),

    #[error("cycle detected in sub-model graph: {0}")]
    CycleDetected(String),

    #[error("expansion depth exceeded at `{entity}` (max {max})")]
    DepthExceeded { entity: String, max: usize },

    #[error("expansion cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

pub type Result<T> = std::result::Result<T, CircuitGenError>;
