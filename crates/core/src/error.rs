//! Error types for the weekforge domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator boundary has its own error enum; the pipeline only ever
//! surfaces [`PipelineError`] to its caller.

use thiserror::Error;

/// The top-level error type for all weekforge operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Text generation ---
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    // --- Verification / search tools ---
    #[error("Verification error: {0}")]
    Verification(#[from] VerificationError),

    // --- Context budget ---
    #[error("Budget error: {0}")]
    Budget(#[from] BudgetError),

    // --- Persistence ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Pipeline ---
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failure of the text-generation service, reported after its own retries.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider returned an empty response")]
    EmptyResponse,

    #[error("Prompt does not fit the context budget: {0}")]
    Budget(String),
}

impl GenerationError {
    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Network(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            Self::EmptyResponse => true,
            Self::AuthenticationFailed(_) | Self::NotConfigured(_) | Self::Budget(_) => false,
        }
    }
}

/// Failure of a link, dataset, or search collaborator.
#[derive(Debug, Clone, Error)]
pub enum VerificationError {
    #[error("Service not configured: {0}")]
    NotConfigured(String),

    #[error("Request to {url} failed: {reason}")]
    RequestFailed { url: String, reason: String },

    #[error("Unexpected response from {service}: {reason}")]
    InvalidResponse { service: String, reason: String },
}

/// The non-truncatable part of a prompt does not fit the usable ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BudgetError {
    #[error("Required context needs {required} tokens but only {limit} are usable")]
    Overflow { required: usize, limit: usize },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Malformed stored section {id}: {reason}")]
    Malformed { id: String, reason: String },
}

/// Errors the pipeline reports to its caller.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// Fewer approved sections than specified at compile time. The per-section
    /// state machine always terminates, so this indicates a bug.
    #[error("Cannot compile incomplete week: {actual}/{expected} sections approved")]
    IncompleteWeek { expected: usize, actual: usize },

    #[error("No sections configured for week {0}")]
    NoSections(u32),
}
