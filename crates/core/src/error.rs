//! Error types for the NestChat domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all NestChat operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- LLM client errors ---
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    // --- Orchestration errors ---
    #[error("Advisor error: {0}")]
    Advisor(#[from] AdvisorError),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures from the remote chat-completion API.
///
/// Quota exhaustion surfaces as `RateLimited` or `Api` depending on how
/// the upstream reports it; a malformed response body is `Api` with
/// status 200.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// The single uniform failure the Chat Orchestrator surfaces.
///
/// Every downstream failure kind (network, timeout, auth, quota,
/// malformed response) collapses into `Upstream` with the underlying
/// detail preserved. The orchestrator never retries; resilience, if
/// any, belongs to the caller.
#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("AI service failure: {0}")]
    Upstream(#[source] ClientError),
}

/// Storage-layer failures.
///
/// "Not found" is not an error: stores return `Ok(None)` / `Ok(false)`
/// for absent rows, and a session owned by a different user is reported
/// identically to an absent one so existence never leaks across users.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Profile already exists for user {0}")]
    AlreadyExists(String),
}
