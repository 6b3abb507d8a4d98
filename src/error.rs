//! Error types for the subtrack library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`SubTrackError`] is **fatal**: the upload cannot proceed at all
//!   (unreadable file, API key not configured, nothing found in any file).
//!   Returned as `Err(SubTrackError)` from the top-level `scan*` functions.
//!   Its `Display` text is what the web UI shows in the error banner.
//!
//! * [`ScanIssue`] is **non-fatal**: one file's completion failed or came back
//!   malformed. The file contributes zero subscriptions and the issue is kept
//!   on [`crate::output::FileScan`] so callers can tell "the model found
//!   nothing" apart from "the model answer was garbage".

use thiserror::Error;

/// All fatal errors returned by the subtrack library.
#[derive(Debug, Error)]
pub enum SubTrackError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The upload contained no files.
    #[error("No files uploaded")]
    NoFiles,

    /// Text extraction produced nothing but whitespace.
    #[error("Could not read file contents")]
    UnreadableFile { filename: String },

    /// Every file was read, but no subscriptions came back.
    #[error("No subscriptions found")]
    NoSubscriptionsFound,

    // ── Credential errors ─────────────────────────────────────────────────
    /// No API key in the config and none in the environment.
    #[error("{var} not set. Run: export {var}='your-key'")]
    MissingCredential { var: String },

    // ── Completion errors ─────────────────────────────────────────────────
    /// The completion API returned a non-success status.
    #[error("LLM API error ({status}): {message}")]
    LlmApiError { status: u16, message: String },

    /// The completion API rejected the key (401/403).
    #[error("Authentication error from OpenRouter: {detail}")]
    AuthError { detail: String },

    /// HTTP 429 from the completion API.
    #[error("Rate limit exceeded for model '{model}'")]
    RateLimitExceeded {
        model: String,
        retry_after_secs: Option<u64>,
    },

    /// The completion call exceeded `api_timeout_secs`.
    #[error("API call timed out after {secs}s")]
    ApiTimeout { secs: u64 },

    /// Transport-level failure (DNS, TLS, connection reset, bad body).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not read an input file from disk (CLI only).
    #[error("Failed to read '{path}': {source}")]
    InputReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SubTrackError {
    /// Whether a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SubTrackError::RateLimitExceeded { .. } | SubTrackError::ApiTimeout { .. } => true,
            SubTrackError::LlmApiError { status, .. } => *status >= 500,
            SubTrackError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// A non-fatal problem with a single file's completion.
///
/// Stored on [`crate::output::FileScan`] when a file yields zero records
/// because of a failure rather than because nothing was there.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum ScanIssue {
    /// The model answered, but the answer could not be turned into records.
    #[error("{filename}: malformed model response: {detail}")]
    MalformedResponse { filename: String, detail: String },

    /// The completion call itself failed after retries.
    #[error("{filename}: completion failed after {retries} retries: {detail}")]
    Completion {
        filename: String,
        retries: u32,
        detail: String,
    },
}
