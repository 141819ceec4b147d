//! Typed errors for the FACT pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`). Errors raised inside a
//! single unit of work (one oracle call, one retrieval) classify themselves
//! through [`Retryability`] so the retry helper can decide what to do next.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::evidence::FetchStatus;

/// How a failed call should be treated by the retry helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retryability {
    /// Network trouble, timeouts, throttling, server errors.
    Transient,
    /// The reply arrived but could not be parsed. Retried once.
    ParseFailure,
    /// Retrying cannot help.
    Permanent,
}

/// Run-level errors. These abort a stage.
#[derive(Debug, Error)]
pub enum FactError {
    /// A record could not be parsed
    #[error("malformed input {path}:{line}: {reason}")]
    MalformedInput {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// Required input file does not exist
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Reading or writing a stage file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A resolvable pair cites a source the evidence file does not cover
    #[error("no evidence record for {url} (cited by task {task_id})")]
    MissingEvidence { task_id: String, url: String },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

/// Errors from the reasoning oracle.
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    /// Missing credentials or bad settings
    #[error("oracle not configured: {0}")]
    Config(String),

    /// Connection-level failure
    #[error("network error: {0}")]
    Network(String),

    /// Throttled by the provider
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// No reply within the per-call budget
    #[error("no reply after {0:?}")]
    Timeout(Duration),

    /// Non-success HTTP status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Reply did not have the expected structure
    #[error("unparseable reply: {0}")]
    Parse(String),
}

impl OracleError {
    pub fn retryability(&self) -> Retryability {
        match self {
            Self::Network(_) | Self::RateLimited(_) | Self::Timeout(_) => Retryability::Transient,
            Self::Api { status, .. } if *status == 408 || *status >= 500 => {
                Retryability::Transient
            }
            Self::Parse(_) => Retryability::ParseFailure,
            Self::Config(_) | Self::Api { .. } => Retryability::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.retryability() == Retryability::Transient
    }
}

/// Errors from the content-retrieval service.
#[derive(Debug, Error)]
pub enum RetrieveError {
    /// Security validation failed
    #[error("security error: {0}")]
    Security(#[from] SecurityError),

    /// Connection-level failure
    #[error("network error: {0}")]
    Network(String),

    /// No response within the per-call budget
    #[error("no response after {0:?}")]
    Timeout(Duration),

    /// Non-success HTTP status from the service or the origin
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body could not be decoded
    #[error("unexpected response: {0}")]
    Response(String),

    /// Missing credentials or bad settings
    #[error("retriever not configured: {0}")]
    Config(String),
}

impl RetrieveError {
    pub fn retryability(&self) -> Retryability {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::Response(_) => Retryability::Transient,
            Self::Status { status, .. } => match status {
                408 | 429 => Retryability::Transient,
                s if *s >= 500 => Retryability::Transient,
                _ => Retryability::Permanent,
            },
            Self::Security(_) | Self::Config(_) => Retryability::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.retryability() == Retryability::Transient
    }

    /// Terminal fetch status once this error is final.
    pub fn fetch_status(&self) -> FetchStatus {
        match self {
            Self::Security(_) => FetchStatus::Blocked,
            Self::Status { status, .. } if matches!(status, 401 | 403 | 451) => {
                FetchStatus::Blocked
            }
            _ => FetchStatus::Unreachable,
        }
    }
}

/// Security-related errors, primarily for SSRF protection.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// URL scheme not allowed (e.g., file://, ftp://)
    #[error("disallowed URL scheme: {0}")]
    DisallowedScheme(String),

    /// Host is blocked (e.g., localhost, metadata endpoints)
    #[error("blocked host: {0}")]
    BlockedHost(String),

    /// IP in blocked CIDR range (e.g., 10.0.0.0/8)
    #[error("blocked IP range: {0}")]
    BlockedCidr(String),

    /// URL has no host
    #[error("URL has no host")]
    NoHost,

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, FactError>;

/// Result type alias for oracle calls.
pub type OracleResult<T> = std::result::Result<T, OracleError>;

/// Result type alias for retrieval calls.
pub type RetrieveResult<T> = std::result::Result<T, RetrieveError>;

/// Result type alias for security operations.
pub type SecurityResult<T> = std::result::Result<T, SecurityError>;
