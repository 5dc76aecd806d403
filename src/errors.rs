use std::path::PathBuf;
use thiserror::Error;

/// Transport-level failures of a single whois exchange.
#[derive(Error, Debug)]
pub enum WhoisError {
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Network timeout")]
    Timeout,

    #[error("IO error: {0}")]
    IoError(#[from] tokio::io::Error),

    #[error("Response too large")]
    ResponseTooLarge,

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),
}

impl From<tokio::time::error::Elapsed> for WhoisError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        WhoisError::Timeout
    }
}

impl WhoisError {
    /// Connectivity failures are worth another attempt. An oversized reply
    /// or bad input will be the same next time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WhoisError::Timeout | WhoisError::IoError(_))
    }
}

/// Why a whois response was rejected by the parser.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("rate limited")]
    RateLimited,

    #[error("{0}")]
    MalformedResponse(String),

    #[error("unsupported registrar: {0}")]
    UnsupportedRegistrar(String),
}

/// Terminal failure for one domain, as seen by the batch driver.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("transport error: {0}")]
    Transport(#[from] WhoisError),

    #[error("rate limited by whois server")]
    RateLimited,

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("unsupported registrar: {0}")]
    UnsupportedRegistrar(String),

    #[error("retry budget exhausted after {attempts} attempts: {last}")]
    RetryBudgetExhausted { attempts: u32, last: Box<QueryError> },
}

impl From<ParseFailure> for QueryError {
    fn from(failure: ParseFailure) -> Self {
        match failure {
            ParseFailure::RateLimited => QueryError::RateLimited,
            ParseFailure::MalformedResponse(reason) => QueryError::MalformedResponse(reason),
            ParseFailure::UnsupportedRegistrar(name) => QueryError::UnsupportedRegistrar(name),
        }
    }
}

impl QueryError {
    /// Short machine-friendly label, used in events and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::Transport(_) => "transport",
            QueryError::RateLimited => "rate_limited",
            QueryError::MalformedResponse(_) => "malformed_response",
            QueryError::UnsupportedRegistrar(_) => "unsupported_registrar",
            QueryError::RetryBudgetExhausted { .. } => "retry_budget_exhausted",
        }
    }
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read domain list {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON domain list: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid CSV domain list: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Template error: {0}")]
    Template(String),

    #[error("Failed to write report {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
