//! Error types for ochat.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

/// Violations of the model-service streaming contract.
///
/// Any of these fails the turn that produced it; the conversation itself
/// keeps going.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unrecognized stream event kind '{kind}'")]
    UnrecognizedEventKind { kind: String },

    #[error("Malformed '{kind}' event: {message}")]
    MalformedEvent { kind: String, message: String },

    #[error("Unexpected stream event '{kind}'")]
    UnsupportedEvent { kind: String },

    #[error("Unexpected output item '{kind}'")]
    UnsupportedOutputItem { kind: String },

    #[error("Unrecognized output item kind")]
    UnrecognizedOutputItem,

    #[error("Invalid tool call in item {item_id}: {reason}")]
    InvalidToolCall { item_id: String, reason: String },

    #[error("Event references unknown output item at index {output_index}")]
    UnknownOutputItem { output_index: u32 },

    #[error("Model service reported an error ({code}): {message}")]
    ServiceError { code: String, message: String },

    #[error("Stream ended before the turn reached a terminal state")]
    StreamEnded,
}

/// Failures resolving or invoking a capability.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("Unknown capability: {name}")]
    Unknown { name: String },

    #[error("Invalid arguments for {name}: {message}")]
    InvalidArguments { name: String, message: String },

    #[error("Capability {name} failed: {message}")]
    Execution { name: String, message: String },

    #[error("Connection to {endpoint} failed: {message}")]
    Connection { endpoint: String, message: String },

    #[error("Session initialization with {endpoint} failed: {message}")]
    SessionInit { endpoint: String, message: String },

    #[error("Capability {name} timed out after {timeout_ms}ms")]
    Timeout { name: String, timeout_ms: u64 },

    #[error("Provider error from {name}: {message}")]
    Provider { name: String, message: String },
}

/// Primary error type for all ochat operations.
#[derive(Error, Debug)]
pub enum OchatError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Turn failed: {0}")]
    TurnFailed(String),

    #[error("Continuation limit of {0} turns exceeded")]
    ContinuationLimit(usize),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl OchatError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Protocol(_) => ErrorCategory::Protocol,
            Self::Capability(CapabilityError::Connection { .. })
            | Self::Capability(CapabilityError::SessionInit { .. }) => ErrorCategory::Connection,
            Self::Capability(CapabilityError::Timeout { .. }) => ErrorCategory::Timeout,
            Self::Capability(_) => ErrorCategory::Capability,
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(_) => ErrorCategory::Network,
            Self::TurnFailed(_) => ErrorCategory::Server,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            _ => ErrorCategory::Unknown,
        }
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::RateLimit | ErrorCategory::Network | ErrorCategory::Server => {
                RecoverySuggestion::RetryLater
            }
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::Connection => RecoverySuggestion::CheckServer,
            ErrorCategory::Capability => RecoverySuggestion::CheckCapability,
            ErrorCategory::Protocol => RecoverySuggestion::ReportProtocolMismatch,
            _ => RecoverySuggestion::None,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, OchatError>;
