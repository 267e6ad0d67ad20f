//! Error classification and recovery hints.

use std::fmt;

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Server,
    Api,
    Configuration,
    Serialization,
    Protocol,
    Capability,
    Connection,
    Unknown,
}

/// Suggested recovery action, shown after a failed turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryLater,
    CheckCredentials,
    CheckConfiguration,
    IncreaseTimeout,
    CheckServer,
    CheckCapability,
    ReportProtocolMismatch,
    None,
}

impl RecoverySuggestion {
    /// One-line hint, or `None` when there is nothing useful to say.
    pub fn hint(self) -> Option<&'static str> {
        match self {
            Self::RetryLater => Some("the model service may be busy; try again shortly"),
            Self::CheckCredentials => Some("check OPENAI_API_KEY"),
            Self::CheckConfiguration => Some("check the config file and environment"),
            Self::IncreaseTimeout => Some("raise the timeout in the config file"),
            Self::CheckServer => Some("make sure the capability server is running and reachable"),
            Self::CheckCapability => Some("the tool failed; see the result above"),
            Self::ReportProtocolMismatch => {
                Some("the service sent something this client does not handle")
            }
            Self::None => None,
        }
    }
}

impl fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.hint().unwrap_or(""))
    }
}
