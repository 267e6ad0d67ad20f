//! Connection parameters for MCP servers.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};

const DEFAULT_INIT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 300;

/// How to reach a capability server. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum ServerParameters {
    /// Spawn a child process and speak MCP over its stdin/stdout.
    Stdio(StdioParameters),
    /// Streamable-HTTP endpoint.
    Http(HttpParameters),
}

impl ServerParameters {
    pub fn stdio(command: impl Into<String>, args: Vec<String>) -> Self {
        Self::Stdio(StdioParameters::builder().command(command).args(args).build())
    }

    pub fn http(url: impl Into<String>) -> Self {
        Self::Http(HttpParameters::builder().url(url).build())
    }

    /// Short description used in logs and error messages.
    pub fn endpoint(&self) -> String {
        match self {
            Self::Stdio(p) if p.args.is_empty() => p.command.clone(),
            Self::Stdio(p) => format!("{} {}", p.command, p.args.join(" ")),
            Self::Http(p) => p.url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
pub struct StdioParameters {
    #[builder(into)]
    pub command: String,
    #[serde(default)]
    #[builder(default)]
    pub args: Vec<String>,
    /// Extra environment variables for the child process.
    #[serde(default)]
    #[builder(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Bound on spawning plus the initialize handshake.
    #[serde(default = "default_init_timeout_secs")]
    #[builder(default = DEFAULT_INIT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
}

impl StdioParameters {
    pub fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
pub struct HttpParameters {
    #[builder(into)]
    pub url: String,
    #[serde(default)]
    #[builder(default)]
    pub headers: BTreeMap<String, String>,
    /// Bound on connecting plus the initialize handshake.
    #[serde(default = "default_init_timeout_secs")]
    #[builder(default = DEFAULT_INIT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
    /// Bound on each request once the session is up.
    #[serde(default = "default_read_timeout_secs")]
    #[builder(default = DEFAULT_READ_TIMEOUT_SECS)]
    pub read_timeout_secs: u64,
    /// Ask the server to end the session when it is closed.
    #[serde(default = "default_true")]
    #[builder(default = true)]
    pub terminate_on_close: bool,
}

impl HttpParameters {
    pub fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Bearer token from an `Authorization` header, if one was configured.
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("authorization"))
            .map(|(_, value)| value.strip_prefix("Bearer ").unwrap_or(value).trim())
    }

    /// Headers other than `Authorization`.
    pub fn extra_headers(&self) -> impl Iterator<Item = (&String, &String)> {
        self.headers
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case("authorization"))
    }
}

fn default_init_timeout_secs() -> u64 {
    DEFAULT_INIT_TIMEOUT_SECS
}

fn default_read_timeout_secs() -> u64 {
    DEFAULT_READ_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}
