//! Configuration (layered: defaults < TOML file < env < CLI flags).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agent::conversation::DEFAULT_MAX_CONTINUATIONS;
use crate::agent::ConversationSettings;
use crate::error::{OchatError, Result};
use crate::mcp::{CapabilityProvider, ServerParameters};
use crate::provider::openai_responses::DEFAULT_BASE_URL;

pub const DEFAULT_MODEL: &str = "gpt-4.1";
pub const DEFAULT_INSTRUCTIONS: &str = "You are an agent of delight. Use the tools provided.";
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 60;
const CONFIG_FILE_NAME: &str = "ochat.toml";

/// A named capability server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    #[serde(flatten)]
    pub params: ServerParameters,
}

/// Runtime configuration for one ochat process.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OchatConfig {
    /// Never written back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub instructions: String,
    pub web_search: bool,
    pub store: bool,
    pub max_continuations: usize,
    /// Bound on one remote capability call, in seconds.
    pub call_timeout_secs: u64,
    pub servers: Vec<ServerConfig>,
}

impl std::fmt::Debug for OchatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OchatConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("instructions", &self.instructions)
            .field("web_search", &self.web_search)
            .field("store", &self.store)
            .field("max_continuations", &self.max_continuations)
            .field("call_timeout_secs", &self.call_timeout_secs)
            .field("servers", &self.servers)
            .finish()
    }
}

impl Default for OchatConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            web_search: false,
            store: true,
            max_continuations: DEFAULT_MAX_CONTINUATIONS,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
            servers: Vec::new(),
        }
    }
}

impl OchatConfig {
    /// Load the file at `path`, or the default config file if it exists.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            OchatError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "loading config file");
        Self::from_toml(&text)
            .map_err(|e| OchatError::Configuration(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// `ochat.toml` in the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "ochat")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Override from the process environment (and `.env`, if present).
    pub fn apply_env(&mut self) {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        self.apply_vars(|key| std::env::var(key).ok());
    }

    /// Override from an arbitrary variable lookup.
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(url) = non_empty("OPENAI_BASE_URL") {
            self.base_url = url;
        }
        if let Some(model) = non_empty("OCHAT_MODEL") {
            self.model = model;
        }
        if let Some(instructions) = non_empty("OCHAT_INSTRUCTIONS") {
            self.instructions = instructions;
        }
    }

    /// Startup checks. Any failure here is fatal.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.as_deref().map_or(true, |key| key.trim().is_empty()) {
            return Err(OchatError::Configuration(
                "missing OPENAI_API_KEY (set it in the environment or a .env file)".into(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(OchatError::Configuration("model must not be empty".into()));
        }
        for server in &self.servers {
            if let ServerParameters::Http(params) = &server.params {
                if !params.url.starts_with("http://") && !params.url.starts_with("https://") {
                    return Err(OchatError::Configuration(format!(
                        "server '{}': url must start with http:// or https://",
                        server.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| OchatError::Configuration("missing OPENAI_API_KEY".into()))
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn conversation_settings(&self) -> ConversationSettings {
        ConversationSettings::builder()
            .model(self.model.clone())
            .instructions(self.instructions.clone())
            .web_search(self.web_search)
            .store(self.store)
            .max_continuations(self.max_continuations)
            .build()
    }

    /// One provider per configured server, in file order.
    pub fn providers(&self) -> Vec<Arc<CapabilityProvider>> {
        self.servers
            .iter()
            .map(|server| {
                Arc::new(
                    CapabilityProvider::new(server.name.clone(), server.params.clone())
                        .with_call_timeout(self.call_timeout()),
                )
            })
            .collect()
    }
}
