//! Output items produced within a turn.

use serde::Deserialize;
use serde_json::{Map, Value};

/// A unit of model output: a message, a tool call, or a hosted-tool record.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message(MessageItem),
    FunctionCall(FunctionCallItem),
    WebSearchCall(WebSearchCallItem),
    FileSearchCall(OpaqueItem),
    ComputerCall(OpaqueItem),
    Reasoning(OpaqueItem),
    CodeInterpreterCall(OpaqueItem),
    ImageGenerationCall(OpaqueItem),
    LocalShellCall(OpaqueItem),
    McpCall(OpaqueItem),
    McpListTools(OpaqueItem),
    McpApprovalRequest(OpaqueItem),
    #[serde(other)]
    Unrecognized,
}

impl OutputItem {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::FunctionCall(_) => "function_call",
            Self::WebSearchCall(_) => "web_search_call",
            Self::FileSearchCall(_) => "file_search_call",
            Self::ComputerCall(_) => "computer_call",
            Self::Reasoning(_) => "reasoning",
            Self::CodeInterpreterCall(_) => "code_interpreter_call",
            Self::ImageGenerationCall(_) => "image_generation_call",
            Self::LocalShellCall(_) => "local_shell_call",
            Self::McpCall(_) => "mcp_call",
            Self::McpListTools(_) => "mcp_list_tools",
            Self::McpApprovalRequest(_) => "mcp_approval_request",
            Self::Unrecognized => "unrecognized",
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Message(item) => Some(&item.id),
            Self::FunctionCall(item) => item.id.as_deref(),
            Self::WebSearchCall(item) => Some(&item.id),
            Self::FileSearchCall(item)
            | Self::ComputerCall(item)
            | Self::Reasoning(item)
            | Self::CodeInterpreterCall(item)
            | Self::ImageGenerationCall(item)
            | Self::LocalShellCall(item)
            | Self::McpCall(item)
            | Self::McpListTools(item)
            | Self::McpApprovalRequest(item) => item.id.as_deref(),
            Self::Unrecognized => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageItem {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl MessageItem {
    /// Concatenated `output_text` parts.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                MessageContent::OutputText { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    OutputText {
        text: String,
        #[serde(default)]
        annotations: Vec<Value>,
    },
    Refusal {
        refusal: String,
    },
    #[serde(other)]
    Other,
}

/// A request from the model to invoke a named capability.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionCallItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub call_id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSearchCallItem {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub action: Option<WebSearchAction>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WebSearchAction {
    Search {
        #[serde(default)]
        query: Option<String>,
    },
    OpenPage {
        #[serde(default)]
        url: Option<String>,
    },
    Find {
        #[serde(default)]
        pattern: Option<String>,
        #[serde(default)]
        url: Option<String>,
    },
    #[serde(other)]
    Other,
}

impl WebSearchAction {
    /// Human-readable trace line for the console.
    pub fn describe(&self) -> Option<String> {
        match self {
            Self::Search { query } => Some(format!(
                "Searching for: {}",
                query.as_deref().unwrap_or("")
            )),
            Self::OpenPage { url } => {
                Some(format!("Opened page: {}", url.as_deref().unwrap_or("")))
            }
            Self::Find { pattern, url } => Some(format!(
                "Searched for pattern '{}' in page: {}",
                pattern.as_deref().unwrap_or(""),
                url.as_deref().unwrap_or("")
            )),
            Self::Other => None,
        }
    }
}

/// Item of a kind this client recognizes but never acts on.
#[derive(Debug, Clone, Deserialize)]
pub struct OpaqueItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}
