//! Translation between rmcp types and ochat's capability types.

use rmcp::model::{CallToolResult, Content, ResourceContents};
use rmcp::service::{ClientInitializeError, ServiceError};

use super::schema::RemoteToolSchema;
use crate::error::CapabilityError;
use crate::tools::{CapabilityResult, ContentPart};

pub(crate) fn map_tool_schema(tool: rmcp::model::Tool) -> RemoteToolSchema {
    RemoteToolSchema {
        name: tool.name.to_string(),
        description: tool.description.map(|d| d.to_string()),
        input_schema: serde_json::Value::Object((*tool.input_schema).clone()),
    }
}

fn map_content(item: &Content) -> Option<ContentPart> {
    if let Some(text) = item.as_text() {
        return Some(ContentPart::Text {
            text: text.text.clone(),
        });
    }
    if let Some(image) = item.as_image() {
        return Some(ContentPart::Image {
            data: image.data.clone(),
            mime_type: image.mime_type.clone(),
        });
    }
    if let Some(resource) = item.as_resource() {
        return Some(match &resource.resource {
            ResourceContents::TextResourceContents { uri, text, .. } => ContentPart::Resource {
                uri: uri.clone(),
                text: Some(text.clone()),
            },
            ResourceContents::BlobResourceContents { uri, .. } => ContentPart::Resource {
                uri: uri.clone(),
                text: None,
            },
        });
    }
    serde_json::to_string(item)
        .ok()
        .map(|text| ContentPart::Text { text })
}

/// Keep every content part; fall back to structured content when a server
/// returns no content list.
pub(crate) fn map_call_result(result: CallToolResult) -> CapabilityResult {
    let mut content: Vec<ContentPart> = result.content.iter().filter_map(map_content).collect();
    if content.is_empty() {
        if let Some(structured) = &result.structured_content {
            content.push(ContentPart::Text {
                text: structured.to_string(),
            });
        }
    }
    CapabilityResult {
        content,
        is_error: result.is_error.unwrap_or(false),
    }
}

/// Render an error with its source chain and, failing that, the OS-level
/// cause (for example "Connection refused") so it reaches the model.
///
/// rmcp's transport errors format their inner client error without exposing
/// it through `source()`, so the chain alone stops at reqwest's
/// "error sending request". The io error is still present in the `Debug`
/// form.
pub(crate) fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    if let Some(cause) = io_cause(&format!("{error:?}")) {
        if !message.contains(&cause) {
            message.push_str(": ");
            message.push_str(&cause);
        }
    }
    message
}

/// The innermost io error in a `Debug` rendering, e.g. `Os { code: 111,
/// kind: ConnectionRefused, message: "Connection refused" }` gives
/// "Connection refused". Falls back to the kind name.
fn io_cause(debug: &str) -> Option<String> {
    let start = debug.rfind("kind: ")? + "kind: ".len();
    let rest = &debug[start..];
    let kind_end = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    let kind = &rest[..kind_end];
    if kind.is_empty() {
        return None;
    }
    let tail = &rest[kind_end..];
    let message = tail
        .strip_prefix(", message: \"")
        .and_then(|m| m.find('"').map(|end| m[..end].to_string()));
    Some(message.unwrap_or_else(|| kind.to_string()))
}

pub(crate) fn map_initialize_error(endpoint: &str, error: ClientInitializeError) -> CapabilityError {
    let endpoint = endpoint.to_string();
    match error {
        ClientInitializeError::ConnectionClosed(context) => CapabilityError::Connection {
            endpoint,
            message: format!("connection closed during {context}"),
        },
        ClientInitializeError::TransportError { error, context } => CapabilityError::Connection {
            endpoint,
            message: format!("transport error ({context}): {}", error_chain(&error)),
        },
        ClientInitializeError::Cancelled => CapabilityError::Connection {
            endpoint,
            message: "initialize cancelled".into(),
        },
        ClientInitializeError::JsonRpcError(error) => CapabilityError::SessionInit {
            endpoint,
            message: format!("JSON-RPC error {}: {}", error.code.0, error.message),
        },
        other => CapabilityError::SessionInit {
            endpoint,
            message: other.to_string(),
        },
    }
}

/// Map a failed request on an open session. `operation` is the tool name
/// or the protocol method being called.
pub(crate) fn map_service_error(
    endpoint: &str,
    operation: &str,
    error: ServiceError,
) -> CapabilityError {
    match error {
        ServiceError::McpError(error) => CapabilityError::Provider {
            name: operation.to_string(),
            message: format!("MCP error {}: {}", error.code.0, error.message),
        },
        ServiceError::TransportSend(error) => CapabilityError::Connection {
            endpoint: endpoint.to_string(),
            message: format!("{operation}: transport send failed: {}", error_chain(&error)),
        },
        ServiceError::TransportClosed => CapabilityError::Connection {
            endpoint: endpoint.to_string(),
            message: format!("{operation}: transport closed"),
        },
        ServiceError::Timeout { timeout } => CapabilityError::Timeout {
            name: operation.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        },
        ServiceError::Cancelled { reason } => CapabilityError::Provider {
            name: operation.to_string(),
            message: format!(
                "request cancelled{}",
                reason.map(|r| format!(" ({r})")).unwrap_or_default()
            ),
        },
        other => CapabilityError::Provider {
            name: operation.to_string(),
            message: other.to_string(),
        },
    }
}
