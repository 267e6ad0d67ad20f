//! Capability-related types: parameter schemas, descriptors, results.

use serde::{Deserialize, Serialize};

use crate::error::CapabilityError;

/// JSON Schema-based parameter definition for a capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityParameters {
    /// JSON Schema object describing the parameters.
    pub schema: serde_json::Value,
}

impl CapabilityParameters {
    /// Create from a raw JSON Schema value.
    pub fn from_schema(schema: serde_json::Value) -> Self {
        Self { schema }
    }

    /// A closed schema that accepts no parameters.
    pub fn none() -> Self {
        Self {
            schema: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": [],
                "additionalProperties": false,
            }),
        }
    }

    /// Builder: create an object schema with properties.
    pub fn object() -> ParameterBuilder {
        ParameterBuilder {
            properties: serde_json::Map::new(),
            required: Vec::new(),
            closed: false,
        }
    }
}

/// Builder for constructing parameter schemas.
pub struct ParameterBuilder {
    properties: serde_json::Map<String, serde_json::Value>,
    required: Vec<String>,
    closed: bool,
}

impl ParameterBuilder {
    fn property(mut self, name: impl Into<String>, kind: &str, description: impl Into<String>, required: bool) -> Self {
        let name = name.into();
        self.properties.insert(
            name.clone(),
            serde_json::json!({
                "type": kind,
                "description": description.into(),
            }),
        );
        if required {
            self.required.push(name);
        }
        self
    }

    pub fn string(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.property(name, "string", description, required)
    }

    pub fn integer(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.property(name, "integer", description, required)
    }

    pub fn number(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.property(name, "number", description, required)
    }

    pub fn boolean(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.property(name, "boolean", description, required)
    }

    /// Reject properties not listed in the schema.
    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }

    pub fn build(self) -> CapabilityParameters {
        let mut schema = serde_json::json!({
            "type": "object",
            "properties": self.properties,
            "required": self.required,
        });
        if self.closed {
            schema["additionalProperties"] = serde_json::Value::Bool(false);
        }
        CapabilityParameters { schema }
    }
}

/// Function tool as advertised to the model service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub parameters: serde_json::Value,
    #[serde(default)]
    pub strict: bool,
}

/// Tool entry in a turn request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolDescriptor {
    Function(FunctionToolDescriptor),
    /// Service-hosted web search.
    WebSearchPreview,
}

/// One piece of capability output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum ContentPart {
    Text { text: String },
    Image { data: String, mime_type: String },
    Resource { uri: String, text: Option<String> },
}

/// Output of a capability invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityResult {
    pub content: Vec<ContentPart>,
    #[serde(default)]
    pub is_error: bool,
}

impl CapabilityResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentPart::Text { text: text.into() }],
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentPart::Text { text: message.into() }],
            is_error: true,
        }
    }

    /// Text parts joined with newlines; non-text parts as JSON.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => text.clone(),
                ContentPart::Resource { text: Some(text), .. } => text.clone(),
                other => serde_json::to_string(other).unwrap_or_default(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The string handed back to the model as a function-call output.
    pub fn to_output_string(&self) -> String {
        let text = self.text_content();
        if self.is_error {
            format!("Error: {text}")
        } else {
            text
        }
    }
}

impl From<CapabilityError> for CapabilityResult {
    fn from(err: CapabilityError) -> Self {
        Self::error(err.to_string())
    }
}
