//! Tool schemas discovered on MCP servers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tools::CapabilityParameters;

/// Annotation keys some servers emit that the model service rejects.
const NON_STANDARD_KEYS: &[&str] = &["$schema", "$id"];

/// Schema for a tool exposed by an MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteToolSchema {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

impl RemoteToolSchema {
    /// Parameters in the shape the model service accepts.
    pub fn parameters(&self) -> CapabilityParameters {
        CapabilityParameters::from_schema(normalize_input_schema(self.input_schema.clone()))
    }
}

/// Strip transport-specific annotations and make sure the result is an
/// object schema with a `properties` map.
pub fn normalize_input_schema(schema: Value) -> Value {
    let mut map = match schema {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    strip_annotations(&mut map);
    map.entry("type").or_insert_with(|| Value::String("object".into()));
    map.entry("properties").or_insert_with(|| Value::Object(Map::new()));
    Value::Object(map)
}

fn strip_annotations(map: &mut Map<String, Value>) {
    for key in NON_STANDARD_KEYS {
        map.remove(*key);
    }
    for value in map.values_mut() {
        match value {
            Value::Object(inner) => strip_annotations(inner),
            Value::Array(items) => {
                for item in items.iter_mut() {
                    if let Value::Object(inner) = item {
                        strip_annotations(inner);
                    }
                }
            }
            _ => {}
        }
    }
}
