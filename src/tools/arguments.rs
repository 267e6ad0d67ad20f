//! Typed access to capability call arguments.

use serde_json::{Map, Value};

use crate::error::CapabilityError;

/// Decoded arguments for one invocation, tagged with the capability name
/// so extraction failures say which capability rejected them.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    capability: String,
    value: Value,
}

impl ToolArguments {
    pub fn new(capability: impl Into<String>, value: Value) -> Self {
        Self {
            capability: capability.into(),
            value,
        }
    }

    pub fn capability(&self) -> &str {
        &self.capability
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &Value {
        &self.value
    }

    /// Arguments as a JSON object, for forwarding to a remote server.
    ///
    /// `null` and blank strings mean "no arguments"; a string is parsed
    /// as JSON; anything that is not an object is rejected.
    pub fn to_object(&self) -> Result<Option<Map<String, Value>>, CapabilityError> {
        match &self.value {
            Value::Null => Ok(None),
            Value::Object(map) => Ok(Some(map.clone())),
            Value::String(raw) if raw.trim().is_empty() => Ok(None),
            Value::String(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => Ok(Some(map)),
                Ok(_) => Err(self.invalid("arguments must be a JSON object")),
                Err(err) => Err(self.invalid(format!("arguments are not valid JSON: {err}"))),
            },
            _ => Err(self.invalid("arguments must be a JSON object")),
        }
    }

    pub fn get_str(&self, key: &str) -> Result<&str, CapabilityError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| self.invalid(format!("missing string argument: {key}")))
    }

    pub fn get_i64(&self, key: &str) -> Result<i64, CapabilityError> {
        self.value
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| self.invalid(format!("missing integer argument: {key}")))
    }

    pub fn get_f64(&self, key: &str) -> Result<f64, CapabilityError> {
        self.value
            .get(key)
            .and_then(|v| v.as_f64())
            .ok_or_else(|| self.invalid(format!("missing number argument: {key}")))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, CapabilityError> {
        self.value
            .get(key)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| self.invalid(format!("missing boolean argument: {key}")))
    }

    /// Deserialize the entire arguments into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, CapabilityError> {
        let value = match self.to_object()? {
            Some(map) => Value::Object(map),
            None => Value::Object(Map::new()),
        };
        serde_json::from_value(value).map_err(|err| self.invalid(err.to_string()))
    }

    fn invalid(&self, message: impl Into<String>) -> CapabilityError {
        CapabilityError::InvalidArguments {
            name: self.capability.clone(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn typed_getters() {
        let args = ToolArguments::new("add", json!({"a": 5, "b": 7.5, "label": "sum", "exact": true}));
        assert_eq!(args.get_i64("a").unwrap(), 5);
        assert_eq!(args.get_f64("b").unwrap(), 7.5);
        assert_eq!(args.get_str("label").unwrap(), "sum");
        assert!(args.get_bool("exact").unwrap());
    }

    #[test]
    fn missing_argument_names_the_capability() {
        let args = ToolArguments::new("add", json!({"a": 5}));
        let err = args.get_i64("b").unwrap_err();
        assert_eq!(
            err,
            CapabilityError::InvalidArguments {
                name: "add".into(),
                message: "missing integer argument: b".into(),
            }
        );
    }

    #[test]
    fn object_coercion() {
        assert_eq!(ToolArguments::new("t", Value::Null).to_object().unwrap(), None);
        assert_eq!(ToolArguments::new("t", json!("  ")).to_object().unwrap(), None);
        let parsed = ToolArguments::new("t", json!("{\"q\":\"x\"}")).to_object().unwrap().unwrap();
        assert_eq!(parsed["q"], "x");
        assert!(ToolArguments::new("t", json!([1, 2])).to_object().is_err());
        assert!(ToolArguments::new("t", json!("[1]")).to_object().is_err());
    }

    #[test]
    fn deserialize_into_struct() {
        #[derive(Deserialize)]
        struct Add {
            a: i64,
            b: i64,
        }
        let add: Add = ToolArguments::new("add", json!({"a": 5, "b": 7})).deserialize().unwrap();
        assert_eq!(add.a + add.b, 12);
    }
}
