//! The uniform result object every operation emits.

use crate::error::{ErrorKind, ToolkitError};
use serde::Serialize;
use serde_json::{Map, Value};

/// `{success, message, ...extra}` as written to stdout.
///
/// Failures additionally carry an `error` field holding the [`ErrorKind`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl OperationResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            details: Map::new(),
        }
    }

    pub fn failure(err: &ToolkitError) -> Self {
        let mut details = Map::new();
        details.insert("error".to_string(), json_value(err.kind()));
        Self {
            success: false,
            message: err.to_string(),
            details,
        }
    }

    /// Adds an operation-specific field.
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        self.details.insert(key.to_string(), json_value(value));
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }

    pub fn error_kind(&self) -> Option<&str> {
        self.details.get("error").and_then(Value::as_str)
    }

    /// Single-line JSON rendering.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"success":false,"message":"failed to serialise result: {}"}}"#,
                e.to_string().replace('"', "'")
            )
        })
    }
}

fn json_value(value: impl Serialize) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

impl From<ToolkitError> for OperationResult {
    fn from(err: ToolkitError) -> Self {
        Self::failure(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_serialisation() {
        let result = OperationResult::ok("done").with("pageCount", 3);
        let json: Value = serde_json::from_str(&result.to_json()).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "done");
        assert_eq!(json["pageCount"], 3);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_failure_carries_kind() {
        let err = ToolkitError::UnsupportedAngle { angle: 45 };
        let result = OperationResult::failure(&err);
        assert!(!result.success);
        assert_eq!(result.error_kind(), Some("UnsupportedAngle"));
        assert!(result.message.contains("45"));
        assert!(!result.to_json().contains('\n'));
    }
}
