//! Tool trait and typed parameters.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agent::AgentContext;
use crate::content::ContentBuffer;
pub use crate::error::ToolError;

/// Declared type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
        };
        f.write_str(s)
    }
}

/// A named, typed tool parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolParam {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    pub description: String,
}

impl ToolParam {
    pub fn required(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: true,
            description: description.into(),
        }
    }

    pub fn optional(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    /// Coerce a raw value to this parameter's type.
    ///
    /// Strings are accepted for every type since routers answer in text.
    fn coerce(&self, value: Value) -> Result<Value, String> {
        let mismatch = |v: &Value| format!("'{}' must be a {}, got {}", self.name, self.param_type, v);
        match (self.param_type, value) {
            (ParamType::String, Value::String(s)) => Ok(Value::String(s)),
            (ParamType::String, v @ (Value::Number(_) | Value::Bool(_))) => {
                Ok(Value::String(v.to_string()))
            }
            (ParamType::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => {
                Ok(Value::Number(n))
            }
            (ParamType::Integer, Value::String(ref s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| mismatch(&Value::String(s.clone()))),
            (ParamType::Number, Value::Number(n)) => Ok(Value::Number(n)),
            (ParamType::Number, Value::String(ref s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| mismatch(&Value::String(s.clone()))),
            (ParamType::Boolean, Value::Bool(b)) => Ok(Value::Bool(b)),
            (ParamType::Boolean, Value::String(ref s)) => match s.trim().to_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(mismatch(&Value::String(s.clone()))),
            },
            (_, v) => Err(mismatch(&v)),
        }
    }
}

/// Validated arguments for one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArgs {
    tool: String,
    values: Map<String, Value>,
}

impl ToolArgs {
    /// Check `raw` against `params`, coercing values to their declared types.
    ///
    /// Missing required parameters, unknown parameters and type mismatches are
    /// rejected before the tool ever runs.
    pub fn validate(
        tool: &str,
        params: &[ToolParam],
        mut raw: Map<String, Value>,
    ) -> Result<Self, ToolError> {
        let invalid = |reason: String| ToolError::InvalidParameters {
            name: tool.to_string(),
            reason,
        };

        if let Some(unknown) = raw.keys().find(|k| !params.iter().any(|p| &p.name == *k)) {
            return Err(invalid(format!("unknown parameter '{}'", unknown)));
        }

        let mut values = Map::new();
        for param in params {
            match raw.remove(&param.name) {
                Some(Value::Null) | None if param.required => {
                    return Err(invalid(format!("missing required parameter '{}'", param.name)));
                }
                Some(Value::Null) | None => {}
                Some(value) => {
                    values.insert(param.name.clone(), param.coerce(value).map_err(&invalid)?);
                }
            }
        }

        Ok(Self {
            tool: tool.to_string(),
            values,
        })
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(Value::as_bool)
    }

    /// Get a required string parameter.
    pub fn require_str(&self, key: &str) -> Result<&str, ToolError> {
        self.get_str(key).ok_or_else(|| ToolError::InvalidParameters {
            name: self.tool.clone(),
            reason: format!("missing required parameter '{}'", key),
        })
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }
}

/// A capability the router model may pick during a turn.
///
/// Tools stream any visible output into `output` and return a value that is
/// recorded as an observation (use `Value::Null` for nothing).
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Description shown to the router model.
    fn description(&self) -> &str;

    /// Display hint for renderers.
    fn icon(&self) -> &str {
        "handyman"
    }

    /// Extra guidance appended to the tool definition in the router prompt.
    fn instructions(&self) -> &str {
        ""
    }

    fn params(&self) -> Vec<ToolParam>;

    /// How many times the tool may be picked in one turn.
    fn max_uses(&self) -> usize {
        1
    }

    /// Whether the tool can be offered at all (e.g. its backend is configured).
    fn is_available(&self) -> bool {
        true
    }

    /// JSON schema built from [`Tool::params`].
    fn parameters_schema(&self) -> Value {
        let params = self.params();
        let properties: Map<String, Value> = params
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    serde_json::json!({
                        "type": p.param_type,
                        "description": p.description,
                    }),
                )
            })
            .collect();
        let required: Vec<&str> = params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    async fn execute(
        &self,
        ctx: &mut AgentContext,
        output: &ContentBuffer,
        args: ToolArgs,
    ) -> Result<Value, ToolError>;
}

/// Serializable summary of a tool, for listings and renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub icon: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            icon: tool.icon().to_string(),
            parameters: tool.parameters_schema(),
        }
    }
}

impl fmt::Debug for dyn Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name())
            .field("icon", &self.icon())
            .field("max_uses", &self.max_uses())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params() -> Vec<ToolParam> {
        vec![
            ToolParam::required("query", ParamType::String, "What to search"),
            ToolParam::optional("limit", ParamType::Integer, "Max results"),
            ToolParam::optional("fresh", ParamType::Boolean, "Skip cache"),
        ]
    }

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_validate_coerces_strings() {
        let args = ToolArgs::validate(
            "search",
            &params(),
            map(json!({"query": "rust", "limit": " 5 ", "fresh": "TRUE"})),
        )
        .unwrap();

        assert_eq!(args.require_str("query").unwrap(), "rust");
        assert_eq!(args.get_i64("limit"), Some(5));
        assert_eq!(args.get_bool("fresh"), Some(true));
    }

    #[test]
    fn test_validate_rejects_missing_required() {
        let err = ToolArgs::validate("search", &params(), map(json!({"limit": 2}))).unwrap_err();
        assert!(
            matches!(err, ToolError::InvalidParameters { ref reason, .. } if reason.contains("query"))
        );
    }

    #[test]
    fn test_validate_rejects_unknown() {
        let err = ToolArgs::validate("search", &params(), map(json!({"query": "x", "page": 1})))
            .unwrap_err();
        assert!(
            matches!(err, ToolError::InvalidParameters { ref reason, .. } if reason.contains("page"))
        );
    }

    #[test]
    fn test_validate_rejects_bad_types() {
        let err = ToolArgs::validate("search", &params(), map(json!({"query": "x", "limit": "many"})))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters { .. }));

        let err = ToolArgs::validate("search", &params(), map(json!({"query": ["x"]}))).unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters { .. }));
    }

    #[test]
    fn test_optional_params_may_be_omitted() {
        let args = ToolArgs::validate("search", &params(), map(json!({"query": "x"}))).unwrap();
        assert_eq!(args.get_i64("limit"), None);
        assert_eq!(args.as_map().len(), 1);
    }

    #[test]
    fn test_number_coercion() {
        let p = [ToolParam::required("t", ParamType::Number, "")];
        let args = ToolArgs::validate("x", &p, map(json!({"t": "0.5"}))).unwrap();
        assert_eq!(args.get_f64("t"), Some(0.5));
    }
}
