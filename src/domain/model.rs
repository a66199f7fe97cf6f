use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// A service api entry as declared by a provider's `*.http_services_api` file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceDescription {
    pub id: String,
    pub title: String,
    /// Description document location, relative to the provider base path.
    pub api_path: String,
    /// Absolute (or root-relative) location of the description document.
    pub source: PathBuf,
    pub base_url: Option<String>,
    pub provider: String,
    /// Transport configuration handed to the execution client.
    pub config: Map<String, Value>,
}

/// Parsed operation document of one service api.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiDescription {
    pub name: Option<String>,
    pub base_url: Option<String>,
    pub operations: BTreeMap<String, Operation>,
}

impl ApiDescription {
    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.operations.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operation {
    pub name: String,
    pub http_method: String,
    pub uri: String,
    pub summary: Option<String>,
    pub parameters: Vec<Parameter>,
}

impl Operation {
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn required_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| p.required)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub required: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
    pub location: Option<ParamLocation>,
    /// Key used on the wire when it differs from `name`.
    pub sent_as: Option<String>,
    /// Item type of `array` parameters.
    pub items: Option<ParamType>,
}

impl Parameter {
    pub fn wire_name(&self) -> &str {
        self.sent_as.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Any,
}

impl ParamType {
    /// Reads a declared type. Union types such as `["string", "null"]`
    /// resolve to their first non-null member.
    pub fn from_declared(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(name)) => Self::from_name(name),
            Some(Value::Array(names)) => names
                .iter()
                .filter_map(Value::as_str)
                .find(|name| *name != "null")
                .map(Self::from_name)
                .unwrap_or(ParamType::Any),
            _ => ParamType::Any,
        }
    }

    fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "string" => ParamType::String,
            "integer" | "int" => ParamType::Integer,
            "number" | "float" | "numeric" => ParamType::Number,
            "boolean" | "bool" => ParamType::Boolean,
            "array" => ParamType::Array,
            "object" => ParamType::Object,
            _ => ParamType::Any,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
            ParamType::Any => "any",
        };
        f.write_str(name)
    }
}

/// Where a parameter value is placed in the outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamLocation {
    Uri,
    Query,
    Header,
    Json,
    FormParam,
    Body,
}

impl ParamLocation {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "uri" => Some(ParamLocation::Uri),
            "query" => Some(ParamLocation::Query),
            "header" => Some(ParamLocation::Header),
            "json" => Some(ParamLocation::Json),
            "formParam" | "postField" => Some(ParamLocation::FormParam),
            "body" => Some(ParamLocation::Body),
            _ => None,
        }
    }
}

/// A named, pre-filled operation invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedRequest {
    pub id: String,
    pub label: String,
    pub service_api: String,
    pub command_name: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Decoded response of a successfully dispatched operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResult {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

impl CommandResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        self.body.as_array()
    }

    pub fn into_body(self) -> Value {
        self.body
    }
}
