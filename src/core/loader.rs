use crate::domain::model::{ApiDescription, Operation, ParamLocation, ParamType, Parameter};
use crate::utils::error::{ManagerError, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// File formats a service description can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionFormat {
    Json,
    Yaml,
    Toml,
}

impl DescriptionFormat {
    pub const ALLOWED_EXTENSIONS: &'static [&'static str] = &["json", "yml", "yaml", "toml"];

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "json" => Some(DescriptionFormat::Json),
            "yml" | "yaml" => Some(DescriptionFormat::Yaml),
            "toml" => Some(DescriptionFormat::Toml),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| ManagerError::UnsupportedFormat {
                file: path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string()),
                allowed: Self::ALLOWED_EXTENSIONS.join(", "),
            })
    }

    /// Decodes a document of this format into a generic value tree.
    pub fn decode(&self, content: &str) -> Result<Value> {
        let value = match self {
            DescriptionFormat::Json => serde_json::from_str(content)?,
            DescriptionFormat::Yaml => serde_yaml::from_str(content)?,
            DescriptionFormat::Toml => toml::from_str(content)?,
        };
        Ok(value)
    }

    pub fn parse(&self, content: &str) -> Result<ApiDescription> {
        build_description(self.decode(content)?)
    }
}

pub fn load_description(path: &Path) -> Result<ApiDescription> {
    let format = DescriptionFormat::from_path(path)?;
    let content = std::fs::read_to_string(path).map_err(|e| {
        ManagerError::config(format!(
            "Unable to read service description {}: {}",
            path.display(),
            e
        ))
    })?;

    let description = format.parse(&content)?;
    tracing::debug!(
        "Loaded {} operations from {}",
        description.operations.len(),
        path.display()
    );
    Ok(description)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDescription {
    name: Option<String>,
    #[serde(alias = "baseUri")]
    base_url: Option<String>,
    #[serde(default)]
    operations: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOperation {
    http_method: Option<String>,
    uri: Option<String>,
    summary: Option<String>,
    #[serde(default)]
    parameters: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawParameter {
    #[serde(rename = "type")]
    param_type: Option<Value>,
    #[serde(default)]
    required: bool,
    default: Option<Value>,
    description: Option<String>,
    location: Option<String>,
    sent_as: Option<String>,
    items: Option<RawItems>,
}

#[derive(Debug, Deserialize)]
struct RawItems {
    #[serde(rename = "type")]
    param_type: Option<Value>,
}

fn build_description(value: Value) -> Result<ApiDescription> {
    let raw: RawDescription = serde_json::from_value(value)?;
    let mut operations = BTreeMap::new();

    for (name, definition) in raw.operations {
        let operation = build_operation(&name, definition)?;
        operations.insert(name, operation);
    }

    Ok(ApiDescription {
        name: raw.name,
        base_url: raw.base_url,
        operations,
    })
}

fn build_operation(name: &str, definition: Value) -> Result<Operation> {
    let raw: RawOperation = serde_json::from_value(definition).map_err(|e| {
        ManagerError::config(format!("Invalid definition of operation \"{}\": {}", name, e))
    })?;

    let mut parameters = Vec::with_capacity(raw.parameters.len());
    for (param_name, definition) in raw.parameters {
        parameters.push(build_parameter(name, &param_name, definition)?);
    }

    Ok(Operation {
        name: name.to_string(),
        http_method: raw
            .http_method
            .map(|m| m.to_ascii_uppercase())
            .unwrap_or_else(|| "GET".to_string()),
        uri: raw.uri.unwrap_or_default(),
        summary: raw.summary,
        parameters,
    })
}

fn build_parameter(operation: &str, name: &str, definition: Value) -> Result<Parameter> {
    let raw: RawParameter = serde_json::from_value(definition).map_err(|e| {
        ManagerError::config(format!(
            "Invalid definition of parameter \"{}\" in operation \"{}\": {}",
            name, operation, e
        ))
    })?;

    let location = match raw.location.as_deref() {
        None => None,
        Some(location) => Some(ParamLocation::from_name(location).ok_or_else(|| {
            ManagerError::config(format!(
                "Unsupported location \"{}\" for parameter \"{}\" in operation \"{}\"",
                location, name, operation
            ))
        })?),
    };

    Ok(Parameter {
        name: name.to_string(),
        param_type: ParamType::from_declared(raw.param_type.as_ref()),
        required: raw.required,
        default: raw.default,
        description: raw.description,
        location,
        sent_as: raw.sent_as,
        items: raw
            .items
            .map(|items| ParamType::from_declared(items.param_type.as_ref())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    const YAML_DESCRIPTION: &str = r#"
name: JsonPlaceholder
operations:
  FindPosts:
    httpMethod: GET
    uri: /posts
    summary: Find posts
  CreatePost:
    httpMethod: POST
    uri: /posts
    parameters:
      title:
        type: string
        location: json
        required: true
      body:
        type: string
        location: json
      userId:
        type: integer
        location: json
        sentAs: user_id
        default: 1
      tags:
        type: array
        location: json
        items:
          type: string
"#;

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            DescriptionFormat::from_path(Path::new("api/example.json")).unwrap(),
            DescriptionFormat::Json
        );
        assert_eq!(
            DescriptionFormat::from_path(Path::new("api/example.yml")).unwrap(),
            DescriptionFormat::Yaml
        );
        assert_eq!(
            DescriptionFormat::from_path(Path::new("api/example.toml")).unwrap(),
            DescriptionFormat::Toml
        );
    }

    #[test]
    fn test_unsupported_extension_names_allowed_set() {
        let err = DescriptionFormat::from_path(Path::new("api/example.php")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("example.php"));
        assert!(message.contains("json, yml, yaml, toml"));
    }

    #[test]
    fn test_parse_yaml_keeps_parameter_order() {
        let description = DescriptionFormat::Yaml.parse(YAML_DESCRIPTION).unwrap();

        assert_eq!(description.name.as_deref(), Some("JsonPlaceholder"));
        assert_eq!(description.operations.len(), 2);

        let create = description.operation("CreatePost").unwrap();
        assert_eq!(create.http_method, "POST");
        let names: Vec<&str> = create.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["title", "body", "userId", "tags"]);

        let title = create.parameter("title").unwrap();
        assert!(title.required);
        assert_eq!(title.location, Some(ParamLocation::Json));

        let user_id = create.parameter("userId").unwrap();
        assert_eq!(user_id.param_type, ParamType::Integer);
        assert_eq!(user_id.wire_name(), "user_id");
        assert_eq!(user_id.default, Some(serde_json::json!(1)));

        let tags = create.parameter("tags").unwrap();
        assert_eq!(tags.items, Some(ParamType::String));
    }

    #[test]
    fn test_operation_defaults() {
        let description = DescriptionFormat::Json
            .parse(r#"{"operations": {"Ping": {}}}"#)
            .unwrap();
        let ping = description.operation("Ping").unwrap();
        assert_eq!(ping.http_method, "GET");
        assert_eq!(ping.uri, "");
        assert!(ping.parameters.is_empty());
    }

    #[test]
    fn test_parse_toml() {
        let content = r#"
baseUrl = "https://api.example.com"

[operations.FindPost]
httpMethod = "get"
uri = "posts/{postId}"

[operations.FindPost.parameters.postId]
type = "integer"
location = "uri"
required = true
"#;
        let description = DescriptionFormat::Toml.parse(content).unwrap();
        assert_eq!(description.base_url.as_deref(), Some("https://api.example.com"));
        let find = description.operation("FindPost").unwrap();
        assert_eq!(find.http_method, "GET");
        assert_eq!(find.parameter("postId").unwrap().location, Some(ParamLocation::Uri));
    }

    #[test]
    fn test_unknown_location_is_config_error() {
        let err = DescriptionFormat::Json
            .parse(r#"{"operations": {"Upload": {"parameters": {"file": {"location": "multipart"}}}}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("multipart"));
    }

    #[test]
    fn test_load_description_from_file() {
        let mut file = Builder::new().suffix(".yml").tempfile().unwrap();
        file.write_all(YAML_DESCRIPTION.as_bytes()).unwrap();

        let description = load_description(file.path()).unwrap();
        assert!(description.operation("FindPosts").is_some());
    }
}
