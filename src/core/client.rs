use crate::core::transport::{RequestContext, TransportConfig, TransportPipeline};
use crate::domain::model::{ApiDescription, CommandResult, Operation, ParamLocation, ServiceDescription};
use crate::utils::error::{ManagerError, Result};
use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use url::Url;

/// HTTP client bound to one service api and its operation description.
pub struct ServiceClient {
    service: ServiceDescription,
    description: ApiDescription,
    transport: TransportConfig,
    pipeline: TransportPipeline,
    client: Client,
}

/// Parameter values sorted by where they go in the request.
#[derive(Debug, Default)]
struct RequestParts {
    uri: BTreeMap<String, String>,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    json: Map<String, Value>,
    form: Vec<(String, String)>,
    body: Option<String>,
}

impl ServiceClient {
    pub(crate) fn new(
        service: ServiceDescription,
        description: ApiDescription,
        transport: TransportConfig,
        pipeline: TransportPipeline,
    ) -> Result<Self> {
        let client = pipeline.build_client()?;
        Ok(Self {
            service,
            description,
            transport,
            pipeline,
            client,
        })
    }

    pub fn service_id(&self) -> &str {
        &self.service.id
    }

    pub fn service(&self) -> &ServiceDescription {
        &self.service
    }

    pub fn base_url(&self) -> &Url {
        &self.transport.base_url
    }

    pub fn pipeline(&self) -> &TransportPipeline {
        &self.pipeline
    }

    pub fn operations(&self) -> &BTreeMap<String, Operation> {
        &self.description.operations
    }

    pub fn operation(&self, name: &str) -> Result<&Operation> {
        self.description
            .operation(name)
            .ok_or_else(|| ManagerError::OperationNotFound {
                service: self.service.id.clone(),
                operation: name.to_string(),
            })
    }

    /// Starts building a call to `operation`.
    pub fn command(&self, operation: &str) -> CommandBuilder<'_> {
        CommandBuilder {
            client: self,
            operation: operation.to_string(),
            params: Map::new(),
        }
    }

    /// Calls `operation` with any serialisable argument object; `null`
    /// (e.g. `()` or `None`) means no arguments.
    pub async fn call_with<P: Serialize>(&self, operation: &str, params: P) -> Result<CommandResult> {
        let params = match serde_json::to_value(params)? {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(ManagerError::InvalidParameter {
                    operation: operation.to_string(),
                    parameter: "*".to_string(),
                    reason: format!("arguments must be an object, got {}", other),
                })
            }
        };
        self.call(operation, params).await
    }

    /// Validates `params` against the declared operation and executes it.
    pub async fn call(&self, operation: &str, params: Map<String, Value>) -> Result<CommandResult> {
        let op = self.operation(operation)?;
        let parts = self.prepare(op, params)?;

        let method = Method::from_bytes(op.http_method.as_bytes()).map_err(|_| {
            ManagerError::config(format!(
                "Invalid httpMethod \"{}\" for operation \"{}\"",
                op.http_method, op.name
            ))
        })?;
        let url = self.resolve_url(op, &parts.uri)?;

        tracing::debug!("{} {} ({}.{})", method, url, self.service.id, op.name);

        let mut request = self.client.request(method.clone(), url.clone());
        if !parts.query.is_empty() {
            request = request.query(&parts.query);
        }
        for (name, value) in &parts.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if !parts.json.is_empty() {
            request = request.json(&parts.json);
        } else if !parts.form.is_empty() {
            request = request.form(&parts.form);
        } else if let Some(body) = parts.body {
            request = request.body(body);
        }

        let context = RequestContext {
            service_id: &self.service.id,
            operation: op,
        };
        let request = self.pipeline.apply(&context, request)?;

        let response = request
            .send()
            .await
            .map_err(|e| self.request_failed(op, None, e.to_string(), Some(e)))?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect::<BTreeMap<_, _>>();
        let text = response
            .text()
            .await
            .map_err(|e| self.request_failed(op, Some(status.as_u16()), e.to_string(), Some(e)))?;

        tracing::info!(
            "{} {} -> {} ({}.{})",
            method,
            url,
            status.as_u16(),
            self.service.id,
            op.name
        );

        if !status.is_success() && self.transport.http_errors {
            let reason = status.canonical_reason().unwrap_or("Unexpected status");
            let message = if text.is_empty() {
                format!("{} {}", status.as_u16(), reason)
            } else {
                format!("{} {}: {}", status.as_u16(), reason, truncate(&text, 512))
            };
            return Err(self.request_failed(op, Some(status.as_u16()), message, None));
        }

        Ok(CommandResult {
            status: status.as_u16(),
            headers,
            body: decode_body(text),
        })
    }

    fn prepare(&self, op: &Operation, mut params: Map<String, Value>) -> Result<RequestParts> {
        let mut parts = RequestParts::default();
        let fallback = default_location(&op.http_method);

        for param in &op.parameters {
            let value = match params.remove(&param.name) {
                Some(Value::Null) | None => param.default.clone(),
                Some(value) => Some(value),
            };
            let Some(value) = value else {
                if param.required {
                    return Err(ManagerError::missing_parameter(&op.name, &param.name));
                }
                continue;
            };
            place(
                &mut parts,
                param.location.unwrap_or(fallback),
                param.wire_name(),
                value,
            );
        }

        // undeclared arguments travel as-is, next to the declared body if any
        let extras = extras_location(op, fallback);
        for (name, value) in params {
            if !value.is_null() {
                place(&mut parts, extras, &name, value);
            }
        }

        let kinds = [
            (!parts.json.is_empty(), "json"),
            (!parts.form.is_empty(), "formParam"),
            (parts.body.is_some(), "body"),
        ];
        let sent: Vec<&str> = kinds.iter().filter(|(used, _)| *used).map(|(_, kind)| *kind).collect();
        if sent.len() > 1 {
            return Err(ManagerError::config(format!(
                "Operation \"{}\" would send more than one request body ({})",
                op.name,
                sent.join(", ")
            )));
        }

        Ok(parts)
    }

    fn resolve_url(&self, op: &Operation, uri_params: &BTreeMap<String, String>) -> Result<Url> {
        let mut uri = op.uri.clone();
        for (name, value) in uri_params {
            uri = uri.replace(&format!("{{{}}}", name), &encode_segment(value));
        }
        if let (Some(start), Some(end)) = (uri.find('{'), uri.rfind('}')) {
            if start < end {
                return Err(ManagerError::InvalidParameter {
                    operation: op.name.clone(),
                    parameter: uri[start + 1..end].to_string(),
                    reason: format!("unresolved placeholder in uri \"{}\"", op.uri),
                });
            }
        }

        self.transport.base_url.join(&uri).map_err(|e| {
            ManagerError::config(format!(
                "Invalid uri \"{}\" for operation \"{}\": {}",
                uri, op.name, e
            ))
        })
    }

    fn request_failed(
        &self,
        op: &Operation,
        status: Option<u16>,
        message: String,
        source: Option<reqwest::Error>,
    ) -> ManagerError {
        tracing::warn!(
            "Request {}.{} failed: {}",
            self.service.id,
            op.name,
            message
        );
        ManagerError::RequestFailed {
            service: self.service.id.clone(),
            operation: op.name.clone(),
            status,
            message,
            source,
        }
    }
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("service", &self.service.id)
            .field("base_url", &self.transport.base_url.as_str())
            .field("operations", &self.description.operations.len())
            .finish()
    }
}

/// Fluent argument collection for [`ServiceClient::command`].
pub struct CommandBuilder<'a> {
    client: &'a ServiceClient,
    operation: String,
    params: Map<String, Value>,
}

impl CommandBuilder<'_> {
    pub fn arg(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    pub fn args(mut self, params: Map<String, Value>) -> Self {
        self.params.extend(params);
        self
    }

    pub async fn send(self) -> Result<CommandResult> {
        self.client.call(&self.operation, self.params).await
    }
}

fn default_location(http_method: &str) -> ParamLocation {
    match http_method {
        "GET" | "HEAD" | "DELETE" | "OPTIONS" => ParamLocation::Query,
        _ => ParamLocation::Json,
    }
}

/// Where undeclared arguments go. A declared form body absorbs them; a
/// declared raw body cannot, so they move to the query string.
fn extras_location(op: &Operation, fallback: ParamLocation) -> ParamLocation {
    let declares = |location: ParamLocation| {
        op.parameters
            .iter()
            .any(|param| param.location == Some(location))
    };
    if declares(ParamLocation::FormParam) {
        ParamLocation::FormParam
    } else if declares(ParamLocation::Body) && fallback == ParamLocation::Json {
        ParamLocation::Query
    } else {
        fallback
    }
}

fn place(parts: &mut RequestParts, location: ParamLocation, name: &str, value: Value) {
    match location {
        ParamLocation::Uri => {
            parts.uri.insert(name.to_string(), scalar_text(&value));
        }
        ParamLocation::Query => match value {
            Value::Array(items) => {
                for item in items {
                    parts.query.push((name.to_string(), scalar_text(&item)));
                }
            }
            other => parts.query.push((name.to_string(), scalar_text(&other))),
        },
        ParamLocation::Header => parts.headers.push((name.to_string(), scalar_text(&value))),
        ParamLocation::Json => {
            parts.json.insert(name.to_string(), value);
        }
        ParamLocation::FormParam => parts.form.push((name.to_string(), scalar_text(&value))),
        ParamLocation::Body => parts.body = Some(scalar_text(&value)),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn encode_segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn decode_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loader::DescriptionFormat;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::path::PathBuf;

    const DESCRIPTION: &str = r#"
operations:
  FindPosts:
    httpMethod: GET
    uri: /posts
    parameters:
      userId:
        type: integer
        location: query
      ids:
        type: array
        location: query
  FindPost:
    httpMethod: GET
    uri: /posts/{postId}
    parameters:
      postId:
        type: integer
        location: uri
        required: true
  CreatePost:
    httpMethod: POST
    uri: /posts
    parameters:
      title:
        type: string
        location: json
        required: true
      userId:
        type: integer
        sentAs: user_id
        default: 1
      X-Trace:
        type: string
        location: header
  Login:
    httpMethod: POST
    uri: /login
    parameters:
      username:
        location: formParam
        required: true
  SaveNote:
    httpMethod: PUT
    uri: /notes
    parameters:
      note:
        location: body
      title:
        location: json
"#;

    fn client(base_url: &str, config: Value) -> ServiceClient {
        let mut config = config.as_object().cloned().unwrap_or_default();
        config.insert("base_uri".to_string(), json!(base_url));
        let service = ServiceDescription {
            id: "jsonplaceholder".to_string(),
            title: "JSON Placeholder".to_string(),
            api_path: "api/jsonplaceholder.yml".to_string(),
            source: PathBuf::from("api/jsonplaceholder.yml"),
            base_url: None,
            provider: "example".to_string(),
            config,
        };
        let transport = TransportConfig::from_service(&service, None).unwrap();
        let pipeline = TransportPipeline::from_config(&transport).unwrap();
        let description = DescriptionFormat::Yaml.parse(DESCRIPTION).unwrap();
        ServiceClient::new(service, description, transport, pipeline).unwrap()
    }

    #[tokio::test]
    async fn test_missing_required_parameter_fails_before_network() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/posts");
            then.status(201);
        });

        let client = client(&server.base_url(), json!({}));
        let err = client.call("CreatePost", Map::new()).await.unwrap_err();

        match err {
            ManagerError::InvalidParameter { parameter, .. } => assert_eq!(parameter, "title"),
            other => panic!("unexpected error: {other}"),
        }
        mock.assert_hits(0);
    }

    #[tokio::test]
    async fn test_uri_parameter_substitution() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/posts/7");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!({"id": 7, "title": "seven"}));
        });

        let client = client(&server.base_url(), json!({}));
        let result = client.command("FindPost").arg("postId", 7).send().await.unwrap();

        mock.assert();
        assert_eq!(result.status, 200);
        assert_eq!(result.get("title"), Some(&json!("seven")));
    }

    #[tokio::test]
    async fn test_query_parameters_and_arrays() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/posts")
                .query_param("userId", "1")
                .query_param("ids", "3")
                .query_param("_limit", "5");
            then.status(200).json_body(json!([{"id": 3}]));
        });

        let client = client(&server.base_url(), json!({}));
        let result = client
            .call_with(
                "FindPosts",
                json!({"userId": 1, "ids": [3], "_limit": 5}),
            )
            .await
            .unwrap();

        mock.assert();
        assert_eq!(result.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_json_body_defaults_sent_as_and_headers() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/posts")
                .header("X-Trace", "abc")
                .json_body(json!({"title": "Hello", "user_id": 1}));
            then.status(201).json_body(json!({"id": 101}));
        });

        let client = client(&server.base_url(), json!({}));
        let result = client
            .command("CreatePost")
            .arg("title", "Hello")
            .arg("X-Trace", "abc")
            .send()
            .await
            .unwrap();

        mock.assert();
        assert_eq!(result.status, 201);
        assert_eq!(result.get("id"), Some(&json!(101)));
    }

    #[tokio::test]
    async fn test_form_parameters() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/login").body("username=ann");
            then.status(204);
        });

        let client = client(&server.base_url(), json!({}));
        let result = client.command("Login").arg("username", "ann").send().await.unwrap();

        mock.assert();
        assert_eq!(result.body, Value::Null);
    }

    #[tokio::test]
    async fn test_extra_argument_joins_declared_form_body() {
        let server = MockServer::start();
        let form = server.mock(|when, then| {
            when.method(POST)
                .path("/login")
                .header("content-type", "application/x-www-form-urlencoded")
                .body("username=ann&remember=1");
            then.status(204);
        });

        let client = client(&server.base_url(), json!({}));
        let result = client
            .command("Login")
            .arg("username", "ann")
            .arg("remember", "1")
            .send()
            .await
            .unwrap();

        form.assert_hits(1);
        assert_eq!(result.status, 204);
    }

    #[tokio::test]
    async fn test_extra_argument_beside_raw_body_goes_to_query() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/notes")
                .query_param("draft", "true")
                .body("remember the milk");
            then.status(200);
        });

        let client = client(&server.base_url(), json!({}));
        client
            .command("SaveNote")
            .arg("note", "remember the milk")
            .arg("draft", true)
            .send()
            .await
            .unwrap();

        mock.assert();
    }

    #[tokio::test]
    async fn test_two_body_kinds_are_rejected() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.path("/notes");
            then.status(200);
        });

        let client = client(&server.base_url(), json!({}));
        let err = client
            .command("SaveNote")
            .arg("note", "text")
            .arg("title", "Groceries")
            .send()
            .await
            .unwrap_err();

        assert!(matches!(err, ManagerError::ConfigError { .. }));
        assert!(err.to_string().contains("body"));
        mock.assert_hits(0);
    }

    #[tokio::test]
    async fn test_non_success_status_is_request_failed() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/posts/9");
            then.status(404).body("not here");
        });

        let client = client(&server.base_url(), json!({}));
        let err = client.command("FindPost").arg("postId", 9).send().await.unwrap_err();

        assert!(matches!(err, ManagerError::RequestFailed { .. }));
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_http_errors_disabled_returns_result() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/posts/9");
            then.status(404).body("not here");
        });

        let client = client(&server.base_url(), json!({"http_errors": false}));
        let result = client.command("FindPost").arg("postId", 9).send().await.unwrap();

        assert!(!result.is_success());
        assert_eq!(result.body, json!("not here"));
    }

    #[tokio::test]
    async fn test_transport_failure_carries_source() {
        // nothing listens on port 9 of localhost
        let client = client("http://127.0.0.1:9", json!({"connect_timeout": 1}));
        let err = client.command("FindPost").arg("postId", 1).send().await.unwrap_err();

        match err {
            ManagerError::RequestFailed { status, source, .. } => {
                assert!(status.is_none());
                assert!(source.is_some());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_operation() {
        let client = client("http://127.0.0.1:9", json!({}));
        assert!(matches!(
            client.call("DeleteEverything", Map::new()).await,
            Err(ManagerError::OperationNotFound { .. })
        ));
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("a b/c"), "a%20b%2Fc");
    }
}
