//! Transport configuration and the hook points around it.
//!
//! A service's `config` block is turned into a [`TransportConfig`], which
//! seeds a [`TransportPipeline`]. Registered [`ClientHook`]s get one chance
//! to mutate the pipeline before the HTTP client is built; the
//! [`RequestInterceptor`]s they install run on every outbound request.

use crate::domain::model::{Operation, ServiceDescription};
use crate::utils::error::{ManagerError, Result};
use crate::utils::validation::{validate_range, validate_url};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::RequestBuilder;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const MAX_TIMEOUT_SECONDS: f64 = 3600.0;

/// Typed view of the keys of a service `config` block this crate understands.
/// Unknown keys are left alone.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub base_url: Url,
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub headers: Vec<(String, String)>,
    pub user_agent: Option<String>,
    /// Whether non-2xx responses are turned into errors.
    pub http_errors: bool,
}

impl TransportConfig {
    /// `base_uri` from the config block wins over the definition's `base_url`,
    /// which wins over the description document's `baseUrl`.
    pub fn from_service(service: &ServiceDescription, fallback_base_url: Option<&str>) -> Result<Self> {
        let config = &service.config;
        let base_url = config
            .get("base_uri")
            .and_then(Value::as_str)
            .or(service.base_url.as_deref())
            .or(fallback_base_url)
            .ok_or_else(|| ManagerError::MissingDefinitionField {
                service: service.id.clone(),
                field: "config.base_uri".to_string(),
            })?;
        let base_url = validate_url(&format!("{}.config.base_uri", service.id), base_url)?;

        let request_options = config
            .get("command.params")
            .and_then(|params| params.get("command.request_options"))
            .and_then(Value::as_object);

        let timeout = seconds(&service.id, "timeout", config, request_options)?;
        let connect_timeout = seconds(&service.id, "connect_timeout", config, request_options)?;

        let headers = match config.get("headers") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(name, value)| {
                    let value = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (name.clone(), value)
                })
                .collect(),
            Some(other) => {
                return Err(ManagerError::InvalidConfigValueError {
                    field: format!("{}.config.headers", service.id),
                    value: other.to_string(),
                    reason: "headers must be a mapping".to_string(),
                })
            }
        };

        let user_agent = config
            .get("user_agent")
            .and_then(Value::as_str)
            .map(str::to_string);

        let http_errors = config
            .get("http_errors")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        Ok(Self {
            base_url,
            timeout,
            connect_timeout,
            headers,
            user_agent,
            http_errors,
        })
    }
}

fn seconds(
    service_id: &str,
    key: &str,
    config: &Map<String, Value>,
    request_options: Option<&Map<String, Value>>,
) -> Result<Option<Duration>> {
    let value = config
        .get(key)
        .or_else(|| request_options.and_then(|options| options.get(key)));

    let Some(value) = value else {
        return Ok(None);
    };
    let field = format!("{}.config.{}", service_id, key);
    let secs = value
        .as_f64()
        .ok_or_else(|| ManagerError::InvalidConfigValueError {
            field: field.clone(),
            value: value.to_string(),
            reason: "expected a number of seconds".to_string(),
        })?;
    validate_range(&field, secs, 0.0, MAX_TIMEOUT_SECONDS)?;

    // zero means "wait forever"
    if secs == 0.0 {
        Ok(None)
    } else {
        Ok(Some(Duration::from_secs_f64(secs)))
    }
}

/// What an interceptor knows about the request it is handed.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub service_id: &'a str,
    pub operation: &'a Operation,
}

pub trait RequestInterceptor: Send + Sync {
    fn intercept(&self, context: &RequestContext<'_>, request: RequestBuilder)
        -> Result<RequestBuilder>;
}

impl<F> RequestInterceptor for F
where
    F: Fn(&RequestContext<'_>, RequestBuilder) -> Result<RequestBuilder> + Send + Sync,
{
    fn intercept(
        &self,
        context: &RequestContext<'_>,
        request: RequestBuilder,
    ) -> Result<RequestBuilder> {
        self(context, request)
    }
}

/// Observer notified once per client construction, before first use.
pub trait ClientHook: Send + Sync {
    fn on_client_build(&self, service_id: &str, pipeline: &mut TransportPipeline) -> Result<()>;
}

impl<F> ClientHook for F
where
    F: Fn(&str, &mut TransportPipeline) -> Result<()> + Send + Sync,
{
    fn on_client_build(&self, service_id: &str, pipeline: &mut TransportPipeline) -> Result<()> {
        self(service_id, pipeline)
    }
}

/// Mutable outbound pipeline of one service client.
#[derive(Clone, Default)]
pub struct TransportPipeline {
    pub default_headers: HeaderMap,
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub user_agent: Option<String>,
    interceptors: Vec<Arc<dyn RequestInterceptor>>,
}

impl TransportPipeline {
    pub fn from_config(config: &TransportConfig) -> Result<Self> {
        let mut pipeline = Self {
            timeout: config.timeout,
            connect_timeout: config.connect_timeout,
            user_agent: config.user_agent.clone(),
            ..Self::default()
        };
        for (name, value) in &config.headers {
            pipeline.insert_header(name, value)?;
        }
        Ok(pipeline)
    }

    pub fn insert_header(&mut self, name: &str, value: &str) -> Result<()> {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            ManagerError::InvalidConfigValueError {
                field: "headers".to_string(),
                value: name.to_string(),
                reason: e.to_string(),
            }
        })?;
        let header_value =
            HeaderValue::from_str(value).map_err(|e| ManagerError::InvalidConfigValueError {
                field: format!("headers.{}", name),
                value: value.to_string(),
                reason: e.to_string(),
            })?;
        self.default_headers.insert(header_name, header_value);
        Ok(())
    }

    pub fn push_interceptor(&mut self, interceptor: impl RequestInterceptor + 'static) {
        self.interceptors.push(Arc::new(interceptor));
    }

    pub fn interceptors(&self) -> &[Arc<dyn RequestInterceptor>] {
        &self.interceptors
    }

    pub fn build_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().default_headers(self.default_headers.clone());
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        builder
            .build()
            .map_err(|e| ManagerError::config(format!("Unable to build HTTP client: {}", e)))
    }

    pub(crate) fn apply(
        &self,
        context: &RequestContext<'_>,
        mut request: RequestBuilder,
    ) -> Result<RequestBuilder> {
        for interceptor in &self.interceptors {
            request = interceptor.intercept(context, request)?;
        }
        Ok(request)
    }
}

impl std::fmt::Debug for TransportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportPipeline")
            .field("default_headers", &self.default_headers)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("user_agent", &self.user_agent)
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}
