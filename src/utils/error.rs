use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required parameter \"{field}\" in \"{service}\" service api definition")]
    MissingDefinitionField { service: String, field: String },

    #[error("Service api \"{id}\" from \"{provider}\" is already defined by \"{previous}\"")]
    DuplicateService {
        id: String,
        provider: String,
        previous: String,
    },

    #[error("Invalid HTTP Services Api source provided: \"{file}\". File extension must be one of {allowed}")]
    UnsupportedFormat { file: String, allowed: String },

    #[error("Invalid value for '{field}': '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Undefined Http Service Api id \"{id}\"")]
    ServiceNotFound { id: String },

    #[error("Operation \"{operation}\" is not defined by service api \"{service}\"")]
    OperationNotFound { service: String, operation: String },

    #[error("Saved request \"{id}\" does not exist")]
    SavedRequestNotFound { id: String },

    #[error("Invalid parameter \"{parameter}\" for operation \"{operation}\": {reason}")]
    InvalidParameter {
        operation: String,
        parameter: String,
        reason: String,
    },

    #[error("Request for \"{service}.{operation}\" failed: {message}")]
    RequestFailed {
        service: String,
        operation: String,
        status: Option<u16>,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    NotFound,
    InvalidParameter,
    RequestFailed,
    Io,
}

impl ManagerError {
    pub fn config(message: impl Into<String>) -> Self {
        ManagerError::ConfigError {
            message: message.into(),
        }
    }

    pub fn missing_parameter(operation: &str, parameter: &str) -> Self {
        ManagerError::InvalidParameter {
            operation: operation.to_string(),
            parameter: parameter.to_string(),
            reason: "required parameter is missing".to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ManagerError::IoError(_) => ErrorCategory::Io,
            ManagerError::SerializationError(_)
            | ManagerError::YamlError(_)
            | ManagerError::TomlError(_)
            | ManagerError::ConfigError { .. }
            | ManagerError::MissingDefinitionField { .. }
            | ManagerError::DuplicateService { .. }
            | ManagerError::UnsupportedFormat { .. }
            | ManagerError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            ManagerError::ServiceNotFound { .. }
            | ManagerError::OperationNotFound { .. }
            | ManagerError::SavedRequestNotFound { .. } => ErrorCategory::NotFound,
            ManagerError::InvalidParameter { .. } => ErrorCategory::InvalidParameter,
            ManagerError::RequestFailed { .. } => ErrorCategory::RequestFailed,
        }
    }

    /// HTTP status of a failed request, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ManagerError::RequestFailed { status, .. } => *status,
            _ => None,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the *.http_services_api files and the settings file for missing or malformed entries"
            }
            ErrorCategory::NotFound => {
                "List the available services and operations and check the requested name"
            }
            ErrorCategory::InvalidParameter => {
                "Supply every required parameter declared by the operation"
            }
            ErrorCategory::RequestFailed => {
                "Check the remote service availability and the transport config (base_uri, timeouts)"
            }
            ErrorCategory::Io => "Check that the referenced files exist and are readable",
        }
    }

    /// Process exit code used by the CLI.
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Configuration => 3,
            ErrorCategory::NotFound => 4,
            ErrorCategory::InvalidParameter => 2,
            ErrorCategory::RequestFailed => 1,
            ErrorCategory::Io => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, ManagerError>;
