use crate::utils::error::{ManagerError, Result};
use crate::utils::validation::{validate_path, Validate};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Parser)]
#[command(name = "http-client-manager")]
#[command(about = "Discover service api definitions and execute their operations")]
pub struct CliConfig {
    #[arg(long, short, default_value = "http_client_manager.toml")]
    pub config: String,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List every discovered service api
    Services,
    /// List the operations a service api declares
    Operations { service: String },
    /// Execute one operation
    Call {
        service: String,
        operation: String,
        /// Parameter as `name=value`; repeat for several
        #[arg(long = "param", short = 'p')]
        params: Vec<String>,
    },
    /// Manage saved requests
    Saved {
        #[command(subcommand)]
        action: SavedAction,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum SavedAction {
    List,
    Show {
        id: String,
    },
    Run {
        id: String,
    },
    Save {
        id: String,
        #[arg(long)]
        label: String,
        service: String,
        operation: String,
        #[arg(long = "param", short = 'p')]
        params: Vec<String>,
    },
    Delete {
        id: String,
    },
}

/// Splits `name=value` pairs. A repeated name appends a new line to the
/// previous value, which is how array parameters are entered.
pub fn parse_params(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    let mut params: BTreeMap<String, String> = BTreeMap::new();
    for pair in pairs {
        let (name, value) = pair.split_once('=').ok_or_else(|| {
            ManagerError::InvalidConfigValueError {
                field: "param".to_string(),
                value: pair.clone(),
                reason: "Expected name=value".to_string(),
            }
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ManagerError::InvalidConfigValueError {
                field: "param".to_string(),
                value: pair.clone(),
                reason: "Parameter name is empty".to_string(),
            });
        }
        params
            .entry(name.to_string())
            .and_modify(|existing| {
                existing.push('\n');
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    Ok(params)
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("config", &self.config)?;
        match &self.command {
            Command::Call { params, .. } => parse_params(params).map(|_| ()),
            Command::Saved {
                action: SavedAction::Save { params, .. },
            } => parse_params(params).map(|_| ()),
            _ => Ok(()),
        }
    }
}
