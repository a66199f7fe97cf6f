use crate::utils::error::{ManagerError, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directives used when `RUST_LOG` is unset. HTTP internals stay quiet
/// unless asked for explicitly.
fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "http_client_manager=debug,reqwest=info,hyper=warn,info"
    } else {
        "http_client_manager=info,reqwest=warn,hyper=warn,warn"
    }
}

fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)))
}

/// Human readable logs on stderr; stdout is reserved for command output.
pub fn init_cli_logger(verbose: bool) -> Result<()> {
    tracing_subscriber::registry()
        .with(filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(verbose)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .try_init()
        .map_err(|e| ManagerError::config(format!("Unable to install logger: {}", e)))
}

/// One JSON object per line on stderr.
pub fn init_json_logger() -> Result<()> {
    tracing_subscriber::registry()
        .with(filter(false))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(|e| ManagerError::config(format!("Unable to install logger: {}", e)))
}
