pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::Settings;

pub use adapters::{provider::DirectoryProvider, request_store::FileRequestStore, storage::LocalStorage};
pub use core::{
    client::ServiceClient, dispatcher::Dispatcher, factory::ClientFactory, registry::ServiceRegistry,
    transport::TransportPipeline,
};
pub use domain::model::{ApiDescription, CommandResult, Operation, Parameter, SavedRequest, ServiceDescription};
pub use utils::error::{ManagerError, Result};
