pub mod client;
pub mod coercion;
pub mod dispatcher;
pub mod factory;
pub mod loader;
pub mod registry;
pub mod saved_request;
pub mod transport;

pub use crate::domain::ports::{OverrideProvider, SavedRequestStore, ServiceProvider, Storage};
pub use crate::utils::error::Result;
