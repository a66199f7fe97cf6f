#[cfg(feature = "cli")]
pub mod cli;
pub mod settings;

#[cfg(feature = "cli")]
pub use cli::{CliConfig, Command, SavedAction};
pub use settings::{ProviderConfig, Settings};
