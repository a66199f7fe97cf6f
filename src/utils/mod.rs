pub mod error;
pub mod logger;
pub mod merge;
pub mod validation;
