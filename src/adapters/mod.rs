// Adapters layer: concrete implementations for external systems (definition files, storage).

pub mod provider;
pub mod request_store;
pub mod storage;
