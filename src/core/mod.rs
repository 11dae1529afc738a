// src/core/mod.rs
//! Backend access and persisted visitor state

pub mod service_client;
pub mod session_store;

pub use service_client::{ApiError, JobBoardApi, ServiceClient};
pub use session_store::{
    KeyValueStore, MemoryKeyValueStore, PersistedSession, SessionKey, SqliteKeyValueStore,
};
