//! Infrastructure layer: configuration, file locations, store clients and
//! the fallback cache.

pub mod config_service;
pub mod history_cache;
pub mod memory_store;
pub mod paths;
pub mod postgrest_store;
pub mod storage;

pub use config_service::ConfigService;
pub use history_cache::{JsonFileHistoryCache, MemoryHistoryCache};
pub use memory_store::InMemoryTableStore;
pub use paths::DevaiPaths;
pub use postgrest_store::PostgrestStore;
