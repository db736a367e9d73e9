mod config;
mod error;
mod memory;
mod redis_store;
mod store;

pub use config::StoreConfig;
pub use error::{Result, StorageError};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use store::{Queue, ResultStore};
