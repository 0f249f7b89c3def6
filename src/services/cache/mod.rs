pub mod backend;
pub mod client;
pub mod facade;
pub mod keys;
pub mod memory;
pub mod ttl;
pub mod valkey;

pub use backend::CacheBackend;
pub use client::{CacheClient, CacheError, CacheResult, CacheResultExt};
pub use facade::Cache;
pub use memory::MemoryClient;
pub use ttl::ResourceClass;
pub use valkey::ValkeyClient;
