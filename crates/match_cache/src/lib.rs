//! Cache vrstva pro feedy: TTL, bypass, invalidace, single-flight.

pub mod cache;
pub mod error;
pub mod sqlite;
pub mod store;

pub use cache::{cache_key, Cache, CacheStatus, Clock, ManualClock, SystemClock, DEFAULT_TTL};
pub use error::{CacheError, Result};
pub use sqlite::SqliteStore;
pub use store::{CacheEntry, CacheStore, MemoryStore};
