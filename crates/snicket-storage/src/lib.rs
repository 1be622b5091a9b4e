//! Storage backends for the Snicket URL shortener.
//!
//! Two interchangeable implementations of the [`snicket_core::Store`]
//! contract: [`MemoryStore`] keeps everything in process memory behind a
//! read-write lock, [`RedisStore`] delegates persistence and expiry to a
//! Redis server.

pub mod memory;
pub mod redis;

pub use memory::MemoryStore;
pub use self::redis::RedisStore;
