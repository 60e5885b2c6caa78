//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `memory` - In-process store for tests and single-node use
//! - `postgres` - Durable store (authoritative)
//! - `redis` - Cache store (TTL-bounded mirror)
//! - `hybrid` - Durable store fronted by a cache store

pub mod hybrid;
pub mod memory;
pub mod postgres;
pub mod redis;

pub use self::hybrid::{HybridMembershipStore, HybridSettings};
pub use self::memory::InMemoryMembershipStore;
pub use self::postgres::PostgresMembershipStore;
pub use self::redis::{CacheSettings, RedisMembershipStore};
