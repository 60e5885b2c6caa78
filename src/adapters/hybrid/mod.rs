//! Hybrid store adapter: durable store behind a cache store.

mod store;

pub use store::{HybridMembershipStore, HybridSettings};
