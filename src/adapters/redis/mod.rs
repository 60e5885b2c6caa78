//! Redis adapters - the ephemeral cache store.

mod membership_store;

pub use membership_store::{connect, CacheSettings, RedisMembershipStore};
