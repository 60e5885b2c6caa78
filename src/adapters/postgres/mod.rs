//! PostgreSQL adapters - the durable, authoritative store.
//!
//! - `PostgresMembershipStore` - MembershipStore over the `users` table
//! - `create_pool` / `run_migrations` - connection setup

mod membership_store;
mod pool;

pub use membership_store::PostgresMembershipStore;
pub use pool::{create_pool, run_migrations};
