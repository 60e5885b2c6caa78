//! In-memory store adapter.
//!
//! Used by tests and the `memory` backend. State is process-local and lost
//! on restart.

mod store;

pub use store::InMemoryMembershipStore;
