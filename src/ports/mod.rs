//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Storage Ports
//!
//! - `MembershipStore` - Memberships, daily usage counters and boost packs

mod membership_store;

pub use membership_store::MembershipStore;
