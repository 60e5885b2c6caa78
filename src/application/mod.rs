//! Application layer - Services over the membership store.
//!
//! Each service holds the store port and answers one family of questions:
//! - `FeatureChecker` - feature, video and batch permission checks
//! - `QuotaService` - quota reporting and atomic consumption
//! - `BoostPackService` - pack purchase, consumption and status
//! - `AdminService` - operator overrides

mod admin_service;
mod boost_pack_service;
mod feature_checker;
mod quota_service;

pub use admin_service::AdminService;
pub use boost_pack_service::{BoostPackService, BoostStatus, PurchaseResult};
pub use feature_checker::{FeatureChecker, MembershipSummary};
pub use quota_service::{Consumption, QuotaInfo, QuotaService};
