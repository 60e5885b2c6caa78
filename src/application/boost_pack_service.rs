//! BoostPackService - purchase, consumption and status of boost packs.

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::membership::{BoostPack, BoostPackConfig, BoostPackType, MembershipError};
use crate::ports::MembershipStore;

/// Result of a completed purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseResult {
    pub pack_type: BoostPackType,
    pub videos_added: i64,
    /// Balance after the purchase.
    pub total_videos: i64,
    pub expires_at: Option<Timestamp>,
    /// False when the purchase stacked onto a valid pack.
    pub new_purchase: bool,
    pub message: String,
}

/// Boost pack position for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoostStatus {
    pub has_pack: bool,
    pub videos_remaining: i64,
    pub expires_at: Option<Timestamp>,
    pub days_remaining: i64,
    pub last_purchase_at: Option<Timestamp>,
}

impl From<&BoostPack> for BoostStatus {
    fn from(pack: &BoostPack) -> Self {
        if pack.is_valid() {
            Self {
                has_pack: true,
                videos_remaining: pack.videos_remaining,
                expires_at: pack.expires_at,
                days_remaining: pack.days_until_expiry(),
                last_purchase_at: pack.last_purchase_at,
            }
        } else {
            Self {
                has_pack: false,
                videos_remaining: 0,
                expires_at: None,
                days_remaining: 0,
                last_purchase_at: pack.last_purchase_at,
            }
        }
    }
}

#[derive(Clone)]
pub struct BoostPackService {
    store: Arc<dyn MembershipStore>,
}

impl BoostPackService {
    pub fn new(store: Arc<dyn MembershipStore>) -> Self {
        Self { store }
    }

    /// Purchase a pack, stacking onto a valid one.
    ///
    /// Read-modify-write: two concurrent purchases for the same user can
    /// lose one of the additions.
    pub async fn purchase(
        &self,
        user_id: &UserId,
        pack_type: BoostPackType,
    ) -> Result<PurchaseResult, MembershipError> {
        let config = pack_type.config();
        let current = self.store.get_boost_pack(user_id).await?;
        let (pack, fresh) = current.apply_purchase(config, Timestamp::now());

        self.store.save_boost_pack(&pack).await?;

        info!(
            user_id = %user_id,
            pack_type = %pack_type,
            videos_added = config.videos,
            total_videos = pack.videos_remaining,
            new_purchase = fresh,
            "Boost pack purchased"
        );

        let message = if fresh {
            format!("{} activated with {} videos", config.name, config.videos)
        } else {
            format!(
                "{} added {} videos, {} available",
                config.name, config.videos, pack.videos_remaining
            )
        };

        Ok(PurchaseResult {
            pack_type,
            videos_added: config.videos,
            total_videos: pack.videos_remaining,
            expires_at: pack.expires_at,
            new_purchase: fresh,
            message,
        })
    }

    /// Take one video from the pack.
    ///
    /// # Errors
    ///
    /// `InvalidPack` when the pack is empty or expired.
    pub async fn consume(&self, user_id: &UserId) -> Result<BoostPack, MembershipError> {
        self.store.decr_boost_pack(user_id).await
    }

    pub async fn status(&self, user_id: &UserId) -> Result<BoostStatus, MembershipError> {
        let pack = self.store.get_boost_pack(user_id).await?;
        Ok(BoostStatus::from(&pack))
    }

    pub async fn has_valid_pack(&self, user_id: &UserId) -> Result<bool, MembershipError> {
        Ok(self.store.get_boost_pack(user_id).await?.is_valid())
    }

    pub async fn get_available_videos(&self, user_id: &UserId) -> Result<i64, MembershipError> {
        Ok(self.store.get_boost_pack(user_id).await?.available_videos())
    }

    pub fn catalog(&self) -> &'static [BoostPackConfig] {
        BoostPackConfig::all()
    }
}
