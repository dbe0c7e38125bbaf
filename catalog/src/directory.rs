use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{AdFormat, Channel, ChannelId, ChannelRole, Post, PostId, User, UserId};

/// Read access to channels, their staff and their ad catalog.
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    async fn get_by_external_id(&self, external_id: i64) -> Result<Option<Channel>>;

    async fn get_by_id(&self, channel_id: &ChannelId) -> Result<Option<Channel>>;

    async fn get_role(
        &self,
        channel_id: &ChannelId,
        user_id: &UserId,
    ) -> Result<Option<ChannelRole>>;

    async fn get_ad_formats(&self, channel_id: &ChannelId) -> Result<Vec<AdFormat>>;

    /// Wallet of the channel owner, if the owner has registered one.
    async fn get_payout_wallet_address(&self, channel_id: &ChannelId) -> Result<Option<String>>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_by_id(&self, user_id: &UserId) -> Result<Option<User>>;
}

/// Read access to templates and ad versions. Ad versions are written only
/// inside a deal transaction.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn get_by_id(&self, post_id: &PostId) -> Result<Option<Post>>;

    /// Fragments of the highest ad version for `deal_id`, oldest first.
    /// Empty when the deal has no ad yet.
    async fn get_latest_ad_version(&self, deal_id: &Uuid) -> Result<Vec<Post>>;

    /// Every ad version for `deal_id`, keyed by version number.
    async fn get_ad_versions(&self, deal_id: &Uuid) -> Result<BTreeMap<u32, Vec<Post>>>;
}
