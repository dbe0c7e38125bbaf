use anyhow::Result;
use async_trait::async_trait;
use catalog::model::{ChannelId, Post, PostContent, PostId, UserId};
use chrono::{DateTime, Utc};

use crate::model::{Deal, DealId, DealStatus, NewDeal};

#[async_trait]
pub trait DealRepository: Send + Sync {
    async fn get_by_id(&self, deal_id: &DealId) -> Result<Option<Deal>>;

    /// Newest first, plus the total number of matching deals.
    async fn list_by_advertiser(
        &self,
        advertiser_id: &UserId,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<Deal>, u64)>;

    /// Newest first, plus the total number of matching deals.
    async fn list_by_channel(
        &self,
        channel_id: &ChannelId,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<Deal>, u64)>;

    /// Moves the deal to `next` only while it is still in `expected`, and
    /// overwrites its publisher note. Returns false when no row matched.
    async fn transition_status(
        &self,
        deal_id: &DealId,
        expected: DealStatus,
        next: DealStatus,
        note: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool>;
}

/// Opens atomic units of work. Multi-row writes go through here.
#[async_trait]
pub trait TransactionRunner: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn DealTransaction>>;
}

/// One open transaction. Dropping it without [`DealTransaction::commit`]
/// rolls back every write made through it.
#[async_trait]
pub trait DealTransaction: Send {
    async fn insert_deal(&mut self, new: &NewDeal) -> Result<Deal>;

    /// Copies a template (every fragment of its media group) into ad
    /// version 1 of `deal_id`.
    async fn copy_as_first_ad_version(
        &mut self,
        template_id: &PostId,
        deal_id: &DealId,
    ) -> Result<Vec<Post>>;

    /// Highest ad version for the deal, 0 if it has none.
    async fn latest_ad_version(&mut self, deal_id: &DealId) -> Result<u32>;

    async fn append_ad_version(
        &mut self,
        deal_id: &DealId,
        version: u32,
        content: &[PostContent],
    ) -> Result<Vec<Post>>;

    /// Same contract as [`DealRepository::transition_status`], inside this
    /// transaction.
    async fn transition_status(
        &mut self,
        deal_id: &DealId,
        expected: DealStatus,
        next: DealStatus,
        note: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
