use std::fmt;
use std::str::FromStr;

use catalog::model::{ChannelId, FormatTerms, Post, PostId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type DealId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    /// Awaiting the advertiser's payment to the escrow wallet.
    PendingPayment,
    /// Payment never arrived or failed on-chain.
    HoldFailed,
    /// Paid; the publisher must review the creative.
    PendingReview,
    /// Publisher asked for edits; the advertiser must revise.
    ChangesRequested,
    /// Publisher approved; the post is scheduled and can no longer be cancelled.
    Approved,
    Rejected,
    Cancelled,
    /// Published; verification window is open.
    Posted,
    Completed,
    /// Post was removed or altered during verification.
    Dispute,
}

impl DealStatus {
    pub const ALL: [DealStatus; 10] = [
        DealStatus::PendingPayment,
        DealStatus::HoldFailed,
        DealStatus::PendingReview,
        DealStatus::ChangesRequested,
        DealStatus::Approved,
        DealStatus::Rejected,
        DealStatus::Cancelled,
        DealStatus::Posted,
        DealStatus::Completed,
        DealStatus::Dispute,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DealStatus::PendingPayment => "pending_payment",
            DealStatus::HoldFailed => "hold_failed",
            DealStatus::PendingReview => "pending_review",
            DealStatus::ChangesRequested => "changes_requested",
            DealStatus::Approved => "approved",
            DealStatus::Rejected => "rejected",
            DealStatus::Cancelled => "cancelled",
            DealStatus::Posted => "posted",
            DealStatus::Completed => "completed",
            DealStatus::Dispute => "dispute",
        }
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DealStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DealStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Invalid DealStatus value: {}", s))
    }
}

/// A priced offer as submitted by the advertiser. Must match a catalog
/// entry exactly, price included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatOffer {
    pub terms: FormatTerms,
    pub price_nano_ton: i64,
}

/// One advertising transaction. Terms, price and wallet addresses are
/// frozen at creation; only `status` and `publisher_note` change here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,
    pub channel_id: ChannelId,
    pub advertiser_id: UserId,
    pub status: DealStatus,
    pub scheduled_at: DateTime<Utc>,
    pub publisher_note: Option<String>,

    // Wallet snapshots taken at creation
    pub escrow_wallet_address: Option<String>,
    pub advertiser_wallet_address: Option<String>,
    pub payout_wallet_address: Option<String>,

    // Frozen catalog terms
    pub terms: FormatTerms,
    pub price_nano_ton: i64,

    // Written by the payment and posting subsystems
    pub posted_message_ids: Vec<i64>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_tx_hash: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub release_tx_hash: Option<String>,
    pub refund_tx_hash: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deal {
    pub fn is_advertiser(&self, user_id: &UserId) -> bool {
        self.advertiser_id == *user_id
    }
}

/// Insert payload for a deal. There is no status field: every deal starts
/// in [`DealStatus::PendingPayment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeal {
    pub id: DealId,
    pub channel_id: ChannelId,
    pub advertiser_id: UserId,
    pub scheduled_at: DateTime<Utc>,
    pub escrow_wallet_address: Option<String>,
    pub advertiser_wallet_address: Option<String>,
    pub payout_wallet_address: Option<String>,
    pub terms: FormatTerms,
    pub price_nano_ton: i64,
    pub created_at: DateTime<Utc>,
}

impl NewDeal {
    pub fn into_deal(self) -> Deal {
        Deal {
            id: self.id,
            channel_id: self.channel_id,
            advertiser_id: self.advertiser_id,
            status: DealStatus::PendingPayment,
            scheduled_at: self.scheduled_at,
            publisher_note: None,
            escrow_wallet_address: self.escrow_wallet_address,
            advertiser_wallet_address: self.advertiser_wallet_address,
            payout_wallet_address: self.payout_wallet_address,
            terms: self.terms,
            price_nano_ton: self.price_nano_ton,
            posted_message_ids: Vec::new(),
            paid_at: None,
            payment_tx_hash: None,
            posted_at: None,
            release_tx_hash: None,
            refund_tx_hash: None,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDealRequest {
    pub channel_external_id: i64,
    pub format: FormatOffer,
    pub template_post_id: PostId,
    pub scheduled_at: DateTime<Utc>,
}

/// A freshly created deal with its version-1 creative.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedDeal {
    pub deal: Deal,
    pub ad: Vec<Post>,
}

/// A deal as shown to one of its parties.
#[derive(Debug, Clone, PartialEq)]
pub struct DealView {
    pub deal: Deal,
    /// Fragments of the latest ad version.
    pub ad: Vec<Post>,
    pub channel_external_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealListItem {
    pub deal: Deal,
    pub channel_external_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealPage {
    pub items: Vec<DealListItem>,
    /// Matching deals across all pages.
    pub total: u64,
}

/// Result of a successful revision.
#[derive(Debug, Clone, PartialEq)]
pub struct AdRevision {
    pub version: u32,
    pub ad: Vec<Post>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub offset: u64,
}

impl PageRequest {
    pub fn new(limit: u32, offset: u64) -> Self {
        Self { limit, offset }
    }

    /// 1-based page numbers; page 0 is treated as page 1.
    pub fn page(page: u32, page_size: u32) -> Self {
        let page = page.max(1);
        Self {
            limit: page_size,
            offset: u64::from(page - 1) * u64::from(page_size),
        }
    }
}
