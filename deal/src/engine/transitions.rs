use catalog::model::PostContent;
use chrono::Utc;
use common::logger::record_actor;
use tracing::{field, info, instrument};

use super::{DealEngine, observe};
use crate::actor::{Actor, require_actor};
use crate::authz::{require_advertiser, require_channel_role};
use crate::error::{DealError, ResultExt};
use crate::model::{AdRevision, Deal, DealId, DealStatus};
use crate::transition::can_transition;

impl DealEngine {
    #[instrument(
        skip_all,
        target = "deal",
        fields(op = "approve", deal_id = %deal_id, actor_id = field::Empty)
    )]
    pub async fn approve(&self, actor: Option<&Actor>, deal_id: &DealId) -> Result<Deal, DealError> {
        let res = async {
            let deal = self.publisher_deal(actor, deal_id).await?;
            let deal = self.apply_transition(&deal, DealStatus::Approved, None).await?;

            info!("deal approved");
            Ok::<_, DealError>(deal)
        }
        .await;

        observe("approve", res)
    }

    /// The reason, if any, is stored as the publisher note.
    #[instrument(
        skip_all,
        target = "deal",
        fields(op = "reject", deal_id = %deal_id, actor_id = field::Empty)
    )]
    pub async fn reject(
        &self,
        actor: Option<&Actor>,
        deal_id: &DealId,
        reason: Option<&str>,
    ) -> Result<Deal, DealError> {
        let res = async {
            let deal = self.publisher_deal(actor, deal_id).await?;

            let reason = reason.map(str::trim).filter(|r| !r.is_empty());
            let deal = self
                .apply_transition(&deal, DealStatus::Rejected, reason)
                .await?;

            info!(has_reason = reason.is_some(), "deal rejected");
            Ok::<_, DealError>(deal)
        }
        .await;

        observe("reject", res)
    }

    #[instrument(
        skip_all,
        target = "deal",
        fields(op = "request_changes", deal_id = %deal_id, actor_id = field::Empty)
    )]
    pub async fn request_changes(
        &self,
        actor: Option<&Actor>,
        deal_id: &DealId,
        note: &str,
    ) -> Result<Deal, DealError> {
        let res = async {
            let deal = self.publisher_deal(actor, deal_id).await?;

            let note = note.trim();
            if note.is_empty() {
                return Err(DealError::validation("note", "must not be empty"));
            }

            let deal = self
                .apply_transition(&deal, DealStatus::ChangesRequested, Some(note))
                .await?;

            info!("changes requested");
            Ok::<_, DealError>(deal)
        }
        .await;

        observe("request_changes", res)
    }

    /// Advertiser-only, and only while the posting time is still ahead.
    #[instrument(
        skip_all,
        target = "deal",
        fields(op = "cancel", deal_id = %deal_id, actor_id = field::Empty)
    )]
    pub async fn cancel(&self, actor: Option<&Actor>, deal_id: &DealId) -> Result<Deal, DealError> {
        let res = async {
            let deal = self.advertiser_deal(actor, deal_id).await?;

            if !can_transition(deal.status, DealStatus::Cancelled) {
                return Err(DealError::InvalidTransition {
                    from: deal.status,
                    to: DealStatus::Cancelled,
                });
            }

            if deal.scheduled_at <= Utc::now() {
                return Err(DealError::validation(
                    "scheduled_at",
                    "posting time has already arrived",
                ));
            }

            let deal = self
                .apply_transition(&deal, DealStatus::Cancelled, None)
                .await?;

            info!("deal cancelled");
            Ok::<_, DealError>(deal)
        }
        .await;

        observe("cancel", res)
    }

    /// Appends the next ad version and moves the deal back to review, in
    /// one transaction. Only valid after the publisher requested changes.
    #[instrument(
        skip_all,
        target = "deal",
        fields(op = "submit_revision", deal_id = %deal_id, actor_id = field::Empty)
    )]
    pub async fn submit_revision(
        &self,
        actor: Option<&Actor>,
        deal_id: &DealId,
        content: Vec<PostContent>,
    ) -> Result<AdRevision, DealError> {
        let res = async {
            let deal = self.advertiser_deal(actor, deal_id).await?;

            // pending_payment -> pending_review belongs to the payment flow
            if deal.status != DealStatus::ChangesRequested {
                return Err(DealError::InvalidTransition {
                    from: deal.status,
                    to: DealStatus::PendingReview,
                });
            }

            if content.is_empty() {
                return Err(DealError::validation(
                    "content",
                    "at least one fragment is required",
                ));
            }

            let mut tx = self.tx.begin().await.or_internal("begin transaction")?;

            let moved = self
                .slow(
                    "db_transition_status",
                    tx.transition_status(
                        &deal.id,
                        DealStatus::ChangesRequested,
                        DealStatus::PendingReview,
                        None,
                        Utc::now(),
                    ),
                )
                .await
                .or_internal("update deal status")?;

            if !moved {
                drop(tx);
                return Err(self.lost_race(&deal.id, DealStatus::PendingReview).await);
            }

            let version = tx
                .latest_ad_version(&deal.id)
                .await
                .or_internal("read ad version")?
                + 1;

            let ad = self
                .slow(
                    "db_append_ad_version",
                    tx.append_ad_version(&deal.id, version, &content),
                )
                .await
                .or_internal("append ad version")?;

            tx.commit().await.or_internal("commit revision")?;

            info!(version, fragments = ad.len(), "revision submitted");
            Ok::<_, DealError>(AdRevision { version, ad })
        }
        .await;

        observe("submit_revision", res)
    }

    /// Loads the deal and checks the caller holds a role on its channel.
    async fn publisher_deal(
        &self,
        actor: Option<&Actor>,
        deal_id: &DealId,
    ) -> Result<Deal, DealError> {
        let actor = require_actor(actor)?;
        record_actor(&actor.user_id);

        let deal = self.load_deal(deal_id).await?;
        require_channel_role(self.channels.as_ref(), &deal.channel_id, &actor.user_id).await?;
        Ok(deal)
    }

    async fn advertiser_deal(
        &self,
        actor: Option<&Actor>,
        deal_id: &DealId,
    ) -> Result<Deal, DealError> {
        let actor = require_actor(actor)?;
        record_actor(&actor.user_id);

        let deal = self.load_deal(deal_id).await?;
        require_advertiser(&deal, &actor.user_id)?;
        Ok(deal)
    }
}
