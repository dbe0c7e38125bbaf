use chrono::Utc;
use common::logger::{record_actor, record_deal};
use tracing::{field, info, instrument};
use uuid::Uuid;

use super::{DealEngine, observe};
use crate::actor::{Actor, require_actor};
use crate::error::{DealError, ResultExt};
use crate::model::{CreateDealRequest, CreatedDeal, NewDeal};

impl DealEngine {
    /// Creates a deal in `pending_payment` together with ad version 1,
    /// copied from the advertiser's template. Both rows commit together or
    /// not at all.
    #[instrument(
        skip_all,
        target = "deal",
        fields(
            op = "create_deal",
            channel = req.channel_external_id,
            deal_id = field::Empty,
            actor_id = field::Empty
        )
    )]
    pub async fn create_deal(
        &self,
        actor: Option<&Actor>,
        req: CreateDealRequest,
    ) -> Result<CreatedDeal, DealError> {
        observe("create_deal", self.create_deal_inner(actor, req).await)
    }

    async fn create_deal_inner(
        &self,
        actor: Option<&Actor>,
        req: CreateDealRequest,
    ) -> Result<CreatedDeal, DealError> {
        let actor = require_actor(actor)?;
        record_actor(&actor.user_id);

        let channel = self
            .slow(
                "db_get_channel",
                self.channels.get_by_external_id(req.channel_external_id),
            )
            .await
            .or_internal("resolve channel")?
            .ok_or(DealError::NotFound("channel"))?;

        if !channel.is_listed {
            return Err(DealError::ChannelNotListed);
        }

        let formats = self
            .slow("db_get_ad_formats", self.channels.get_ad_formats(&channel.id))
            .await
            .or_internal("load ad formats")?;

        let format = formats
            .iter()
            .find(|f| f.terms == req.format.terms)
            .ok_or(DealError::NotFound("ad format"))?;

        if format.price_nano_ton != req.format.price_nano_ton {
            return Err(DealError::PriceMismatch {
                requested: req.format.price_nano_ton,
                listed: format.price_nano_ton,
            });
        }

        let now = Utc::now();
        if req.scheduled_at <= now {
            return Err(DealError::validation(
                "scheduled_at",
                "must be in the future",
            ));
        }

        // Missing and foreign templates look the same to the caller.
        let template = self
            .slow("db_get_template", self.posts.get_by_id(&req.template_post_id))
            .await
            .or_internal("load template")?;
        match template {
            Some(t) if t.is_template_of(&actor.user_id) => {}
            _ => return Err(DealError::Forbidden),
        }

        let advertiser = self
            .slow("db_get_user", self.users.get_by_id(&actor.user_id))
            .await
            .or_internal("load advertiser")?
            .ok_or(DealError::NotFound("user"))?;

        let payout_wallet_address = self
            .slow(
                "db_get_payout_wallet",
                self.channels.get_payout_wallet_address(&channel.id),
            )
            .await
            .or_internal("load payout wallet")?;

        let new = NewDeal {
            id: Uuid::now_v7(),
            channel_id: channel.id,
            advertiser_id: actor.user_id,
            scheduled_at: req.scheduled_at,
            escrow_wallet_address: self.config.escrow_wallet_address.clone(),
            advertiser_wallet_address: advertiser.wallet_address,
            payout_wallet_address,
            terms: format.terms,
            price_nano_ton: format.price_nano_ton,
            created_at: now,
        };
        record_deal(&new.id);

        // Dropping `tx` on any early return rolls both writes back.
        let mut tx = self.tx.begin().await.or_internal("begin transaction")?;

        let deal = self
            .slow("db_insert_deal", tx.insert_deal(&new))
            .await
            .or_internal("insert deal")?;

        let ad = self
            .slow(
                "db_copy_template",
                tx.copy_as_first_ad_version(&req.template_post_id, &deal.id),
            )
            .await
            .or_internal("copy template")?;

        tx.commit().await.or_internal("commit deal")?;

        info!(
            price_nano_ton = deal.price_nano_ton,
            fragments = ad.len(),
            "deal created"
        );

        Ok(CreatedDeal { deal, ad })
    }
}
