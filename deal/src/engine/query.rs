use std::collections::{BTreeMap, HashMap};

use catalog::model::{ChannelId, Post};
use common::logger::record_actor;
use tracing::{debug, field, instrument};

use super::{DealEngine, observe};
use crate::actor::{Actor, require_actor};
use crate::authz::{require_channel_role, require_deal_visibility};
use crate::error::{DealError, ResultExt};
use crate::model::{Deal, DealId, DealListItem, DealPage, DealView, PageRequest};

impl DealEngine {
    /// A deal with its latest ad version, visible to the advertiser and to
    /// anyone holding a role on the channel.
    #[instrument(
        skip_all,
        target = "deal",
        fields(op = "get_deal", deal_id = %deal_id, actor_id = field::Empty)
    )]
    pub async fn get_deal(
        &self,
        actor: Option<&Actor>,
        deal_id: &DealId,
    ) -> Result<DealView, DealError> {
        let res = async {
            let deal = self.visible_deal(actor, deal_id).await?;

            let ad = self
                .slow("db_latest_ad", self.posts.get_latest_ad_version(&deal.id))
                .await
                .or_internal("load latest ad")?;

            let channel_external_id = self.channel_external_id(&deal.channel_id).await?;

            Ok::<_, DealError>(DealView {
                deal,
                ad,
                channel_external_id,
            })
        }
        .await;

        observe("get_deal", res)
    }

    /// Every ad version of a deal, oldest first.
    #[instrument(
        skip_all,
        target = "deal",
        fields(op = "get_ad_history", deal_id = %deal_id, actor_id = field::Empty)
    )]
    pub async fn get_ad_history(
        &self,
        actor: Option<&Actor>,
        deal_id: &DealId,
    ) -> Result<BTreeMap<u32, Vec<Post>>, DealError> {
        let res = async {
            let deal = self.visible_deal(actor, deal_id).await?;

            self.slow("db_ad_versions", self.posts.get_ad_versions(&deal.id))
                .await
                .or_internal("load ad history")
        }
        .await;

        observe("get_ad_history", res)
    }

    /// The caller's own deals as advertiser, newest first.
    #[instrument(
        skip_all,
        target = "deal",
        fields(op = "list_advertiser_deals", actor_id = field::Empty)
    )]
    pub async fn list_advertiser_deals(
        &self,
        actor: Option<&Actor>,
        page: PageRequest,
    ) -> Result<DealPage, DealError> {
        let res = async {
            let actor = require_actor(actor)?;
            record_actor(&actor.user_id);
            let page = self.config.clamp_page(page)?;

            let (deals, total) = self
                .slow(
                    "db_list_by_advertiser",
                    self.deals
                        .list_by_advertiser(&actor.user_id, page.limit, page.offset),
                )
                .await
                .or_internal("list advertiser deals")?;

            // deals on one page usually share a handful of channels
            let mut external_ids: HashMap<ChannelId, i64> = HashMap::new();
            let mut items = Vec::with_capacity(deals.len());
            for deal in deals {
                let channel_external_id = match external_ids.get(&deal.channel_id) {
                    Some(id) => *id,
                    None => {
                        let id = self.channel_external_id(&deal.channel_id).await?;
                        external_ids.insert(deal.channel_id, id);
                        id
                    }
                };
                items.push(DealListItem {
                    deal,
                    channel_external_id,
                });
            }

            debug!(returned = items.len(), total, "advertiser deals listed");
            Ok::<_, DealError>(DealPage { items, total })
        }
        .await;

        observe("list_advertiser_deals", res)
    }

    /// All deals of one channel, for its owner and managers.
    #[instrument(
        skip_all,
        target = "deal",
        fields(
            op = "list_publisher_deals",
            channel = channel_external_id,
            actor_id = field::Empty
        )
    )]
    pub async fn list_publisher_deals(
        &self,
        actor: Option<&Actor>,
        channel_external_id: i64,
        page: PageRequest,
    ) -> Result<DealPage, DealError> {
        let res = async {
            let actor = require_actor(actor)?;
            record_actor(&actor.user_id);
            let page = self.config.clamp_page(page)?;

            let channel = self
                .slow(
                    "db_get_channel",
                    self.channels.get_by_external_id(channel_external_id),
                )
                .await
                .or_internal("resolve channel")?
                .ok_or(DealError::NotFound("channel"))?;

            require_channel_role(self.channels.as_ref(), &channel.id, &actor.user_id).await?;

            let (deals, total) = self
                .slow(
                    "db_list_by_channel",
                    self.deals.list_by_channel(&channel.id, page.limit, page.offset),
                )
                .await
                .or_internal("list channel deals")?;

            let items: Vec<DealListItem> = deals
                .into_iter()
                .map(|deal| DealListItem {
                    deal,
                    channel_external_id: channel.external_id,
                })
                .collect();

            debug!(returned = items.len(), total, "channel deals listed");
            Ok::<_, DealError>(DealPage { items, total })
        }
        .await;

        observe("list_publisher_deals", res)
    }

    async fn visible_deal(
        &self,
        actor: Option<&Actor>,
        deal_id: &DealId,
    ) -> Result<Deal, DealError> {
        let actor = require_actor(actor)?;
        record_actor(&actor.user_id);

        let deal = self.load_deal(deal_id).await?;
        require_deal_visibility(self.channels.as_ref(), &deal, &actor.user_id).await?;
        Ok(deal)
    }

    async fn channel_external_id(&self, channel_id: &ChannelId) -> Result<i64, DealError> {
        self.slow("db_get_channel", self.channels.get_by_id(channel_id))
            .await
            .or_internal("resolve channel")?
            .map(|c| c.external_id)
            .ok_or(DealError::NotFound("channel"))
    }
}
