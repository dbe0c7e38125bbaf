use catalog::directory::ChannelDirectory;
use catalog::model::{ChannelId, ChannelRole, UserId};

use crate::error::{DealError, ResultExt};
use crate::model::Deal;

pub fn require_advertiser(deal: &Deal, user_id: &UserId) -> Result<(), DealError> {
    if deal.is_advertiser(user_id) {
        Ok(())
    } else {
        Err(DealError::Forbidden)
    }
}

/// Any role (owner or manager) grants publisher-side authority.
pub async fn require_channel_role(
    channels: &dyn ChannelDirectory,
    channel_id: &ChannelId,
    user_id: &UserId,
) -> Result<ChannelRole, DealError> {
    channels
        .get_role(channel_id, user_id)
        .await
        .or_internal("resolve channel role")?
        .ok_or(DealError::Forbidden)
}

/// The advertiser, or anyone holding a role on the deal's channel, may
/// see a deal.
pub async fn require_deal_visibility(
    channels: &dyn ChannelDirectory,
    deal: &Deal,
    user_id: &UserId,
) -> Result<(), DealError> {
    if deal.is_advertiser(user_id) {
        return Ok(());
    }
    require_channel_role(channels, &deal.channel_id, user_id)
        .await
        .map(|_| ())
}
