use catalog::model::UserId;
use serde::{Deserialize, Serialize};

use crate::error::DealError;

/// Authenticated caller, passed explicitly into every engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    /// Messenger-side user id.
    pub telegram_id: i64,
}

impl Actor {
    pub fn new(user_id: UserId, telegram_id: i64) -> Self {
        Self {
            user_id,
            telegram_id,
        }
    }
}

/// An unauthenticated call is forbidden for every operation.
pub fn require_actor(actor: Option<&Actor>) -> Result<&Actor, DealError> {
    actor.ok_or(DealError::Forbidden)
}
