//! The public operations of the deal engine.
//!
//! Every operation takes the acting user explicitly, runs inside its own
//! span and returns a [`DealError`] the caller can map to a transport status.
//! Domain rejections are logged at `warn`; internal failures at `error`.

mod create;
mod query;
mod transitions;

use std::future::Future;
use std::sync::Arc;

use catalog::directory::{ChannelDirectory, PostStore, UserDirectory};
use catalog::directory_sqlx::{SqlxChannelDirectory, SqlxPostStore, SqlxUserDirectory};
use chrono::Utc;
use common::logger::warn_if_slow;
use sqlx::AnyPool;
use tracing::{error, warn};

use crate::config::DealConfig;
use crate::db::Db;
use crate::error::{DealError, ResultExt};
use crate::model::{Deal, DealId, DealStatus};
use crate::repository::{DealRepository, TransactionRunner};
use crate::repository_sqlx::{SqlxDealRepository, SqlxTransactionRunner};
use crate::transition::can_transition;

pub struct DealEngine {
    deals: Arc<dyn DealRepository>,
    channels: Arc<dyn ChannelDirectory>,
    users: Arc<dyn UserDirectory>,
    posts: Arc<dyn PostStore>,
    tx: Arc<dyn TransactionRunner>,
    config: DealConfig,
}

impl DealEngine {
    pub fn new(
        deals: Arc<dyn DealRepository>,
        channels: Arc<dyn ChannelDirectory>,
        users: Arc<dyn UserDirectory>,
        posts: Arc<dyn PostStore>,
        tx: Arc<dyn TransactionRunner>,
        config: DealConfig,
    ) -> Self {
        Self {
            deals,
            channels,
            users,
            posts,
            tx,
            config,
        }
    }

    /// Opens `config.database_url`, applies the schema and wires the
    /// SQL-backed collaborators.
    pub async fn connect(config: DealConfig) -> anyhow::Result<Self> {
        let db = Db::connect(&config.database_url).await?;
        db.migrate().await?;
        Ok(Self::with_pool(db.pool, config))
    }

    pub fn with_pool(pool: AnyPool, config: DealConfig) -> Self {
        Self::new(
            Arc::new(SqlxDealRepository::new(pool.clone())),
            Arc::new(SqlxChannelDirectory::new(pool.clone())),
            Arc::new(SqlxUserDirectory::new(pool.clone())),
            Arc::new(SqlxPostStore::new(pool.clone())),
            Arc::new(SqlxTransactionRunner::new(pool)),
            config,
        )
    }

    pub fn config(&self) -> &DealConfig {
        &self.config
    }

    async fn slow<F, T>(&self, label: &'static str, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        warn_if_slow(label, self.config.slow_query_threshold, fut).await
    }

    async fn load_deal(&self, deal_id: &DealId) -> Result<Deal, DealError> {
        self.slow("db_get_deal", self.deals.get_by_id(deal_id))
            .await
            .or_internal("load deal")?
            .ok_or(DealError::NotFound("deal"))
    }

    /// Guard check against the stored status, then a conditional update.
    /// The returned deal is the loaded one with the written columns applied;
    /// it is not read back.
    async fn apply_transition(
        &self,
        deal: &Deal,
        next: DealStatus,
        note: Option<&str>,
    ) -> Result<Deal, DealError> {
        if !can_transition(deal.status, next) {
            return Err(DealError::InvalidTransition {
                from: deal.status,
                to: next,
            });
        }

        let at = Utc::now();
        let updated = self
            .slow(
                "db_transition_status",
                self.deals
                    .transition_status(&deal.id, deal.status, next, note, at),
            )
            .await
            .or_internal("update deal status")?;

        if !updated {
            return Err(self.lost_race(&deal.id, next).await);
        }

        Ok(Deal {
            status: next,
            publisher_note: note.map(str::to_string),
            updated_at: at,
            ..deal.clone()
        })
    }

    /// Another writer moved the deal first; report against its current status.
    async fn lost_race(&self, deal_id: &DealId, next: DealStatus) -> DealError {
        match self.load_deal(deal_id).await {
            Ok(current) => {
                warn!(current = %current.status, to = %next, "concurrent status change");
                DealError::InvalidTransition {
                    from: current.status,
                    to: next,
                }
            }
            Err(e) => e,
        }
    }
}

fn observe<T>(op: &'static str, res: Result<T, DealError>) -> Result<T, DealError> {
    if let Err(e) = &res {
        if e.is_internal() {
            error!(op, error = ?e, "deal operation failed");
        } else {
            warn!(op, code = e.code(), error = %e, "deal operation rejected");
        }
    }
    res
}
