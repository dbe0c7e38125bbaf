use anyhow::{Context, anyhow};
use async_trait::async_trait;
use catalog::directory_sqlx::{POST_COLUMNS, row_to_post};
use catalog::model::{ChannelId, FormatTerms, Post, PostContent, PostId, UserId};
use catalog::sql::{flag, flag_col, opt_time_col, time_col, u32_col, utc_to_millis, uuid_col};
use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;
use sqlx::{Any, AnyConnection, AnyPool, Row, Transaction};
use uuid::Uuid;

use crate::model::{Deal, DealId, DealStatus, NewDeal};
use crate::repository::{DealRepository, DealTransaction, TransactionRunner};

const DEAL_COLUMNS: &str = "id, channel_id, advertiser_id, status, scheduled_at_ms, publisher_note, \
     escrow_wallet_address, advertiser_wallet_address, payout_wallet_address, \
     format_type, is_native, feed_hours, top_hours, price_nano_ton, \
     posted_message_ids, paid_at_ms, payment_tx_hash, posted_at_ms, release_tx_hash, \
     refund_tx_hash, created_at_ms, updated_at_ms";

/// SQLx-backed deal repository. Responsible only for persistence and row mapping.
pub struct SqlxDealRepository {
    pool: AnyPool,
}

impl SqlxDealRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    async fn list_where(
        &self,
        column: &'static str,
        value: &Uuid,
        limit: u32,
        offset: u64,
    ) -> anyhow::Result<(Vec<Deal>, u64)> {
        let offset = i64::try_from(offset).context("page offset out of range")?;

        let rows = sqlx::query(&format!(
            r#"
SELECT {DEAL_COLUMNS}
FROM deals
WHERE {column} = ?
ORDER BY created_at_ms DESC, id DESC
LIMIT ? OFFSET ?;
"#
        ))
        .bind(value.to_string())
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("listing deals by {column}"))?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            match row_to_deal(&r) {
                Ok(d) => out.push(d),
                Err(e) => {
                    // poison-row resilience: one bad row must not hide the rest
                    tracing::warn!(error = %e, "skipping malformed deal row");
                }
            }
        }

        let total: i64 = sqlx::query(&format!(
            "SELECT COUNT(*) AS n FROM deals WHERE {column} = ?;"
        ))
        .bind(value.to_string())
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("counting deals by {column}"))?
        .try_get("n")?;

        Ok((out, u64::try_from(total).unwrap_or_default()))
    }
}

#[async_trait]
impl DealRepository for SqlxDealRepository {
    async fn get_by_id(&self, deal_id: &DealId) -> anyhow::Result<Option<Deal>> {
        let mut conn = self.pool.acquire().await.context("acquiring connection")?;
        fetch_deal(&mut conn, deal_id).await
    }

    async fn list_by_advertiser(
        &self,
        advertiser_id: &UserId,
        limit: u32,
        offset: u64,
    ) -> anyhow::Result<(Vec<Deal>, u64)> {
        self.list_where("advertiser_id", advertiser_id, limit, offset)
            .await
    }

    async fn list_by_channel(
        &self,
        channel_id: &ChannelId,
        limit: u32,
        offset: u64,
    ) -> anyhow::Result<(Vec<Deal>, u64)> {
        self.list_where("channel_id", channel_id, limit, offset).await
    }

    async fn transition_status(
        &self,
        deal_id: &DealId,
        expected: DealStatus,
        next: DealStatus,
        note: Option<&str>,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let mut conn = self.pool.acquire().await.context("acquiring connection")?;
        update_status(&mut conn, deal_id, expected, next, note, at).await
    }
}

pub struct SqlxTransactionRunner {
    pool: AnyPool,
}

impl SqlxTransactionRunner {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionRunner for SqlxTransactionRunner {
    async fn begin(&self) -> anyhow::Result<Box<dyn DealTransaction>> {
        let tx = self.pool.begin().await.context("beginning transaction")?;
        Ok(Box::new(SqlxDealTransaction { tx }))
    }
}

/// Rolls back on drop unless committed.
pub struct SqlxDealTransaction {
    tx: Transaction<'static, Any>,
}

#[async_trait]
impl DealTransaction for SqlxDealTransaction {
    async fn insert_deal(&mut self, new: &NewDeal) -> anyhow::Result<Deal> {
        sqlx::query(
            r#"
INSERT INTO deals (
  id, channel_id, advertiser_id, status, scheduled_at_ms,
  escrow_wallet_address, advertiser_wallet_address, payout_wallet_address,
  format_type, is_native, feed_hours, top_hours, price_nano_ton,
  posted_message_ids, created_at_ms, updated_at_ms
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, '[]', ?, ?);
"#,
        )
        .bind(new.id.to_string())
        .bind(new.channel_id.to_string())
        .bind(new.advertiser_id.to_string())
        .bind(DealStatus::PendingPayment.as_str().to_string())
        .bind(utc_to_millis(&new.scheduled_at))
        .bind(new.escrow_wallet_address.clone())
        .bind(new.advertiser_wallet_address.clone())
        .bind(new.payout_wallet_address.clone())
        .bind(new.terms.format_type.as_str().to_string())
        .bind(flag(new.terms.is_native))
        .bind(i64::from(new.terms.feed_hours))
        .bind(i64::from(new.terms.top_hours))
        .bind(new.price_nano_ton)
        .bind(utc_to_millis(&new.created_at))
        .bind(utc_to_millis(&new.created_at))
        .execute(&mut *self.tx)
        .await
        .context("inserting deal")?;

        fetch_deal(&mut self.tx, &new.id)
            .await?
            .ok_or_else(|| anyhow!("deal {} missing after insert", new.id))
    }

    async fn copy_as_first_ad_version(
        &mut self,
        template_id: &PostId,
        deal_id: &DealId,
    ) -> anyhow::Result<Vec<Post>> {
        let row = sqlx::query(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = ? AND kind = 'template' AND deleted_at_ms IS NULL;"
        ))
        .bind(template_id.to_string())
        .fetch_optional(&mut *self.tx)
        .await
        .context("loading template post")?
        .ok_or_else(|| anyhow!("template post {template_id} not found"))?;
        let template = row_to_post(&row)?;

        // An album is copied whole, in its original order.
        let fragments = match &template.media_group_id {
            Some(group) => {
                let rows = sqlx::query(&format!(
                    r#"
SELECT {POST_COLUMNS}
FROM posts
WHERE kind = 'template' AND external_id = ? AND media_group_id = ? AND deleted_at_ms IS NULL
ORDER BY created_at_ms ASC, position ASC, id ASC;
"#
                ))
                .bind(template.external_id.to_string())
                .bind(group.clone())
                .fetch_all(&mut *self.tx)
                .await
                .context("loading template media group")?;

                rows.iter().map(row_to_post).collect::<anyhow::Result<Vec<_>>>()?
            }
            None => vec![template.clone()],
        };

        let group = template
            .media_group_id
            .as_ref()
            .map(|_| Uuid::new_v4().to_string());
        let contents: Vec<PostContent> = fragments
            .into_iter()
            .enumerate()
            .map(|(i, p)| {
                // the album carries one name, on its first fragment
                let mut content = p.content;
                if i > 0 {
                    content.name = None;
                }
                content
            })
            .collect();

        write_ad_version(&mut self.tx, deal_id, 1, group.as_deref(), &contents).await
    }

    async fn latest_ad_version(&mut self, deal_id: &DealId) -> anyhow::Result<u32> {
        let row = sqlx::query(
            r#"
SELECT COALESCE(MAX(version), 0) AS v
FROM posts
WHERE kind = 'ad' AND external_id = ? AND deleted_at_ms IS NULL;
"#,
        )
        .bind(deal_id.to_string())
        .fetch_one(&mut *self.tx)
        .await
        .context("reading latest ad version")?;

        u32_col(&row, "v")
    }

    async fn append_ad_version(
        &mut self,
        deal_id: &DealId,
        version: u32,
        content: &[PostContent],
    ) -> anyhow::Result<Vec<Post>> {
        let group = (content.len() > 1).then(|| Uuid::new_v4().to_string());
        write_ad_version(&mut self.tx, deal_id, version, group.as_deref(), content).await
    }

    async fn transition_status(
        &mut self,
        deal_id: &DealId,
        expected: DealStatus,
        next: DealStatus,
        note: Option<&str>,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        update_status(&mut self.tx, deal_id, expected, next, note, at).await
    }

    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        let this = *self;
        this.tx.commit().await.context("committing transaction")
    }
}

/* =========================
Shared statements
========================= */

async fn fetch_deal(conn: &mut AnyConnection, deal_id: &DealId) -> anyhow::Result<Option<Deal>> {
    let row = sqlx::query(&format!("SELECT {DEAL_COLUMNS} FROM deals WHERE id = ?;"))
        .bind(deal_id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .context("getting deal by id")?;

    row.as_ref().map(row_to_deal).transpose()
}

async fn update_status(
    conn: &mut AnyConnection,
    deal_id: &DealId,
    expected: DealStatus,
    next: DealStatus,
    note: Option<&str>,
    at: DateTime<Utc>,
) -> anyhow::Result<bool> {
    let res = sqlx::query(
        r#"
UPDATE deals
SET status = ?, publisher_note = ?, updated_at_ms = ?
WHERE id = ? AND status = ?;
"#,
    )
    .bind(next.as_str().to_string())
    .bind(note.map(str::to_string))
    .bind(utc_to_millis(&at))
    .bind(deal_id.to_string())
    .bind(expected.as_str().to_string())
    .execute(&mut *conn)
    .await
    .context("updating deal status")?;

    Ok(res.rows_affected() == 1)
}

async fn write_ad_version(
    conn: &mut AnyConnection,
    deal_id: &DealId,
    version: u32,
    media_group_id: Option<&str>,
    content: &[PostContent],
) -> anyhow::Result<Vec<Post>> {
    let now_ms = utc_to_millis(&Utc::now());

    for (position, c) in content.iter().enumerate() {
        let entities = c
            .entities
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("encoding post entities")?;

        sqlx::query(
            r#"
INSERT INTO posts (
  id, kind, external_id, version, position, name, media_group_id, text, entities,
  media_type, media_file_id, has_media_spoiler, show_caption_above_media, created_at_ms
) VALUES (?, 'ad', ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?);
"#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(deal_id.to_string())
        .bind(i64::from(version))
        .bind(i64::try_from(position).context("fragment position out of range")?)
        .bind(c.name.clone())
        .bind(media_group_id.map(str::to_string))
        .bind(c.text.clone())
        .bind(entities)
        .bind(c.media_type.map(|m| m.as_str().to_string()))
        .bind(c.media_file_id.clone())
        .bind(flag(c.has_media_spoiler))
        .bind(flag(c.show_caption_above_media))
        .bind(now_ms)
        .execute(&mut *conn)
        .await
        .context("inserting ad post")?;
    }

    let rows = sqlx::query(&format!(
        r#"
SELECT {POST_COLUMNS}
FROM posts
WHERE kind = 'ad' AND external_id = ? AND version = ? AND deleted_at_ms IS NULL
ORDER BY position ASC;
"#
    ))
    .bind(deal_id.to_string())
    .bind(i64::from(version))
    .fetch_all(&mut *conn)
    .await
    .context("reading back ad version")?;

    rows.iter().map(row_to_post).collect()
}

/* =========================
Row mapping
========================= */

fn row_to_deal(r: &AnyRow) -> anyhow::Result<Deal> {
    let status: DealStatus = r.try_get::<String, _>("status")?.parse()?;

    let posted_message_ids: Vec<i64> =
        serde_json::from_str(&r.try_get::<String, _>("posted_message_ids")?)
            .context("invalid posted_message_ids json")?;

    Ok(Deal {
        id: uuid_col(r, "id")?,
        channel_id: uuid_col(r, "channel_id")?,
        advertiser_id: uuid_col(r, "advertiser_id")?,
        status,
        scheduled_at: time_col(r, "scheduled_at_ms")?,
        publisher_note: r.try_get("publisher_note")?,
        escrow_wallet_address: r.try_get("escrow_wallet_address")?,
        advertiser_wallet_address: r.try_get("advertiser_wallet_address")?,
        payout_wallet_address: r.try_get("payout_wallet_address")?,
        terms: FormatTerms {
            format_type: r.try_get::<String, _>("format_type")?.parse()?,
            is_native: flag_col(r, "is_native")?,
            feed_hours: u32_col(r, "feed_hours")?,
            top_hours: u32_col(r, "top_hours")?,
        },
        price_nano_ton: r.try_get("price_nano_ton")?,
        posted_message_ids,
        paid_at: opt_time_col(r, "paid_at_ms")?,
        payment_tx_hash: r.try_get("payment_tx_hash")?,
        posted_at: opt_time_col(r, "posted_at_ms")?,
        release_tx_hash: r.try_get("release_tx_hash")?,
        refund_tx_hash: r.try_get("refund_tx_hash")?,
        created_at: time_col(r, "created_at_ms")?,
        updated_at: time_col(r, "updated_at_ms")?,
    })
}
