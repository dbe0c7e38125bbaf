use std::collections::BTreeMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::directory::{ChannelDirectory, PostStore, UserDirectory};
use crate::model::{
    AdFormat, Channel, ChannelId, ChannelRole, FormatTerms, Post, PostContent, PostId, User,
    UserId,
};
use crate::sql::{flag_col, i64_to_u32, time_col, u32_col, uuid_col};

/// SQLx-backed channel directory. Responsible only for queries and row mapping.
pub struct SqlxChannelDirectory {
    pool: AnyPool,
}

impl SqlxChannelDirectory {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

const CHANNEL_COLUMNS: &str = "id, external_id, title, username, is_listed, created_at_ms";

#[async_trait]
impl ChannelDirectory for SqlxChannelDirectory {
    async fn get_by_external_id(&self, external_id: i64) -> anyhow::Result<Option<Channel>> {
        let row = sqlx::query(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels WHERE external_id = ? AND deleted_at_ms IS NULL;"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .context("getting channel by external id")?;

        row.as_ref().map(row_to_channel).transpose()
    }

    async fn get_by_id(&self, channel_id: &ChannelId) -> anyhow::Result<Option<Channel>> {
        let row = sqlx::query(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels WHERE id = ? AND deleted_at_ms IS NULL;"
        ))
        .bind(channel_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("getting channel by id")?;

        row.as_ref().map(row_to_channel).transpose()
    }

    async fn get_role(
        &self,
        channel_id: &ChannelId,
        user_id: &UserId,
    ) -> anyhow::Result<Option<ChannelRole>> {
        let row = sqlx::query(
            r#"
SELECT channel_id, user_id, role, created_at_ms
FROM channel_roles
WHERE channel_id = ? AND user_id = ?;
"#,
        )
        .bind(channel_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("getting channel role")?;

        match row {
            Some(r) => Ok(Some(ChannelRole {
                channel_id: uuid_col(&r, "channel_id")?,
                user_id: uuid_col(&r, "user_id")?,
                role: r.try_get::<String, _>("role")?.parse()?,
                created_at: time_col(&r, "created_at_ms")?,
            })),
            None => Ok(None),
        }
    }

    async fn get_ad_formats(&self, channel_id: &ChannelId) -> anyhow::Result<Vec<AdFormat>> {
        let rows = sqlx::query(
            r#"
SELECT id, channel_id, format_type, is_native, feed_hours, top_hours, price_nano_ton
FROM channel_ad_formats
WHERE channel_id = ?
ORDER BY created_at_ms ASC;
"#,
        )
        .bind(channel_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("getting ad formats")?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            match row_to_ad_format(&r) {
                Ok(f) => out.push(f),
                Err(e) => {
                    // an unreadable offer simply cannot be matched
                    tracing::warn!(error = %e, %channel_id, "skipping malformed ad format row");
                }
            }
        }

        Ok(out)
    }

    async fn get_payout_wallet_address(
        &self,
        channel_id: &ChannelId,
    ) -> anyhow::Result<Option<String>> {
        let row = sqlx::query(
            r#"
SELECT u.wallet_address AS wallet_address
FROM channel_roles cr
JOIN users u ON u.id = cr.user_id
WHERE cr.channel_id = ? AND cr.role = 'owner' AND u.deleted_at_ms IS NULL
LIMIT 1;
"#,
        )
        .bind(channel_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("getting owner wallet address")?;

        match row {
            Some(r) => Ok(r.try_get::<Option<String>, _>("wallet_address")?),
            None => Ok(None),
        }
    }
}

pub struct SqlxUserDirectory {
    pool: AnyPool,
}

impl SqlxUserDirectory {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for SqlxUserDirectory {
    async fn get_by_id(&self, user_id: &UserId) -> anyhow::Result<Option<User>> {
        let row = sqlx::query(
            r#"
SELECT id, telegram_id, name, wallet_address
FROM users
WHERE id = ? AND deleted_at_ms IS NULL;
"#,
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("getting user by id")?;

        match row {
            Some(r) => Ok(Some(User {
                id: uuid_col(&r, "id")?,
                telegram_id: r.try_get("telegram_id")?,
                name: r.try_get("name")?,
                wallet_address: r.try_get("wallet_address")?,
            })),
            None => Ok(None),
        }
    }
}

pub struct SqlxPostStore {
    pool: AnyPool,
}

impl SqlxPostStore {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

/// Column list understood by [`row_to_post`].
pub const POST_COLUMNS: &str = "id, kind, external_id, version, name, media_group_id, text, \
     entities, media_type, media_file_id, has_media_spoiler, show_caption_above_media, \
     created_at_ms";

#[async_trait]
impl PostStore for SqlxPostStore {
    async fn get_by_id(&self, post_id: &PostId) -> anyhow::Result<Option<Post>> {
        let row = sqlx::query(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = ? AND deleted_at_ms IS NULL;"
        ))
        .bind(post_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("getting post by id")?;

        row.as_ref().map(row_to_post).transpose()
    }

    async fn get_latest_ad_version(&self, deal_id: &Uuid) -> anyhow::Result<Vec<Post>> {
        let rows = sqlx::query(&format!(
            r#"
SELECT {POST_COLUMNS}
FROM posts
WHERE kind = 'ad' AND external_id = ? AND deleted_at_ms IS NULL
  AND version = (
    SELECT MAX(version) FROM posts
    WHERE kind = 'ad' AND external_id = ? AND deleted_at_ms IS NULL
  )
ORDER BY position ASC;
"#
        ))
        .bind(deal_id.to_string())
        .bind(deal_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("getting latest ad version")?;

        rows.iter().map(row_to_post).collect()
    }

    async fn get_ad_versions(&self, deal_id: &Uuid) -> anyhow::Result<BTreeMap<u32, Vec<Post>>> {
        let rows = sqlx::query(&format!(
            r#"
SELECT {POST_COLUMNS}
FROM posts
WHERE kind = 'ad' AND external_id = ? AND deleted_at_ms IS NULL
ORDER BY version ASC, position ASC;
"#
        ))
        .bind(deal_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("getting ad versions")?;

        let mut versions: BTreeMap<u32, Vec<Post>> = BTreeMap::new();
        for r in &rows {
            let post = row_to_post(r)?;
            if let Some(v) = post.version {
                versions.entry(v).or_default().push(post);
            }
        }

        Ok(versions)
    }
}

/* =========================
Row mapping
========================= */

fn row_to_channel(r: &AnyRow) -> anyhow::Result<Channel> {
    Ok(Channel {
        id: uuid_col(r, "id")?,
        external_id: r.try_get("external_id")?,
        title: r.try_get("title")?,
        username: r.try_get("username")?,
        is_listed: flag_col(r, "is_listed")?,
        created_at: time_col(r, "created_at_ms")?,
    })
}

fn row_to_ad_format(r: &AnyRow) -> anyhow::Result<AdFormat> {
    Ok(AdFormat {
        id: uuid_col(r, "id")?,
        channel_id: uuid_col(r, "channel_id")?,
        terms: FormatTerms {
            format_type: r.try_get::<String, _>("format_type")?.parse()?,
            is_native: flag_col(r, "is_native")?,
            feed_hours: u32_col(r, "feed_hours")?,
            top_hours: u32_col(r, "top_hours")?,
        },
        price_nano_ton: r.try_get("price_nano_ton")?,
    })
}

/// Decodes a row selected with [`POST_COLUMNS`].
pub fn row_to_post(r: &AnyRow) -> anyhow::Result<Post> {
    let entities = r
        .try_get::<Option<String>, _>("entities")?
        .map(|raw| serde_json::from_str(&raw).context("invalid post entities json"))
        .transpose()?;

    let media_type = r
        .try_get::<Option<String>, _>("media_type")?
        .map(|m| m.parse())
        .transpose()?;

    let version = r
        .try_get::<Option<i64>, _>("version")?
        .map(i64_to_u32)
        .transpose()?;

    Ok(Post {
        id: uuid_col(r, "id")?,
        kind: r.try_get::<String, _>("kind")?.parse()?,
        external_id: uuid_col(r, "external_id")?,
        version,
        media_group_id: r.try_get("media_group_id")?,
        content: PostContent {
            name: r.try_get("name")?,
            text: r.try_get("text")?,
            entities,
            media_type,
            media_file_id: r.try_get("media_file_id")?,
            has_media_spoiler: flag_col(r, "has_media_spoiler")?,
            show_caption_above_media: flag_col(r, "show_caption_above_media")?,
        },
        created_at: time_col(r, "created_at_ms")?,
    })
}
