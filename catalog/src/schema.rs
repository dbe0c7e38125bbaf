use sqlx::AnyPool;

/// Creates the catalog tables. Owned by the catalog services; the deal
/// engine only reads them.
pub async fn migrate(pool: &AnyPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS users (
  id TEXT PRIMARY KEY,
  telegram_id BIGINT NOT NULL UNIQUE,
  name TEXT NOT NULL,
  wallet_address TEXT,
  created_at_ms BIGINT NOT NULL,
  deleted_at_ms BIGINT
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS channels (
  id TEXT PRIMARY KEY,
  external_id BIGINT NOT NULL UNIQUE,
  title TEXT NOT NULL,
  username TEXT,
  is_listed INTEGER NOT NULL DEFAULT 0 CHECK (is_listed IN (0,1)),
  created_at_ms BIGINT NOT NULL,
  deleted_at_ms BIGINT
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS channel_roles (
  channel_id TEXT NOT NULL,
  user_id TEXT NOT NULL,
  role TEXT NOT NULL CHECK (role IN ('owner','manager')),
  created_at_ms BIGINT NOT NULL,
  PRIMARY KEY (channel_id, user_id)
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS channel_ad_formats (
  id TEXT PRIMARY KEY,
  channel_id TEXT NOT NULL,
  format_type TEXT NOT NULL,
  is_native INTEGER NOT NULL CHECK (is_native IN (0,1)),
  feed_hours BIGINT NOT NULL,
  top_hours BIGINT NOT NULL,
  price_nano_ton BIGINT NOT NULL,
  created_at_ms BIGINT NOT NULL,
  UNIQUE (channel_id, format_type, is_native, feed_hours, top_hours)
);
"#,
    )
    .execute(pool)
    .await?;

    // kind = 'template': external_id is the owning user.
    // kind = 'ad':       external_id is the deal, version is set.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS posts (
  id TEXT PRIMARY KEY,
  kind TEXT NOT NULL CHECK (kind IN ('template','ad')),
  external_id TEXT NOT NULL,
  version BIGINT,
  position BIGINT NOT NULL DEFAULT 0,
  name TEXT,
  media_group_id TEXT,
  text TEXT,
  entities TEXT,
  media_type TEXT,
  media_file_id TEXT,
  has_media_spoiler INTEGER NOT NULL DEFAULT 0,
  show_caption_above_media INTEGER NOT NULL DEFAULT 0,
  created_at_ms BIGINT NOT NULL,
  deleted_at_ms BIGINT
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_posts_external ON posts(kind, external_id, version);"#)
        .execute(pool)
        .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_posts_media_group ON posts(media_group_id);"#)
        .execute(pool)
        .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_ad_formats_channel ON channel_ad_formats(channel_id);"#)
        .execute(pool)
        .await?;

    Ok(())
}
