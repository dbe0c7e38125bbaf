use sqlx::AnyPool;

pub async fn migrate(pool: &AnyPool) -> anyhow::Result<()> {
    // Deals. Status strings are checked when rows are decoded.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS deals (
  id TEXT PRIMARY KEY,
  channel_id TEXT NOT NULL,
  advertiser_id TEXT NOT NULL,
  status TEXT NOT NULL,
  scheduled_at_ms BIGINT NOT NULL,
  publisher_note TEXT,

  escrow_wallet_address TEXT,
  advertiser_wallet_address TEXT,
  payout_wallet_address TEXT,

  format_type TEXT NOT NULL,
  is_native INTEGER NOT NULL CHECK (is_native IN (0,1)),
  feed_hours BIGINT NOT NULL,
  top_hours BIGINT NOT NULL,
  price_nano_ton BIGINT NOT NULL,

  posted_message_ids TEXT NOT NULL DEFAULT '[]',
  paid_at_ms BIGINT,
  payment_tx_hash TEXT,
  posted_at_ms BIGINT,
  release_tx_hash TEXT,
  refund_tx_hash TEXT,

  created_at_ms BIGINT NOT NULL,
  updated_at_ms BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_deals_advertiser ON deals(advertiser_id, created_at_ms);"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_deals_channel ON deals(channel_id, created_at_ms);"#)
        .execute(pool)
        .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_deals_status ON deals(status);"#)
        .execute(pool)
        .await?;

    Ok(())
}
