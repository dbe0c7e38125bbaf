use chrono::{Duration, Utc};
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use uuid::Uuid;

use catalog::directory::PostStore;
use catalog::directory_sqlx::SqlxPostStore;
use catalog::model::{AdFormatType, FormatTerms, PostContent};
use deal::config::DealConfig;
use deal::db::Db;
use deal::model::{CreateDealRequest, FormatOffer, NewDeal, PageRequest};
use deal::repository::{DealRepository, TransactionRunner};
use deal::repository_sqlx::{SqlxDealRepository, SqlxTransactionRunner};
use deal::{Actor, DealEngine, DealError, DealStatus};

const PRICE: i64 = 5_000_000_000;
const CHANNEL: i64 = -1001234567890;

fn db_url() -> String {
    format!("sqlite:file:{}?mode=memory&cache=shared", Uuid::new_v4())
}

/// Isolated in-memory database on a single connection, so a dropped
/// transaction's rollback is ordered before the next statement.
async fn setup_db() -> AnyPool {
    sqlx::any::install_default_drivers();

    let pool = AnyPoolOptions::new()
        .max_connections(1)
        .connect(&db_url())
        .await
        .unwrap();

    Db { pool: pool.clone() }.migrate().await.unwrap();
    pool
}

fn engine(pool: &AnyPool) -> DealEngine {
    DealEngine::with_pool(
        pool.clone(),
        DealConfig {
            escrow_wallet_address: Some("EQ-escrow".into()),
            ..DealConfig::default()
        },
    )
}

fn terms() -> FormatTerms {
    FormatTerms {
        format_type: AdFormatType::Post,
        is_native: false,
        feed_hours: 24,
        top_hours: 2,
    }
}

struct Seeded {
    channel_id: Uuid,
    advertiser: Actor,
    owner: Actor,
    template_id: Uuid,
}

async fn insert_user(pool: &AnyPool, tg: i64, wallet: Option<&str>) -> Actor {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, telegram_id, name, wallet_address, created_at_ms) VALUES (?, ?, 'u', ?, 0)")
        .bind(id.to_string())
        .bind(tg)
        .bind(wallet.map(str::to_string))
        .execute(pool)
        .await
        .unwrap();
    Actor::new(id, tg)
}

async fn insert_template(pool: &AnyPool, owner: Uuid, group: Option<&str>, position: i64, text: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO posts (id, kind, external_id, position, name, media_group_id, text, created_at_ms) VALUES (?, 'template', ?, ?, ?, ?, ?, 1)",
    )
    .bind(id.to_string())
    .bind(owner.to_string())
    .bind(position)
    .bind((position == 0).then(|| "promo".to_string()))
    .bind(group.map(str::to_string))
    .bind(text.to_string())
    .execute(pool)
    .await
    .unwrap();
    id
}

async fn seed(pool: &AnyPool) -> Seeded {
    let owner = insert_user(pool, 100, Some("EQ-owner")).await;
    let advertiser = insert_user(pool, 200, Some("EQ-advertiser")).await;

    let channel_id = Uuid::new_v4();
    sqlx::query("INSERT INTO channels (id, external_id, title, is_listed, created_at_ms) VALUES (?, ?, 'Crypto Daily', 1, 0)")
        .bind(channel_id.to_string())
        .bind(CHANNEL)
        .execute(pool)
        .await
        .unwrap();

    sqlx::query("INSERT INTO channel_roles (channel_id, user_id, role, created_at_ms) VALUES (?, ?, 'owner', 0)")
        .bind(channel_id.to_string())
        .bind(owner.user_id.to_string())
        .execute(pool)
        .await
        .unwrap();

    sqlx::query("INSERT INTO channel_ad_formats VALUES (?, ?, 'post', 0, 24, 2, ?, 0)")
        .bind(Uuid::new_v4().to_string())
        .bind(channel_id.to_string())
        .bind(PRICE)
        .execute(pool)
        .await
        .unwrap();

    let template_id = insert_template(pool, advertiser.user_id, None, 0, "Buy TON today").await;

    Seeded {
        channel_id,
        advertiser,
        owner,
        template_id,
    }
}

fn request(template_post_id: Uuid) -> CreateDealRequest {
    CreateDealRequest {
        channel_external_id: CHANNEL,
        format: FormatOffer {
            terms: terms(),
            price_nano_ton: PRICE,
        },
        template_post_id,
        scheduled_at: Utc::now() + Duration::hours(24),
    }
}

fn new_deal(seeded: &Seeded) -> NewDeal {
    NewDeal {
        id: Uuid::now_v7(),
        channel_id: seeded.channel_id,
        advertiser_id: seeded.advertiser.user_id,
        scheduled_at: Utc::now() + Duration::hours(24),
        escrow_wallet_address: None,
        advertiser_wallet_address: None,
        payout_wallet_address: None,
        terms: terms(),
        price_nano_ton: PRICE,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn full_review_cycle_against_sqlite() {
    let db = Db::connect(&db_url()).await.unwrap();
    db.migrate().await.unwrap();
    let pool = db.pool.clone();

    let seeded = seed(&pool).await;
    let engine = engine(&pool);
    let repo = SqlxDealRepository::new(pool.clone());

    let created = engine
        .create_deal(Some(&seeded.advertiser), request(seeded.template_id))
        .await
        .unwrap();
    let id = created.deal.id;

    assert_eq!(created.deal.status, DealStatus::PendingPayment);
    assert_eq!(created.deal.escrow_wallet_address.as_deref(), Some("EQ-escrow"));
    assert_eq!(created.deal.advertiser_wallet_address.as_deref(), Some("EQ-advertiser"));
    assert_eq!(created.deal.payout_wallet_address.as_deref(), Some("EQ-owner"));
    assert!(created.deal.posted_message_ids.is_empty());
    assert_eq!(created.ad.len(), 1);
    assert_eq!(created.ad[0].version, Some(1));
    assert_eq!(created.ad[0].content.text.as_deref(), Some("Buy TON today"));
    assert_eq!(created.ad[0].content.name.as_deref(), Some("promo"));

    // payment confirmation happens outside the engine
    assert!(
        repo.transition_status(
            &id,
            DealStatus::PendingPayment,
            DealStatus::PendingReview,
            None,
            Utc::now()
        )
        .await
        .unwrap()
    );

    let d = engine
        .request_changes(Some(&seeded.owner), &id, "shorter please")
        .await
        .unwrap();
    assert_eq!(d.status, DealStatus::ChangesRequested);
    assert_eq!(d.publisher_note.as_deref(), Some("shorter please"));

    let rev = engine
        .submit_revision(
            Some(&seeded.advertiser),
            &id,
            vec![PostContent {
                text: Some("Buy TON".into()),
                ..Default::default()
            }],
        )
        .await
        .unwrap();
    assert_eq!(rev.version, 2);

    let view = engine.get_deal(Some(&seeded.owner), &id).await.unwrap();
    assert_eq!(view.deal.status, DealStatus::PendingReview);
    assert!(view.deal.publisher_note.is_none());
    assert_eq!(view.channel_external_id, CHANNEL);
    assert_eq!(view.ad.len(), 1);
    assert_eq!(view.ad[0].content.text.as_deref(), Some("Buy TON"));

    let approved = engine.approve(Some(&seeded.owner), &id).await.unwrap();
    assert_eq!(approved.status, DealStatus::Approved);

    let err = engine
        .cancel(Some(&seeded.advertiser), &id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DealError::InvalidTransition {
            from: DealStatus::Approved,
            to: DealStatus::Cancelled
        }
    ));

    let mine = engine
        .list_advertiser_deals(Some(&seeded.advertiser), PageRequest::page(1, 20))
        .await
        .unwrap();
    assert_eq!(mine.total, 1);
    assert_eq!(mine.items[0].channel_external_id, CHANNEL);

    let theirs = engine
        .list_publisher_deals(Some(&seeded.owner), CHANNEL, PageRequest::page(1, 20))
        .await
        .unwrap();
    assert_eq!(theirs.total, 1);
    assert_eq!(theirs.items[0].deal.status, DealStatus::Approved);

    let history = engine
        .get_ad_history(Some(&seeded.advertiser), &id)
        .await
        .unwrap();
    assert_eq!(history.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
}

#[tokio::test]
async fn conditional_update_ignores_stale_expectations() {
    let pool = setup_db().await;
    let seeded = seed(&pool).await;
    let repo = SqlxDealRepository::new(pool.clone());
    let runner = SqlxTransactionRunner::new(pool.clone());

    let new = new_deal(&seeded);
    let mut tx = runner.begin().await.unwrap();
    tx.insert_deal(&new).await.unwrap();
    tx.commit().await.unwrap();

    let moved = repo
        .transition_status(
            &new.id,
            DealStatus::PendingReview,
            DealStatus::Approved,
            None,
            Utc::now(),
        )
        .await
        .unwrap();
    assert!(!moved);

    let stored = repo.get_by_id(&new.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DealStatus::PendingPayment);

    let moved = repo
        .transition_status(
            &Uuid::new_v4(),
            DealStatus::PendingPayment,
            DealStatus::Cancelled,
            None,
            Utc::now(),
        )
        .await
        .unwrap();
    assert!(!moved);
}

#[tokio::test]
async fn dropped_transaction_rolls_back() {
    let pool = setup_db().await;
    let seeded = seed(&pool).await;
    let repo = SqlxDealRepository::new(pool.clone());
    let runner = SqlxTransactionRunner::new(pool.clone());

    let new = new_deal(&seeded);
    {
        let mut tx = runner.begin().await.unwrap();
        let inserted = tx.insert_deal(&new).await.unwrap();
        assert_eq!(inserted.status, DealStatus::PendingPayment);
        tx.copy_as_first_ad_version(&seeded.template_id, &new.id)
            .await
            .unwrap();
        // dropped here without commit
    }

    assert!(repo.get_by_id(&new.id).await.unwrap().is_none());
    let posts = SqlxPostStore::new(pool.clone());
    assert!(posts.get_latest_ad_version(&new.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleted_template_is_refused() {
    let pool = setup_db().await;
    let seeded = seed(&pool).await;
    let engine = engine(&pool);

    // soft-deleted templates are no longer usable
    sqlx::query("UPDATE posts SET deleted_at_ms = 5 WHERE id = ?")
        .bind(seeded.template_id.to_string())
        .execute(&pool)
        .await
        .unwrap();

    let err = engine
        .create_deal(Some(&seeded.advertiser), request(seeded.template_id))
        .await
        .unwrap_err();
    assert!(matches!(err, DealError::Forbidden));

    let page = engine
        .list_advertiser_deals(Some(&seeded.advertiser), PageRequest::page(1, 20))
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn album_template_is_copied_in_order() {
    let pool = setup_db().await;
    let seeded = seed(&pool).await;
    let engine = engine(&pool);

    let group = Uuid::new_v4().to_string();
    let owner = seeded.advertiser.user_id;
    insert_template(&pool, owner, Some(&group), 1, "second").await;
    let first = insert_template(&pool, owner, Some(&group), 0, "first").await;

    let created = engine
        .create_deal(Some(&seeded.advertiser), request(first))
        .await
        .unwrap();

    let texts: Vec<_> = created
        .ad
        .iter()
        .map(|p| p.content.text.clone().unwrap())
        .collect();
    assert_eq!(texts, vec!["first", "second"]);

    let copied_group = created.ad[0].media_group_id.clone().unwrap();
    assert_ne!(copied_group, group);
    assert_eq!(created.ad[1].media_group_id.as_deref(), Some(copied_group.as_str()));
    assert_eq!(created.ad[0].content.name.as_deref(), Some("promo"));
    assert!(created.ad[1].content.name.is_none());
}

#[tokio::test]
async fn unknown_status_rows_are_errors_not_guesses() {
    let pool = setup_db().await;
    let seeded = seed(&pool).await;
    let repo = SqlxDealRepository::new(pool.clone());
    let runner = SqlxTransactionRunner::new(pool.clone());

    let good = new_deal(&seeded);
    let mut tx = runner.begin().await.unwrap();
    tx.insert_deal(&good).await.unwrap();
    tx.commit().await.unwrap();

    let bad = Uuid::new_v4();
    sqlx::query(
        r#"
INSERT INTO deals (id, channel_id, advertiser_id, status, scheduled_at_ms, format_type, is_native,
                   feed_hours, top_hours, price_nano_ton, created_at_ms, updated_at_ms)
VALUES (?, ?, ?, 'paid', 0, 'post', 0, 24, 2, 1, 0, 0)
"#,
    )
    .bind(bad.to_string())
    .bind(seeded.channel_id.to_string())
    .bind(seeded.advertiser.user_id.to_string())
    .execute(&pool)
    .await
    .unwrap();

    assert!(repo.get_by_id(&bad).await.is_err());

    // listings skip the poison row but still count it
    let (deals, total) = repo
        .list_by_advertiser(&seeded.advertiser.user_id, 20, 0)
        .await
        .unwrap();
    assert_eq!(deals.len(), 1);
    assert_eq!(deals[0].id, good.id);
    assert_eq!(total, 2);
}

#[tokio::test]
async fn latest_version_counts_from_zero() {
    let pool = setup_db().await;
    let seeded = seed(&pool).await;
    let runner = SqlxTransactionRunner::new(pool.clone());

    let new = new_deal(&seeded);
    let mut tx = runner.begin().await.unwrap();
    tx.insert_deal(&new).await.unwrap();
    assert_eq!(tx.latest_ad_version(&new.id).await.unwrap(), 0);

    let v1 = tx
        .append_ad_version(
            &new.id,
            1,
            &[
                PostContent {
                    text: Some("a".into()),
                    ..Default::default()
                },
                PostContent {
                    text: Some("b".into()),
                    ..Default::default()
                },
            ],
        )
        .await
        .unwrap();
    assert_eq!(v1.len(), 2);
    assert!(v1[0].media_group_id.is_some());
    assert_eq!(tx.latest_ad_version(&new.id).await.unwrap(), 1);
    tx.commit().await.unwrap();
}

#[tokio::test]
async fn engine_connects_from_config() {
    let url = db_url();
    let engine = DealEngine::connect(DealConfig {
        database_url: url.clone(),
        ..DealConfig::default()
    })
    .await
    .unwrap();

    // a second pool on the same shared-cache database sees the migrated schema
    let pool = AnyPoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await
        .unwrap();
    let seeded = seed(&pool).await;

    let created = engine
        .create_deal(Some(&seeded.advertiser), request(seeded.template_id))
        .await
        .unwrap();
    assert!(created.deal.escrow_wallet_address.is_none());

    let view = engine
        .get_deal(Some(&seeded.owner), &created.deal.id)
        .await
        .unwrap();
    assert_eq!(view.deal, created.deal);
}
