pub mod schema;

use anyhow::Context;
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;

#[derive(Clone)]
pub struct Db {
    pub pool: AnyPool,
}

impl Db {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(16)
            .connect(database_url)
            .await
            .with_context(|| format!("connecting to {database_url}"))?;

        Ok(Self { pool })
    }

    /// Catalog tables first, then the deal tables that refer to them.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        catalog::schema::migrate(&self.pool).await?;
        schema::migrate(&self.pool).await
    }
}
