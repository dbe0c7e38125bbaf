use std::time::Duration;

use crate::error::DealError;
use crate::model::PageRequest;

#[derive(Clone, Debug)]
pub struct DealConfig {
    /// Database connection string.
    pub database_url: String,

    // =========================
    // Pagination
    // =========================
    /// Page size used when a caller asks for a zero-sized page.
    pub default_page_size: u32,

    /// Upper bound on any page size; larger requests are clamped.
    pub max_page_size: u32,

    // =========================
    // Observability
    // =========================
    /// Repository calls slower than this log a `performance` warning.
    pub slow_query_threshold: Duration,

    // =========================
    // Payments
    // =========================
    /// Escrow wallet snapshotted into every new deal, if configured.
    pub escrow_wallet_address: Option<String>,
}

const DEFAULT_DATABASE_URL: &str = "sqlite://deals_dev.db";
const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;
const SLOW_QUERY_MS: u64 = 100;

impl Default for DealConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            slow_query_threshold: Duration::from_millis(SLOW_QUERY_MS),
            escrow_wallet_address: None,
        }
    }
}

impl DealConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Unparseable numbers
    /// fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let default_page_size = parse_or(&lookup, "DEALS_DEFAULT_PAGE_SIZE", DEFAULT_PAGE_SIZE);
        let max_page_size = parse_or(&lookup, "DEALS_MAX_PAGE_SIZE", MAX_PAGE_SIZE);
        let slow_ms = parse_or(&lookup, "DEALS_SLOW_QUERY_MS", SLOW_QUERY_MS);

        let escrow_wallet_address = lookup("ESCROW_WALLET_ADDRESS")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Self {
            database_url,
            default_page_size,
            max_page_size,
            slow_query_threshold: Duration::from_millis(slow_ms),
            escrow_wallet_address,
        }
    }

    /// Zero limit becomes the default page size; anything above the
    /// maximum is capped. Offsets must fit a signed 64-bit column.
    pub fn clamp_page(&self, page: PageRequest) -> Result<PageRequest, DealError> {
        if i64::try_from(page.offset).is_err() {
            return Err(DealError::validation("offset", "out of range"));
        }

        let limit = match page.limit {
            0 => self.default_page_size,
            n => n,
        };
        Ok(PageRequest {
            limit: limit.min(self.max_page_size),
            offset: page.offset,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %raw, "invalid config value, using default");
                default
            }
        },
        None => default,
    }
}
