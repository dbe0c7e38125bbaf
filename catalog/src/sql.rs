//! Row decoding and value conversions shared by the sqlx repositories.
//!
//! Storage conventions: ids are UUID text, timestamps are epoch
//! milliseconds, booleans are 0/1 integers.

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::any::AnyRow;
use uuid::Uuid;

pub fn uuid_col(r: &AnyRow, col: &str) -> anyhow::Result<Uuid> {
    let s: String = r.try_get(col)?;
    Uuid::parse_str(&s).with_context(|| format!("invalid uuid in column {col}"))
}

pub fn time_col(r: &AnyRow, col: &str) -> anyhow::Result<DateTime<Utc>> {
    millis_to_utc(r.try_get(col)?)
}

pub fn opt_time_col(r: &AnyRow, col: &str) -> anyhow::Result<Option<DateTime<Utc>>> {
    r.try_get::<Option<i64>, _>(col)?
        .map(millis_to_utc)
        .transpose()
}

pub fn flag_col(r: &AnyRow, col: &str) -> anyhow::Result<bool> {
    Ok(r.try_get::<i64, _>(col)? != 0)
}

pub fn u32_col(r: &AnyRow, col: &str) -> anyhow::Result<u32> {
    i64_to_u32(r.try_get(col)?)
}

pub fn millis_to_utc(ms: i64) -> anyhow::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("timestamp out of range: {ms}"))
}

pub fn utc_to_millis(t: &DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

pub fn flag(v: bool) -> i64 {
    i64::from(v)
}

pub fn i64_to_u32(v: i64) -> anyhow::Result<u32> {
    u32::try_from(v).map_err(|_| anyhow!("out of range for u32: {v}"))
}
