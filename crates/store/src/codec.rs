//! TEXT-column encoding for `Decimal`/date/time types. sqlx's sqlite driver
//! has no native `Decimal` support in this workspace's feature set, so
//! monetary/quantity fields round-trip through their canonical string
//! form instead of `f64`, unlike the teacher's `portfolio-manager::portfolio`
//! which binds `to_f64()` and accepts the precision loss.

use chrono::{DateTime, NaiveDate, Utc};
use core_types::CoreError;
use rust_decimal::Decimal;
use std::str::FromStr;

pub fn decimal_to_text(d: Decimal) -> String {
    d.to_string()
}

pub fn opt_decimal_to_text(d: Option<Decimal>) -> Option<String> {
    d.map(|v| v.to_string())
}

pub fn text_to_decimal(s: &str) -> CoreResult<Decimal> {
    Decimal::from_str(s).map_err(|e| CoreError::ProviderInvalid(format!("bad decimal {s:?}: {e}")))
}

pub fn text_to_opt_decimal(s: Option<String>) -> CoreResult<Option<Decimal>> {
    s.map(|v| text_to_decimal(&v)).transpose()
}

pub fn date_to_text(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

pub fn text_to_date(s: &str) -> CoreResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| CoreError::ProviderInvalid(format!("bad date {s:?}: {e}")))
}

pub fn datetime_to_text(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

pub fn text_to_datetime(s: &str) -> CoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CoreError::ProviderInvalid(format!("bad datetime {s:?}: {e}")))
}

pub fn opt_datetime_to_text(dt: Option<DateTime<Utc>>) -> Option<String> {
    dt.map(|v| v.to_rfc3339())
}

pub fn text_to_opt_datetime(s: Option<String>) -> CoreResult<Option<DateTime<Utc>>> {
    s.map(|v| text_to_datetime(&v)).transpose()
}

type CoreResult<T> = core_types::CoreResult<T>;
