//! Date-tolerant parsing.
//!
//! Source files mix date layouts freely (ISO timestamps next to `05-03-24`
//! next to unix seconds). Parsing never fails: a value that matches none of
//! the tried layouts becomes null and the caller decides what to do with the
//! gap.

use crate::error::Result;
use crate::utils::{
    datetime_ms, datetime_series, is_datetime_dtype, is_numeric_dtype, millis_to_naive,
    naive_to_millis,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Date-time layouts tried by [`DateFormat::Mixed`], in order.
const MIXED_DATETIME_FORMATS: [&str; 8] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
];

/// Date-only layouts tried by [`DateFormat::Mixed`], in order.
///
/// Day-first layouts come before ISO: `%Y` accepts a two-digit year, so
/// `05-03-24` would otherwise parse as the year 5. Two-digit years come
/// before four-digit ones for the same reason.
const MIXED_DATE_FORMATS: [&str; 10] = [
    "%d-%m-%y",
    "%d-%m-%Y",
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%b %d %Y",
    "%d %b %Y",
    "%B %d, %Y",
];

/// How string dates are parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DateFormat {
    /// Try every known layout per value.
    #[default]
    Mixed,
    /// Only the given strftime layout (date-time first, then date at midnight).
    Fixed(String),
}

impl DateFormat {
    /// Shorthand for [`DateFormat::Fixed`].
    pub fn fixed(fmt: impl Into<String>) -> Self {
        Self::Fixed(fmt.into())
    }

    /// Parse one value, returning `None` when no layout matches.
    pub fn parse(&self, raw: &str) -> Option<NaiveDateTime> {
        let value = raw.trim();
        if value.is_empty() {
            return None;
        }
        match self {
            Self::Fixed(fmt) => parse_with(value, fmt),
            Self::Mixed => parse_mixed(value),
        }
    }
}

fn parse_with(value: &str, fmt: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, fmt).ok().or_else(|| {
        NaiveDate::parse_from_str(value, fmt)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
}

fn parse_mixed(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }

    for fmt in MIXED_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }

    for fmt in MIXED_DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(value, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }

    if value.chars().all(|c| c.is_ascii_digit()) {
        return value
            .parse::<i64>()
            .ok()
            .and_then(epoch_to_millis)
            .and_then(millis_to_naive);
    }

    None
}

/// Interpret an integer as unix seconds or milliseconds.
///
/// Only values inside the plausible range of recent dates are accepted;
/// anything else is not a timestamp.
fn epoch_to_millis(value: i64) -> Option<i64> {
    if value > 1_000_000_000 && value < 2_000_000_000 {
        Some(value * 1000)
    } else if value > 1_000_000_000_000 && value < 2_000_000_000_000 {
        Some(value)
    } else {
        None
    }
}

/// Parse a column into `Datetime[ms]`.
///
/// - temporal columns are cast,
/// - numeric columns are read as epoch seconds or milliseconds,
/// - string columns are parsed per value with `format`.
///
/// Unparseable values become null.
pub fn parse_dates(series: &Series, format: &DateFormat) -> Result<Series> {
    let name = series.name().as_str();

    if is_datetime_dtype(series.dtype()) {
        return Ok(series.cast(&datetime_ms())?);
    }

    let millis: Vec<Option<i64>> = if is_numeric_dtype(series.dtype()) {
        let ints = series.cast(&DataType::Int64)?;
        ints.i64()?
            .into_iter()
            .map(|v| v.and_then(epoch_to_millis))
            .collect()
    } else {
        let strings = series.cast(&DataType::String)?;
        strings
            .str()?
            .into_iter()
            .map(|v| v.and_then(|s| format.parse(s)).map(|dt| naive_to_millis(&dt)))
            .collect()
    };

    let coerced = millis
        .iter()
        .filter(|v| v.is_none())
        .count()
        .saturating_sub(series.null_count());
    if coerced > 0 {
        debug!("{} values in '{}' could not be parsed as dates", coerced, name);
    }

    datetime_series(name, millis)
}

/// Parse the named column in place.
pub fn parse_date_column(mut df: DataFrame, column: &str, format: &DateFormat) -> Result<DataFrame> {
    let parsed = parse_dates(crate::utils::series(&df, column)?, format)?;
    df.with_column(parsed)?;
    Ok(df)
}

/// Replace null dates with `default`.
pub fn fill_null_dates(series: &Series, default: NaiveDateTime) -> Result<Series> {
    let fill = naive_to_millis(&default);
    let millis = series.cast(&datetime_ms())?.cast(&DataType::Int64)?;
    let filled: Vec<Option<i64>> = millis
        .i64()?
        .into_iter()
        .map(|v| Some(v.unwrap_or(fill)))
        .collect();
    datetime_series(series.name().as_str(), filled)
}
