//! Calendar features derived from a datetime column.

use crate::error::Result;
use crate::utils::{datetime_series, datetime_values, naive_to_millis};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use polars::prelude::*;

/// Midnight of the last day of the month holding `dt`.
pub fn month_end(dt: &NaiveDateTime) -> Option<NaiveDateTime> {
    let (year, month) = if dt.month() == 12 {
        (dt.year() + 1, 1)
    } else {
        (dt.year(), dt.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?
        .pred_opt()?
        .and_hms_opt(0, 0, 0)
}

/// `YYYY-MM`.
pub fn year_month(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m").to_string()
}

/// `YYYYQn`.
pub fn quarter_label(dt: &NaiveDateTime) -> String {
    format!("{}Q{}", dt.year(), (dt.month() - 1) / 3 + 1)
}

/// ISO-8601 week number.
pub fn iso_week(dt: &NaiveDateTime) -> i64 {
    i64::from(dt.iso_week().week())
}

/// Full English weekday name.
pub fn weekday_name(dt: &NaiveDateTime) -> String {
    dt.format("%A").to_string()
}

pub fn hour(dt: &NaiveDateTime) -> i64 {
    i64::from(dt.hour())
}

/// Append one column computed from each non-null timestamp of `column`.
pub fn with_date_feature<T, F>(mut df: DataFrame, column: &str, out: &str, f: F) -> Result<DataFrame>
where
    F: Fn(&NaiveDateTime) -> T,
    Series: NamedFrom<Vec<Option<T>>, [Option<T>]>,
{
    let values: Vec<Option<T>> = datetime_values(&df, column)?
        .iter()
        .map(|v| v.as_ref().map(&f))
        .collect();
    df.with_column(Series::new(out.into(), values))?;
    Ok(df)
}

/// Append the month-end bucket of `column` as a datetime column.
pub fn with_month_end(mut df: DataFrame, column: &str, out: &str) -> Result<DataFrame> {
    let millis: Vec<Option<i64>> = datetime_values(&df, column)?
        .iter()
        .map(|v| v.as_ref().and_then(month_end).map(|d| naive_to_millis(&d)))
        .collect();
    df.with_column(datetime_series(out, millis)?)?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::str_values;
    use pretty_assertions::assert_eq;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_month_end() {
        assert_eq!(
            month_end(&at(2024, 2, 10, 5)),
            Some(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap().and_hms_opt(0, 0, 0).unwrap())
        );
        assert_eq!(
            month_end(&at(2023, 12, 31, 23)),
            Some(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap().and_hms_opt(0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_labels() {
        let dt = at(2024, 11, 4, 14);
        assert_eq!(year_month(&dt), "2024-11");
        assert_eq!(quarter_label(&dt), "2024Q4");
        assert_eq!(weekday_name(&dt), "Monday");
        assert_eq!(iso_week(&dt), 45);
        assert_eq!(hour(&dt), 14);
        assert_eq!(iso_week(&at(2021, 1, 1, 0)), 53);
    }

    #[test]
    fn test_with_date_feature_keeps_nulls() {
        let ts = datetime_series("timestamp", vec![Some(naive_to_millis(&at(2024, 3, 1, 9))), None]).unwrap();
        let df = DataFrame::new(vec![ts.into()]).unwrap();
        let df = with_date_feature(df, "timestamp", "month", year_month).unwrap();
        assert_eq!(
            str_values(&df, "month").unwrap(),
            vec![Some("2024-03".to_string()), None]
        );
    }
}
