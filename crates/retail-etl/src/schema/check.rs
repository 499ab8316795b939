//! Value-level column checks.

use crate::error::{EtlError, Result};
use crate::utils::series_str_values;
use polars::prelude::*;
use regex::Regex;
use std::fmt;

/// A predicate evaluated against every non-null value of a column.
///
/// Numeric checks cast the column to `f64`; string checks render values as
/// text. Nulls are never checked here, nullability is a property of the
/// column spec.
#[derive(Debug, Clone)]
pub enum Check {
    Gt(f64),
    Ge(f64),
    Lt(f64),
    Le(f64),
    /// Inclusive on both ends.
    InRange { min: f64, max: f64 },
    /// Character count bounds, inclusive.
    StrLength { min: Option<usize>, max: Option<usize> },
    /// Regex that must match somewhere in the value (anchor it to match whole values).
    Matches(Regex),
    IsIn(Vec<String>),
    /// At least one cased character and no uppercase ones.
    IsLower,
    /// At least one cased character and no lowercase ones.
    IsUpper,
    FirstCharUpper,
    /// Not empty after trimming.
    NonEmpty,
}

impl Check {
    /// Compile a regex check.
    pub fn matches(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Self::Matches)
            .map_err(|e| EtlError::InvalidConfig(format!("invalid pattern '{pattern}': {e}")))
    }

    pub fn is_in<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::IsIn(values.into_iter().map(Into::into).collect())
    }

    pub fn max_len(max: usize) -> Self {
        Self::StrLength {
            min: None,
            max: Some(max),
        }
    }

    pub fn len_between(min: usize, max: usize) -> Self {
        Self::StrLength {
            min: Some(min),
            max: Some(max),
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Gt(_) | Self::Ge(_) | Self::Lt(_) | Self::Le(_) | Self::InRange { .. }
        )
    }

    fn passes_number(&self, v: f64) -> bool {
        match self {
            Self::Gt(bound) => v > *bound,
            Self::Ge(bound) => v >= *bound,
            Self::Lt(bound) => v < *bound,
            Self::Le(bound) => v <= *bound,
            Self::InRange { min, max } => v >= *min && v <= *max,
            _ => true,
        }
    }

    fn passes_str(&self, v: &str) -> bool {
        match self {
            Self::StrLength { min, max } => {
                let len = v.chars().count();
                min.is_none_or(|m| len >= m) && max.is_none_or(|m| len <= m)
            }
            Self::Matches(regex) => regex.is_match(v),
            Self::IsIn(allowed) => allowed.iter().any(|a| a == v),
            Self::IsLower => is_lower(v),
            Self::IsUpper => is_upper(v),
            Self::FirstCharUpper => v.chars().next().is_some_and(char::is_uppercase),
            Self::NonEmpty => !v.trim().is_empty(),
            _ => true,
        }
    }

    /// Rows whose value fails this check, with the rendered value.
    pub fn failures(&self, series: &Series) -> Result<Vec<(usize, String)>> {
        let mut failed = Vec::new();
        if self.is_numeric() {
            let values = series.cast(&DataType::Float64)?;
            for (row, value) in values.f64()?.into_iter().enumerate() {
                if let Some(v) = value
                    && !self.passes_number(v)
                {
                    failed.push((row, v.to_string()));
                }
            }
        } else {
            for (row, value) in series_str_values(series)?.into_iter().enumerate() {
                if let Some(v) = value
                    && !self.passes_str(&v)
                {
                    failed.push((row, v));
                }
            }
        }
        Ok(failed)
    }
}

fn is_lower(v: &str) -> bool {
    let mut cased = false;
    for c in v.chars() {
        if c.is_uppercase() {
            return false;
        }
        cased |= c.is_lowercase();
    }
    cased
}

fn is_upper(v: &str) -> bool {
    let mut cased = false;
    for c in v.chars() {
        if c.is_lowercase() {
            return false;
        }
        cased |= c.is_uppercase();
    }
    cased
}

fn fmt_bound(f: &mut fmt::Formatter<'_>, bound: Option<usize>) -> fmt::Result {
    match bound {
        Some(b) => write!(f, "{b}"),
        None => f.write_str("None"),
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gt(b) => write!(f, "greater_than({b})"),
            Self::Ge(b) => write!(f, "greater_than_or_equal_to({b})"),
            Self::Lt(b) => write!(f, "less_than({b})"),
            Self::Le(b) => write!(f, "less_than_or_equal_to({b})"),
            Self::InRange { min, max } => write!(f, "in_range({min}, {max})"),
            Self::StrLength { min, max } => {
                f.write_str("str_length(")?;
                fmt_bound(f, *min)?;
                f.write_str(", ")?;
                fmt_bound(f, *max)?;
                f.write_str(")")
            }
            Self::Matches(regex) => write!(f, "str_matches('{}')", regex.as_str()),
            Self::IsIn(values) => write!(f, "isin([{}])", values.join(", ")),
            Self::IsLower => f.write_str("str_is_lower"),
            Self::IsUpper => f.write_str("str_is_upper"),
            Self::FirstCharUpper => f.write_str("str_first_char_upper"),
            Self::NonEmpty => f.write_str("str_non_empty"),
        }
    }
}

impl PartialEq for Check {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Matches(a), Self::Matches(b)) => a.as_str() == b.as_str(),
            (Self::Matches(_), _) | (_, Self::Matches(_)) => false,
            _ => self.to_string() == other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_numeric_checks_skip_nulls() {
        let s = Series::new("discount".into(), &[Some(0.1), None, Some(1.5), Some(-0.2)]);
        let failed = Check::InRange { min: 0.0, max: 1.0 }.failures(&s).unwrap();
        assert_eq!(failed, vec![(2, "1.5".to_string()), (3, "-0.2".to_string())]);
    }

    #[test]
    fn test_integer_values_render_without_fraction() {
        let s = Series::new("customer_id".into(), &[3i64, -4]);
        let failed = Check::Gt(0.0).failures(&s).unwrap();
        assert_eq!(failed, vec![(1, "-4".to_string())]);
    }

    #[test]
    fn test_case_checks_follow_cased_characters() {
        assert!(is_lower("north america"));
        assert!(!is_lower("North"));
        assert!(!is_lower("123"));
        assert!(is_upper("BRANDX-2"));
        assert!(!is_upper("BrandX"));
    }

    #[test]
    fn test_string_checks() {
        let s = Series::new("brand".into(), &["BrandA", "brandb", "BrandAB", ""]);
        let check = Check::matches("^Brand[A-Z]$").unwrap();
        let rows: Vec<usize> = check.failures(&s).unwrap().into_iter().map(|(r, _)| r).collect();
        assert_eq!(rows, vec![1, 2, 3]);

        let rows: Vec<usize> = Check::NonEmpty
            .failures(&s)
            .unwrap()
            .into_iter()
            .map(|(r, _)| r)
            .collect();
        assert_eq!(rows, vec![3]);

        // "brandb" is six characters and within bounds
        let rows: Vec<usize> = Check::len_between(1, 6)
            .failures(&s)
            .unwrap()
            .into_iter()
            .map(|(r, _)| r)
            .collect();
        assert_eq!(rows, vec![2, 3]);
    }

    #[test]
    fn test_is_in() {
        let s = Series::new("segment".into(), &["Low", "VIP", "Gold"]);
        let failed = Check::is_in(["Low", "Medium", "High", "VIP"]).failures(&s).unwrap();
        assert_eq!(failed, vec![(2, "Gold".to_string())]);
    }

    #[test]
    fn test_display_and_equality() {
        assert_eq!(Check::InRange { min: 0.0, max: 1.0 }.to_string(), "in_range(0, 1)");
        assert_eq!(Check::max_len(100).to_string(), "str_length(None, 100)");
        assert_eq!(Check::Gt(0.0), Check::Gt(0.0));
        assert_ne!(Check::Gt(0.0), Check::Ge(0.0));
        assert_eq!(Check::matches("^a$").unwrap(), Check::matches("^a$").unwrap());
        assert!(Check::matches("(").is_err());
    }
}
