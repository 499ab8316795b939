//! Key joins between cleaned tables.

use crate::error::{EtlError, Result};
use crate::utils::require_columns;
use polars::prelude::*;
use tracing::info;

/// Join flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
}

impl From<JoinKind> for JoinType {
    fn from(kind: JoinKind) -> Self {
        match kind {
            JoinKind::Inner => JoinType::Inner,
            JoinKind::Left => JoinType::Left,
        }
    }
}

/// Join `left` and `right` on a shared key column.
///
/// Overlapping non-key columns from `right` get a `_right` suffix. Rows keep
/// the order of `left`.
pub fn join_on(left: &DataFrame, right: &DataFrame, key: &str, kind: JoinKind) -> Result<DataFrame> {
    require_columns(left, &[key])?;
    require_columns(right, &[key])?;

    let mut args = JoinArgs::new(kind.into());
    args.maintain_order = MaintainOrderJoin::Left;

    let joined = left
        .clone()
        .lazy()
        .join(right.clone().lazy(), [col(key)], [col(key)], args)
        .collect()?;

    info!(
        "Joined {} x {} rows on '{}' into {} rows",
        left.height(),
        right.height(),
        key,
        joined.height()
    );
    Ok(joined)
}

/// Inner-join a chain of tables, `tables[i + 1]` on `keys[i]`.
///
/// At least two tables are required and there must be one key per join.
pub fn merge_chain(tables: &[DataFrame], keys: &[&str]) -> Result<DataFrame> {
    let (first, rest) = tables.split_first().ok_or_else(|| {
        EtlError::InvalidConfig("at least two tables are required for merging".to_string())
    })?;
    if rest.is_empty() {
        return Err(EtlError::InvalidConfig(
            "at least two tables are required for merging".to_string(),
        ));
    }
    if keys.len() < rest.len() {
        return Err(EtlError::InvalidConfig(format!(
            "{} join keys given for {} joins",
            keys.len(),
            rest.len()
        )));
    }

    let mut merged = first.clone();
    for (table, key) in rest.iter().zip(keys) {
        merged = join_on(&merged, table, key, JoinKind::Inner)?;
    }
    Ok(merged)
}
