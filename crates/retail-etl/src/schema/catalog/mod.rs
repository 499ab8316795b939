//! Schemas applied by each pipeline.
//!
//! Every entity that is checked both before and after its transform is listed
//! in [`entities`] together with the header renames its cleaner applies, so
//! the post schema can be checked to carry every constraint of the pre
//! schema. Output-only tables (aggregates, rankings, local exports) have a
//! post schema and nothing else.

pub mod file_formats;
pub mod order_fulfillment;
pub mod regional_sales;
pub mod retail;
pub mod sales_analysis;
pub mod sales_etl;
pub mod sales_insights;

use super::TableSchema;
use crate::cleaner::HeaderStyle;

/// A pre/post schema pair for one entity.
pub struct EntitySchemas {
    pub entity: &'static str,
    pub pre: &'static TableSchema,
    pub post: &'static TableSchema,
    /// Renames applied after header normalisation.
    pub renames: &'static [(&'static str, &'static str)],
}

impl EntitySchemas {
    /// Name a raw pre-schema column carries once cleaned.
    pub fn cleaned_name(&self, raw: &str) -> String {
        let name = HeaderStyle::SnakeLower.apply(raw);
        self.renames
            .iter()
            .find(|(from, _)| *from == name)
            .map(|(_, to)| to.to_string())
            .unwrap_or(name)
    }

    /// Constraints of the pre schema the post schema does not carry.
    ///
    /// Empty when the post schema is at least as strict: every pre column
    /// exists after cleaning with a refining type, non-nullable and unique
    /// columns stay so, and every pre check is repeated.
    pub fn loosened_constraints(&self) -> Vec<String> {
        let mut gaps = Vec::new();
        for pre in &self.pre.columns {
            let name = self.cleaned_name(&pre.name);
            let Some(post) = self.post.get(&name) else {
                gaps.push(format!("{}: column '{}' dropped", self.entity, name));
                continue;
            };
            if !post.scalar_type.refines(pre.scalar_type) {
                gaps.push(format!(
                    "{}: '{}' changes type {} -> {}",
                    self.entity, name, pre.scalar_type, post.scalar_type
                ));
            }
            if !pre.nullable && post.nullable {
                gaps.push(format!("{}: '{}' becomes nullable", self.entity, name));
            }
            if pre.unique && !post.unique {
                gaps.push(format!("{}: '{}' loses uniqueness", self.entity, name));
            }
            for check in &pre.checks {
                if !post.checks.contains(check) {
                    gaps.push(format!("{}: '{}' drops {}", self.entity, name, check));
                }
            }
        }
        if self.pre.strict && !self.post.strict {
            gaps.push(format!("{}: post schema is not strict", self.entity));
        }
        gaps
    }
}

/// Every entity validated on both sides of its transform.
pub fn entities() -> Vec<EntitySchemas> {
    vec![
        EntitySchemas {
            entity: "retail.sales",
            pre: &retail::SALES_INPUT,
            post: &retail::SALES_OUTPUT,
            renames: retail::SALES_RENAMES,
        },
        EntitySchemas {
            entity: "retail.products",
            pre: &retail::PRODUCTS_INPUT,
            post: &retail::PRODUCTS_OUTPUT,
            renames: &[],
        },
        EntitySchemas {
            entity: "sales_analysis.sales",
            pre: &sales_analysis::SALES_INPUT,
            post: &sales_analysis::SALES_OUTPUT,
            renames: &[],
        },
        EntitySchemas {
            entity: "sales_analysis.customers",
            pre: &sales_analysis::CUSTOMERS_INPUT,
            post: &sales_analysis::CUSTOMERS_OUTPUT,
            renames: &[],
        },
        EntitySchemas {
            entity: "sales_analysis.products",
            pre: &sales_analysis::PRODUCTS_INPUT,
            post: &sales_analysis::PRODUCTS_OUTPUT,
            renames: &[],
        },
        EntitySchemas {
            entity: "sales_insights.sales",
            pre: &sales_insights::SALES_INPUT,
            post: &sales_insights::SALES_OUTPUT,
            renames: &[],
        },
        EntitySchemas {
            entity: "sales_insights.products",
            pre: &sales_insights::PRODUCTS_INPUT,
            post: &sales_insights::PRODUCTS_OUTPUT,
            renames: &[],
        },
        EntitySchemas {
            entity: "file_formats.sales",
            pre: &file_formats::LAB_SALES_INPUT,
            post: &file_formats::LAB_SALES_OUTPUT,
            renames: &[],
        },
        EntitySchemas {
            entity: "sales_etl.sales",
            pre: &sales_etl::SALES_INPUT,
            post: &sales_etl::SALES_OUTPUT,
            renames: sales_etl::SALES_RENAMES,
        },
        EntitySchemas {
            entity: "regional_sales.sales",
            pre: &regional_sales::SALES_INPUT,
            post: &regional_sales::REGION_TOTALS,
            renames: &[],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_post_schemas_carry_pre_constraints() {
        for entity in entities() {
            assert_eq!(
                entity.loosened_constraints(),
                Vec::<String>::new(),
                "{} loosens its pre schema",
                entity.entity
            );
        }
    }

    #[test]
    fn test_cleaned_name_applies_renames() {
        let sales = entities().remove(0);
        assert_eq!(sales.cleaned_name("qty"), "quantity");
        assert_eq!(sales.cleaned_name("Time stamp"), "timestamp");
        assert_eq!(sales.cleaned_name("proDuct Id"), "product_id");
    }

    #[test]
    fn test_loosened_constraints_detects_gaps() {
        use crate::schema::{Check, ColumnSpec, ScalarType};
        use once_cell::sync::Lazy;

        static PRE: Lazy<TableSchema> = Lazy::new(|| {
            TableSchema::new("pre").column(
                ColumnSpec::new("id", ScalarType::Int)
                    .unique()
                    .check(Check::Gt(0.0)),
            )
        });
        static POST: Lazy<TableSchema> = Lazy::new(|| {
            TableSchema::new("post").column(ColumnSpec::new("id", ScalarType::Str).nullable())
        });

        let pair = EntitySchemas {
            entity: "t",
            pre: &PRE,
            post: &POST,
            renames: &[],
        };
        assert_eq!(pair.loosened_constraints().len(), 4);
    }
}
