//! Spend by general-ledger account

use crate::money::{accumulate, round_cents};
use crate::Analytics;
use rust_decimal::Decimal;
use serde::Serialize;
use spendboard_common::errors::Result;
use spendboard_common::{metrics, UNCATEGORIZED};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySpend {
    pub category: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub spend: Decimal,
}

impl Analytics {
    /// Line-item totals grouped by ledger account, largest first. Items
    /// without an account are reported as "Uncategorized".
    #[instrument(skip(self))]
    pub async fn category_spend(&self, limit: usize) -> Result<Vec<CategorySpend>> {
        let start = Instant::now();
        let items = self.store.line_item_totals().await?;

        let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
        for item in &items {
            let category = item
                .general_ledger_account
                .as_deref()
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .unwrap_or(UNCATEGORIZED);
            accumulate(
                totals.entry(category.to_string()).or_default(),
                item.total_price.unwrap_or(Decimal::ZERO),
            )?;
        }

        let mut categories: Vec<CategorySpend> = totals
            .into_iter()
            .map(|(category, spend)| CategorySpend {
                category,
                spend: round_cents(spend),
            })
            .collect();
        // stable sort keeps the name order for equal spend
        categories.sort_by(|a, b| b.spend.cmp(&a.spend));
        categories.truncate(limit);

        metrics::record_query("category_spend", start.elapsed().as_secs_f64(), categories.len());
        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{analytics, date, SeedInvoice};

    #[tokio::test]
    async fn test_groups_by_account_with_fallback() {
        let analytics = analytics(
            date(2024, 3, 15),
            &[
                SeedInvoice::new("a", Some("Acme"), Some(date(2024, 3, 1)), Some(100))
                    .line_item(Some("4400"), Some(Decimal::new(6050, 2)))
                    .line_item(Some(" 4400 "), Some(Decimal::new(3950, 2)))
                    .line_item(None, Some(Decimal::from(25))),
                SeedInvoice::new("b", Some("Globex"), Some(date(2024, 3, 2)), Some(300))
                    .line_item(Some(""), Some(Decimal::from(5)))
                    .line_item(Some("6815"), Some(Decimal::from(300)))
                    .line_item(Some("4900"), None),
            ],
        )
        .await;

        let spend = analytics.category_spend(10).await.unwrap();

        assert_eq!(
            spend,
            vec![
                CategorySpend { category: "6815".into(), spend: Decimal::from(300) },
                CategorySpend { category: "4400".into(), spend: Decimal::from(100) },
                CategorySpend { category: UNCATEGORIZED.into(), spend: Decimal::from(30) },
                CategorySpend { category: "4900".into(), spend: Decimal::ZERO },
            ]
        );
    }

    #[tokio::test]
    async fn test_limit_and_empty_store() {
        let empty = analytics(date(2024, 3, 15), &[]).await;
        assert!(empty.category_spend(10).await.unwrap().is_empty());

        let analytics = analytics(
            date(2024, 3, 15),
            &[SeedInvoice::new("a", None, None, None)
                .line_item(Some("1"), Some(Decimal::from(3)))
                .line_item(Some("2"), Some(Decimal::from(2)))
                .line_item(Some("3"), Some(Decimal::from(1)))],
        )
        .await;
        let top = analytics.category_spend(2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].category, "1");
    }
}
