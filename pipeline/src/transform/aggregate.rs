//! Weekly aggregation: distinct purchase dates per (week, customer, product).
//!
//! ```text
//! 2023_1  C1  P1  2023-01-02 ┐
//! 2023_1  C1  P1  2023-01-02 ├─→  2023_1  C1  P1  purchase_count = 2
//! 2023_1  C1  P1  2023-01-04 ┘
//! ```

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use super::bucket::BucketedPurchase;
use crate::models::{AggregatedRow, LoyaltyScore, YearWeek};

/// Grouping key. Field order is the output sort order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct GroupKey {
    year_week: YearWeek,
    customer_id: String,
    product_id: String,
    loyalty_score: LoyaltyScore,
    product_category: String,
}

/// Group purchases and count distinct calendar dates per group.
///
/// Output is sorted by week (numerically), then customer, then product.
pub fn aggregate(rows: Vec<BucketedPurchase>) -> Vec<AggregatedRow> {
    let mut groups: BTreeMap<GroupKey, BTreeSet<NaiveDate>> = BTreeMap::new();

    for row in rows {
        let p = row.purchase;
        let key = GroupKey {
            year_week: row.year_week,
            customer_id: p.customer_id,
            product_id: p.product_id,
            loyalty_score: p.loyalty_score,
            product_category: p.product_category,
        };
        groups.entry(key).or_default().insert(row.date);
    }

    groups
        .into_iter()
        .map(|(key, dates)| AggregatedRow {
            year_week: key.year_week,
            customer_id: key.customer_id,
            loyalty_score: key.loyalty_score,
            product_id: key.product_id,
            product_category: key.product_category,
            purchase_count: dates.len(),
        })
        .collect()
}
