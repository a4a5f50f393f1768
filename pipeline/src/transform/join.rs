//! Inner join of flattened purchases against the product and customer masters.
//!
//! Rows whose `product_id` or `customer_id` has no master row are dropped
//! without error; the drop counts are reported in [`JoinOutcome`].

use std::collections::HashMap;

use tracing::{info, warn};

use crate::error::{JoinError, JoinResult, MasterTable};
use crate::models::{CustomerRecord, FlattenedPurchase, JoinedPurchase, ProductRecord};

/// Master tables indexed by key.
#[derive(Debug)]
pub struct MasterIndex<'a> {
    customers: HashMap<&'a str, &'a CustomerRecord>,
    products: HashMap<&'a str, &'a ProductRecord>,
}

impl<'a> MasterIndex<'a> {
    /// Index both tables, rejecting duplicate keys.
    pub fn build(
        customers: &'a [CustomerRecord],
        products: &'a [ProductRecord],
    ) -> JoinResult<Self> {
        Ok(Self {
            customers: index_unique(customers, MasterTable::Customers, |c| &c.customer_id)?,
            products: index_unique(products, MasterTable::Products, |p| &p.product_id)?,
        })
    }

    pub fn customer(&self, id: &str) -> Option<&'a CustomerRecord> {
        self.customers.get(id).copied()
    }

    pub fn product(&self, id: &str) -> Option<&'a ProductRecord> {
        self.products.get(id).copied()
    }
}

/// Joined rows plus what was dropped.
#[derive(Debug, Default)]
pub struct JoinOutcome {
    pub rows: Vec<JoinedPurchase>,
    /// Rows whose product_id is not in the product master.
    pub unknown_product: usize,
    /// Rows with a known product but a customer_id not in the customer master.
    pub unknown_customer: usize,
}

impl JoinOutcome {
    pub fn dropped(&self) -> usize {
        self.unknown_product + self.unknown_customer
    }
}

/// Keep the rows that match both masters, with their master columns attached.
pub fn join(rows: Vec<FlattenedPurchase>, index: &MasterIndex<'_>) -> JoinOutcome {
    let mut outcome = JoinOutcome::default();

    for row in rows {
        let Some(product) = index.product(&row.product_id) else {
            outcome.unknown_product += 1;
            continue;
        };
        let Some(customer) = index.customer(&row.customer_id) else {
            outcome.unknown_customer += 1;
            continue;
        };

        outcome.rows.push(JoinedPurchase {
            origin: row.origin,
            customer_id: row.customer_id,
            loyalty_score: customer.loyalty_score.clone(),
            product_id: row.product_id,
            product_category: product.product_category.clone(),
            date_of_purchase: row.date_of_purchase,
        });
    }

    if outcome.dropped() > 0 {
        warn!(
            unknown_product = outcome.unknown_product,
            unknown_customer = outcome.unknown_customer,
            "dropped purchases without a master match"
        );
    }
    info!(rows = outcome.rows.len(), "joined purchases");
    outcome
}

fn index_unique<'a, T>(
    records: &'a [T],
    table: MasterTable,
    key: impl Fn(&'a T) -> &'a String,
) -> JoinResult<HashMap<&'a str, &'a T>> {
    let mut map = HashMap::with_capacity(records.len());
    for record in records {
        let k = key(record).as_str();
        if map.insert(k, record).is_some() {
            return Err(JoinError::DuplicateKey {
                table,
                key: k.to_string(),
            });
        }
    }
    Ok(map)
}
