//! Basket expansion: one row per (transaction, basket item).
//!
//! ```text
//! { customer_id: C1, date: D, basket: [P1, P2] }   →   C1, D, P1
//!                                                      C1, D, P2
//! { customer_id: C2, date: D, basket: [] }         →   (nothing)
//! ```

use serde_json::{Map, Value};

use crate::error::{FlattenError, FlattenResult, SourceLine};
use crate::models::{BasketItem, FlattenedPurchase, RawTransaction, Transaction};

/// Check the shape of a loaded record and type its basket.
pub fn decode_transaction(raw: &RawTransaction) -> FlattenResult<Transaction> {
    let origin = &raw.origin;

    let customer_id = identifier(&raw.fields, "customer_id", origin)?;

    let date_of_purchase = match raw.fields.get("date_of_purchase") {
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            return Err(FlattenError::InvalidField {
                origin: origin.clone(),
                field: "date_of_purchase",
                expected: "a string",
            })
        }
        None => return Err(missing(origin, "date_of_purchase")),
    };

    let items = match raw.fields.get("basket") {
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(FlattenError::InvalidField {
                origin: origin.clone(),
                field: "basket",
                expected: "an array",
            })
        }
        None => return Err(missing(origin, "basket")),
    };

    let basket = items
        .iter()
        .enumerate()
        .map(|(index, item)| decode_item(item, index, origin))
        .collect::<FlattenResult<Vec<_>>>()?;

    Ok(Transaction {
        origin: origin.clone(),
        customer_id,
        date_of_purchase,
        basket,
    })
}

/// Expand one transaction into its basket rows.
pub fn flatten_transaction(tx: &Transaction) -> Vec<FlattenedPurchase> {
    tx.basket
        .iter()
        .map(|item| FlattenedPurchase {
            origin: tx.origin.clone(),
            customer_id: tx.customer_id.clone(),
            date_of_purchase: tx.date_of_purchase.clone(),
            product_id: item.product_id.clone(),
            attributes: item.attributes.clone(),
        })
        .collect()
}

/// Decode and expand every loaded record.
pub fn flatten(raw: &[RawTransaction]) -> FlattenResult<Vec<FlattenedPurchase>> {
    let mut rows = Vec::new();
    for record in raw {
        let tx = decode_transaction(record)?;
        rows.extend(flatten_transaction(&tx));
    }
    Ok(rows)
}

fn decode_item(item: &Value, index: usize, origin: &SourceLine) -> FlattenResult<BasketItem> {
    let fields = item.as_object().ok_or_else(|| FlattenError::InvalidItem {
        origin: origin.clone(),
        index,
        message: "expected an object".to_string(),
    })?;

    let product_id = match fields.get("product_id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => n.to_string(),
        Some(_) => {
            return Err(FlattenError::InvalidItem {
                origin: origin.clone(),
                index,
                message: "product_id must be a string or an integer".to_string(),
            })
        }
        None => {
            return Err(FlattenError::InvalidItem {
                origin: origin.clone(),
                index,
                message: "missing product_id".to_string(),
            })
        }
    };

    let mut attributes = fields.clone();
    attributes.remove("product_id");

    Ok(BasketItem {
        product_id,
        attributes,
    })
}

/// String or integer key, as a string.
fn identifier(
    fields: &Map<String, Value>,
    field: &'static str,
    origin: &SourceLine,
) -> FlattenResult<String> {
    match fields.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        Some(_) => Err(FlattenError::InvalidField {
            origin: origin.clone(),
            field,
            expected: "a string or an integer",
        }),
        None => Err(missing(origin, field)),
    }
}

fn missing(origin: &SourceLine, field: &'static str) -> FlattenError {
    FlattenError::MissingField {
        origin: origin.clone(),
        field,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::Path;
    use std::sync::Arc;

    fn raw(line: usize, value: Value) -> RawTransaction {
        RawTransaction {
            origin: SourceLine::new(Arc::from(Path::new("tx.json")), line),
            fields: value.as_object().unwrap().clone(),
        }
    }

    #[test]
    fn test_row_count_is_sum_of_basket_lengths() {
        let records = vec![
            raw(1, json!({"customer_id": "C1", "date_of_purchase": "2023-01-02",
                          "basket": [{"product_id": "P1"}, {"product_id": "P2"},
                                     {"product_id": "P1"}]})),
            raw(2, json!({"customer_id": "C2", "date_of_purchase": "2023-01-03", "basket": []})),
            raw(3, json!({"customer_id": "C3", "date_of_purchase": "2023-01-04",
                          "basket": [{"product_id": "P9"}]})),
        ];

        let rows = flatten(&records).unwrap();

        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.customer_id != "C2"));
    }

    #[test]
    fn test_item_fields_copied() {
        let records = vec![raw(
            1,
            json!({"customer_id": "C1", "date_of_purchase": "2023-01-02",
                   "basket": [{"product_id": "P1", "price": 120}]}),
        )];

        let rows = flatten(&records).unwrap();

        assert_eq!(rows[0].customer_id, "C1");
        assert_eq!(rows[0].date_of_purchase, "2023-01-02");
        assert_eq!(rows[0].product_id, "P1");
        assert_eq!(rows[0].attributes["price"], 120);
        assert!(!rows[0].attributes.contains_key("product_id"));
    }

    #[test]
    fn test_integer_ids_accepted() {
        let records = vec![raw(
            1,
            json!({"customer_id": 42, "date_of_purchase": "2023-01-02",
                   "basket": [{"product_id": 7}]}),
        )];

        let rows = flatten(&records).unwrap();
        assert_eq!(rows[0].customer_id, "42");
        assert_eq!(rows[0].product_id, "7");
    }

    #[test]
    fn test_basket_must_be_array() {
        let records = vec![raw(
            4,
            json!({"customer_id": "C1", "date_of_purchase": "2023-01-02", "basket": "P1"}),
        )];

        let err = flatten(&records).unwrap_err();
        assert!(matches!(err, FlattenError::InvalidField { field: "basket", .. }));
        assert!(err.to_string().starts_with("tx.json:4"));
    }

    #[test]
    fn test_missing_date_is_a_flatten_error() {
        let records = vec![raw(1, json!({"customer_id": "C1", "basket": []}))];

        let err = flatten(&records).unwrap_err();
        assert!(matches!(err, FlattenError::MissingField { field: "date_of_purchase", .. }));
    }

    #[test]
    fn test_item_without_product_id() {
        let records = vec![raw(
            1,
            json!({"customer_id": "C1", "date_of_purchase": "2023-01-02",
                   "basket": [{"product_id": "P1"}, {"price": 3}]}),
        )];

        let err = flatten(&records).unwrap_err();
        assert!(matches!(err, FlattenError::InvalidItem { index: 1, .. }));
    }
}
