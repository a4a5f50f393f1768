//! Domain models for the basketweek pipeline.
//!
//! - [`CustomerRecord`] / [`ProductRecord`] - master table rows
//! - [`RawTransaction`] / [`Transaction`] / [`BasketItem`] - transaction input
//! - [`FlattenedPurchase`] / [`JoinedPurchase`] - per-item rows between stages
//! - [`YearWeek`] - ISO week partition key
//! - [`AggregatedRow`] / [`WeeklyRecord`] - aggregation output and its file projection

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::SourceLine;

// =============================================================================
// Master Tables
// =============================================================================

/// Loyalty score as read from the customer master.
///
/// Kept as the verbatim cell text so that grouping and ordering are exact,
/// and written out as a JSON number whenever the text is numeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoyaltyScore(String);

impl LoyaltyScore {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// JSON value written to partition files. An empty cell is `null`.
    pub fn to_json(&self) -> Value {
        if self.0.is_empty() {
            return Value::Null;
        }
        if let Ok(i) = self.0.parse::<i64>() {
            return Value::from(i);
        }
        match self.0.parse::<f64>() {
            Ok(f) if f.is_finite() => Value::from(f),
            _ => Value::String(self.0.clone()),
        }
    }
}

impl fmt::Display for LoyaltyScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for LoyaltyScore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// A row of the customer master.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRecord {
    pub customer_id: String,
    pub loyalty_score: LoyaltyScore,
    /// Remaining master columns, by header name.
    pub extra: BTreeMap<String, String>,
}

/// A row of the product master.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    pub product_id: String,
    pub product_category: String,
    /// Remaining master columns, by header name.
    pub extra: BTreeMap<String, String>,
}

// =============================================================================
// Transactions
// =============================================================================

/// One transaction line as loaded, before its shape is checked.
#[derive(Debug, Clone)]
pub struct RawTransaction {
    pub origin: SourceLine,
    pub fields: Map<String, Value>,
}

/// A transaction with a typed basket.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub origin: SourceLine,
    pub customer_id: String,
    pub date_of_purchase: String,
    pub basket: Vec<BasketItem>,
}

/// One entry of a basket.
#[derive(Debug, Clone, PartialEq)]
pub struct BasketItem {
    pub product_id: String,
    /// Every other item field (price, quantity, ...).
    pub attributes: Map<String, Value>,
}

/// One (transaction, basket item) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedPurchase {
    pub origin: SourceLine,
    pub customer_id: String,
    pub date_of_purchase: String,
    pub product_id: String,
    pub attributes: Map<String, Value>,
}

/// A flattened purchase that matched both master tables.
///
/// Only the columns the aggregation needs are carried over.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedPurchase {
    pub origin: SourceLine,
    pub customer_id: String,
    pub loyalty_score: LoyaltyScore,
    pub product_id: String,
    pub product_category: String,
    pub date_of_purchase: String,
}

// =============================================================================
// ISO Week Key
// =============================================================================

/// ISO 8601 (year, week) partition key.
///
/// Orders numerically, so `2023_2` sorts before `2023_10` even though the
/// display strings do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearWeek {
    pub year: i32,
    pub week: u32,
}

impl YearWeek {
    pub fn new(year: i32, week: u32) -> Self {
        Self { year, week }
    }

    /// ISO week of a calendar date. Dates in late December or early January
    /// may belong to the neighbouring ISO year.
    pub fn from_date(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    /// Output file name for this week's partition.
    pub fn file_name(&self) -> String {
        format!("W={}.json", self)
    }
}

impl fmt::Display for YearWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.year, self.week)
    }
}

impl Serialize for YearWeek {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// =============================================================================
// Aggregation Output
// =============================================================================

/// Distinct purchase dates per (week, customer, product).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedRow {
    pub year_week: YearWeek,
    pub customer_id: String,
    pub loyalty_score: LoyaltyScore,
    pub product_id: String,
    pub product_category: String,
    pub purchase_count: usize,
}

impl AggregatedRow {
    pub fn to_weekly(&self) -> WeeklyRecord<'_> {
        WeeklyRecord {
            customer_id: &self.customer_id,
            loyalty_score: &self.loyalty_score,
            product_id: &self.product_id,
            product_category: &self.product_category,
            purchase_count: self.purchase_count,
        }
    }
}

/// The exact field set written to a weekly partition file.
#[derive(Debug, Serialize)]
pub struct WeeklyRecord<'a> {
    pub customer_id: &'a str,
    pub loyalty_score: &'a LoyaltyScore,
    pub product_id: &'a str,
    pub product_category: &'a str,
    pub purchase_count: usize,
}
