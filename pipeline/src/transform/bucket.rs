//! ISO week bucketing of purchase dates.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::{DateParseError, SourceLine};
use crate::models::{JoinedPurchase, YearWeek};

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// A joined purchase with its calendar date and week key.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketedPurchase {
    pub year_week: YearWeek,
    pub date: NaiveDate,
    pub purchase: JoinedPurchase,
}

/// Parse a purchase date into its calendar date.
///
/// Accepts a bare `YYYY-MM-DD`, a naive date-time with space or `T`
/// separator (optional fractional seconds), or an RFC 3339 timestamp.
/// The time of day is discarded.
pub fn parse_purchase_date(value: &str, origin: &SourceLine) -> Result<NaiveDate, DateParseError> {
    let trimmed = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.date_naive());
    }

    Err(DateParseError {
        origin: origin.clone(),
        value: value.to_string(),
    })
}

/// Attach the ISO week key to every purchase. The first bad date aborts.
pub fn bucket(rows: Vec<JoinedPurchase>) -> Result<Vec<BucketedPurchase>, DateParseError> {
    rows.into_iter()
        .map(|purchase| {
            let date = parse_purchase_date(&purchase.date_of_purchase, &purchase.origin)?;
            Ok(BucketedPurchase {
                year_week: YearWeek::from_date(date),
                date,
                purchase,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;

    fn origin() -> SourceLine {
        SourceLine::new(Arc::from(Path::new("tx.json")), 9)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_accepted_date_forms() {
        let o = origin();
        assert_eq!(parse_purchase_date("2023-01-02", &o).unwrap(), date(2023, 1, 2));
        assert_eq!(parse_purchase_date("2018-12-01 09:48:00", &o).unwrap(), date(2018, 12, 1));
        assert_eq!(
            parse_purchase_date("2018-12-01T23:59:59.123456", &o).unwrap(),
            date(2018, 12, 1)
        );
        assert_eq!(
            parse_purchase_date("2018-12-01T10:00:00+02:00", &o).unwrap(),
            date(2018, 12, 1)
        );
    }

    #[test]
    fn test_invalid_dates() {
        let o = origin();
        for bad in ["", "yesterday", "2023-02-30", "01/02/2023"] {
            let err = parse_purchase_date(bad, &o).unwrap_err();
            assert_eq!(err.value, bad);
        }
        let err = parse_purchase_date("2023-13-01", &o).unwrap_err();
        assert!(err.to_string().contains("tx.json:9"));
    }

    #[test]
    fn test_bucket_assigns_iso_week() {
        let purchase = |d: &str| JoinedPurchase {
            origin: origin(),
            customer_id: "C1".into(),
            loyalty_score: crate::models::LoyaltyScore::new("5"),
            product_id: "P1".into(),
            product_category: "snacks".into(),
            date_of_purchase: d.into(),
        };

        let rows = bucket(vec![purchase("2023-01-01"), purchase("2023-01-02 08:00:00")]).unwrap();

        assert_eq!(rows[0].year_week, YearWeek::new(2022, 52));
        assert_eq!(rows[1].year_week, YearWeek::new(2023, 1));
        assert_eq!(rows[1].date, date(2023, 1, 2));
    }
}
