//! Loader: master tables and transaction files into typed records.
//!
//! Master files go through [`crate::parser::parse_delimited_file`] (encoding and
//! delimiter detection); transaction files are JSON lines. Any failure aborts
//! the whole load.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use tracing::{debug, info};

use crate::error::{LoadError, LoadResult};
use crate::models::{CustomerRecord, LoyaltyScore, ProductRecord, RawTransaction};
use crate::parser::{parse_delimited_file, parse_json_lines_file, ParseResult};

/// Everything a run reads from disk.
#[derive(Debug, Clone)]
pub struct LoadedInputs {
    pub customers: Vec<CustomerRecord>,
    pub products: Vec<ProductRecord>,
    pub transactions: Vec<RawTransaction>,
}

/// Load both master tables and every transaction file.
pub fn load_inputs(
    customers_path: &Path,
    products_path: &Path,
    transaction_paths: &[PathBuf],
) -> LoadResult<LoadedInputs> {
    Ok(LoadedInputs {
        customers: load_customers(customers_path)?,
        products: load_products(products_path)?,
        transactions: load_transactions(transaction_paths)?,
    })
}

/// Load the customer master (`customer_id`, `loyalty_score`, ...).
pub fn load_customers(path: &Path) -> LoadResult<Vec<CustomerRecord>> {
    let parsed = parse_delimited_file(path)?;
    let id_col = require_column(&parsed, path, "customer_id")?;
    let score_col = require_column(&parsed, path, "loyalty_score")?;

    let customers: Vec<CustomerRecord> = parsed
        .records
        .iter()
        .map(|record| CustomerRecord {
            customer_id: cell(record, id_col),
            loyalty_score: LoyaltyScore::new(cell(record, score_col)),
            extra: extra_columns(&parsed.headers, record, &[id_col, score_col]),
        })
        .collect();

    info!(
        path = %path.display(),
        encoding = %parsed.encoding,
        rows = customers.len(),
        "loaded customer master"
    );
    Ok(customers)
}

/// Load the product master (`product_id`, `product_category`, ...).
pub fn load_products(path: &Path) -> LoadResult<Vec<ProductRecord>> {
    let parsed = parse_delimited_file(path)?;
    let id_col = require_column(&parsed, path, "product_id")?;
    let category_col = require_column(&parsed, path, "product_category")?;

    let products: Vec<ProductRecord> = parsed
        .records
        .iter()
        .map(|record| ProductRecord {
            product_id: cell(record, id_col),
            product_category: cell(record, category_col),
            extra: extra_columns(&parsed.headers, record, &[id_col, category_col]),
        })
        .collect();

    info!(
        path = %path.display(),
        encoding = %parsed.encoding,
        rows = products.len(),
        "loaded product master"
    );
    Ok(products)
}

/// Concatenate transaction files in the given order.
pub fn load_transactions(paths: &[PathBuf]) -> LoadResult<Vec<RawTransaction>> {
    let mut all = Vec::new();

    for path in paths {
        let rows = parse_json_lines_file(path)?;
        debug!(path = %path.display(), rows = rows.len(), "read transaction file");
        all.extend(rows);
    }

    info!(files = paths.len(), rows = all.len(), "loaded transactions");
    Ok(all)
}

fn require_column(parsed: &ParseResult, path: &Path, column: &'static str) -> LoadResult<usize> {
    parsed.column(column).ok_or_else(|| LoadError::MissingColumn {
        path: path.to_path_buf(),
        column,
    })
}

fn cell(record: &StringRecord, idx: usize) -> String {
    record.get(idx).unwrap_or("").to_string()
}

fn extra_columns(
    headers: &[String],
    record: &StringRecord,
    keys: &[usize],
) -> BTreeMap<String, String> {
    headers
        .iter()
        .enumerate()
        .filter(|(i, _)| !keys.contains(i))
        .map(|(i, h)| (h.clone(), cell(record, i)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_customers_keeps_extra_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("customers.csv");
        fs::write(&path, "customer_id,loyalty_score,region\nC1,7,north\nC2,3,south\n").unwrap();

        let customers = load_customers(&path).unwrap();

        assert_eq!(customers.len(), 2);
        assert_eq!(customers[0].customer_id, "C1");
        assert_eq!(customers[0].loyalty_score.as_str(), "7");
        assert_eq!(customers[1].extra["region"], "south");
        assert!(!customers[1].extra.contains_key("customer_id"));
    }

    #[test]
    fn test_load_products_semicolon_master() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("products.csv");
        fs::write(&path, "product_id;description;product_category\nP1;crisps;snacks\n").unwrap();

        let products = load_products(&path).unwrap();

        assert_eq!(products[0].product_id, "P1");
        assert_eq!(products[0].product_category, "snacks");
        assert_eq!(products[0].extra["description"], "crisps");
    }

    #[test]
    fn test_missing_master_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("products.csv");
        fs::write(&path, "product_id,description\nP1,crisps\n").unwrap();

        let err = load_products(&path).unwrap_err();
        assert!(matches!(
            err,
            LoadError::MissingColumn { column: "product_category", .. }
        ));
    }

    #[test]
    fn test_load_inputs_reads_all_three_sources() {
        let dir = tempdir().unwrap();
        let customers = dir.path().join("customers.csv");
        let products = dir.path().join("products.csv");
        let tx = dir.path().join("day1.json");
        fs::write(&customers, "customer_id,loyalty_score\nC1,5\nC2,\n").unwrap();
        fs::write(&products, "product_id,product_category\nP1,snacks\n").unwrap();
        fs::write(&tx, "{\"customer_id\":\"C1\"}\n\n{\"customer_id\":\"C2\"}\n").unwrap();

        let loaded = load_inputs(&customers, &products, &[tx]).unwrap();

        assert_eq!(loaded.customers.len(), 2);
        assert_eq!(loaded.customers[1].loyalty_score.as_str(), "");
        assert_eq!(loaded.products[0].product_category, "snacks");
        assert_eq!(loaded.transactions.len(), 2);
        assert_eq!(loaded.transactions[1].origin.line, 3);
    }

    #[test]
    fn test_missing_master_file() {
        let dir = tempdir().unwrap();
        let err = load_customers(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_transactions_concatenated_in_file_order() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        fs::write(&a, "{\"customer_id\":\"C1\"}\n{\"customer_id\":\"C2\"}\n").unwrap();
        fs::write(&b, "{\"customer_id\":\"C3\"}\n").unwrap();

        let rows = load_transactions(&[b.clone(), a.clone()]).unwrap();

        let ids: Vec<&str> = rows
            .iter()
            .map(|r| r.fields["customer_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["C3", "C1", "C2"]);
        assert_eq!(&*rows[0].origin.path, b.as_path());
    }

    #[test]
    fn test_bad_transaction_line_aborts_load() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.json");
        let bad = dir.path().join("bad.json");
        fs::write(&good, "{\"customer_id\":\"C1\"}\n").unwrap();
        fs::write(&bad, "{\"customer_id\":\"C2\"}\nnot json\n").unwrap();

        let err = load_transactions(&[good, bad]).unwrap_err();
        assert!(matches!(err, LoadError::Json { ref origin, .. } if origin.line == 2));
    }
}
