//! Run configuration and its defaults.
//!
//! The binary fills [`PipelineConfig`] from flags or `BASKETWEEK_*` environment
//! variables (a `.env` file is honoured); anything left unset falls back to the
//! defaults below.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::runlog::Rotation;

pub const DEFAULT_CUSTOMERS: &str = "./input_data/starter/customers.csv";
pub const DEFAULT_PRODUCTS: &str = "./input_data/starter/products.csv";
pub const DEFAULT_TRANSACTIONS: &str = "./input_data/starter/transactions/";
pub const DEFAULT_OUTPUT: &str = "./output_data/outputs/";
pub const DEFAULT_EXTENSION: &str = "json";
pub const DEFAULT_LOG_FILE: &str = "log.log";

/// Everything one invocation needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Customer master file
    pub customers_location: PathBuf,
    /// Product master file
    pub products_location: PathBuf,
    /// Root directory (or single file) of transaction JSON-lines files
    pub transactions_location: PathBuf,
    /// Directory receiving `W=<year_week>.json` files
    pub output_location: PathBuf,
    /// Extension of transaction files, without the dot
    pub extension: String,
    /// Run log file
    pub log_file: PathBuf,
    pub log_max_bytes: u64,
    pub log_backups: usize,
}

impl PipelineConfig {
    pub fn rotation(&self) -> Rotation {
        Rotation {
            max_bytes: self.log_max_bytes,
            backups: self.log_backups,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let rotation = Rotation::default();
        Self {
            customers_location: PathBuf::from(DEFAULT_CUSTOMERS),
            products_location: PathBuf::from(DEFAULT_PRODUCTS),
            transactions_location: PathBuf::from(DEFAULT_TRANSACTIONS),
            output_location: PathBuf::from(DEFAULT_OUTPUT),
            extension: DEFAULT_EXTENSION.to_string(),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            log_max_bytes: rotation.max_bytes,
            log_backups: rotation.backups,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.customers_location, PathBuf::from("./input_data/starter/customers.csv"));
        assert_eq!(config.output_location, PathBuf::from("./output_data/outputs/"));
        assert_eq!(config.extension, "json");
        assert_eq!(config.rotation(), Rotation::default());
    }
}
