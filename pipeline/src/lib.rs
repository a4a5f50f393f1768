//! # Basketweek - weekly purchase counts from basket transactions
//!
//! Basketweek reads per-customer transactions with nested baskets, joins them
//! with the customer and product masters, and writes one JSON file per ISO week
//! holding how many distinct days each customer bought each product.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────┐   ┌────────┐   ┌──────────┐   ┌───────────┐   ┌─────────────┐
//! │ JSON lines │──▶│ Flatten  │──▶│  Join  │──▶│  Bucket  │──▶│ Aggregate │──▶│ W=2023_1    │
//! │ + masters  │   │ (basket) │   │ (inner)│   │ (ISO wk) │   │ (distinct │   │ W=2023_2    │
//! └────────────┘   └──────────┘   └────────┘   └──────────┘   │   dates)  │   │ ...         │
//!                                                             └───────────┘   └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use basketweek::{resolve_paths, run_from_files, MemoryRunLog, RunInputs};
//! use std::path::Path;
//!
//! let transactions = resolve_paths(Path::new("input/transactions"), "json")?;
//! let inputs = RunInputs {
//!     customers: "input/customers.csv".into(),
//!     products: "input/products.csv".into(),
//!     transactions,
//!     output_dir: "output".into(),
//! };
//! let result = run_from_files(&inputs, &mut MemoryRunLog::new())?;
//! println!("{:?}", result.partition_counts());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per stage
//! - [`models`] - Records flowing between stages
//! - [`parser`] - Delimited text and JSON lines
//! - [`loader`] - Master tables and transaction files
//! - [`transform`] - Flatten, join, bucket, aggregate, pipeline
//! - [`writer`] - Weekly partition files
//! - [`discovery`] - Transaction file discovery
//! - [`runlog`] - Run bookkeeping log
//! - [`config`] - Configuration defaults

// Core modules
pub mod error;
pub mod models;

// Input
pub mod discovery;
pub mod loader;
pub mod parser;

// Transformation
pub mod transform;

// Output
pub mod writer;

// Run bookkeeping
pub mod config;
pub mod runlog;

// =============================================================================
// Re-exports - Errors
// =============================================================================

pub use error::{
    DateParseError, DiscoveryError, FlattenError, JoinError, LoadError, MasterTable, RunError,
    SourceLine, Stage, StageError, WriteError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    AggregatedRow, BasketItem, CustomerRecord, FlattenedPurchase, JoinedPurchase, LoyaltyScore,
    ProductRecord, RawTransaction, Transaction, WeeklyRecord, YearWeek,
};

// =============================================================================
// Re-exports - Input
// =============================================================================

pub use discovery::{discover, resolve_paths};
pub use loader::{load_customers, load_inputs, load_products, load_transactions, LoadedInputs};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{run, run_from_files, run_records, RunInputs, RunResult, RunStats};
pub use writer::{write_partitions, PartitionSummary, PartitionWriter};

// =============================================================================
// Re-exports - Run log & config
// =============================================================================

pub use config::PipelineConfig;
pub use runlog::{FileRunLog, LogEntry, LogLevel, MemoryRunLog, Rotation, RunLog, RunScope};
