//! High-level pipeline API.
//!
//! Runs every stage in order, each on the full output of the previous one:
//!
//! ```text
//! load → flatten → join → bucket → aggregate → write
//! ```
//!
//! The first failing stage aborts the run. It is recorded on the caller's
//! [`RunLog`] and returned as a [`RunError`] naming the stage.
//!
//! # Example
//!
//! ```rust,ignore
//! use basketweek::{run_from_files, MemoryRunLog, RunInputs};
//!
//! let inputs = RunInputs {
//!     customers: "customers.csv".into(),
//!     products: "products.csv".into(),
//!     transactions: vec!["transactions/day1.json".into()],
//!     output_dir: "outputs".into(),
//! };
//! let mut log = MemoryRunLog::new();
//! let result = run_from_files(&inputs, &mut log)?;
//! println!("{} weekly files", result.partitions.len());
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::aggregate::aggregate;
use super::bucket::bucket;
use super::flatten::flatten;
use super::join::{join, MasterIndex};
use crate::error::{RunError, StageError};
use crate::loader::{load_inputs, load_transactions};
use crate::models::{CustomerRecord, ProductRecord, RawTransaction};
use crate::runlog::{LogEntry, RunLog};
use crate::writer::{render_partitions, PartitionSummary, PartitionWriter};

/// File inputs of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInputs {
    pub customers: PathBuf,
    pub products: PathBuf,
    pub transactions: Vec<PathBuf>,
    pub output_dir: PathBuf,
}

/// Row counts at each stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub transactions: usize,
    pub flattened: usize,
    pub joined: usize,
    pub unknown_customer: usize,
    pub unknown_product: usize,
    pub aggregated: usize,
}

/// Outcome of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run_id: Uuid,
    /// Committed partitions, in week order
    pub partitions: Vec<PartitionSummary>,
    pub stats: RunStats,
    pub elapsed: Duration,
}

impl RunResult {
    /// Rows written per `year_week`.
    pub fn partition_counts(&self) -> BTreeMap<String, usize> {
        self.partitions
            .iter()
            .map(|p| (p.year_week.to_string(), p.rows))
            .collect()
    }

    pub fn rows_written(&self) -> usize {
        self.partitions.iter().map(|p| p.rows).sum()
    }
}

/// Per-run state threaded through the stages.
struct RunContext<'a> {
    run_id: Uuid,
    started: Instant,
    log: &'a mut dyn RunLog,
}

impl RunContext<'_> {
    fn new(log: &mut dyn RunLog) -> RunContext<'_> {
        RunContext {
            run_id: Uuid::new_v4(),
            started: Instant::now(),
            log,
        }
    }

    fn note(&mut self, message: impl Into<String>) {
        self.log.record(LogEntry::info(message));
    }

    /// Record the failure and turn it into a [`RunError`].
    fn fail(&mut self, err: impl Into<StageError>) -> RunError {
        let err = RunError::new(err, self.started.elapsed());
        self.log
            .record(LogEntry::error(format!("{} stage failed: {}", err.stage, err.source)));
        err
    }
}

/// Load both master files and every transaction file, then run the pipeline.
pub fn run_from_files(inputs: &RunInputs, log: &mut dyn RunLog) -> Result<RunResult, RunError> {
    let mut ctx = RunContext::new(log);

    let loaded = load_inputs(&inputs.customers, &inputs.products, &inputs.transactions)
        .map_err(|e| ctx.fail(e))?;
    ctx.note(format!(
        "loaded {} customers and {} products",
        loaded.customers.len(),
        loaded.products.len()
    ));
    ctx.note(format!(
        "loaded {} transaction files ({} records)",
        inputs.transactions.len(),
        loaded.transactions.len()
    ));

    process(
        &mut ctx,
        &loaded.customers,
        &loaded.products,
        &loaded.transactions,
        &inputs.output_dir,
    )
}

/// Run the pipeline over loaded master tables and a resolved list of
/// transaction files.
pub fn run(
    customers: &[CustomerRecord],
    products: &[ProductRecord],
    transaction_paths: &[PathBuf],
    output_dir: &Path,
    log: &mut dyn RunLog,
) -> Result<RunResult, RunError> {
    let mut ctx = RunContext::new(log);
    let transactions = load_transactions(transaction_paths).map_err(|e| ctx.fail(e))?;
    ctx.note(format!(
        "loaded {} transaction files ({} records)",
        transaction_paths.len(),
        transactions.len()
    ));

    process(&mut ctx, customers, products, &transactions, output_dir)
}

/// Run the pipeline over records already in memory.
pub fn run_records(
    customers: &[CustomerRecord],
    products: &[ProductRecord],
    transactions: &[RawTransaction],
    output_dir: &Path,
    log: &mut dyn RunLog,
) -> Result<RunResult, RunError> {
    let mut ctx = RunContext::new(log);
    process(&mut ctx, customers, products, transactions, output_dir)
}

fn process(
    ctx: &mut RunContext<'_>,
    customers: &[CustomerRecord],
    products: &[ProductRecord],
    transactions: &[RawTransaction],
    output_dir: &Path,
) -> Result<RunResult, RunError> {
    let _span = tracing::info_span!("run", run_id = %ctx.run_id).entered();
    let mut stats = RunStats {
        transactions: transactions.len(),
        ..RunStats::default()
    };

    // Flatten
    let flattened = flatten(transactions).map_err(|e| ctx.fail(e))?;
    stats.flattened = flattened.len();
    info!(rows = stats.flattened, "flattened baskets");

    // Join
    let index = MasterIndex::build(customers, products).map_err(|e| ctx.fail(e))?;
    let joined = join(flattened, &index);
    stats.joined = joined.rows.len();
    stats.unknown_customer = joined.unknown_customer;
    stats.unknown_product = joined.unknown_product;
    if joined.dropped() > 0 {
        ctx.log.record(LogEntry::warning(format!(
            "dropped {} purchases with unknown product and {} with unknown customer",
            joined.unknown_product, joined.unknown_customer
        )));
    }

    // Bucket + aggregate
    let bucketed = bucket(joined.rows).map_err(|e| ctx.fail(e))?;
    let rows = aggregate(bucketed);
    stats.aggregated = rows.len();
    info!(rows = stats.aggregated, "aggregated weekly counts");

    // Write
    let rendered = render_partitions(&rows).map_err(|e| ctx.fail(e))?;
    let mut writer = PartitionWriter::create(output_dir).map_err(|e| ctx.fail(e))?;
    for partition in &rendered {
        if let Err(e) = writer.write(partition) {
            let committed = writer.committed().iter().map(|p| p.path.clone()).collect();
            return Err(ctx.fail(e).with_committed(committed));
        }
    }
    let partitions = writer.into_committed();

    ctx.note(format!(
        "wrote {} weekly partitions to {}",
        partitions.len(),
        output_dir.display()
    ));
    info!(partitions = partitions.len(), "run complete");

    Ok(RunResult {
        run_id: ctx.run_id,
        partitions,
        stats,
        elapsed: ctx.started.elapsed(),
    })
}
