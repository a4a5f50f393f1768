//! Basketweek CLI - weekly purchase counts per customer and product
//!
//! ```bash
//! basketweek                                   # run with the default locations
//! basketweek run --summary                     # run and print the run summary as JSON
//! basketweek discover                          # list the transaction files a run would read
//! basketweek --output-location out/ run        # any location can be overridden
//! ```
//!
//! Every location flag can also be set through `BASKETWEEK_*` environment
//! variables or a `.env` file. `RUST_LOG` controls diagnostic output.

use std::path::PathBuf;
use std::process::ExitCode;

use basketweek::config::{
    DEFAULT_CUSTOMERS, DEFAULT_EXTENSION, DEFAULT_LOG_FILE, DEFAULT_OUTPUT, DEFAULT_PRODUCTS,
    DEFAULT_TRANSACTIONS,
};
use basketweek::{
    discover, resolve_paths, run_from_files, FileRunLog, PipelineConfig, RunError, RunInputs,
    RunLog, RunScope,
};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "basketweek")]
#[command(about = "Weekly per-customer, per-product purchase counts", long_about = None)]
struct Cli {
    #[command(flatten)]
    locations: LocationArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct LocationArgs {
    /// Customer master file
    #[arg(
        long,
        global = true,
        alias = "customers_location",
        env = "BASKETWEEK_CUSTOMERS",
        default_value = DEFAULT_CUSTOMERS
    )]
    customers_location: PathBuf,

    /// Product master file
    #[arg(
        long,
        global = true,
        alias = "products_location",
        env = "BASKETWEEK_PRODUCTS",
        default_value = DEFAULT_PRODUCTS
    )]
    products_location: PathBuf,

    /// Directory searched recursively for transaction files
    #[arg(
        long,
        global = true,
        alias = "transactions_location",
        env = "BASKETWEEK_TRANSACTIONS",
        default_value = DEFAULT_TRANSACTIONS
    )]
    transactions_location: PathBuf,

    /// Directory receiving one W=<year_week>.json file per ISO week
    #[arg(
        long,
        global = true,
        alias = "output_location",
        env = "BASKETWEEK_OUTPUT",
        default_value = DEFAULT_OUTPUT
    )]
    output_location: PathBuf,

    /// Transaction file extension
    #[arg(long, global = true, env = "BASKETWEEK_EXTENSION", default_value = DEFAULT_EXTENSION)]
    extension: String,

    /// Run log file
    #[arg(long, global = true, env = "BASKETWEEK_LOG_FILE", default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    /// Rotate the run log beyond this size (0 disables rotation)
    #[arg(
        long,
        global = true,
        env = "BASKETWEEK_LOG_MAX_BYTES",
        default_value_t = PipelineConfig::default().log_max_bytes
    )]
    log_max_bytes: u64,

    /// Rotated run logs to keep
    #[arg(
        long,
        global = true,
        env = "BASKETWEEK_LOG_BACKUPS",
        default_value_t = PipelineConfig::default().log_backups
    )]
    log_backups: usize,
}

impl From<LocationArgs> for PipelineConfig {
    fn from(args: LocationArgs) -> Self {
        Self {
            customers_location: args.customers_location,
            products_location: args.products_location,
            transactions_location: args.transactions_location,
            output_location: args.output_location,
            extension: args.extension,
            log_file: args.log_file,
            log_max_bytes: args.log_max_bytes,
            log_backups: args.log_backups,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the whole pipeline (default)
    Run {
        /// Print the run summary as JSON on stdout
        #[arg(long)]
        summary: bool,
    },

    /// List the transaction files a run would read
    Discover,
}

fn main() -> ExitCode {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from(cli.locations);

    let result = match cli.command.unwrap_or(Commands::Run { summary: false }) {
        Commands::Run { summary } => cmd_run(&config, summary),
        Commands::Discover => cmd_discover(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_run(config: &PipelineConfig, summary: bool) -> Result<(), Box<dyn std::error::Error>> {
    let log = FileRunLog::open(&config.log_file, config.rotation())?;
    let mut scope = RunScope::open(log);

    let transactions = match resolve_paths(&config.transactions_location, &config.extension) {
        Ok(paths) => paths,
        Err(e) => {
            scope.error(format!("transaction files paths fetch error: {}", e));
            let err = RunError::new(e, scope.elapsed());
            scope.finish(&err.to_string());
            return Err(err.into());
        }
    };
    eprintln!(
        "📄 {} transaction files under {}",
        transactions.len(),
        config.transactions_location.display()
    );

    let inputs = RunInputs {
        customers: config.customers_location.clone(),
        products: config.products_location.clone(),
        transactions,
        output_dir: config.output_location.clone(),
    };

    match run_from_files(&inputs, &mut scope) {
        Ok(result) => {
            scope.finish("");
            eprintln!(
                "📦 {} weekly files, {} rows ({} purchases dropped without master match)",
                result.partitions.len(),
                result.rows_written(),
                result.stats.unknown_customer + result.stats.unknown_product
            );
            for partition in &result.partitions {
                eprintln!("   {} → {} rows", partition.path.display(), partition.rows);
            }
            if summary {
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            eprintln!("✨ Done!");
            Ok(())
        }
        Err(e) => {
            scope.finish(&e.to_string());
            for path in &e.committed {
                eprintln!("   already committed: {}", path.display());
            }
            Err(e.into())
        }
    }
}

fn cmd_discover(config: &PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut found = 0;
    for path in discover(&config.transactions_location, &config.extension) {
        println!("{}", path?.display());
        found += 1;
    }
    eprintln!("{} '.{}' files", found, config.extension.trim_start_matches('.'));
    Ok(())
}
