//! Error types for the basketweek pipeline.
//!
//! One error type per pipeline stage, plus the collaborator that resolves input files:
//!
//! - [`LoadError`] - master table and transaction file reading
//! - [`DiscoveryError`] - transaction file discovery
//! - [`FlattenError`] - malformed transaction/basket shape
//! - [`JoinError`] - master tables violating their key uniqueness
//! - [`DateParseError`] - unparsable purchase dates
//! - [`WriteError`] - weekly partition output
//!
//! [`StageError`] wraps all of them via `From`, so `?` works across stage
//! boundaries, and [`RunError`] adds the failing [`Stage`] and elapsed time.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

// =============================================================================
// Source location
// =============================================================================

/// A line in an input file, used as context on record-level errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub path: Arc<Path>,
    pub line: usize,
}

impl SourceLine {
    pub fn new(path: Arc<Path>, line: usize) -> Self {
        Self { path, line }
    }
}

impl fmt::Display for SourceLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.line)
    }
}

// =============================================================================
// Load Errors
// =============================================================================

/// Errors while reading master tables or transaction files.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Failed to read file.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File has no header line.
    #[error("{} is empty", path.display())]
    EmptyFile { path: PathBuf },

    /// Required master column absent from the header.
    #[error("{} has no '{column}' column", path.display())]
    MissingColumn { path: PathBuf, column: &'static str },

    /// Invalid delimited record.
    #[error("Invalid CSV in {}: {message}", path.display())]
    Csv { path: PathBuf, message: String },

    /// A transaction line that is not valid JSON.
    #[error("{origin}: invalid JSON: {source}")]
    Json {
        origin: SourceLine,
        #[source]
        source: serde_json::Error,
    },

    /// A transaction line that is valid JSON but not an object.
    #[error("{origin}: expected one JSON object per line")]
    NotAnObject { origin: SourceLine },
}

// =============================================================================
// Discovery Errors
// =============================================================================

/// Errors while resolving the transaction file list.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Root or a subdirectory could not be traversed.
    #[error("Cannot traverse {}: {source}", root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// Nothing matched the extension.
    #[error("No '.{extension}' files found under {}", root.display())]
    NoFiles { root: PathBuf, extension: String },
}

// =============================================================================
// Flatten Errors
// =============================================================================

/// A transaction record whose shape cannot be expanded into basket rows.
#[derive(Debug, Error)]
pub enum FlattenError {
    /// Required field absent.
    #[error("{origin}: missing field '{field}'")]
    MissingField {
        origin: SourceLine,
        field: &'static str,
    },

    /// Field present with the wrong JSON type.
    #[error("{origin}: field '{field}' must be {expected}")]
    InvalidField {
        origin: SourceLine,
        field: &'static str,
        expected: &'static str,
    },

    /// Basket entry that is not an item object.
    #[error("{origin}: basket item {index}: {message}")]
    InvalidItem {
        origin: SourceLine,
        index: usize,
        message: String,
    },
}

// =============================================================================
// Join Errors
// =============================================================================

/// Which master table a join error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterTable {
    Customers,
    Products,
}

impl fmt::Display for MasterTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MasterTable::Customers => f.write_str("customer master"),
            MasterTable::Products => f.write_str("product master"),
        }
    }
}

/// Errors while indexing master tables for the join.
#[derive(Debug, Error)]
pub enum JoinError {
    /// The same key appears on two master rows.
    #[error("Duplicate key '{key}' in {table}")]
    DuplicateKey { table: MasterTable, key: String },
}

// =============================================================================
// Date Errors
// =============================================================================

/// A purchase date that is not a calendar date.
#[derive(Debug, Error)]
#[error("{origin}: invalid date_of_purchase '{value}'")]
pub struct DateParseError {
    pub origin: SourceLine,
    pub value: String,
}

// =============================================================================
// Write Errors
// =============================================================================

/// Errors while writing weekly partitions.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Output directory could not be created.
    #[error("Cannot create output directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Partition could not be serialized.
    #[error("Cannot serialize partition {year_week}: {source}")]
    Serialize {
        year_week: String,
        #[source]
        source: serde_json::Error,
    },

    /// Partition file could not be written or committed.
    #[error("Cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// =============================================================================
// Stage / Run Errors (top-level)
// =============================================================================

/// Pipeline stage names, as reported on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discovery,
    Load,
    Flatten,
    Join,
    Bucket,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Discovery => "discovery",
            Stage::Load => "load",
            Stage::Flatten => "flatten",
            Stage::Join => "join",
            Stage::Bucket => "bucket",
            Stage::Write => "write",
        };
        f.write_str(name)
    }
}

/// Any stage failure.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Flatten(#[from] FlattenError),

    #[error(transparent)]
    Join(#[from] JoinError),

    #[error(transparent)]
    DateParse(#[from] DateParseError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

impl StageError {
    /// The stage this error originates from.
    pub fn stage(&self) -> Stage {
        match self {
            StageError::Discovery(_) => Stage::Discovery,
            StageError::Load(_) => Stage::Load,
            StageError::Flatten(_) => Stage::Flatten,
            StageError::Join(_) => Stage::Join,
            StageError::DateParse(_) => Stage::Bucket,
            StageError::Write(_) => Stage::Write,
        }
    }
}

/// Top-level error returned by [`crate::transform::pipeline::run`].
///
/// Carries everything the caller's run log needs: which stage failed, why,
/// how long the run had been going, and which partition files were already
/// committed (only non-empty for write failures).
#[derive(Debug, Error)]
#[error("{stage} stage failed after {elapsed:?}: {source}")]
pub struct RunError {
    pub stage: Stage,
    #[source]
    pub source: StageError,
    pub elapsed: Duration,
    pub committed: Vec<PathBuf>,
}

impl RunError {
    pub fn new(source: impl Into<StageError>, elapsed: Duration) -> Self {
        let source = source.into();
        Self {
            stage: source.stage(),
            source,
            elapsed,
            committed: Vec::new(),
        }
    }

    pub fn with_committed(mut self, committed: Vec<PathBuf>) -> Self {
        self.committed = committed;
        self
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type LoadResult<T> = Result<T, LoadError>;

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

pub type FlattenResult<T> = Result<T, FlattenError>;

pub type JoinResult<T> = Result<T, JoinError>;

pub type WriteResult<T> = Result<T, WriteError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> SourceLine {
        SourceLine::new(Arc::from(Path::new("tx/a.json")), 3)
    }

    #[test]
    fn test_stage_follows_error_kind() {
        let err: StageError = DateParseError {
            origin: origin(),
            value: "yesterday".into(),
        }
        .into();
        assert_eq!(err.stage(), Stage::Bucket);

        let err: StageError = JoinError::DuplicateKey {
            table: MasterTable::Products,
            key: "P1".into(),
        }
        .into();
        assert_eq!(err.stage(), Stage::Join);
    }

    #[test]
    fn test_run_error_message_names_stage_and_cause() {
        let err = RunError::new(
            FlattenError::MissingField {
                origin: origin(),
                field: "basket",
            },
            Duration::from_millis(12),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("flatten stage failed"));
        assert!(msg.contains("tx/a.json:3"));
        assert!(msg.contains("'basket'"));
        assert!(err.committed.is_empty());
    }

    #[test]
    fn test_duplicate_key_format() {
        let err = JoinError::DuplicateKey {
            table: MasterTable::Customers,
            key: "C1".into(),
        };
        assert_eq!(err.to_string(), "Duplicate key 'C1' in customer master");
    }
}
