//! Weekly partition output.
//!
//! Rows are grouped by [`YearWeek`] and every partition is serialized before
//! anything touches the disk. Each partition file is then written to a
//! temporary file in the output directory and renamed over `W=<year_week>.json`,
//! so a partition file is either the previous version or the complete new one.
//! Committed files are world-readable (`0644` on Unix) like any other export.
//!
//! Partitions are committed one by one: if a later partition fails, the ones
//! already committed stay on disk and are listed by [`PartitionWriter::committed`].

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::{WriteError, WriteResult};
use crate::models::{AggregatedRow, WeeklyRecord, YearWeek};

#[cfg(unix)]
const PARTITION_MODE: u32 = 0o644;

/// One week's rows, serialized and ready to write.
#[derive(Debug, Clone)]
pub struct RenderedPartition {
    pub year_week: YearWeek,
    pub rows: usize,
    pub bytes: Vec<u8>,
}

/// A partition file that has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionSummary {
    pub year_week: YearWeek,
    pub path: PathBuf,
    pub rows: usize,
}

/// Group rows by week, in chronological week order.
pub fn partition(rows: &[AggregatedRow]) -> BTreeMap<YearWeek, Vec<&AggregatedRow>> {
    let mut partitions: BTreeMap<YearWeek, Vec<&AggregatedRow>> = BTreeMap::new();
    for row in rows {
        partitions.entry(row.year_week).or_default().push(row);
    }
    partitions
}

/// Serialize every partition as a JSON array of [`WeeklyRecord`].
pub fn render_partitions(rows: &[AggregatedRow]) -> WriteResult<Vec<RenderedPartition>> {
    partition(rows)
        .into_iter()
        .map(|(year_week, rows)| {
            let records: Vec<WeeklyRecord<'_>> = rows.iter().map(|r| r.to_weekly()).collect();
            let bytes = serde_json::to_vec(&records).map_err(|source| WriteError::Serialize {
                year_week: year_week.to_string(),
                source,
            })?;
            Ok(RenderedPartition {
                year_week,
                rows: records.len(),
                bytes,
            })
        })
        .collect()
}

/// Commits rendered partitions into an output directory.
pub struct PartitionWriter {
    output_dir: PathBuf,
    committed: Vec<PartitionSummary>,
}

impl PartitionWriter {
    /// Create the output directory (and parents) if needed.
    pub fn create(output_dir: impl AsRef<Path>) -> WriteResult<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir).map_err(|source| WriteError::CreateDir {
            path: output_dir.clone(),
            source,
        })?;
        Ok(Self {
            output_dir,
            committed: Vec::new(),
        })
    }

    /// Write one partition through a temporary file and rename it into place.
    pub fn write(&mut self, partition: &RenderedPartition) -> WriteResult<()> {
        let target = self.output_dir.join(partition.year_week.file_name());
        let io_error = |source| WriteError::Io {
            path: target.clone(),
            source,
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(".partition-")
            .suffix(".tmp")
            .tempfile_in(&self.output_dir)
            .map_err(io_error)?;
        tmp.write_all(&partition.bytes).map_err(io_error)?;
        // Temp files start out as 0600
        #[cfg(unix)]
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(PARTITION_MODE))
            .map_err(io_error)?;
        tmp.as_file().sync_all().map_err(io_error)?;
        tmp.persist(&target).map_err(|e| io_error(e.error))?;

        debug!(path = %target.display(), rows = partition.rows, "committed partition");
        self.committed.push(PartitionSummary {
            year_week: partition.year_week,
            path: target,
            rows: partition.rows,
        });
        Ok(())
    }

    /// Partitions committed so far, in write order.
    pub fn committed(&self) -> &[PartitionSummary] {
        &self.committed
    }

    pub fn into_committed(self) -> Vec<PartitionSummary> {
        self.committed
    }
}

/// Render and write every partition. Stops at the first failure.
pub fn write_partitions(
    rows: &[AggregatedRow],
    output_dir: &Path,
) -> WriteResult<Vec<PartitionSummary>> {
    let rendered = render_partitions(rows)?;
    let mut writer = PartitionWriter::create(output_dir)?;
    for partition in &rendered {
        writer.write(partition)?;
    }
    Ok(writer.into_committed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LoyaltyScore;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    fn row(year: i32, week: u32, customer: &str, product: &str, count: usize) -> AggregatedRow {
        AggregatedRow {
            year_week: YearWeek::new(year, week),
            customer_id: customer.into(),
            loyalty_score: LoyaltyScore::new("5"),
            product_id: product.into(),
            product_category: "snacks".into(),
            purchase_count: count,
        }
    }

    #[test]
    fn test_partitions_in_week_order() {
        let rows = vec![
            row(2023, 10, "C1", "P1", 1),
            row(2023, 2, "C1", "P1", 1),
            row(2023, 2, "C2", "P1", 3),
        ];

        let parts = partition(&rows);
        let weeks: Vec<String> = parts.keys().map(ToString::to_string).collect();

        assert_eq!(weeks, vec!["2023_2", "2023_10"]);
        assert_eq!(parts[&YearWeek::new(2023, 2)].len(), 2);
    }

    #[test]
    fn test_one_file_per_week_with_projected_fields() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("nested").join("outputs");
        let rows = vec![row(2022, 52, "C1", "P1", 1), row(2023, 1, "C1", "P1", 2)];

        let written = write_partitions(&rows, &out).unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(written[0].path, out.join("W=2022_52.json"));
        assert_eq!(written[1].rows, 1);

        let content = fs::read_to_string(out.join("W=2023_1.json")).unwrap();
        let value: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(
            value,
            json!([{
                "customer_id": "C1",
                "loyalty_score": 5,
                "product_id": "P1",
                "product_category": "snacks",
                "purchase_count": 2
            }])
        );
    }

    #[test]
    fn test_no_temporary_files_left_behind() {
        let dir = tempdir().unwrap();
        write_partitions(&[row(2023, 1, "C1", "P1", 1)], dir.path()).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["W=2023_1.json"]);
    }

    #[test]
    fn test_existing_partition_overwritten() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("W=2023_1.json"), "stale").unwrap();

        write_partitions(&[row(2023, 1, "C1", "P1", 4)], dir.path()).unwrap();

        let content = fs::read_to_string(dir.path().join("W=2023_1.json")).unwrap();
        assert!(content.contains("\"purchase_count\":4"));
    }

    #[cfg(unix)]
    #[test]
    fn test_partition_file_is_world_readable() {
        let dir = tempdir().unwrap();
        let written = write_partitions(&[row(2023, 1, "C1", "P1", 1)], dir.path()).unwrap();

        let mode = fs::metadata(&written[0].path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_output_dir_blocked_by_file() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("outputs");
        fs::write(&blocker, "not a directory").unwrap();

        let err = write_partitions(&[row(2023, 1, "C1", "P1", 1)], &blocker).unwrap_err();
        assert!(matches!(err, WriteError::CreateDir { .. }));
    }
}
