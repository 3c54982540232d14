//! Aggregation of metric records into a dense, sliceable result grid

use std::collections::HashMap;

use serde::de::{Deserializer, Error as _};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::normalize::MetricRecord;

/// Measured configuration tuple a record is aggregated under.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GridKey {
    pub block_size_bytes: u64,
    pub num_jobs: u32,
    pub io_depth: u32,
}

impl From<&MetricRecord> for GridKey {
    fn from(record: &MetricRecord) -> Self {
        Self {
            block_size_bytes: record.block_size_bytes,
            num_jobs: record.num_jobs,
            io_depth: record.io_depth,
        }
    }
}

/// Mapping from measured configuration tuples to the records observed there.
///
/// Duplicate keys (repeated axis tokens, re-measured combinations) keep all
/// their records; queries resolve them to the arithmetic mean of the
/// bandwidth fields.
#[derive(Debug, Clone, Default)]
pub struct ResultGrid {
    cells: HashMap<GridKey, Vec<MetricRecord>>,
}

impl ResultGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: MetricRecord) {
        self.cells.entry(GridKey::from(&record)).or_default().push(record);
    }

    /// Number of distinct keys in the grid.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &GridKey> {
        self.cells.keys()
    }

    /// Mean of all records at a key, or `None` if the key was never inserted.
    pub fn merge(&self, key: GridKey) -> Option<MetricRecord> {
        let records = self.cells.get(&key)?;
        let n = records.len() as f64;
        Some(MetricRecord {
            block_size_bytes: key.block_size_bytes,
            num_jobs: key.num_jobs,
            io_depth: key.io_depth,
            read_bw_mbps: records.iter().map(|r| r.read_bw_mbps).sum::<f64>() / n,
            write_bw_mbps: records.iter().map(|r| r.write_bw_mbps).sum::<f64>() / n,
        })
    }

    /// Distinct block sizes present in the grid, ascending.
    pub fn block_sizes(&self) -> Vec<u64> {
        let mut sizes: Vec<u64> = self.cells.keys().map(|k| k.block_size_bytes).collect();
        sizes.sort_unstable();
        sizes.dedup();
        sizes
    }

    /// One merged record per key, sorted by key.
    pub fn merged_entries(&self) -> Vec<MetricRecord> {
        let mut keys: Vec<GridKey> = self.cells.keys().copied().collect();
        keys.sort_unstable();
        keys.iter()
            .filter_map(|&key| self.merge(key))
            .collect()
    }

    /// Dense (numJobs × ioDepth) bandwidth surface for one block size.
    ///
    /// The matrix axes are the distinct numjobs/iodepth values observed
    /// within this slice only, so an asymmetric sweep produces differently
    /// shaped slices rather than being padded to a global shape. Cells whose
    /// cross-product key was never measured are `(0.0, 0.0)`.
    pub fn slice_by_block_size(&self, block_size_bytes: u64) -> BlockSizeSlice {
        let mut num_jobs: Vec<u32> = Vec::new();
        let mut io_depths: Vec<u32> = Vec::new();
        for key in self.cells.keys() {
            if key.block_size_bytes == block_size_bytes {
                num_jobs.push(key.num_jobs);
                io_depths.push(key.io_depth);
            }
        }
        num_jobs.sort_unstable();
        num_jobs.dedup();
        io_depths.sort_unstable();
        io_depths.dedup();

        let cells = num_jobs
            .iter()
            .map(|&jobs| {
                io_depths
                    .iter()
                    .map(|&depth| {
                        self.merge(GridKey {
                            block_size_bytes,
                            num_jobs: jobs,
                            io_depth: depth,
                        })
                        .map(|r| (r.read_bw_mbps, r.write_bw_mbps))
                        .unwrap_or((0.0, 0.0))
                    })
                    .collect()
            })
            .collect();

        BlockSizeSlice {
            block_size_bytes,
            num_jobs,
            io_depths,
            cells,
        }
    }
}

/// 2-D dense view of the grid restricted to one block size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSizeSlice {
    pub block_size_bytes: u64,
    /// Row axis: distinct numjobs values observed in this slice, ascending
    pub num_jobs: Vec<u32>,
    /// Column axis: distinct iodepth values observed in this slice, ascending
    pub io_depths: Vec<u32>,
    /// `cells[i][j]` is the merged (read, write) MB/s at
    /// `num_jobs[i] × io_depths[j]`, `(0, 0)` where never measured
    pub cells: Vec<Vec<(f64, f64)>>,
}

// JSON maps need string keys, so the grid serializes as a sorted entry list.
#[derive(Serialize, Deserialize)]
struct GridEntry {
    key: GridKey,
    records: Vec<MetricRecord>,
}

impl Serialize for ResultGrid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut entries: Vec<GridEntry> = self
            .cells
            .iter()
            .map(|(&key, records)| GridEntry {
                key,
                records: records.clone(),
            })
            .collect();
        entries.sort_by_key(|entry| entry.key);
        entries.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ResultGrid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<GridEntry>::deserialize(deserializer)?;
        let mut grid = ResultGrid::new();
        for entry in entries {
            // An empty record list would make merge() divide by zero; no
            // serialized grid ever legitimately contains one.
            if entry.records.is_empty() {
                return Err(D::Error::custom(format!(
                    "grid entry {:?} has no records",
                    entry.key
                )));
            }
            grid.cells.insert(entry.key, entry.records);
        }
        Ok(grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(bs: u64, jobs: u32, depth: u32, read: f64, write: f64) -> MetricRecord {
        MetricRecord {
            block_size_bytes: bs,
            num_jobs: jobs,
            io_depth: depth,
            read_bw_mbps: read,
            write_bw_mbps: write,
        }
    }

    #[test]
    fn test_duplicate_keys_merge_to_mean() {
        let mut grid = ResultGrid::new();
        grid.insert(record(4096, 1, 1, 100.0, 40.0));
        grid.insert(record(4096, 1, 1, 200.0, 60.0));
        assert_eq!(grid.len(), 1);

        let merged = grid
            .merge(GridKey {
                block_size_bytes: 4096,
                num_jobs: 1,
                io_depth: 1,
            })
            .unwrap();
        assert_eq!(merged.read_bw_mbps, 150.0);
        assert_eq!(merged.write_bw_mbps, 50.0);
    }

    #[test]
    fn test_merge_absent_key_is_none() {
        let grid = ResultGrid::new();
        assert!(grid
            .merge(GridKey {
                block_size_bytes: 4096,
                num_jobs: 1,
                io_depth: 1,
            })
            .is_none());
    }

    #[test]
    fn test_slice_is_dense_and_zero_filled() {
        let mut grid = ResultGrid::new();
        grid.insert(record(4096, 1, 1, 100.0, 50.0));
        grid.insert(record(4096, 2, 8, 300.0, 150.0));

        let slice = grid.slice_by_block_size(4096);
        assert_eq!(slice.num_jobs, vec![1, 2]);
        assert_eq!(slice.io_depths, vec![1, 8]);
        assert_eq!(slice.cells[0][0], (100.0, 50.0));
        assert_eq!(slice.cells[1][1], (300.0, 150.0));
        // Cross-product cells never measured are explicit zeros, not gaps.
        assert_eq!(slice.cells[0][1], (0.0, 0.0));
        assert_eq!(slice.cells[1][0], (0.0, 0.0));
    }

    #[test]
    fn test_slice_axes_are_per_block_size() {
        let mut grid = ResultGrid::new();
        grid.insert(record(4096, 1, 1, 100.0, 0.0));
        grid.insert(record(1048576, 8, 32, 900.0, 0.0));

        // The 4k slice must not pick up axis values swept only at 1m.
        let slice = grid.slice_by_block_size(4096);
        assert_eq!(slice.num_jobs, vec![1]);
        assert_eq!(slice.io_depths, vec![1]);
        assert_eq!(slice.cells.len(), 1);
        assert_eq!(slice.cells[0].len(), 1);
    }

    #[test]
    fn test_slice_of_unknown_block_size_is_empty() {
        let grid = ResultGrid::new();
        let slice = grid.slice_by_block_size(4096);
        assert!(slice.num_jobs.is_empty());
        assert!(slice.cells.is_empty());
    }

    #[test]
    fn test_block_sizes_sorted_distinct() {
        let mut grid = ResultGrid::new();
        grid.insert(record(1048576, 1, 1, 1.0, 1.0));
        grid.insert(record(4096, 1, 1, 1.0, 1.0));
        grid.insert(record(4096, 2, 1, 1.0, 1.0));
        assert_eq!(grid.block_sizes(), vec![4096, 1048576]);
    }

    #[test]
    fn test_deserialize_rejects_empty_record_list() {
        let json = r#"[{
            "key": {"block_size_bytes": 4096, "num_jobs": 1, "io_depth": 1},
            "records": []
        }]"#;
        let err = serde_json::from_str::<ResultGrid>(json).unwrap_err();
        assert!(err.to_string().contains("has no records"));
    }

    #[test]
    fn test_grid_serde_roundtrip() {
        let mut grid = ResultGrid::new();
        grid.insert(record(4096, 1, 1, 100.0, 50.0));
        grid.insert(record(4096, 1, 1, 200.0, 70.0));
        grid.insert(record(1048576, 2, 8, 400.0, 300.0));

        let json = serde_json::to_string(&grid).unwrap();
        let restored: ResultGrid = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(
            restored
                .merge(GridKey {
                    block_size_bytes: 4096,
                    num_jobs: 1,
                    io_depth: 1,
                })
                .unwrap()
                .read_bw_mbps,
            150.0
        );
    }
}
