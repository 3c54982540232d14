//! fio parameter sweep harness
//!
//! This crate drives the `fio` I/O benchmarking tool across the Cartesian
//! product of block size, job count and queue depth values, normalizes the
//! JSON output of each run into canonical metric records, and aggregates
//! them into a queryable grid. It includes:
//! - Sweep definition and combination generation ([`axes`])
//! - Subprocess execution with per-run isolation ([`executor`])
//! - fio JSON parsing and unit normalization ([`normalize`])
//! - Grid aggregation and dense per-block-size slicing ([`grid`])
//! - Sequential orchestration with partial-failure reporting ([`sweep`])

pub mod axes;
pub mod config;
pub mod error;
pub mod executor;
pub mod grid;
pub mod normalize;
pub mod report;
pub mod sweep;

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Operation mode selected for a sweep.
///
/// `All` measures read and write as two separate fio invocations per
/// combination, so each direction is exercised with its own request pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    Read,
    Write,
    Randread,
    Randwrite,
    All,
}

impl OperationMode {
    /// The fio `--rw=` values this mode expands to, in execution order.
    pub fn rw_modes(&self) -> &'static [RwMode] {
        match self {
            OperationMode::Read => &[RwMode::Read],
            OperationMode::Write => &[RwMode::Write],
            OperationMode::Randread => &[RwMode::Randread],
            OperationMode::Randwrite => &[RwMode::Randwrite],
            OperationMode::All => &[RwMode::Read, RwMode::Write],
        }
    }
}

/// A single fio request pattern, the value handed to `--rw=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RwMode {
    Read,
    Write,
    Randread,
    Randwrite,
}

impl RwMode {
    pub fn as_fio_arg(&self) -> &'static str {
        match self {
            RwMode::Read => "read",
            RwMode::Write => "write",
            RwMode::Randread => "randread",
            RwMode::Randwrite => "randwrite",
        }
    }

    /// Whether this pattern drives the write direction of the workload.
    pub fn is_write(&self) -> bool {
        matches!(self, RwMode::Write | RwMode::Randwrite)
    }
}

/// Sweep-wide fixed settings passed to every fio invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Path or name of the fio binary
    pub fio_binary: String,
    /// Directory fio creates its working files in
    pub target_dir: PathBuf,
    /// Base directory for per-sweep result directories
    pub output_dir: PathBuf,
    /// fio ioengine
    pub ioengine: String,
    /// Working-set size range per file (fio `--filesize` syntax)
    pub file_size: String,
    /// Number of files per job
    pub nr_files: u32,
    /// Use O_DIRECT, bypassing the page cache
    pub direct: bool,
    /// Remove working files after each run
    pub unlink: bool,
    /// Report all jobs as a single group
    pub group_reporting: bool,
    /// Fixed duration of each time-based run, in seconds
    pub runtime_secs: u64,
    /// fio job name
    pub job_name: String,
    /// Wall-clock limit per invocation; `None` (the default) waits forever
    pub timeout_secs: Option<u64>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            fio_binary: "fio".to_string(),
            target_dir: PathBuf::from("/tmp/fio-sweep-target"),
            output_dir: PathBuf::from("./sweep_results"),
            ioengine: "sync".to_string(),
            file_size: "4m:6m".to_string(),
            nr_files: 10,
            direct: true,
            unlink: true,
            group_reporting: true,
            runtime_secs: 30,
            job_name: "sweep".to_string(),
            timeout_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_mode_expands_to_both_directions() {
        assert_eq!(OperationMode::All.rw_modes(), &[RwMode::Read, RwMode::Write]);
        assert_eq!(OperationMode::Randread.rw_modes(), &[RwMode::Randread]);
    }

    #[test]
    fn test_rw_mode_fio_args() {
        assert_eq!(RwMode::Randwrite.as_fio_arg(), "randwrite");
        assert!(RwMode::Randwrite.is_write());
        assert!(!RwMode::Randread.is_write());
    }
}
