//! Persistence and tabular export of sweep results
//!
//! A sweep writes everything into one timestamped directory: the raw JSON
//! artifacts (placed there by the executor), the serialized report, and a
//! CSV table of the merged grid. The per-block-size surface tables carry the
//! same data a 3-D surface plot would, for consumers that render them.

use std::fmt::Write as _;
use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::SweepError;
use crate::grid::ResultGrid;
use crate::sweep::SweepReport;

/// Per-sweep result directory under `base`, e.g. `sweep_results_20260829_143000`.
pub fn timestamped_dir(base: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    base.join(format!("sweep_results_{}", stamp))
}

/// Writes the whole report as pretty JSON and returns the file path.
pub fn save_report(report: &SweepReport, dir: &Path) -> Result<PathBuf, SweepError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join("sweep_report.json");
    let file = File::create(&path)?;
    serde_json::to_writer_pretty(file, report)?;
    info!(path = %path.display(), "sweep report written");
    Ok(path)
}

pub fn load_report(path: &Path) -> Result<SweepReport, SweepError> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(file)?)
}

/// Exports the merged grid as a CSV table, one row per key.
pub fn write_csv(grid: &ResultGrid, path: &Path) -> Result<(), SweepError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "block_size_bytes",
        "num_jobs",
        "io_depth",
        "read_bandwidth_mb_s",
        "write_bandwidth_mb_s",
    ])?;
    for record in grid.merged_entries() {
        writer.write_record(&[
            record.block_size_bytes.to_string(),
            record.num_jobs.to_string(),
            record.io_depth.to_string(),
            format!("{:.2}", record.read_bw_mbps),
            format!("{:.2}", record.write_bw_mbps),
        ])?;
    }
    writer.flush()?;
    info!(path = %path.display(), "CSV table written");
    Ok(())
}

/// Renders every block-size slice as a plain-text read/write surface table.
///
/// Rows are numjobs values, columns iodepth values, cells `read/write` MB/s.
pub fn render_surface_tables(grid: &ResultGrid) -> String {
    let mut out = String::new();
    for block_size in grid.block_sizes() {
        let slice = grid.slice_by_block_size(block_size);
        let _ = writeln!(out, "block size {} bytes (read/write MB/s)", block_size);
        let _ = write!(out, "{:>12}", "numjobs");
        for depth in &slice.io_depths {
            let _ = write!(out, " {:>15}", format!("iodepth={}", depth));
        }
        let _ = writeln!(out);
        for (row, jobs) in slice.num_jobs.iter().enumerate() {
            let _ = write!(out, "{:>12}", jobs);
            for (read, write) in &slice.cells[row] {
                let _ = write!(out, " {:>15}", format!("{:.1}/{:.1}", read, write));
            }
            let _ = writeln!(out);
        }
        let _ = writeln!(out);
    }
    out
}
