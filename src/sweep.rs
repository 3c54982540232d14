//! Sequential sweep orchestration with partial-failure reporting
//!
//! Combinations run strictly one at a time: fio saturates the target I/O
//! subsystem, so overlapping runs would contaminate each other's numbers.
//! Individual failures are collected into the final report instead of
//! aborting the remaining combinations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::axes::{AxisSet, Combination};
use crate::error::SweepError;
use crate::executor::RunExecutor;
use crate::grid::{GridKey, ResultGrid};
use crate::normalize::{self, MetricRecord};
use crate::{OperationMode, RwMode};

/// One combination's failure, recorded instead of aborting the sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepFailure {
    pub combination: Combination,
    pub rw: RwMode,
    pub stage: FailureStage,
    pub message: String,
}

/// Which pipeline stage a per-combination failure occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Run,
    Parse,
}

/// Final output of a sweep: the aggregated grid plus everything that failed.
#[derive(Debug, Serialize, Deserialize)]
pub struct SweepReport {
    pub mode: OperationMode,
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// Combinations that contributed at least one record to the grid
    pub completed_runs: usize,
    pub grid: ResultGrid,
    pub failures: Vec<SweepFailure>,
}

/// Cooperative cancellation flag, checked between combinations (never
/// mid-run: an in-flight fio invocation always runs to completion).
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Drives axes → executor → normalizer → grid for every combination.
pub struct SweepOrchestrator {
    mode: OperationMode,
    cancel: CancelToken,
}

impl SweepOrchestrator {
    pub fn new(mode: OperationMode) -> Self {
        Self {
            mode,
            cancel: CancelToken::new(),
        }
    }

    /// Token that callers (signal handlers, UIs) can trip to stop the sweep
    /// after the current combination.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Runs the whole sweep and returns the report.
    ///
    /// A malformed axis set is fatal before any run starts. Per-combination
    /// run or parse failures land in `failures` and iteration continues, so
    /// a partially successful sweep still yields its grid.
    pub fn run<E: RunExecutor>(
        &self,
        axes: &AxisSet,
        executor: &E,
    ) -> Result<SweepReport, SweepError> {
        axes.validate()?;

        let started_at = chrono::Utc::now();
        let total = axes.combination_count();
        info!(total, mode = ?self.mode, "starting sweep");

        let mut grid = ResultGrid::new();
        let mut failures = Vec::new();
        let mut completed_runs = 0usize;

        for (index, combination) in axes.combinations().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(
                    remaining = total - index,
                    "sweep cancelled, skipping remaining combinations"
                );
                break;
            }
            info!(run = index + 1, total, %combination, "running combination");
            if let Some(record) = self.run_combination(&combination, executor, &mut failures) {
                grid.insert(record);
                completed_runs += 1;
            }
        }

        info!(
            completed_runs,
            failures = failures.len(),
            keys = grid.len(),
            "sweep finished"
        );
        Ok(SweepReport {
            mode: self.mode,
            started_at,
            completed_runs,
            grid,
            failures,
        })
    }

    /// Executes every rw mode for one combination and folds the results into
    /// a single record. In `all` mode a failed direction is recorded as a
    /// failure while the surviving direction is still kept, its counterpart
    /// bandwidth left at zero.
    fn run_combination<E: RunExecutor>(
        &self,
        combination: &Combination,
        executor: &E,
        failures: &mut Vec<SweepFailure>,
    ) -> Option<MetricRecord> {
        let mut merged: Option<MetricRecord> = None;
        for &rw in self.mode.rw_modes() {
            let outcome = executor
                .execute(combination, rw)
                .map_err(|e| (FailureStage::Run, e.to_string()))
                .and_then(|raw| {
                    normalize::normalize(&raw).map_err(|e| (FailureStage::Parse, e.to_string()))
                });
            let record = match outcome {
                Ok(record) => record,
                Err((stage, message)) => {
                    warn!(%combination, rw = rw.as_fio_arg(), %message, "combination failed");
                    failures.push(SweepFailure {
                        combination: combination.clone(),
                        rw,
                        stage,
                        message,
                    });
                    continue;
                }
            };
            merged = Some(match merged.take() {
                None => record,
                Some(previous) => match combine_directions(previous, record, rw) {
                    Ok(combined) => combined,
                    Err(message) => {
                        warn!(%combination, rw = rw.as_fio_arg(), %message, "dropping direction");
                        failures.push(SweepFailure {
                            combination: combination.clone(),
                            rw,
                            stage: FailureStage::Parse,
                            message,
                        });
                        previous
                    }
                },
            });
        }
        merged
    }
}

/// Folds the record of a second direction into the one already measured for
/// the same combination. Both runs must have echoed the same configuration.
fn combine_directions(
    mut base: MetricRecord,
    next: MetricRecord,
    rw: RwMode,
) -> Result<MetricRecord, String> {
    if GridKey::from(&base) != GridKey::from(&next) {
        return Err(format!(
            "echoed configuration differs between directions: {:?} vs {:?}",
            GridKey::from(&base),
            GridKey::from(&next)
        ));
    }
    if rw.is_write() {
        base.write_bw_mbps = next.write_bw_mbps;
    } else {
        base.read_bw_mbps = next.read_bw_mbps;
    }
    Ok(base)
}
