//! Sweep axes and Cartesian combination generation

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SweepError;

/// Axis names every fio sweep must bind.
pub const REQUIRED_AXES: &[&str] = &["bs", "numjobs", "iodepth"];

/// A named, ordered list of candidate values for one sweep dimension.
///
/// Values are opaque tokens; the harness never interprets them except for the
/// block size echoed back by fio (see [`crate::normalize::parse_block_size`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Axis {
    pub name: String,
    pub values: Vec<String>,
}

impl Axis {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// One fully-bound assignment of a value to every axis, in axis order.
///
/// Identity is structural: two combinations carrying the same (name, value)
/// pairs are equal even if produced by different iteration steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combination {
    entries: Vec<(String, String)>,
}

impl Combination {
    /// Look up the value bound to an axis name.
    pub fn get(&self, axis: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == axis)
            .map(|(_, value)| value.as_str())
    }

    /// Values in axis-declaration order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, value)| value.as_str())
    }

    /// Filename-friendly label, e.g. `4k_2_8`.
    pub fn label(&self) -> String {
        self.values().collect::<Vec<_>>().join("_")
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        Ok(())
    }
}

/// The set of axes a sweep iterates over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisSet {
    axes: Vec<Axis>,
}

impl AxisSet {
    pub fn new(axes: Vec<Axis>) -> Self {
        Self { axes }
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Rejects a malformed sweep definition before any run starts.
    ///
    /// An empty axis set, an axis with zero values, or a missing required
    /// axis would otherwise silently produce no useful work.
    pub fn validate(&self) -> Result<(), SweepError> {
        if self.axes.is_empty() {
            return Err(SweepError::InvalidAxis("axis set is empty".to_string()));
        }
        for axis in &self.axes {
            if axis.values.is_empty() {
                return Err(SweepError::InvalidAxis(format!(
                    "axis `{}` has no values",
                    axis.name
                )));
            }
        }
        for required in REQUIRED_AXES {
            if !self.axes.iter().any(|axis| axis.name == *required) {
                return Err(SweepError::InvalidAxis(format!(
                    "missing required axis `{}`",
                    required
                )));
            }
        }
        Ok(())
    }

    /// Total number of combinations the sweep will produce.
    pub fn combination_count(&self) -> usize {
        self.axes.iter().map(|axis| axis.values.len()).product()
    }

    /// Lazy iterator over the full Cartesian product, first axis slowest.
    ///
    /// Restartable: every call yields a fresh iteration from the start. A
    /// repeated token in an axis value list yields a distinct iteration step;
    /// deduplication happens later at grid level, by key merging.
    pub fn combinations(&self) -> Combinations<'_> {
        Combinations {
            axes: &self.axes,
            indices: vec![0; self.axes.len()],
            exhausted: self.axes.is_empty()
                || self.axes.iter().any(|axis| axis.values.is_empty()),
        }
    }
}

/// Odometer-style iterator over the Cartesian product of an [`AxisSet`].
pub struct Combinations<'a> {
    axes: &'a [Axis],
    indices: Vec<usize>,
    exhausted: bool,
}

impl Iterator for Combinations<'_> {
    type Item = Combination;

    fn next(&mut self) -> Option<Combination> {
        if self.exhausted {
            return None;
        }
        let entries = self
            .axes
            .iter()
            .zip(&self.indices)
            .map(|(axis, &i)| (axis.name.clone(), axis.values[i].clone()))
            .collect();

        // Advance the odometer, last axis fastest.
        self.exhausted = true;
        for pos in (0..self.axes.len()).rev() {
            self.indices[pos] += 1;
            if self.indices[pos] < self.axes[pos].values.len() {
                self.exhausted = false;
                break;
            }
            self.indices[pos] = 0;
        }

        Some(Combination { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(name: &str, values: &[&str]) -> Axis {
        Axis::new(name, values.iter().map(|v| v.to_string()).collect())
    }

    fn fio_axes() -> AxisSet {
        AxisSet::new(vec![
            axis("bs", &["4k", "1m"]),
            axis("numjobs", &["1", "2", "4"]),
            axis("iodepth", &["1", "8"]),
        ])
    }

    #[test]
    fn test_cartesian_product_count() {
        let axes = fio_axes();
        assert_eq!(axes.combination_count(), 12);
        assert_eq!(axes.combinations().count(), 12);
    }

    #[test]
    fn test_first_axis_varies_slowest() {
        let axes = fio_axes();
        let combos: Vec<_> = axes.combinations().collect();
        assert_eq!(combos[0].get("bs"), Some("4k"));
        assert_eq!(combos[0].get("iodepth"), Some("1"));
        assert_eq!(combos[1].get("bs"), Some("4k"));
        assert_eq!(combos[1].get("iodepth"), Some("8"));
        assert_eq!(combos[6].get("bs"), Some("1m"));
        assert_eq!(combos[11].get("numjobs"), Some("4"));
    }

    #[test]
    fn test_values_drawn_from_own_axis() {
        let axes = fio_axes();
        for combo in axes.combinations() {
            assert!(["4k", "1m"].contains(&combo.get("bs").unwrap()));
            assert!(["1", "2", "4"].contains(&combo.get("numjobs").unwrap()));
            assert!(["1", "8"].contains(&combo.get("iodepth").unwrap()));
        }
    }

    #[test]
    fn test_restartable_iteration() {
        let axes = fio_axes();
        let first: Vec<_> = axes.combinations().collect();
        let second: Vec<_> = axes.combinations().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_repeated_token_yields_distinct_steps() {
        let axes = AxisSet::new(vec![
            axis("bs", &["4k", "4k"]),
            axis("numjobs", &["1"]),
            axis("iodepth", &["1"]),
        ]);
        let combos: Vec<_> = axes.combinations().collect();
        assert_eq!(combos.len(), 2);
        assert_eq!(combos[0], combos[1]);
    }

    #[test]
    fn test_empty_axis_rejected() {
        let axes = AxisSet::new(vec![
            axis("bs", &["4k"]),
            axis("numjobs", &[]),
            axis("iodepth", &["1"]),
        ]);
        assert!(axes.validate().is_err());
        assert_eq!(axes.combinations().count(), 0);
    }

    #[test]
    fn test_missing_required_axis_rejected() {
        let axes = AxisSet::new(vec![axis("bs", &["4k"]), axis("numjobs", &["1"])]);
        let err = axes.validate().unwrap_err();
        assert!(err.to_string().contains("iodepth"));
    }

    #[test]
    fn test_combination_label_and_display() {
        let axes = fio_axes();
        let combo = axes.combinations().next().unwrap();
        assert_eq!(combo.label(), "4k_1_1");
        assert_eq!(combo.to_string(), "bs=4k numjobs=1 iodepth=1");
    }
}
