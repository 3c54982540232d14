//! Normalization of fio's JSON output into canonical metric records
//!
//! fio echoes the configuration it actually ran under in a `"global options"`
//! object. The parameters in a [`MetricRecord`] are taken from that echo, not
//! from the driving combination, so a silently altered or rounded request
//! shows up as a different grid key instead of mislabeled data.

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::executor::RawRunOutput;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Canonical measurement extracted from one combination's tool output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub block_size_bytes: u64,
    pub num_jobs: u32,
    pub io_depth: u32,
    pub read_bw_mbps: f64,
    pub write_bw_mbps: f64,
}

#[derive(Debug, Deserialize)]
struct FioOutput {
    #[serde(default)]
    jobs: Vec<FioJob>,
    #[serde(rename = "global options")]
    global_options: Option<FioGlobalOptions>,
}

#[derive(Debug, Deserialize)]
struct FioJob {
    read: Option<FioDirection>,
    write: Option<FioDirection>,
}

#[derive(Debug, Deserialize)]
struct FioDirection {
    bw_bytes: Option<u64>,
}

// fio echoes option values as strings, including the numeric ones.
#[derive(Debug, Deserialize)]
struct FioGlobalOptions {
    bs: Option<String>,
    numjobs: Option<String>,
    iodepth: Option<String>,
}

/// Parses one run's raw JSON artifact into a [`MetricRecord`].
///
/// Bandwidth comes from the first job entry (runs use group reporting, so it
/// covers the whole run) in bytes/s and is converted to MB/s. A missing
/// bandwidth field is zero, not an error: a pure-write run legitimately
/// reports no read bandwidth. Missing or uncoercible echoed parameters are
/// [`ParseError`]s.
pub fn normalize(raw: &RawRunOutput) -> Result<MetricRecord, ParseError> {
    parse_fio_json(&raw.json)
}

pub fn parse_fio_json(json: &str) -> Result<MetricRecord, ParseError> {
    let output: FioOutput =
        serde_json::from_str(json).map_err(|e| ParseError::new("document", e.to_string()))?;

    let job = output
        .jobs
        .first()
        .ok_or_else(|| ParseError::new("jobs", "no job entries in fio output"))?;
    let read_bw_mbps = bw_mbps(job.read.as_ref());
    let write_bw_mbps = bw_mbps(job.write.as_ref());

    let opts = output
        .global_options
        .as_ref()
        .ok_or_else(|| ParseError::new("global options", "missing from fio output"))?;
    let bs = opts
        .bs
        .as_deref()
        .ok_or_else(|| ParseError::new("bs", "missing from echoed global options"))?;

    Ok(MetricRecord {
        block_size_bytes: parse_block_size(bs)?,
        num_jobs: parse_echoed_int(opts.numjobs.as_deref(), "numjobs")?,
        io_depth: parse_echoed_int(opts.iodepth.as_deref(), "iodepth")?,
        read_bw_mbps,
        write_bw_mbps,
    })
}

fn bw_mbps(direction: Option<&FioDirection>) -> f64 {
    direction.and_then(|d| d.bw_bytes).unwrap_or(0) as f64 / BYTES_PER_MB
}

fn parse_echoed_int(value: Option<&str>, field: &'static str) -> Result<u32, ParseError> {
    let raw = value.ok_or_else(|| ParseError::new(field, "missing from echoed global options"))?;
    raw.trim()
        .parse()
        .map_err(|e| ParseError::new(field, format!("`{}`: {}", raw, e)))
}

/// Parses a human block size token into bytes.
///
/// Suffixes `k`, `m` and `g` (case-insensitive) scale by powers of 1024; an
/// unsuffixed token is taken as bytes.
pub fn parse_block_size(raw: &str) -> Result<u64, ParseError> {
    let token = raw.trim();
    if token.is_empty() {
        return Err(ParseError::new("bs", "empty block size"));
    }
    let (digits, multiplier) = match token.as_bytes()[token.len() - 1].to_ascii_lowercase() {
        b'k' => (&token[..token.len() - 1], 1024u64),
        b'm' => (&token[..token.len() - 1], 1024 * 1024),
        b'g' => (&token[..token.len() - 1], 1024 * 1024 * 1024),
        _ => (token, 1),
    };
    let size: u64 = digits
        .parse()
        .map_err(|e| ParseError::new("bs", format!("`{}`: {}", raw, e)))?;
    size.checked_mul(multiplier)
        .ok_or_else(|| ParseError::new("bs", format!("`{}` overflows u64", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fio_json(bs: &str, numjobs: &str, iodepth: &str, read_bw: u64, write_bw: u64) -> String {
        format!(
            r#"{{
                "fio version": "fio-3.33",
                "global options": {{"bs": "{bs}", "numjobs": "{numjobs}", "iodepth": "{iodepth}"}},
                "jobs": [{{
                    "jobname": "sweep",
                    "read": {{"bw_bytes": {read_bw}, "iops": 1000.0}},
                    "write": {{"bw_bytes": {write_bw}, "iops": 500.0}}
                }}]
            }}"#
        )
    }

    #[test]
    fn test_parse_block_size_suffixes() {
        assert_eq!(parse_block_size("4k").unwrap(), 4096);
        assert_eq!(parse_block_size("1m").unwrap(), 1048576);
        assert_eq!(parse_block_size("2g").unwrap(), 2147483648);
        assert_eq!(parse_block_size("512").unwrap(), 512);
        assert_eq!(parse_block_size("8K").unwrap(), 8192);
    }

    #[test]
    fn test_parse_block_size_rejects_garbage() {
        assert!(parse_block_size("").is_err());
        assert!(parse_block_size("k").is_err());
        assert!(parse_block_size("4x").is_err());
        assert!(parse_block_size("four-k").is_err());
    }

    #[test]
    fn test_parse_full_output() {
        let json = fio_json("64k", "4", "16", 209715200, 104857600);
        let record = parse_fio_json(&json).unwrap();
        assert_eq!(record.block_size_bytes, 65536);
        assert_eq!(record.num_jobs, 4);
        assert_eq!(record.io_depth, 16);
        assert!((record.read_bw_mbps - 200.0).abs() < 1e-9);
        assert!((record.write_bw_mbps - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_bandwidth_is_zero() {
        // A pure-write run reports no read object at all.
        let json = r#"{
            "global options": {"bs": "4k", "numjobs": "1", "iodepth": "1"},
            "jobs": [{"write": {"bw_bytes": 1048576}}]
        }"#;
        let record = parse_fio_json(json).unwrap();
        assert_eq!(record.read_bw_mbps, 0.0);
        assert!((record.write_bw_mbps - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_echoed_field_is_error() {
        let json = r#"{
            "global options": {"bs": "4k", "iodepth": "1"},
            "jobs": [{"read": {"bw_bytes": 0}}]
        }"#;
        let err = parse_fio_json(json).unwrap_err();
        assert_eq!(err.field, "numjobs");
    }

    #[test]
    fn test_uncoercible_echoed_field_is_error() {
        let json = fio_json("4k", "lots", "1", 0, 0);
        let err = parse_fio_json(&json).unwrap_err();
        assert_eq!(err.field, "numjobs");
    }

    #[test]
    fn test_no_jobs_is_error() {
        let json = r#"{"global options": {"bs": "4k", "numjobs": "1", "iodepth": "1"}, "jobs": []}"#;
        let err = parse_fio_json(json).unwrap_err();
        assert_eq!(err.field, "jobs");
    }

    #[test]
    fn test_first_job_entry_wins() {
        let json = r#"{
            "global options": {"bs": "4k", "numjobs": "2", "iodepth": "1"},
            "jobs": [
                {"read": {"bw_bytes": 2097152}},
                {"read": {"bw_bytes": 1048576}}
            ]
        }"#;
        let record = parse_fio_json(json).unwrap();
        assert!((record.read_bw_mbps - 2.0).abs() < 1e-9);
    }
}
