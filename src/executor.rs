//! Execution of individual fio runs as synchronous subprocesses
//!
//! Each combination writes its JSON artifact to a path derived from its own
//! parameter values, so re-runs and neighbouring combinations never clobber a
//! result before it is read back.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::axes::Combination;
use crate::error::RunError;
use crate::{RwMode, SweepConfig};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The unparsed JSON artifact produced by one fio invocation.
///
/// Transient: handed to the normalizer and discarded.
#[derive(Debug, Clone)]
pub struct RawRunOutput {
    pub combination: Combination,
    pub rw: RwMode,
    pub json: String,
}

/// Seam between the orchestrator and the external tool.
///
/// Implementations must block until the run completes; stub implementations
/// back the orchestrator tests.
pub trait RunExecutor {
    fn execute(&self, combination: &Combination, rw: RwMode) -> Result<RawRunOutput, RunError>;
}

/// Runs the real fio binary, one invocation per call.
pub struct FioExecutor {
    config: SweepConfig,
    results_dir: PathBuf,
}

impl FioExecutor {
    /// `results_dir` is the per-sweep directory the JSON artifacts land in.
    pub fn new(config: SweepConfig, results_dir: PathBuf) -> Self {
        Self {
            config,
            results_dir,
        }
    }

    /// Deterministic artifact path for one (combination, rw) run.
    pub fn artifact_path(&self, combination: &Combination, rw: RwMode) -> PathBuf {
        self.results_dir
            .join(format!("result_{}_{}.json", combination.label(), rw.as_fio_arg()))
    }

    fn build_command(
        &self,
        combination: &Combination,
        rw: RwMode,
        artifact: &Path,
    ) -> Result<Command, RunError> {
        let bind = |axis: &'static str| {
            combination
                .get(axis)
                .ok_or_else(|| RunError::new(combination, format!("combination has no `{}` axis", axis)))
        };
        let bs = bind("bs")?;
        let numjobs = bind("numjobs")?;
        let iodepth = bind("iodepth")?;

        let cfg = &self.config;
        let mut cmd = Command::new(&cfg.fio_binary);
        cmd.arg(format!("--rw={}", rw.as_fio_arg()))
            .arg(format!("--ioengine={}", cfg.ioengine))
            .arg(format!("--filesize={}", cfg.file_size))
            .arg(format!("--nrfiles={}", cfg.nr_files))
            .arg(format!("--bs={}", bs))
            .arg(format!("--numjobs={}", numjobs))
            .arg(format!("--iodepth={}", iodepth));
        if cfg.direct {
            cmd.arg("--direct=1");
        }
        if cfg.unlink {
            cmd.arg("--unlink=1");
        }
        if cfg.group_reporting {
            cmd.arg("--group_reporting=1");
        }
        cmd.arg(format!("--directory={}", cfg.target_dir.display()))
            .arg("--time_based=1")
            .arg(format!("--runtime={}s", cfg.runtime_secs))
            .arg(format!("--name={}", cfg.job_name))
            .arg("--output-format=json")
            .arg(format!("--output={}", artifact.display()));
        Ok(cmd)
    }
}

impl RunExecutor for FioExecutor {
    fn execute(&self, combination: &Combination, rw: RwMode) -> Result<RawRunOutput, RunError> {
        let artifact = self.artifact_path(combination, rw);
        let mut cmd = self.build_command(combination, rw, &artifact)?;
        debug!(%combination, rw = rw.as_fio_arg(), artifact = %artifact.display(), "invoking fio");

        let timeout = self.config.timeout_secs.map(Duration::from_secs);
        let output = run_to_completion(&mut cmd, timeout).map_err(|e| {
            RunError::new(
                combination,
                format!("failed to run `{}`: {}", self.config.fio_binary, e),
            )
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RunError::new(
                combination,
                format!("fio exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        let json = fs::read_to_string(&artifact).map_err(|e| {
            RunError::new(
                combination,
                format!("unreadable result artifact {}: {}", artifact.display(), e),
            )
        })?;

        Ok(RawRunOutput {
            combination: combination.clone(),
            rw,
            json,
        })
    }
}

/// Blocks until the child exits, killing it if the optional deadline passes.
///
/// Cancellation is not supported mid-run; the orchestrator only checks its
/// token between combinations.
fn run_to_completion(cmd: &mut Command, timeout: Option<Duration>) -> io::Result<Output> {
    cmd.stdout(Stdio::null()).stderr(Stdio::piped());
    let mut child = cmd.spawn()?;

    // Drain stderr on its own thread: a child that writes more than the pipe
    // buffer would otherwise block on the full pipe and never exit from the
    // poll loop's perspective. fio emits warnings on stderr on valid input.
    let mut stderr_pipe = child.stderr.take();
    let drain = thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(stderr) = stderr_pipe.as_mut() {
            let _ = stderr.read_to_end(&mut buf);
        }
        buf
    });

    let deadline = timeout.map(|t| Instant::now() + t);
    loop {
        if let Some(status) = child.try_wait()? {
            let stderr = drain.join().unwrap_or_default();
            return Ok(Output {
                status,
                stdout: Vec::new(),
                stderr,
            });
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                child.kill()?;
                let _ = child.wait();
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("run exceeded {:?} limit", timeout.unwrap_or_default()),
                ));
            }
        }
        thread::sleep(POLL_INTERVAL);
    }
}
