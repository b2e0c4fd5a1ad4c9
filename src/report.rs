use crate::error::Error;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Outcome of one successful conversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionReport {
    /// Source file
    pub input_path: PathBuf,

    /// File that was written
    pub output_path: PathBuf,

    /// Detected source encoding label
    pub detected_encoding: String,

    /// Detection confidence in [0, 1]
    pub confidence: f64,

    /// Raw bytes consumed from the input
    pub bytes_in: u64,

    /// Size of the output file on disk
    pub bytes_out: u64,
}

/// Outcome of one batch candidate.
///
/// Exactly one of `report` and `error` is set.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItemResult {
    /// Source file
    pub path: PathBuf,

    /// Whether the conversion succeeded
    pub ok: bool,

    /// Conversion report, present on success
    pub report: Option<ConversionReport>,

    /// Human-readable failure, present on failure
    pub error: Option<String>,
}

impl BatchItemResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(path: impl Into<PathBuf>, report: ConversionReport) -> Self {
        Self {
            path: path.into(),
            ok: true,
            report: Some(report),
            error: None,
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failure(path: impl Into<PathBuf>, error: &Error) -> Self {
        Self {
            path: path.into(),
            ok: false,
            report: None,
            error: Some(error.to_string()),
        }
    }

    /// Builds the result of converting `path`.
    #[must_use]
    pub fn from_result(path: &Path, result: crate::Result<ConversionReport>) -> Self {
        match result {
            Ok(report) => Self::success(path, report),
            Err(e) => Self::failure(path, &e),
        }
    }
}

/// Aggregate view of a finished batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    /// Number of candidates
    pub total: usize,

    /// Successful conversions
    pub succeeded: usize,

    /// Failed conversions
    pub failed: usize,

    /// Input bytes across successful conversions
    pub bytes_in: u64,

    /// Output bytes across successful conversions
    pub bytes_out: u64,

    /// Successful conversions per detected encoding
    pub encodings: BTreeMap<String, usize>,

    /// Wall time of the batch
    pub duration: Duration,

    /// Output directory
    pub output_directory: String,
}

impl BatchSummary {
    /// Computes the summary of `results`.
    #[must_use]
    pub fn new(results: &[BatchItemResult], duration: Duration, output_directory: String) -> Self {
        let reports: Vec<&ConversionReport> =
            results.iter().filter_map(|r| r.report.as_ref()).collect();

        let mut encodings = BTreeMap::new();
        for report in &reports {
            *encodings.entry(report.detected_encoding.clone()).or_insert(0) += 1;
        }

        let succeeded = results.iter().filter(|r| r.ok).count();

        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            bytes_in: reports.iter().map(|r| r.bytes_in).sum(),
            bytes_out: reports.iter().map(|r| r.bytes_out).sum(),
            encodings,
            duration,
            output_directory,
        }
    }

    /// Returns true if every candidate converted.
    #[must_use]
    pub const fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("{self}");
    }

    /// Returns the throughput in input bytes per second.
    #[must_use]
    pub fn throughput_bytes_per_sec(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.bytes_in as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n╔═══════════════════════════════════════════════════════╗")?;
        writeln!(f, "║              Batch Conversion Summary                 ║")?;
        writeln!(f, "╠═══════════════════════════════════════════════════════╣")?;
        writeln!(f, "║ Files:                {:>8}                        ║", self.total)?;
        writeln!(f, "║   - Converted:        {:>8}                        ║", self.succeeded)?;
        writeln!(f, "║   - Failed:           {:>8}                        ║", self.failed)?;
        writeln!(f, "║                                                       ║")?;
        writeln!(f, "║ Bytes In:             {:>12}                    ║", self.bytes_in)?;
        writeln!(f, "║ Bytes Out:            {:>12}                    ║", self.bytes_out)?;
        writeln!(f, "║                                                       ║")?;
        writeln!(f, "║ Detected Encodings:                                   ║")?;
        for (name, count) in &self.encodings {
            writeln!(f, "║   - {name:<18} {count:>8}                        ║")?;
        }
        writeln!(f, "║                                                       ║")?;
        writeln!(
            f,
            "║ Total Time:           {:>8.2}s                       ║",
            self.duration.as_secs_f64()
        )?;
        writeln!(
            f,
            "║ Throughput:           {:>10.0} B/s                  ║",
            self.throughput_bytes_per_sec()
        )?;
        writeln!(f, "║ Output Directory:                                     ║")?;
        writeln!(f, "║   {}", self.output_directory)?;
        write!(f, "╚═══════════════════════════════════════════════════════╝")
    }
}
