//! # txt2utf8
//!
//! Converts text files of unknown or mixed encoding into canonical UTF-8.
//!
//! ## Features
//!
//! - Encoding detection from a bounded head sample, with a lenient
//!   always-succeed policy or a strict fail-on-miss policy
//! - Streaming decode → UTF-8 encode with memory bounded by the chunk size
//! - Byte-order marks stripped on read, never written
//! - Atomic output writes (temp file + rename)
//! - Parallel batch conversion with per-file failure isolation
//!
//! ## Quick Start
//!
//! ```no_run
//! use txt2utf8::{Config, BatchDriver};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .input("./legacy")
//!     .output("./utf8")
//!     .workers(8)
//!     .build()?;
//!
//! let outcome = BatchDriver::new(config)?.run()?;
//! for failure in outcome.failures() {
//!     eprintln!("{}: {:?}", failure.path.display(), failure.error);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Data flows one way:
//! 1. **Scanner**: Discovers `.txt` candidates under a root
//! 2. **BatchDriver**: Fans candidates out over a bounded worker pool
//! 3. **Converter**: Validates paths and applies the overwrite policy
//! 4. **EncodingDetector**: Infers the source encoding
//! 5. **StreamTranscoder**: Streams the file into UTF-8

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod batch;
mod config;
mod converter;
mod error;
mod report;
mod scanner;
mod transcode;

pub mod detect;

#[cfg(feature = "async")]
pub mod async_batch;

pub use batch::{BatchDriver, BatchOutcome};
pub use config::{Config, ConfigBuilder};
pub use converter::{Converter, FileConverter};
pub use detect::{CharsetClassifier, DetectionPolicy, EncodingDetector};
pub use error::{Error, Result};
pub use report::{BatchItemResult, BatchSummary, ConversionReport};
pub use transcode::{StreamTranscoder, TranscodeStats};

/// Converts the single file named by `config.input` into `config.output`.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - The input is missing or not a `.txt` file
/// - The output exists and overwriting is disabled
/// - The encoding cannot be detected (strict policy only)
/// - Reading or writing fails
///
/// # Examples
///
/// ```no_run
/// use txt2utf8::{Config, convert_file};
///
/// # fn main() -> anyhow::Result<()> {
/// let config = Config::builder()
///     .input("legacy/report.txt")
///     .output("utf8/")
///     .build()?;
///
/// let report = convert_file(&config)?;
/// println!("{} → {}", report.detected_encoding, report.output_path.display());
/// # Ok(())
/// # }
/// ```
pub fn convert_file(config: &Config) -> Result<ConversionReport> {
    config.validate()?;
    Converter::new(config).convert(&config.input, &config.output, config.overwrite)
}

/// Converts every `.txt` file under `config.input` into `config.output`.
///
/// Per-file failures are returned as failed items, in discovery order.
///
/// # Errors
///
/// Returns an error only if the batch cannot run at all: invalid
/// configuration, missing root, no candidates, or an output directory that
/// cannot be created.
pub fn convert_batch(config: Config) -> Result<Vec<BatchItemResult>> {
    Ok(BatchDriver::new(config)?.run()?.results)
}
