use crate::{
    config::Config,
    converter::{Converter, FileConverter},
    error::{Error, Result},
    report::{BatchItemResult, BatchSummary, ConversionReport},
    scanner::Scanner,
};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// One discovered candidate and where it is written.
#[derive(Debug, Clone)]
pub(crate) struct BatchTask {
    /// Source file
    pub(crate) input: PathBuf,

    /// Output file, or the collision that keeps this candidate from running
    pub(crate) target: Result<PathBuf>,
}

impl BatchTask {
    /// Runs the conversion for this candidate.
    pub(crate) fn run<C: FileConverter + ?Sized>(
        &self,
        converter: &C,
        overwrite: bool,
    ) -> Result<ConversionReport> {
        match &self.target {
            Ok(output) => converter.convert(&self.input, output, overwrite),
            Err(e) => Err(e.clone()),
        }
    }

    /// Runs the conversion and records the outcome.
    pub(crate) fn execute<C: FileConverter + ?Sized>(
        &self,
        converter: &C,
        overwrite: bool,
    ) -> BatchItemResult {
        let result = self.run(converter, overwrite);
        if let Err(e) = &result {
            warn!("Failed to convert {}: {}", self.input.display(), e);
        }
        BatchItemResult::from_result(&self.input, result)
    }
}

/// Discovers candidates, creates the output directory and assigns every
/// candidate its output file.
///
/// Flattened outputs are claimed in discovery order; a later candidate with
/// the same file name gets an `OutputCollision` target instead of silently
/// replacing the earlier one.
///
/// # Errors
///
/// Returns an error if:
/// - The root does not exist (`NotFound`)
/// - No candidates are found (`NoInputFiles`)
/// - The output directory cannot be created
pub(crate) fn plan_batch(config: &Config) -> Result<Vec<BatchTask>> {
    let files = Scanner::new(config).scan()?;

    fs::create_dir_all(&config.output).map_err(|e| Error::io(&config.output, e))?;

    let root_is_file = config.input.is_file();
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::with_capacity(files.len());

    let tasks = files
        .into_iter()
        .map(|input| {
            let target = output_for(&input, config, root_is_file).and_then(|output| {
                if let Some(owner) = claimed.get(&output) {
                    return Err(Error::output_collision(&output, owner));
                }
                claimed.insert(output.clone(), input.clone());
                Ok(output)
            });
            BatchTask { input, target }
        })
        .collect();

    Ok(tasks)
}

/// Output file of one candidate under the batch output directory.
fn output_for(input: &Path, config: &Config, root_is_file: bool) -> Result<PathBuf> {
    let name = input.file_name().ok_or_else(|| Error::not_found(input))?;

    if config.preserve_structure && !root_is_file {
        if let Some(relative) = pathdiff::diff_paths(input, &config.input) {
            return Ok(config.output.join(relative));
        }
    }

    Ok(config.output.join(name))
}

/// Results of a finished batch.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// One result per candidate, in discovery order
    pub results: Vec<BatchItemResult>,

    /// Aggregate counts
    pub summary: BatchSummary,
}

impl BatchOutcome {
    /// Returns the failed items.
    pub fn failures(&self) -> impl Iterator<Item = &BatchItemResult> {
        self.results.iter().filter(|r| !r.ok)
    }
}

/// Converts every candidate under a root on a bounded worker pool.
///
/// At most `workers` conversions run at once. A failing candidate becomes a
/// failed [`BatchItemResult`]; it never stops its siblings.
pub struct BatchDriver<C = Converter> {
    config: Config,
    converter: C,
}

impl BatchDriver<Converter> {
    /// Creates a driver using the default [`Converter`].
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: Config) -> Result<Self> {
        let converter = Converter::new(&config);
        Self::with_converter(config, converter)
    }
}

impl<C: FileConverter> BatchDriver<C> {
    /// Creates a driver using a custom converter.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_converter(config: Config, converter: C) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, converter })
    }

    /// Runs the batch.
    ///
    /// # Errors
    ///
    /// Returns an error only for batch-level failures: missing root, empty
    /// candidate set, unwritable output directory or a worker pool that
    /// cannot start.
    pub fn run(&self) -> Result<BatchOutcome> {
        self.run_with_observer(&|_| {})
    }

    /// Runs the batch, calling `observer` once per finished candidate.
    ///
    /// # Errors
    ///
    /// Same as [`BatchDriver::run`].
    #[instrument(skip(self, observer), fields(root = %self.config.input.display()))]
    pub fn run_with_observer(
        &self,
        observer: &(dyn Fn(&BatchItemResult) + Sync),
    ) -> Result<BatchOutcome> {
        let start = Instant::now();

        let tasks = plan_batch(&self.config)?;
        let workers = self.config.workers.max(1);
        info!(
            "Converting {} files into {} with {} workers",
            tasks.len(),
            self.config.output.display(),
            workers
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("txt2utf8-worker-{i}"))
            .build()?;

        let overwrite = self.config.overwrite;
        let results: Vec<BatchItemResult> = pool.install(|| {
            tasks
                .par_iter()
                .map(|task| {
                    let item = task.execute(&self.converter, overwrite);
                    observer(&item);
                    item
                })
                .collect()
        });

        let summary = BatchSummary::new(
            &results,
            start.elapsed(),
            self.config.output.display().to_string(),
        );

        info!(
            "✓ Batch finished: {} ok, {} failed in {:.2}s",
            summary.succeeded,
            summary.failed,
            summary.duration.as_secs_f64()
        );
        debug!("Encodings: {:?}", summary.encodings);

        Ok(BatchOutcome { results, summary })
    }
}
