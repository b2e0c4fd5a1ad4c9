use crate::{
    config::Config,
    converter::has_txt_extension,
    error::{Error, Result},
};
use std::path::PathBuf;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

/// Statistics collected during discovery.
#[derive(Debug, Default, Clone)]
pub(crate) struct ScanStats {
    /// Regular files seen
    pub total_files: usize,

    /// Files selected for conversion
    pub candidates: usize,

    /// Files skipped for their extension
    pub skipped_files: usize,

    /// Walk errors encountered
    pub errors: usize,
}

/// Collects the `.txt` candidate set under a batch root.
pub(crate) struct Scanner {
    root: PathBuf,
    recursive: bool,
}

impl Scanner {
    /// Creates a new scanner from configuration.
    pub(crate) fn new(config: &Config) -> Self {
        Self {
            root: config.input.clone(),
            recursive: config.recursive,
        }
    }

    /// Returns the candidate files, sorted by path.
    ///
    /// A file root is its own candidate set when it is a `.txt` file. A
    /// directory root yields its `.txt` regular files, descending only when
    /// recursive.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The root does not exist (`NotFound`)
    /// - No candidates are found (`NoInputFiles`)
    pub(crate) fn scan(&self) -> Result<Vec<PathBuf>> {
        if !self.root.exists() {
            return Err(Error::not_found(&self.root));
        }

        let mut stats = ScanStats::default();
        let mut files = Vec::new();

        if self.root.is_file() {
            stats.total_files = 1;
            if has_txt_extension(&self.root) {
                files.push(self.root.clone());
            } else {
                stats.skipped_files = 1;
            }
        } else {
            debug!(
                "Scanning {} ({})",
                self.root.display(),
                if self.recursive { "recursive" } else { "top level only" }
            );

            let max_depth = if self.recursive { usize::MAX } else { 1 };
            for entry in WalkDir::new(&self.root).min_depth(1).max_depth(max_depth) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("Walk error: {}", e);
                        stats.errors += 1;
                        continue;
                    }
                };

                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                stats.total_files += 1;

                if has_txt_extension(path) {
                    trace!("Candidate: {}", path.display());
                    files.push(path.to_path_buf());
                } else {
                    stats.skipped_files += 1;
                }
            }
        }

        stats.candidates = files.len();
        debug!(
            "Scan complete: {} files, {} candidates, {} skipped, {} errors",
            stats.total_files, stats.candidates, stats.skipped_files, stats.errors
        );

        if files.is_empty() {
            return Err(Error::no_input_files(&self.root));
        }

        // Sort for deterministic ordering
        files.sort();
        Ok(files)
    }
}
