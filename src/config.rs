use crate::detect::DetectionPolicy;
use crate::error::{Error, Result};
use std::path::PathBuf;

const DEFAULT_WORKERS: usize = 8;
const DEFAULT_SAMPLE_SIZE: usize = 1024 * 1024;
const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Configuration for single-file and batch conversion.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Input `.txt` file, or batch root directory
    pub input: PathBuf,

    /// Output file or directory
    pub output: PathBuf,

    /// Replace outputs that already exist
    pub overwrite: bool,

    /// Maximum number of conversions in flight (never below 1)
    pub workers: usize,

    /// Descend into subdirectories during batch discovery
    pub recursive: bool,

    /// Detector policy shared by single and batch conversions
    pub policy: DetectionPolicy,

    /// Bytes sampled from the head of each input for detection
    pub sample_size: usize,

    /// Raw bytes read per transcoding iteration
    pub chunk_size: usize,

    /// Mirror the input tree under the output root instead of flattening
    pub preserve_structure: bool,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use txt2utf8::Config;
    ///
    /// let config = Config::builder()
    ///     .input("./legacy")
    ///     .output("./utf8")
    ///     .workers(4)
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// Paths are not checked here: a missing input is a conversion failure
    /// (`NotFound`), not a configuration error.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Input or output path is empty
    /// - Sample or chunk size is zero
    pub fn validate(&self) -> Result<()> {
        if self.input.as_os_str().is_empty() {
            return Err(Error::config("input path must not be empty"));
        }

        if self.output.as_os_str().is_empty() {
            return Err(Error::config("output path must not be empty"));
        }

        if self.sample_size == 0 {
            return Err(Error::config("sample_size must be greater than 0"));
        }

        if self.chunk_size == 0 {
            return Err(Error::config("chunk_size must be greater than 0"));
        }

        if self.workers == 0 {
            return Err(Error::config("workers must be at least 1"));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: PathBuf::from("."),
            output: PathBuf::from("out"),
            overwrite: false,
            workers: DEFAULT_WORKERS,
            recursive: true,
            policy: DetectionPolicy::default(),
            sample_size: DEFAULT_SAMPLE_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            preserve_structure: false,
        }
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    overwrite: bool,
    workers: Option<usize>,
    recursive: Option<bool>,
    policy: Option<DetectionPolicy>,
    sample_size: Option<usize>,
    chunk_size: Option<usize>,
    preserve_structure: bool,
}

impl ConfigBuilder {
    /// Sets the input file or batch root.
    #[must_use]
    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.input = Some(path.into());
        self
    }

    /// Sets the output file or directory.
    #[must_use]
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Enables or disables replacing existing outputs.
    #[must_use]
    pub fn overwrite(mut self, enabled: bool) -> Self {
        self.overwrite = enabled;
        self
    }

    /// Sets the concurrency limit. Zero is raised to 1.
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers.max(1));
        self
    }

    /// Enables or disables recursive discovery.
    #[must_use]
    pub fn recursive(mut self, enabled: bool) -> Self {
        self.recursive = Some(enabled);
        self
    }

    /// Sets the detector policy.
    #[must_use]
    pub fn policy(mut self, policy: DetectionPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Sets the detection sample size in bytes.
    #[must_use]
    pub fn sample_size(mut self, bytes: usize) -> Self {
        self.sample_size = Some(bytes);
        self
    }

    /// Sets the transcoding chunk size in bytes.
    #[must_use]
    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = Some(bytes);
        self
    }

    /// Mirrors the input tree under the output root during batch runs.
    #[must_use]
    pub fn preserve_structure(mut self, enabled: bool) -> Self {
        self.preserve_structure = enabled;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let config = Config {
            input: self.input.unwrap_or_else(|| PathBuf::from(".")),
            output: self.output.unwrap_or_else(|| PathBuf::from("out")),
            overwrite: self.overwrite,
            workers: self.workers.unwrap_or(DEFAULT_WORKERS),
            recursive: self.recursive.unwrap_or(true),
            policy: self.policy.unwrap_or_default(),
            sample_size: self.sample_size.unwrap_or(DEFAULT_SAMPLE_SIZE),
            chunk_size: self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            preserve_structure: self.preserve_structure,
        };

        config.validate()?;
        Ok(config)
    }
}
