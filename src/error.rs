use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds raised by detection, transcoding and batch conversion.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Input file or batch root does not exist (or is not a regular file).
    #[error("Not found: '{path}'")]
    NotFound {
        /// Missing path
        path: PathBuf,
    },

    /// Input is not a `.txt` file.
    #[error("Unsupported file type '{path}': only .txt files are supported")]
    UnsupportedType {
        /// Rejected input path
        path: PathBuf,
    },

    /// Output already exists and overwriting was not requested.
    #[error("Output exists: '{path}'")]
    AlreadyExists {
        /// Existing output path
        path: PathBuf,
    },

    /// No encoding could be inferred for the input.
    #[error("Failed to detect text encoding of '{path}' (file may be binary)")]
    Undetectable {
        /// Input that could not be classified
        path: PathBuf,
    },

    /// Batch discovery produced an empty candidate set.
    #[error("No .txt files found for batch under '{path}'")]
    NoInputFiles {
        /// Batch root that was scanned
        path: PathBuf,
    },

    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Two batch inputs flatten onto the same output file.
    #[error("Output '{path}' is already claimed by '{claimed_by}'")]
    OutputCollision {
        /// Contested output path
        path: PathBuf,
        /// Input that was assigned the output first
        claimed_by: PathBuf,
    },

    /// Configuration validation error.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// Worker pool could not be started.
    #[error("Failed to start worker pool: {message}")]
    WorkerPool {
        /// Error message
        message: String,
    },
}

impl Error {
    /// Creates an IO error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates an unsupported type error.
    #[must_use]
    pub fn unsupported_type(path: impl Into<PathBuf>) -> Self {
        Self::UnsupportedType { path: path.into() }
    }

    /// Creates an already exists error.
    #[must_use]
    pub fn already_exists(path: impl Into<PathBuf>) -> Self {
        Self::AlreadyExists { path: path.into() }
    }

    /// Creates an undetectable encoding error.
    #[must_use]
    pub fn undetectable(path: impl Into<PathBuf>) -> Self {
        Self::Undetectable { path: path.into() }
    }

    /// Creates a no input files error.
    #[must_use]
    pub fn no_input_files(path: impl Into<PathBuf>) -> Self {
        Self::NoInputFiles { path: path.into() }
    }

    /// Creates an output collision error.
    #[must_use]
    pub fn output_collision(path: impl Into<PathBuf>, claimed_by: impl Into<PathBuf>) -> Self {
        Self::OutputCollision {
            path: path.into(),
            claimed_by: claimed_by.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a worker pool error.
    #[must_use]
    pub fn worker_pool(message: impl Into<String>) -> Self {
        Self::WorkerPool {
            message: message.into(),
        }
    }

    /// Returns true if this is an IO error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns true if this is a not found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if this is an unsupported type error.
    #[must_use]
    pub const fn is_unsupported_type(&self) -> bool {
        matches!(self, Self::UnsupportedType { .. })
    }

    /// Returns true if this is an already exists error.
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns true if this is an undetectable encoding error.
    #[must_use]
    pub const fn is_undetectable(&self) -> bool {
        matches!(self, Self::Undetectable { .. })
    }

    /// Returns true if this is a no input files error.
    #[must_use]
    pub const fn is_no_input_files(&self) -> bool {
        matches!(self, Self::NoInputFiles { .. })
    }

    /// Returns true if this is an output collision error.
    #[must_use]
    pub const fn is_output_collision(&self) -> bool {
        matches!(self, Self::OutputCollision { .. })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        Self::worker_pool(e.to_string())
    }
}
