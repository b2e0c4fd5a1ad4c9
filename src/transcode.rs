use crate::error::{Error, Result};
use encoding_rs::{CoderResult, Encoding};
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

const MIN_OUTPUT_BUFFER: usize = 4096;

/// Byte counts of a finished transcode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranscodeStats {
    /// Raw bytes consumed from the input
    pub bytes_read: u64,
    /// UTF-8 bytes written to the output
    pub bytes_written: u64,
    /// Whether any input was replaced with U+FFFD
    pub had_replacements: bool,
}

/// Decodes a file from a source encoding and writes it as UTF-8.
///
/// Memory use is bounded by the chunk size regardless of file size. Output
/// never carries a byte-order mark and newlines pass through untouched.
#[derive(Debug, Clone, Copy)]
pub struct StreamTranscoder {
    chunk_size: usize,
}

impl StreamTranscoder {
    /// Creates a transcoder reading `chunk_size` raw bytes per iteration.
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Transcodes `input` into `output`.
    ///
    /// # Errors
    ///
    /// Returns an error if reading, writing or the final rename fails.
    pub fn transcode(
        &self,
        input: &Path,
        output: &Path,
        encoding: &'static Encoding,
    ) -> Result<TranscodeStats> {
        self.transcode_with_progress(input, output, encoding, &mut |_| {})
    }

    /// Transcodes `input` into `output`, reporting cumulative input bytes
    /// consumed after every chunk.
    ///
    /// # Process
    ///
    /// 1. Streams decoded chunks into a hidden sibling temp file
    /// 2. Syncs the temp file to disk
    /// 3. Renames it over `output`
    ///
    /// The temp file is removed on failure, so `output` is either left as it
    /// was or fully written.
    ///
    /// # Errors
    ///
    /// Returns an error if reading, writing or the final rename fails.
    pub fn transcode_with_progress(
        &self,
        input: &Path,
        output: &Path,
        encoding: &'static Encoding,
        progress: &mut dyn FnMut(u64),
    ) -> Result<TranscodeStats> {
        let temp_path = temp_path_for(output)?;

        let result = self
            .stream(input, &temp_path, encoding, progress)
            .and_then(|stats| {
                fs::rename(&temp_path, output).map_err(|e| Error::io(output, e))?;
                Ok(stats)
            });

        if result.is_err() && temp_path.exists() {
            if let Err(e) = fs::remove_file(&temp_path) {
                debug!("Failed to remove {}: {}", temp_path.display(), e);
            }
        }

        result
    }

    fn stream(
        &self,
        input: &Path,
        temp_path: &Path,
        encoding: &'static Encoding,
        progress: &mut dyn FnMut(u64),
    ) -> Result<TranscodeStats> {
        let mut reader = File::open(input).map_err(|e| Error::io(input, e))?;
        let mut writer = File::create(temp_path).map_err(|e| Error::io(temp_path, e))?;

        let mut decoder = encoding.new_decoder_with_bom_removal();
        let mut raw = vec![0u8; self.chunk_size];
        let mut decoded = vec![0u8; self.chunk_size.max(MIN_OUTPUT_BUFFER)];
        let mut stats = TranscodeStats::default();

        loop {
            let n = match reader.read(&mut raw) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::io(input, e)),
            };
            let last = n == 0;
            stats.bytes_read += n as u64;

            let mut pending = &raw[..n];
            loop {
                let (result, read, written, had_errors) =
                    decoder.decode_to_utf8(pending, &mut decoded, last);
                stats.had_replacements |= had_errors;

                writer
                    .write_all(&decoded[..written])
                    .map_err(|e| Error::io(temp_path, e))?;
                stats.bytes_written += written as u64;
                pending = &pending[read..];

                match result {
                    CoderResult::InputEmpty => break,
                    CoderResult::OutputFull => continue,
                }
            }

            trace!("Transcoded {} bytes of {}", stats.bytes_read, input.display());
            progress(stats.bytes_read);

            if last {
                break;
            }
        }

        writer.sync_all().map_err(|e| Error::io(temp_path, e))?;

        if stats.had_replacements {
            debug!(
                "Replaced undecodable {} input in {}",
                encoding.name(),
                input.display()
            );
        }

        Ok(stats)
    }
}

/// Hidden sibling used while the output is being written.
fn temp_path_for(output: &Path) -> Result<PathBuf> {
    let name = output
        .file_name()
        .ok_or_else(|| Error::config(format!("Invalid output path: {}", output.display())))?
        .to_string_lossy();

    Ok(output.with_file_name(format!(".{name}.tmp")))
}
