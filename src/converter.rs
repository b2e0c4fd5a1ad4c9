use crate::{
    config::Config,
    detect::EncodingDetector,
    error::{Error, Result},
    report::ConversionReport,
    transcode::StreamTranscoder,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Converts one file to UTF-8.
///
/// This is the seam the batch drivers work against; implementations must be
/// safe to call from many threads at once.
pub trait FileConverter: Send + Sync {
    /// Converts `input` to UTF-8 at the location named by `output`.
    ///
    /// # Errors
    ///
    /// Returns an error if any precondition fails or the conversion itself
    /// fails.
    fn convert(&self, input: &Path, output: &Path, overwrite: bool) -> Result<ConversionReport>;
}

/// Detects the source encoding of a `.txt` file and streams it into UTF-8.
#[derive(Debug, Clone)]
pub struct Converter {
    detector: EncodingDetector,
    transcoder: StreamTranscoder,
    sample_size: usize,
}

impl Converter {
    /// Creates a converter from configuration.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            detector: EncodingDetector::new(config.policy),
            transcoder: StreamTranscoder::new(config.chunk_size),
            sample_size: config.sample_size,
        }
    }

    /// Replaces the encoding detector.
    #[must_use]
    pub fn with_detector(mut self, detector: EncodingDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Converts `input`, reporting cumulative input bytes to `progress`.
    ///
    /// # Process
    ///
    /// 1. Checks the input exists and has a `.txt` extension
    /// 2. Resolves the output path and applies the overwrite policy
    /// 3. Creates missing parent directories
    /// 4. Detects the encoding from a bounded head sample
    /// 5. Streams the file into UTF-8
    ///
    /// Nothing is written before steps 1 and 2 pass.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The input is missing or not a regular file (`NotFound`)
    /// - The input is not a `.txt` file (`UnsupportedType`)
    /// - The output exists and `overwrite` is false (`AlreadyExists`)
    /// - The strict detector finds no encoding (`Undetectable`)
    /// - Reading or writing fails (`Io`)
    pub fn convert_with_progress(
        &self,
        input: &Path,
        output: &Path,
        overwrite: bool,
        progress: &mut dyn FnMut(u64),
    ) -> Result<ConversionReport> {
        ensure_input_txt(input)?;
        let out_path = resolve_output_path(input, output)?;

        if out_path.exists() && !overwrite {
            return Err(Error::already_exists(out_path));
        }

        if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let detection = self.detector.detect_file(input, self.sample_size)?;
        let stats = self.transcoder.transcode_with_progress(
            input,
            &out_path,
            detection.encoding,
            progress,
        )?;

        let bytes_out = fs::metadata(&out_path)
            .map_err(|e| Error::io(&out_path, e))?
            .len();

        debug!(
            "Converted {} [{}] → {} ({}→{} bytes)",
            input.display(),
            detection.name(),
            out_path.display(),
            stats.bytes_read,
            bytes_out
        );

        Ok(ConversionReport {
            input_path: input.to_path_buf(),
            output_path: out_path,
            detected_encoding: detection.name().to_string(),
            confidence: detection.confidence,
            bytes_in: stats.bytes_read,
            bytes_out,
        })
    }
}

impl FileConverter for Converter {
    fn convert(&self, input: &Path, output: &Path, overwrite: bool) -> Result<ConversionReport> {
        self.convert_with_progress(input, output, overwrite, &mut |_| {})
    }
}

/// Returns true if `path` has a `.txt` extension, ignoring case.
#[must_use]
pub(crate) fn has_txt_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
}

/// Checks the input is an existing regular `.txt` file.
fn ensure_input_txt(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(Error::not_found(path));
    }
    if !has_txt_extension(path) {
        return Err(Error::unsupported_type(path));
    }
    Ok(())
}

/// Resolves where the converted `input` is written.
///
/// An output with no extension, or one naming an existing directory, is a
/// directory and receives the input's file name; anything else is the exact
/// output file.
pub(crate) fn resolve_output_path(input: &Path, output: &Path) -> Result<PathBuf> {
    if output.extension().is_none() || output.is_dir() {
        let name = input
            .file_name()
            .ok_or_else(|| Error::not_found(input))?;
        let resolved = output.join(name);
        debug!("Output {} resolved as directory → {}", output.display(), resolved.display());
        return Ok(resolved);
    }
    Ok(output.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::DetectionPolicy;
    use assert_fs::prelude::*;

    const CYRILLIC_1251: &[u8] = b"\xcf\xf0\xe8\xe2\xe5\xf2, \xec\xe8\xf0! \xdd\xf2\xee \xf2\xe5\xf1\xf2\xee\xe2\xfb\xe9 \xf4\xe0\xe9\xeb \xed\xe0 \xf0\xf3\xf1\xf1\xea\xee\xec \xff\xe7\xfb\xea\xe5. \xcc\xfb \xef\xf0\xee\xe2\xe5\xf0\xff\xe5\xec \xea\xee\xe4\xe8\xf0\xee\xe2\xea\xf3 \xf2\xe5\xea\xf1\xf2\xe0.";

    fn converter() -> Converter {
        Converter::new(&Config::default())
    }

    #[test]
    fn test_windows_1251_into_directory() {
        let temp = assert_fs::TempDir::new().unwrap();
        let input = temp.child("a.txt");
        input.write_binary(CYRILLIC_1251).unwrap();
        let out_dir = temp.child("out");

        let report = converter().convert(input.path(), out_dir.path(), false).unwrap();

        assert_eq!(report.output_path, out_dir.path().join("a.txt"));
        assert_eq!(report.detected_encoding, "windows-1251");
        assert!(report.confidence > 0.0);

        let expected = encoding_rs::WINDOWS_1251.decode(CYRILLIC_1251).0;
        let written = fs::read_to_string(&report.output_path).unwrap();
        assert_eq!(written, expected);
        assert!(written.starts_with("Привет"));
    }

    #[test]
    fn test_bytes_out_matches_disk() {
        let temp = assert_fs::TempDir::new().unwrap();
        let input = temp.child("a.txt");
        input.write_binary(CYRILLIC_1251).unwrap();

        let report = converter()
            .convert(input.path(), &temp.path().join("b.txt"), false)
            .unwrap();

        assert_eq!(report.bytes_in, CYRILLIC_1251.len() as u64);
        assert_eq!(report.bytes_out, fs::metadata(&report.output_path).unwrap().len());
        assert!(report.bytes_out > report.bytes_in);
    }

    #[test]
    fn test_strips_bom() {
        let temp = assert_fs::TempDir::new().unwrap();
        let input = temp.child("bom.txt");
        input.write_binary(b"\xEF\xBB\xBFfirst line\n").unwrap();

        let report = converter()
            .convert(input.path(), &temp.path().join("out"), false)
            .unwrap();

        assert_eq!(fs::read(&report.output_path).unwrap(), b"first line\n");
    }

    #[test]
    fn test_utf8_conversion_is_idempotent() {
        let temp = assert_fs::TempDir::new().unwrap();
        let input = temp.child("plain.txt");
        input.write_str("Ünïcödé text\r\nsecond line\n").unwrap();

        let first = converter()
            .convert(input.path(), &temp.path().join("one"), false)
            .unwrap();
        let second = converter()
            .convert(&first.output_path, &temp.path().join("two"), false)
            .unwrap();

        let original = fs::read(input.path()).unwrap();
        assert_eq!(fs::read(&first.output_path).unwrap(), original);
        assert_eq!(fs::read(&second.output_path).unwrap(), original);
    }

    #[test]
    fn test_existing_output_is_untouched() {
        let temp = assert_fs::TempDir::new().unwrap();
        let input = temp.child("a.txt");
        input.write_str("new").unwrap();
        let existing = temp.child("out/a.txt");
        existing.write_str("keep me").unwrap();

        let err = converter()
            .convert(input.path(), &temp.path().join("out"), false)
            .unwrap_err();

        assert!(err.is_already_exists());
        assert_eq!(fs::read_to_string(existing.path()).unwrap(), "keep me");
    }

    #[test]
    fn test_overwrite_replaces_output() {
        let temp = assert_fs::TempDir::new().unwrap();
        let input = temp.child("a.txt");
        input.write_str("new").unwrap();
        let existing = temp.child("out/a.txt");
        existing.write_str("old").unwrap();

        converter()
            .convert(input.path(), &temp.path().join("out"), true)
            .unwrap();

        assert_eq!(fs::read_to_string(existing.path()).unwrap(), "new");
    }

    #[test]
    fn test_in_place_with_overwrite() {
        let temp = assert_fs::TempDir::new().unwrap();
        let input = temp.child("a.txt");
        input.write_binary(b"\xEF\xBB\xBFinline").unwrap();

        let report = converter().convert(input.path(), input.path(), true).unwrap();

        assert_eq!(report.output_path, input.path());
        assert_eq!(fs::read(input.path()).unwrap(), b"inline");
    }

    #[test]
    fn test_missing_input() {
        let temp = assert_fs::TempDir::new().unwrap();
        let err = converter()
            .convert(&temp.path().join("nope.txt"), temp.path(), false)
            .unwrap_err();
        assert!(err.is_not_found());

        let err = converter().convert(temp.path(), temp.path(), false).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_rejects_non_txt() {
        let temp = assert_fs::TempDir::new().unwrap();
        let input = temp.child("data.csv");
        input.write_str("a,b").unwrap();

        let err = converter()
            .convert(input.path(), &temp.path().join("out"), false)
            .unwrap_err();

        assert!(err.is_unsupported_type());
        assert!(!temp.child("out").exists());
    }

    #[test]
    fn test_accepts_uppercase_extension() {
        let temp = assert_fs::TempDir::new().unwrap();
        let input = temp.child("LOUD.TXT");
        input.write_str("hello").unwrap();

        let report = converter()
            .convert(input.path(), &temp.path().join("out"), false)
            .unwrap();

        assert_eq!(report.output_path, temp.path().join("out").join("LOUD.TXT"));
    }

    #[test]
    fn test_strict_policy_rejects_binary() {
        let temp = assert_fs::TempDir::new().unwrap();
        let input = temp.child("blob.txt");
        input.write_binary(&[0u8, 1, 2, 0, 3]).unwrap();

        let config = Config::builder()
            .policy(DetectionPolicy::Strict)
            .build()
            .unwrap();
        let err = Converter::new(&config)
            .convert(input.path(), &temp.path().join("out"), false)
            .unwrap_err();

        assert!(err.is_undetectable());
        assert!(!temp.child("out/blob.txt").exists());
    }

    #[test]
    fn test_custom_classifier() {
        use crate::detect::{CharsetClassifier, Classification};
        use std::sync::Arc;

        struct Koi8;

        impl CharsetClassifier for Koi8 {
            fn classify(&self, _sample: &[u8]) -> Option<Classification> {
                Some(Classification {
                    encoding: encoding_rs::KOI8_R,
                    confidence: 0.42,
                })
            }
        }

        let temp = assert_fs::TempDir::new().unwrap();
        let input = temp.child("koi.txt");
        // "мир" in KOI8-R
        input.write_binary(b"\xcd\xc9\xd2").unwrap();

        let detector = EncodingDetector::with_classifier(Arc::new(Koi8), DetectionPolicy::Strict);
        let report = converter()
            .with_detector(detector)
            .convert(input.path(), &temp.path().join("out"), false)
            .unwrap();

        assert_eq!(report.detected_encoding, "KOI8-R");
        assert_eq!(report.confidence, 0.42);
        assert_eq!(fs::read_to_string(&report.output_path).unwrap(), "мир");
    }

    #[test]
    fn test_resolve_output_path() {
        let temp = assert_fs::TempDir::new().unwrap();
        let input = Path::new("/data/in/a.txt");

        assert_eq!(
            resolve_output_path(input, Path::new("out")).unwrap(),
            Path::new("out/a.txt")
        );
        assert_eq!(
            resolve_output_path(input, Path::new("out/b.txt")).unwrap(),
            Path::new("out/b.txt")
        );

        let dotted = temp.child("dir.d");
        dotted.create_dir_all().unwrap();
        assert_eq!(
            resolve_output_path(input, dotted.path()).unwrap(),
            dotted.path().join("a.txt")
        );
    }

    #[test]
    fn test_has_txt_extension() {
        assert!(has_txt_extension(Path::new("a.txt")));
        assert!(has_txt_extension(Path::new("a.TxT")));
        assert!(!has_txt_extension(Path::new("a.csv")));
        assert!(!has_txt_extension(Path::new("txt")));
        assert!(!has_txt_extension(Path::new("a.txt.bak")));
    }
}
