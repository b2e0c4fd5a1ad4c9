use crate::error::{Error, Result};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

/// Confidence reported by the lenient policy for any accepted guess.
pub const LENIENT_CONFIDENCE: f64 = 0.8;

/// Confidence reported when every explicit fallback failed.
pub const TERMINAL_CONFIDENCE: f64 = 0.5;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One strict-decode attempt of the lenient fallback chain.
struct FallbackStep {
    encoding: &'static Encoding,
    /// Bytes the legacy code page leaves undefined even though the WHATWG
    /// table maps them.
    undefined: &'static [u8],
}

impl FallbackStep {
    fn accepts(&self, sample: &[u8]) -> bool {
        !sample.iter().any(|b| self.undefined.contains(b))
            && self
                .encoding
                .decode_without_bom_handling_and_without_replacement(sample)
                .is_some()
    }
}

/// Encodings tried, in order, after a classifier miss. The last one maps
/// every byte and therefore always decodes.
static FALLBACK_CHAIN: [FallbackStep; 3] = [
    FallbackStep {
        encoding: &encoding_rs::UTF_8_INIT,
        undefined: &[],
    },
    FallbackStep {
        encoding: &encoding_rs::WINDOWS_1251_INIT,
        undefined: &[0x98],
    },
    FallbackStep {
        encoding: &encoding_rs::WINDOWS_1252_INIT,
        undefined: &[],
    },
];

/// How the detector reacts when the classifier has no answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionPolicy {
    /// Always produce an encoding: fixed confidence for classifier hits,
    /// strict-decode fallback chain for misses.
    #[default]
    Lenient,
    /// Fail with `Undetectable` on a miss and expose the classifier's own
    /// confidence on a hit.
    Strict,
}

/// A classifier's best guess for a byte sample.
#[derive(Debug, Clone, Copy)]
pub struct Classification {
    /// Guessed encoding
    pub encoding: &'static Encoding,
    /// Classifier confidence in [0, 1]
    pub confidence: f64,
}

/// Statistical charset classifier.
///
/// Implementations must be pure functions of the sample and thread-safe.
pub trait CharsetClassifier: Send + Sync {
    /// Returns the best guess for `sample`, or `None` when the sample does
    /// not look like text in any known encoding.
    fn classify(&self, sample: &[u8]) -> Option<Classification>;
}

/// Default classifier: BOM sniffing, a NUL-byte binary check, then
/// `chardetng` statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChardetClassifier;

impl CharsetClassifier for ChardetClassifier {
    fn classify(&self, sample: &[u8]) -> Option<Classification> {
        if sample.is_empty() {
            return None;
        }

        if let Some((encoding, _)) = Encoding::for_bom(sample) {
            trace!("BOM found for {}", encoding.name());
            return Some(Classification {
                encoding,
                confidence: 1.0,
            });
        }

        // UTF-16 without a BOM is treated as binary as well
        if memchr::memchr(0, sample).is_some() {
            return None;
        }

        if sample.is_ascii() {
            return Some(Classification {
                encoding: UTF_8,
                confidence: 1.0,
            });
        }

        let mut detector = chardetng::EncodingDetector::new();
        detector.feed(sample, true);
        let encoding = detector.guess(None, true);

        Some(Classification {
            encoding,
            confidence: clean_ratio(encoding, sample),
        })
    }
}

/// Outcome of a successful detection.
#[derive(Debug, Clone, Copy)]
pub struct Detection {
    /// Source encoding to decode with
    pub encoding: &'static Encoding,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

impl Detection {
    /// Returns the canonical encoding label, e.g. `windows-1251`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }
}

/// Infers the source encoding of a byte sample under a fixed policy.
#[derive(Clone)]
pub struct EncodingDetector {
    classifier: Arc<dyn CharsetClassifier>,
    policy: DetectionPolicy,
}

impl std::fmt::Debug for EncodingDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodingDetector")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl EncodingDetector {
    /// Creates a detector backed by [`ChardetClassifier`].
    #[must_use]
    pub fn new(policy: DetectionPolicy) -> Self {
        Self::with_classifier(Arc::new(ChardetClassifier), policy)
    }

    /// Creates a detector backed by a custom classifier.
    #[must_use]
    pub fn with_classifier(classifier: Arc<dyn CharsetClassifier>, policy: DetectionPolicy) -> Self {
        Self { classifier, policy }
    }

    /// Returns the policy this detector applies.
    #[must_use]
    pub const fn policy(&self) -> DetectionPolicy {
        self.policy
    }

    /// Detects the encoding of `sample`.
    ///
    /// Returns `None` only under [`DetectionPolicy::Strict`], when the
    /// classifier has no match.
    #[must_use]
    pub fn detect(&self, sample: &[u8]) -> Option<Detection> {
        let classified = self.classifier.classify(sample);

        match (self.policy, classified) {
            (DetectionPolicy::Lenient, Some(c)) => Some(Detection {
                encoding: c.encoding,
                confidence: LENIENT_CONFIDENCE,
            }),
            (DetectionPolicy::Lenient, None) => Some(fallback(sample)),
            (DetectionPolicy::Strict, Some(c)) => Some(Detection {
                encoding: c.encoding,
                confidence: c.confidence.clamp(0.0, 1.0),
            }),
            (DetectionPolicy::Strict, None) => None,
        }
    }

    /// Reads up to `sample_size` bytes from the head of `path` and detects
    /// their encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The strict policy finds no match (`Undetectable`)
    pub fn detect_file(&self, path: &Path, sample_size: usize) -> Result<Detection> {
        let sample = read_sample(path, sample_size)?;
        let detection = self
            .detect(&sample)
            .ok_or_else(|| Error::undetectable(path))?;

        debug!(
            "Detected {} ({:.2}) for {}",
            detection.name(),
            detection.confidence,
            path.display()
        );
        Ok(detection)
    }
}

/// Lenient fallback: first encoding in the chain that strictly decodes the
/// sample.
fn fallback(sample: &[u8]) -> Detection {
    if let Some(body) = sample.strip_prefix(UTF8_BOM) {
        if UTF_8
            .decode_without_bom_handling_and_without_replacement(body)
            .is_some()
        {
            return Detection {
                encoding: UTF_8,
                confidence: LENIENT_CONFIDENCE,
            };
        }
    }

    if let Some(step) = FALLBACK_CHAIN.iter().find(|step| step.accepts(sample)) {
        trace!("Fallback accepted {}", step.encoding.name());
        return Detection {
            encoding: step.encoding,
            confidence: LENIENT_CONFIDENCE,
        };
    }

    Detection {
        encoding: WINDOWS_1252,
        confidence: TERMINAL_CONFIDENCE,
    }
}

/// Share of characters that decode without substitution.
fn clean_ratio(encoding: &'static Encoding, sample: &[u8]) -> f64 {
    let (text, had_errors) = encoding.decode_without_bom_handling(sample);
    if !had_errors {
        return 1.0;
    }

    let mut total = 0usize;
    let mut replaced = 0usize;
    for c in text.chars() {
        total += 1;
        if c == char::REPLACEMENT_CHARACTER {
            replaced += 1;
        }
    }

    if total == 0 {
        return 0.0;
    }
    1.0 - replaced as f64 / total as f64
}

/// Reads the detection sample from the head of a file.
///
/// When the file is longer than the sample, an incomplete UTF-8 sequence cut
/// at the sample boundary is dropped so it cannot disqualify UTF-8. A sample
/// holding nothing but such a fragment is kept whole.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub(crate) fn read_sample(path: &Path, sample_size: usize) -> Result<Vec<u8>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let file_len = file.metadata().map_err(|e| Error::io(path, e))?.len();

    let mut sample = Vec::with_capacity(sample_size.min(file_len as usize));
    file.take(sample_size as u64)
        .read_to_end(&mut sample)
        .map_err(|e| Error::io(path, e))?;

    if (sample.len() as u64) < file_len {
        let keep = complete_utf8_prefix(&sample);
        if keep > 0 {
            sample.truncate(keep);
        }
    }

    Ok(sample)
}

/// Length of `bytes` without a trailing, incomplete UTF-8 sequence.
fn complete_utf8_prefix(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for back in 1..=len.min(4) {
        let b = bytes[len - back];
        if b & 0b1100_0000 == 0b1000_0000 {
            continue;
        }

        let expected = match b {
            0x00..=0x7F => 1,
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return len,
        };
        return if back < expected { len - back } else { len };
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use encoding_rs::WINDOWS_1251;

    const CYRILLIC_1251: &[u8] = b"\xcf\xf0\xe8\xe2\xe5\xf2, \xec\xe8\xf0! \xdd\xf2\xee \xf2\xe5\xf1\xf2\xee\xe2\xfb\xe9 \xf4\xe0\xe9\xeb \xed\xe0 \xf0\xf3\xf1\xf1\xea\xee\xec \xff\xe7\xfb\xea\xe5. \xcc\xfb \xef\xf0\xee\xe2\xe5\xf0\xff\xe5\xec \xea\xee\xe4\xe8\xf0\xee\xe2\xea\xf3 \xf2\xe5\xea\xf1\xf2\xe0.";

    struct NeverClassifier;

    impl CharsetClassifier for NeverClassifier {
        fn classify(&self, _sample: &[u8]) -> Option<Classification> {
            None
        }
    }

    struct FixedClassifier(f64);

    impl CharsetClassifier for FixedClassifier {
        fn classify(&self, _sample: &[u8]) -> Option<Classification> {
            Some(Classification {
                encoding: WINDOWS_1251,
                confidence: self.0,
            })
        }
    }

    fn lenient_without_classifier() -> EncodingDetector {
        EncodingDetector::with_classifier(Arc::new(NeverClassifier), DetectionPolicy::Lenient)
    }

    #[test]
    fn test_classifier_detects_bom() {
        let sample = b"\xEF\xBB\xBFhello";
        let c = ChardetClassifier.classify(sample).unwrap();
        assert_eq!(c.encoding, UTF_8);
        assert_eq!(c.confidence, 1.0);

        let c = ChardetClassifier.classify(b"\xFF\xFEh\x00i\x00").unwrap();
        assert_eq!(c.encoding, encoding_rs::UTF_16LE);
    }

    #[test]
    fn test_classifier_rejects_binary_and_empty() {
        assert!(ChardetClassifier.classify(b"").is_none());
        assert!(ChardetClassifier.classify(b"ab\x00\x01\x02cd").is_none());
    }

    #[test]
    fn test_classifier_ascii_is_utf8() {
        let c = ChardetClassifier.classify(b"plain ascii text\n").unwrap();
        assert_eq!(c.encoding, UTF_8);
    }

    #[test]
    fn test_classifier_utf8() {
        let c = ChardetClassifier
            .classify("Grüße aus Köln, naïve café".as_bytes())
            .unwrap();
        assert_eq!(c.encoding, UTF_8);
        assert_eq!(c.confidence, 1.0);
    }

    #[test]
    fn test_classifier_windows_1251() {
        let c = ChardetClassifier.classify(CYRILLIC_1251).unwrap();
        assert_eq!(c.encoding, WINDOWS_1251);
        assert!(c.confidence > 0.0);
    }

    #[test]
    fn test_lenient_hit_uses_fixed_confidence() {
        let detector = EncodingDetector::with_classifier(
            Arc::new(FixedClassifier(0.31)),
            DetectionPolicy::Lenient,
        );
        let d = detector.detect(b"anything").unwrap();
        assert_eq!(d.encoding, WINDOWS_1251);
        assert_eq!(d.confidence, LENIENT_CONFIDENCE);
    }

    #[test]
    fn test_strict_hit_exposes_classifier_confidence() {
        let detector = EncodingDetector::with_classifier(
            Arc::new(FixedClassifier(0.31)),
            DetectionPolicy::Strict,
        );
        let d = detector.detect(b"anything").unwrap();
        assert_eq!(d.confidence, 0.31);

        let detector = EncodingDetector::with_classifier(
            Arc::new(FixedClassifier(7.0)),
            DetectionPolicy::Strict,
        );
        assert_eq!(detector.detect(b"x").unwrap().confidence, 1.0);
    }

    #[test]
    fn test_strict_miss_is_undetectable() {
        let detector = EncodingDetector::with_classifier(Arc::new(NeverClassifier), DetectionPolicy::Strict);
        assert!(detector.detect(b"whatever").is_none());

        let detector = EncodingDetector::new(DetectionPolicy::Strict);
        assert!(detector.detect(b"").is_none());
    }

    #[test]
    fn test_fallback_chain_order() {
        let detector = lenient_without_classifier();

        let d = detector.detect(b"\xEF\xBB\xBFbom text").unwrap();
        assert_eq!(d.encoding, UTF_8);

        let d = detector.detect("plain ütf".as_bytes()).unwrap();
        assert_eq!(d.encoding, UTF_8);
        assert_eq!(d.confidence, LENIENT_CONFIDENCE);

        let d = detector.detect(CYRILLIC_1251).unwrap();
        assert_eq!(d.encoding, WINDOWS_1251);

        // 0x98 is unmapped in windows-1251
        let d = detector.detect(b"abc\x98def").unwrap();
        assert_eq!(d.encoding, WINDOWS_1252);
        assert_eq!(d.confidence, LENIENT_CONFIDENCE);
    }

    #[test]
    fn test_latin1_with_nul_falls_through_to_1252() {
        let detector = EncodingDetector::new(DetectionPolicy::Lenient);

        let d = detector.detect(b"caf\xe9 \x98 \x00").unwrap();
        assert_eq!(d.encoding, WINDOWS_1252);

        // without 0x98 the regional step still wins
        let d = detector.detect(b"caf\xe9 \x00").unwrap();
        assert_eq!(d.encoding, WINDOWS_1251);
    }

    #[test]
    fn test_lenient_never_fails() {
        let detector = EncodingDetector::new(DetectionPolicy::Lenient);
        assert!(detector.detect(b"").is_some());
        assert!(detector.detect(&[0u8, 159, 146, 150, 0, 255]).is_some());
    }

    #[test]
    fn test_complete_utf8_prefix() {
        let text = "añb".as_bytes();
        assert_eq!(complete_utf8_prefix(text), text.len());
        // cut inside the two-byte ñ
        assert_eq!(complete_utf8_prefix(&text[..2]), 1);
        let euro = "x€".as_bytes();
        assert_eq!(complete_utf8_prefix(&euro[..3]), 1);
        assert_eq!(complete_utf8_prefix(b""), 0);
    }

    #[test]
    fn test_detect_file_reads_bounded_sample() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("long.txt");
        file.write_str(&"é".repeat(100)).unwrap();

        // 3 bytes: one full é plus half of the next one
        let sample = read_sample(file.path(), 3).unwrap();
        assert_eq!(sample, "é".as_bytes());

        let detector = EncodingDetector::new(DetectionPolicy::Strict);
        let d = detector.detect_file(file.path(), 3).unwrap();
        assert_eq!(d.encoding, UTF_8);
    }

    #[test]
    fn test_sample_smaller_than_one_char() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("tiny.txt");
        file.write_str("éééé").unwrap();

        let sample = read_sample(file.path(), 1).unwrap();
        assert_eq!(sample, b"\xC3");

        let detector = EncodingDetector::new(DetectionPolicy::Strict);
        assert!(detector.detect_file(file.path(), 1).is_ok());
    }

    #[test]
    fn test_detect_file_strict_binary() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("blob.txt");
        file.write_binary(&[0u8; 64]).unwrap();

        let detector = EncodingDetector::new(DetectionPolicy::Strict);
        let err = detector.detect_file(file.path(), 1024).unwrap_err();
        assert!(err.is_undetectable());
    }
}
