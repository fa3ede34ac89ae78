//! Input encoding detection/normalization (spec.md §6 "Encoding contract"):
//! auto-detect BOM, prefer UTF-8, try UTF-16 variants and CP-1250 with a
//! text-quality score, explicit `--encoding` skips detection but still
//! validates. Output is always normalized to `\n` line endings.
//!
//! Built on `encoding_rs`'s own BOM-sniffing API (`Encoding::for_bom`) plus a
//! hand-rolled scoring pass over the decoded text for the no-BOM
//! multi-candidate case.

use crate::cli::EncodingArg;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1250};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodingDetectError {
    #[error("could not decode as {0}: invalid byte sequences")]
    Invalid(&'static str),
}

/// Decodes `bytes` per `explicit` (or auto-detects if `None`), then
/// normalizes line endings to `\n`.
pub fn decode_and_normalize(bytes: &[u8], explicit: Option<EncodingArg>) -> Result<String, EncodingDetectError> {
    let decoded = match explicit {
        Some(EncodingArg::Auto) | None => detect(bytes)?,
        Some(EncodingArg::Utf8) => strict_decode(bytes, UTF_8)?,
        Some(EncodingArg::Utf8Sig) => strict_decode(strip_utf8_bom(bytes), UTF_8)?,
        Some(EncodingArg::Utf16Le) => strict_decode(bytes, UTF_16LE)?,
        Some(EncodingArg::Utf16Be) => strict_decode(bytes, UTF_16BE)?,
        Some(EncodingArg::Cp1250) => strict_decode(bytes, WINDOWS_1250)?,
    };
    Ok(normalize_newlines(&decoded))
}

fn strip_utf8_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes)
}

fn strict_decode(bytes: &[u8], encoding: &'static Encoding) -> Result<String, EncodingDetectError> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(EncodingDetectError::Invalid(encoding.name()))
    } else {
        Ok(text.into_owned())
    }
}

/// BOM-first, then candidate-scoring auto-detection: UTF-8 is tried first
/// (the overwhelmingly common case and, unlike the single-byte/UTF-16
/// candidates, never silently "succeeds" on the wrong encoding unless the
/// bytes are coincidentally valid UTF-8), then UTF-16 variants, then
/// CP-1250, picking whichever candidate both decodes cleanly and scores
/// best for plausible SQL text.
fn detect(bytes: &[u8]) -> Result<String, EncodingDetectError> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return strict_decode(&bytes[bom_len..], encoding);
    }

    let mut candidates: Vec<(String, i64)> = Vec::new();
    if let Ok(text) = strict_decode(bytes, UTF_8) {
        candidates.push((text, i64::MAX));
    }
    for encoding in [UTF_16LE, UTF_16BE, WINDOWS_1250] {
        if let Ok(text) = strict_decode(bytes, encoding) {
            let score = text_quality_score(&text);
            candidates.push((text, score));
        }
    }

    candidates
        .into_iter()
        .max_by_key(|(_, score)| *score)
        .map(|(text, _)| text)
        .ok_or(EncodingDetectError::Invalid("any supported encoding"))
}

/// Higher is more plausible SQL source text: penalize control characters and
/// the Unicode replacement character, reward printable ASCII/common
/// punctuation.
fn text_quality_score(text: &str) -> i64 {
    let mut score: i64 = 0;
    for ch in text.chars() {
        if ch == '\u{FFFD}' {
            score -= 50;
        } else if ch.is_control() && ch != '\n' && ch != '\r' && ch != '\t' {
            score -= 10;
        } else if ch.is_ascii_graphic() || ch == ' ' {
            score += 1;
        }
    }
    score
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_utf8() {
        let text = decode_and_normalize(b"SELECT 1", None).unwrap();
        assert_eq!(text, "SELECT 1");
    }

    #[test]
    fn strips_utf8_bom_and_normalizes_crlf() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"SELECT 1\r\nFROM t\r\n");
        let text = decode_and_normalize(&bytes, None).unwrap();
        assert_eq!(text, "SELECT 1\nFROM t\n");
    }

    #[test]
    fn auto_detects_utf16le_via_bom() {
        let (bytes, _, _) = UTF_16LE.encode("SELECT 1");
        let mut with_bom = vec![0xFF, 0xFE];
        with_bom.extend_from_slice(&bytes);
        let text = decode_and_normalize(&with_bom, None).unwrap();
        assert_eq!(text, "SELECT 1");
    }

    #[test]
    fn explicit_encoding_skips_detection_but_still_validates() {
        let result = decode_and_normalize(&[0xFF, 0xFE, 0x00, 0xD8], Some(EncodingArg::Utf8));
        assert!(result.is_err());
    }
}
