//! Content extraction: raw bytes → normalised text.
//!
//! The only module with format-specific logic. Three paths:
//!
//! - **Plain text** (txt, md, and the source-code kinds): strict UTF-8
//!   decode, then whitespace normalisation.
//! - **Rich text** (rtf): control markup stripped by pattern removal, then
//!   normalised identically.
//! - **Binary documents** (pdf, doc, docx): not parsed. The bytes are
//!   base64-embedded after a placeholder sentence so the model at least
//!   knows what it is looking at. Genuine text extraction for these
//!   formats is future work behind the `FileKind::is_binary` seam.
//!
//! Whatever the path, the extracted text must land inside the configured
//! length bounds; a violation is a terminal error carrying the offending
//! length and both bounds.

use crate::config::PipelineConfig;
use crate::error::ProcessingError;
use crate::record::{FileKind, FileReference, NormalizedDocument};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Turn raw bytes into a [`NormalizedDocument`], or a terminal error.
pub fn extract(
    bytes: &[u8],
    file: &FileReference,
    kind: FileKind,
    config: &PipelineConfig,
) -> Result<NormalizedDocument, ProcessingError> {
    let text = if kind.is_binary() {
        embed_binary(bytes, kind)
    } else if kind.is_rich_text() {
        normalize_whitespace(&strip_rtf(&decode_utf8(bytes, &file.key)?))
    } else {
        normalize_whitespace(&decode_utf8(bytes, &file.key)?)
    };

    let length = text.chars().count();
    if length < config.min_content_chars || length > config.max_content_chars {
        return Err(ProcessingError::ContentLength {
            key: file.key.clone(),
            length,
            min: config.min_content_chars,
            max: config.max_content_chars,
            at: Utc::now(),
        });
    }

    debug!("extracted {} chars from '{}' ({kind})", length, file.key);

    Ok(NormalizedDocument {
        key: file.key.clone(),
        bucket: file.bucket.clone(),
        size: file.size,
        arrived_at: file.arrived_at,
        etag: file.etag.clone(),
        text,
        kind,
    })
}

fn decode_utf8(bytes: &[u8], key: &str) -> Result<String, ProcessingError> {
    String::from_utf8(bytes.to_vec()).map_err(|e| ProcessingError::Decode {
        key: key.to_string(),
        reason: format!("invalid UTF-8: {e}"),
        at: Utc::now(),
    })
}

// ── Whitespace normalisation ─────────────────────────────────────────────

static RE_BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// CRLF/CR → LF, runs of blank lines collapsed to a single blank line,
/// leading/trailing whitespace trimmed.
pub fn normalize_whitespace(input: &str) -> String {
    let unified = input.replace("\r\n", "\n").replace('\r', "\n");
    RE_BLANK_RUNS
        .replace_all(&unified, "\n\n")
        .trim()
        .to_string()
}

// ── RTF stripping ────────────────────────────────────────────────────────

static RE_RTF_HEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\'[0-9a-fA-F]{2}").unwrap());
static RE_RTF_CONTROL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\[a-zA-Z]+-?\d* ?").unwrap());

/// Remove RTF control words, hex escapes and group braces, leaving the
/// document's plain text.
pub fn strip_rtf(input: &str) -> String {
    let s = RE_RTF_HEX.replace_all(input, " ");
    let s = RE_RTF_CONTROL.replace_all(&s, "");
    s.replace(['{', '}'], "")
}

// ── Binary embedding ─────────────────────────────────────────────────────

/// Placeholder + base64 body for unparsed binary formats.
fn embed_binary(bytes: &[u8], kind: FileKind) -> String {
    format!(
        "[{} document — text was not extracted; the base64-encoded content follows]\n{}",
        kind.extension(),
        BASE64.encode(bytes)
    )
}
