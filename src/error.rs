//! Error types for the doc2spec pipeline.
//!
//! One enum, [`ProcessingError`], covers every way an execution can fail.
//! Each variant carries strongly-typed fields for its failure plus the
//! original key and a timestamp, and maps onto one of four public kinds
//! ([`ErrorKind`]) that downstream consumers filter on.
//!
//! Retryability is part of the type: deterministic validation failures
//! (size, format, content bounds) can never succeed on retry and report
//! `retryable() == false` structurally; generation and output-write
//! failures carry an explicit `retryable` flag set at the point of
//! detection. The retrying invoker consults nothing else.
//!
//! Propagation rule: a stage either produces its own error or forwards an
//! inherited one verbatim — errors are never wrapped or re-classified on
//! the way to the notify stage.

use crate::record::SUPPORTED_EXTENSIONS;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The four public failure categories surfaced to notification subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Format, size or extraction failure while reading the source file.
    FileRead,
    /// Accepted by the store but over the orchestration payload ceiling.
    FileTooLargeForTransport,
    /// Completion-capability or response-quality failure.
    Generation,
    /// Persistence failure writing the generated specification.
    OutputWrite,
}

impl ErrorKind {
    /// Stable wire label, used in notification bodies and attributes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileRead => "file-read",
            Self::FileTooLargeForTransport => "file-too-large-for-transport",
            Self::Generation => "generation",
            Self::OutputWrite => "output-write",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A terminal pipeline failure, passed through unchanged by every stage
/// downstream of the one that produced it.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum ProcessingError {
    /// Source object exceeds the storage size ceiling.
    #[error("file '{key}' is {actual_size} bytes, over the {max_size}-byte limit")]
    FileTooLarge {
        key: String,
        actual_size: u64,
        max_size: u64,
        at: DateTime<Utc>,
    },

    /// Source object fits in the store but exceeds the orchestration
    /// payload ceiling — a distinct kind so subscribers can tell the two
    /// size failures apart.
    #[error("file '{key}' is {actual_size} bytes, over the {limit}-byte transport ceiling")]
    TransportLimit {
        key: String,
        actual_size: u64,
        limit: u64,
        at: DateTime<Utc>,
    },

    /// Extension is not in the supported set.
    #[error("unsupported format '{extension}' for '{key}'")]
    UnsupportedFormat {
        key: String,
        extension: String,
        at: DateTime<Utc>,
    },

    /// Extracted text fell outside the configured length bounds.
    #[error("content of '{key}' is {length} chars, outside [{min}, {max}]")]
    ContentLength {
        key: String,
        length: usize,
        min: usize,
        max: usize,
        at: DateTime<Utc>,
    },

    /// Bytes could not be decoded as text.
    #[error("failed to decode '{key}': {reason}")]
    Decode {
        key: String,
        reason: String,
        at: DateTime<Utc>,
    },

    /// The object store failed to deliver the source bytes.
    #[error("failed to fetch '{key}' from '{bucket}': {reason}")]
    StoreRead {
        key: String,
        bucket: String,
        reason: String,
        at: DateTime<Utc>,
    },

    /// The completion capability failed or returned unusable output.
    #[error("generation failed for '{key}': {reason}")]
    Generation {
        key: String,
        reason: String,
        retryable: bool,
        at: DateTime<Utc>,
    },

    /// Writing the generated specification failed.
    #[error("failed to write specification for '{key}': {reason}")]
    OutputWrite {
        key: String,
        /// Computed output key, when the failure happened at or after key
        /// validation.
        output_key: Option<String>,
        reason: String,
        retryable: bool,
        at: DateTime<Utc>,
    },
}

impl ProcessingError {
    /// The public failure category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FileTooLarge { .. }
            | Self::UnsupportedFormat { .. }
            | Self::ContentLength { .. }
            | Self::Decode { .. }
            | Self::StoreRead { .. } => ErrorKind::FileRead,
            Self::TransportLimit { .. } => ErrorKind::FileTooLargeForTransport,
            Self::Generation { .. } => ErrorKind::Generation,
            Self::OutputWrite { .. } => ErrorKind::OutputWrite,
        }
    }

    /// Whether a retry could plausibly succeed.
    ///
    /// Validation failures are deterministic and always terminal; the
    /// transient variants carry the answer decided at the detection site.
    pub fn retryable(&self) -> bool {
        match self {
            Self::FileTooLarge { .. }
            | Self::TransportLimit { .. }
            | Self::UnsupportedFormat { .. }
            | Self::ContentLength { .. }
            | Self::Decode { .. }
            | Self::StoreRead { .. } => false,
            Self::Generation { retryable, .. } | Self::OutputWrite { retryable, .. } => *retryable,
        }
    }

    /// Key of the source object the failing execution was processing.
    pub fn key(&self) -> &str {
        match self {
            Self::FileTooLarge { key, .. }
            | Self::TransportLimit { key, .. }
            | Self::UnsupportedFormat { key, .. }
            | Self::ContentLength { key, .. }
            | Self::Decode { key, .. }
            | Self::StoreRead { key, .. }
            | Self::Generation { key, .. }
            | Self::OutputWrite { key, .. } => key,
        }
    }

    /// When the failure was detected.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::FileTooLarge { at, .. }
            | Self::TransportLimit { at, .. }
            | Self::UnsupportedFormat { at, .. }
            | Self::ContentLength { at, .. }
            | Self::Decode { at, .. }
            | Self::StoreRead { at, .. }
            | Self::Generation { at, .. }
            | Self::OutputWrite { at, .. } => *at,
        }
    }

    /// Typed detail lines for the failure notification body.
    ///
    /// One `label: value` string per detail the variant carries, in a
    /// fixed order, so rendered messages stay diffable across runs.
    pub fn detail_lines(&self) -> Vec<String> {
        match self {
            Self::FileTooLarge {
                actual_size,
                max_size,
                ..
            } => vec![
                format!("actualSize: {actual_size}"),
                format!("maxSize: {max_size}"),
            ],
            Self::TransportLimit {
                actual_size, limit, ..
            } => vec![
                format!("actualSize: {actual_size}"),
                format!("transportLimit: {limit}"),
            ],
            Self::UnsupportedFormat { extension, .. } => vec![
                format!("actualFormat: {extension}"),
                format!("supportedFormats: {}", SUPPORTED_EXTENSIONS.join(", ")),
            ],
            Self::ContentLength {
                length, min, max, ..
            } => vec![
                format!("contentLength: {length}"),
                format!("minLength: {min}"),
                format!("maxLength: {max}"),
            ],
            Self::Decode { reason, .. } => vec![format!("decodeError: {reason}")],
            Self::StoreRead { bucket, reason, .. } => {
                vec![format!("bucket: {bucket}"), format!("storeError: {reason}")]
            }
            Self::Generation { retryable, .. } => vec![format!("retryable: {retryable}")],
            Self::OutputWrite {
                output_key,
                retryable,
                ..
            } => {
                let mut lines = Vec::new();
                if let Some(output_key) = output_key {
                    lines.push(format!("outputKey: {output_key}"));
                }
                lines.push(format!("retryable: {retryable}"));
                lines
            }
        }
    }
}
