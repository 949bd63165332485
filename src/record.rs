//! Value types flowing between pipeline stages.
//!
//! Each stage consumes exactly one of these and produces the next (or a
//! [`crate::error::ProcessingError`]). All of them are plain owned data —
//! no shared mutable state survives a pipeline execution except the
//! artifact written by the persist stage.
//!
//! ```text
//! TriggerEvent ─▶ FileReference ─▶ NormalizedDocument ─▶ GenerationResult ─▶ SpecificationRecord
//!   (wire)          (read)            (generate)            (persist)           (notify)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The raw upload notification that starts a pipeline execution.
///
/// Shape matches what the workflow trigger delivers; `event_name` is kept
/// for logging but carries no pipeline semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// Store location (bucket-equivalent identifier) of the uploaded file.
    pub bucket: String,
    /// Object key of the uploaded file.
    pub key: String,
    /// Object size in bytes as reported by the store.
    pub size: u64,
    /// Content hash / etag of the object.
    pub etag: String,
    /// When the object arrived in the store.
    pub event_time: DateTime<Utc>,
    /// Store event name, e.g. "ObjectCreated:Put".
    pub event_name: String,
}

/// Immutable reference to the uploaded file, consumed by the read stage only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReference {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    pub etag: String,
    pub arrived_at: DateTime<Utc>,
}

impl From<TriggerEvent> for FileReference {
    fn from(event: TriggerEvent) -> Self {
        Self {
            bucket: event.bucket,
            key: event.key,
            size: event.size,
            etag: event.etag,
            arrived_at: event.event_time,
        }
    }
}

impl FileReference {
    /// Final path component of the key, e.g. `"uploads/spec.txt"` → `"spec.txt"`.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

/// Detected file type, keyed on the fixed supported-extension set.
///
/// A closed enum rather than a string tag: an extension outside this set
/// never constructs a `FileKind`, so downstream stages cannot observe an
/// unknown type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Txt,
    Md,
    Rtf,
    Pdf,
    Doc,
    Docx,
    Java,
    Rexx,
    Py,
    Js,
    Ts,
}

/// Every extension the pipeline accepts, in the order shown to users.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "txt", "pdf", "doc", "docx", "md", "rtf", "java", "rexx", "py", "js", "ts",
];

impl FileKind {
    /// Detect the kind from a lowercase-insensitive file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" => Some(Self::Txt),
            "md" => Some(Self::Md),
            "rtf" => Some(Self::Rtf),
            "pdf" => Some(Self::Pdf),
            "doc" => Some(Self::Doc),
            "docx" => Some(Self::Docx),
            "java" => Some(Self::Java),
            "rexx" => Some(Self::Rexx),
            "py" => Some(Self::Py),
            "js" => Some(Self::Js),
            "ts" => Some(Self::Ts),
            _ => None,
        }
    }

    /// Detect the kind from an object key's extension.
    pub fn from_key(key: &str) -> Option<Self> {
        let name = key.rsplit('/').next()?;
        let (_, ext) = name.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    /// Canonical lowercase extension for this kind.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Md => "md",
            Self::Rtf => "rtf",
            Self::Pdf => "pdf",
            Self::Doc => "doc",
            Self::Docx => "docx",
            Self::Java => "java",
            Self::Rexx => "rexx",
            Self::Py => "py",
            Self::Js => "js",
            Self::Ts => "ts",
        }
    }

    /// Binary document formats are base64-embedded rather than parsed.
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Pdf | Self::Doc | Self::Docx)
    }

    /// Rich-text needs control-markup stripping before normalisation.
    pub fn is_rich_text(&self) -> bool {
        matches!(self, Self::Rtf)
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Output of the read stage: validated, extracted, whitespace-normalised text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedDocument {
    /// Original object key.
    pub key: String,
    /// Original store location.
    pub bucket: String,
    /// Original object size in bytes.
    pub size: u64,
    /// When the object arrived in the store.
    pub arrived_at: DateTime<Utc>,
    /// Content hash of the original object.
    pub etag: String,
    /// Extracted text, ready for prompting.
    pub text: String,
    /// Detected file type.
    pub kind: FileKind,
}

/// Output of the generate stage: validated specification markdown plus
/// accounting for the model call that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Generated specification document.
    pub markdown: String,
    /// Prompt tokens consumed by the successful attempt.
    pub input_tokens: u32,
    /// Completion tokens produced by the successful attempt.
    pub output_tokens: u32,
    /// Wall-clock duration of the generate stage in milliseconds.
    pub duration_ms: u64,
    /// Original object key.
    pub key: String,
    /// Original store location.
    pub bucket: String,
    /// Detected file type of the source.
    pub kind: FileKind,
    /// When generation completed.
    pub completed_at: DateTime<Utc>,
}

/// Terminal success value: where the specification landed and what it cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecificationRecord {
    /// Key of the uploaded source document.
    pub source_key: String,
    /// When the specification was generated.
    pub generated_at: DateTime<Utc>,
    /// Store location the artifact was written to.
    pub output_bucket: String,
    /// Date-partitioned key of the artifact, `YYYY/MM/DD/<stem>-<ts>.md`.
    pub output_key: String,
    /// End-to-end generate-stage duration in milliseconds.
    pub duration_ms: u64,
    /// Plain-word count of the generated specification.
    pub word_count: usize,
    /// Detected file type of the source.
    pub kind: FileKind,
    /// Unique identifier for this pipeline execution's artifact.
    pub processing_id: Uuid,
    /// Prompt tokens consumed.
    pub input_tokens: u32,
    /// Completion tokens produced.
    pub output_tokens: u32,
}

impl SpecificationRecord {
    /// `bucket/key` form of the output location, for logs and messages.
    pub fn output_location(&self) -> String {
        format!("{}/{}", self.output_bucket, self.output_key)
    }
}
