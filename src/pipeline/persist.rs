//! Persist stage: write the generated specification exactly once.
//!
//! The output key is deterministic and date-partitioned:
//! `YYYY/MM/DD/<source-stem>-<compact-ISO-timestamp>.md`. Distinct
//! executions get distinct keys through the timestamp, so concurrent
//! pipelines never collide; identical inputs at an identical instant
//! produce the identical key. The key is validated against its grammar
//! before any write is attempted — a mismatch means the generator itself
//! is broken, which no retry will fix.
//!
//! The artifact is the generated markdown with a fixed-format metadata
//! header prepended, written with server-side encryption and a metadata
//! map a human can audit from the store console alone.

use crate::config::PipelineConfig;
use crate::error::ProcessingError;
use crate::record::{GenerationResult, SpecificationRecord};
use crate::store::{ObjectStore, PutRequest, StoreError};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

/// Grammar every output key must match before it is written.
static RE_OUTPUT_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}/\d{2}/\d{2}/.+\.md$").unwrap());

static RE_MARKDOWN_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[#*_`>\[\]()|~\-]+").unwrap());

/// Write the specification and return the terminal success record.
pub async fn persist(
    input: Result<GenerationResult, ProcessingError>,
    store: &dyn ObjectStore,
    config: &PipelineConfig,
) -> Result<SpecificationRecord, ProcessingError> {
    let result = input?;

    let output_bucket = config
        .output_bucket
        .clone()
        .unwrap_or_else(|| result.bucket.clone());
    let output_key = compute_output_key(&result.key, result.completed_at);

    if !RE_OUTPUT_KEY.is_match(&output_key) {
        return Err(ProcessingError::OutputWrite {
            key: result.key,
            output_key: Some(output_key),
            reason: "computed output key does not match the required grammar".into(),
            retryable: false,
            at: Utc::now(),
        });
    }

    let processing_id = Uuid::new_v4();
    let body = format!(
        "{}{}",
        metadata_header(&result, processing_id),
        result.markdown
    );
    let word_count = count_words(&result.markdown);
    let metadata = object_metadata(&result, word_count, processing_id);

    config
        .retry_policy()
        .run("persist", |attempt| {
            let request = PutRequest {
                bucket: output_bucket.clone(),
                key: output_key.clone(),
                body: body.clone().into_bytes(),
                content_type: "text/markdown".to_string(),
                metadata: metadata.clone(),
                server_side_encryption: true,
            };
            let source_key = result.key.clone();
            let output_key = output_key.clone();
            async move {
                tracing::debug!("persist attempt {attempt} for '{output_key}'");
                store
                    .put(request)
                    .await
                    .map_err(|e| classify_store_error(e, &source_key, &output_key))
            }
        })
        .await?;

    info!(
        "wrote specification for '{}' to '{}/{}' ({} words)",
        result.key, output_bucket, output_key, word_count
    );

    Ok(SpecificationRecord {
        source_key: result.key,
        generated_at: result.completed_at,
        output_bucket,
        output_key,
        duration_ms: result.duration_ms,
        word_count,
        kind: result.kind,
        processing_id,
        input_tokens: result.input_tokens,
        output_tokens: result.output_tokens,
    })
}

/// `YYYY/MM/DD/<stem>-<compact-ISO-timestamp>.md` for a source key and a
/// fixed instant. Pure: same inputs, same key.
pub fn compute_output_key(source_key: &str, at: DateTime<Utc>) -> String {
    let name = source_key.rsplit('/').next().unwrap_or(source_key);
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };
    let stem = if stem.is_empty() { "document" } else { stem };
    format!(
        "{}/{}-{}.md",
        at.format("%Y/%m/%d"),
        stem,
        at.format("%Y%m%dT%H%M%SZ")
    )
}

/// Markdown-punctuation-blind word count.
pub fn count_words(markdown: &str) -> usize {
    RE_MARKDOWN_PUNCT
        .replace_all(markdown, " ")
        .split_whitespace()
        .count()
}

/// Fixed-format provenance header prepended to the artifact. An HTML
/// comment keeps the markdown itself untouched for renderers.
fn metadata_header(result: &GenerationResult, processing_id: Uuid) -> String {
    format!(
        "<!--\n\
         Generated specification document\n\
         Source file:     {}\n\
         Generated at:    {}\n\
         Processing time: {} ms\n\
         File type:       {}\n\
         Tokens:          {} in / {} out\n\
         Processing id:   {}\n\
         -->\n\n",
        result.key,
        result.completed_at.format("%Y-%m-%dT%H:%M:%SZ"),
        result.duration_ms,
        result.kind,
        result.input_tokens,
        result.output_tokens,
        processing_id,
    )
}

fn object_metadata(
    result: &GenerationResult,
    word_count: usize,
    processing_id: Uuid,
) -> HashMap<String, String> {
    HashMap::from([
        ("source-key".to_string(), result.key.clone()),
        ("source-bucket".to_string(), result.bucket.clone()),
        ("file-type".to_string(), result.kind.to_string()),
        ("duration-ms".to_string(), result.duration_ms.to_string()),
        ("input-tokens".to_string(), result.input_tokens.to_string()),
        (
            "output-tokens".to_string(),
            result.output_tokens.to_string(),
        ),
        ("word-count".to_string(), word_count.to_string()),
        (
            "generated-at".to_string(),
            result.completed_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        ),
        ("processing-id".to_string(), processing_id.to_string()),
    ])
}

/// Store failures: a missing destination or denied access will fail again
/// identically; unavailability and throttling deserve the backoff.
fn classify_store_error(error: StoreError, source_key: &str, output_key: &str) -> ProcessingError {
    ProcessingError::OutputWrite {
        key: source_key.to_string(),
        output_key: Some(output_key.to_string()),
        reason: error.to_string(),
        retryable: error.is_transient(),
        at: Utc::now(),
    }
}
