//! Notify stage: render the execution's outcome and publish it once.
//!
//! Whatever happened upstream, exactly one message leaves the pipeline: a
//! success body with a time-limited download reference, or a failure body
//! with the error kind, cause, typed details and troubleshooting
//! guidance. Publishing is a single best-effort call — a failed publish is
//! reported to the orchestrator, never retried, and never re-runs the
//! pipeline.
//!
//! If the signed URL cannot be produced the success body degrades to the
//! raw output location rather than failing the notification; a missing
//! download link should not hide a successful run.

use crate::config::PipelineConfig;
use crate::error::ProcessingError;
use crate::notifier::{Notifier, NotifyError};
use crate::record::{SpecificationRecord, SUPPORTED_EXTENSIONS};
use crate::store::ObjectStore;
use std::collections::HashMap;
use tracing::{info, warn};

/// Publish the outcome message, returning the provider's message id.
pub async fn notify(
    outcome: &Result<SpecificationRecord, ProcessingError>,
    store: &dyn ObjectStore,
    notifier: &dyn Notifier,
    config: &PipelineConfig,
) -> Result<String, NotifyError> {
    let (subject, body, source_file) = match outcome {
        Ok(record) => {
            let download = download_reference(record, store, config).await;
            (
                format!("Specification generated: {}", file_name(&record.source_key)),
                render_success(record, &download),
                file_name(&record.source_key).to_string(),
            )
        }
        Err(error) => (
            format!("Specification generation failed: {}", file_name(error.key())),
            render_failure(error, config),
            file_name(error.key()).to_string(),
        ),
    };

    let attributes = HashMap::from([
        (
            "notification_type".to_string(),
            if outcome.is_ok() { "success" } else { "failure" }.to_string(),
        ),
        ("source_file".to_string(), source_file),
        ("environment".to_string(), config.environment.clone()),
    ]);

    let message_id = notifier.publish(&subject, &body, &attributes).await?;
    info!("published outcome notification {message_id}");
    Ok(message_id)
}

fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Signed download URL, or the raw location when URL generation fails.
async fn download_reference(
    record: &SpecificationRecord,
    store: &dyn ObjectStore,
    config: &PipelineConfig,
) -> String {
    let filename = file_name(&record.output_key);
    match store
        .signed_url(
            &record.output_bucket,
            &record.output_key,
            config.download_ttl,
            filename,
        )
        .await
    {
        Ok(url) => format!(
            "Download (valid for {} hours):\n{url}",
            config.download_ttl.as_secs() / 3600
        ),
        Err(e) => {
            warn!("signed URL generation failed, degrading to raw location: {e}");
            format!("Output location: {}", record.output_location())
        }
    }
}

fn render_success(record: &SpecificationRecord, download: &str) -> String {
    format!(
        "Your document has been processed successfully.\n\
         \n\
         Original file:    {}\n\
         Specification:    {}\n\
         File type:        {}\n\
         Word count:       {} words\n\
         Processing time:  {:.1} s\n\
         Tokens:           {} in / {} out\n\
         Processing id:    {}\n\
         \n\
         {download}\n",
        record.source_key,
        record.output_key,
        record.kind,
        record.word_count,
        record.duration_ms as f64 / 1000.0,
        record.input_tokens,
        record.output_tokens,
        record.processing_id,
    )
}

fn render_failure(error: &ProcessingError, config: &PipelineConfig) -> String {
    let mut body = format!(
        "Your document could not be processed.\n\
         \n\
         errorType: \"{}\"\n\
         errorMessage: {}\n\
         occurredAt: {}\n",
        error.kind(),
        error,
        error.occurred_at().format("%Y-%m-%dT%H:%M:%SZ"),
    );
    for line in error.detail_lines() {
        body.push_str("  ");
        body.push_str(&line);
        body.push('\n');
    }
    body.push_str(&format!(
        "\n\
         Troubleshooting:\n\
         - Supported formats: {}\n\
         - Maximum file size: {} MiB (transport ceiling {} KiB)\n\
         - Re-upload the file to trigger another attempt\n",
        SUPPORTED_EXTENSIONS.join(", "),
        config.max_file_size_bytes / (1024 * 1024),
        config.max_transport_bytes / 1024,
    ));
    body
}
