//! Generate stage: prompt the completion capability and gate its output.
//!
//! This stage is intentionally thin — all prompt text lives in
//! [`crate::prompts`] so it can change without touching retry or
//! error-classification logic here.
//!
//! A model response must clear three gates before it becomes a
//! [`GenerationResult`]:
//!
//! 1. **Shape** — non-empty content list whose first block is non-empty
//!    text.
//! 2. **Polish** — deterministic cleanup of model quirks (an outer
//!    ```` ```markdown ```` fence despite the prompt, CRLF endings, missing
//!    final newline). Cleanup runs before the quality gate so the gate
//!    judges the text that would actually be persisted.
//! 3. **Quality** — at least 100 characters, at least one markdown header
//!    marker, no known refusal phrase.
//!
//! Every gate failure is a *retryable* generation error: a fresh sample
//! may well produce a compliant response. Provider failures are
//! classified at the call site — rate limiting retries, a malformed
//! request does not.

use crate::completion::{CompletionError, CompletionModel, CompletionRequest};
use crate::config::PipelineConfig;
use crate::error::ProcessingError;
use crate::prompts;
use crate::record::{GenerationResult, NormalizedDocument};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Instant;
use tracing::{debug, info};

/// Case-insensitive substrings that mark a model refusal rather than a
/// specification.
const REFUSAL_PHRASES: &[&str] = &[
    "i cannot",
    "i can't",
    "i am unable",
    "i'm unable",
    "unable to generate",
    "as an ai",
    "cannot assist with",
];

/// Drive the completion capability for a normalised document.
///
/// An inherited error passes straight through; otherwise the model is
/// invoked under the configured retry policy and the gated markdown comes
/// back with token counts and wall-clock duration.
pub async fn generate(
    input: Result<NormalizedDocument, ProcessingError>,
    model: &dyn CompletionModel,
    config: &PipelineConfig,
) -> Result<GenerationResult, ProcessingError> {
    let document = input?;
    info!("generating specification for '{}'", document.key);

    let system = config
        .system_prompt
        .clone()
        .unwrap_or_else(|| prompts::DEFAULT_SYSTEM_PROMPT.to_string());
    let prompt = prompts::build_user_prompt(&document);
    let start = Instant::now();

    let (markdown, input_tokens, output_tokens) = config
        .retry_policy()
        .run("generate", |attempt| {
            let request = CompletionRequest {
                system: system.clone(),
                prompt: prompt.clone(),
                max_tokens: config.max_output_tokens,
                temperature: config.temperature,
            };
            let key = document.key.clone();
            async move {
                debug!("completion attempt {attempt} for '{key}'");
                let response = model
                    .complete(request)
                    .await
                    .map_err(|e| classify_completion_error(e, &key))?;

                let text = response.leading_text().ok_or_else(|| {
                    generation_error(&key, "invalid response: empty content", true)
                })?;

                let polished = polish(text);
                validate_generated(&polished, config.min_generated_chars)
                    .map_err(|reason| generation_error(&key, reason, true))?;

                Ok((polished, response.input_tokens, response.output_tokens))
            }
        })
        .await?;

    let duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "generated {} chars for '{}' in {}ms ({} in / {} out tokens)",
        markdown.chars().count(),
        document.key,
        duration_ms,
        input_tokens,
        output_tokens
    );

    Ok(GenerationResult {
        markdown,
        input_tokens,
        output_tokens,
        duration_ms,
        key: document.key,
        bucket: document.bucket,
        kind: document.kind,
        completed_at: Utc::now(),
    })
}

fn generation_error(key: &str, reason: &str, retryable: bool) -> ProcessingError {
    ProcessingError::Generation {
        key: key.to_string(),
        reason: reason.to_string(),
        retryable,
        at: Utc::now(),
    }
}

/// Map provider failure signals onto retryability.
///
/// Rate limiting and unavailability are the transient bread and butter of
/// model APIs; a malformed request will be malformed again. Unknown
/// failures default to retryable — a wasted retry is cheaper than a lost
/// execution.
fn classify_completion_error(error: CompletionError, key: &str) -> ProcessingError {
    let retryable = !matches!(error, CompletionError::InvalidRequest(_));
    generation_error(key, &error.to_string(), retryable)
}

// ── Polish ───────────────────────────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown)?\n(.*)\n```\s*$").unwrap());

/// Deterministic cleanup of common model quirks; content is untouched.
fn polish(text: &str) -> String {
    let unfenced = match RE_OUTER_FENCE.captures(text.trim()) {
        Some(caps) => caps[1].to_string(),
        None => text.to_string(),
    };
    let unified = unfenced.replace("\r\n", "\n").replace('\r', "\n");
    format!("{}\n", unified.trim_end())
}

// ── Quality gate ─────────────────────────────────────────────────────────

/// Length, header and refusal checks on generated text.
fn validate_generated(text: &str, min_chars: usize) -> Result<(), &'static str> {
    if text.chars().count() < min_chars {
        return Err("generated content too short");
    }
    if !text.lines().any(|line| line.starts_with('#')) {
        return Err("generated content has no markdown header");
    }
    let lowered = text.to_lowercase();
    if REFUSAL_PHRASES.iter().any(|p| lowered.contains(p)) {
        return Err("model refused to generate a specification");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{CompletionResponse, ContentBlock, StopReason};
    use crate::record::FileKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn doc() -> NormalizedDocument {
        NormalizedDocument {
            key: "uploads/spec.txt".into(),
            bucket: "uploads".into(),
            size: 42,
            arrived_at: Utc::now(),
            etag: "etag".into(),
            text: "Build a login page with email+password.".into(),
            kind: FileKind::Txt,
        }
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig::builder()
            .initial_retry_interval(Duration::from_millis(1))
            .build()
            .unwrap()
    }

    fn good_markdown() -> String {
        format!("# Overview\n\n{}\n", "A thorough specification. ".repeat(10))
    }

    fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            content: vec![ContentBlock::Text(text.to_string())],
            input_tokens: 120,
            output_tokens: 80,
            stop_reason: StopReason::EndTurn,
        }
    }

    /// Scripted model: pops one canned result per call.
    struct Scripted {
        responses: Mutex<Vec<Result<CompletionResponse, CompletionError>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(mut responses: Vec<Result<CompletionResponse, CompletionError>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                calls: AtomicU32::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionModel for Scripted {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(CompletionError::Other("script exhausted".into())))
        }
    }

    #[tokio::test]
    async fn inherited_error_passes_through_without_a_model_call() {
        let model = Scripted::new(vec![]);
        let inherited = ProcessingError::UnsupportedFormat {
            key: "uploads/malware.exe".into(),
            extension: "exe".into(),
            at: Utc::now(),
        };
        let result = generate(Err(inherited.clone()), &model, &fast_config()).await;
        let err = result.unwrap_err();
        assert_eq!(err.key(), inherited.key());
        assert_eq!(err.kind(), inherited.kind());
        assert_eq!(model.call_count(), 0, "stage must not touch the model");
    }

    #[tokio::test]
    async fn success_captures_tokens_and_duration() {
        let model = Scripted::new(vec![Ok(text_response(&good_markdown()))]);
        let result = generate(Ok(doc()), &model, &fast_config()).await.unwrap();
        assert!(result.markdown.starts_with("# Overview"));
        assert_eq!(result.input_tokens, 120);
        assert_eq!(result.output_tokens, 80);
        assert_eq!(result.kind, FileKind::Txt);
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn short_headerless_response_is_retried_then_fails() {
        // 50 chars, no header: fails the gate on all 3 attempts.
        let short = "x".repeat(50);
        let model = Scripted::new(vec![
            Ok(text_response(&short)),
            Ok(text_response(&short)),
            Ok(text_response(&short)),
        ]);
        let err = generate(Ok(doc()), &model, &fast_config()).await.unwrap_err();
        assert_eq!(err.kind().as_str(), "generation");
        assert!(err.retryable());
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn quality_gate_passes_150_chars_with_header() {
        let fine = format!("# Overview\n\n{}", "word ".repeat(28)); // > 140 chars
        assert!(fine.chars().count() >= 150);
        let model = Scripted::new(vec![Ok(text_response(&fine))]);
        assert!(generate(Ok(doc()), &model, &fast_config()).await.is_ok());
    }

    #[tokio::test]
    async fn refusal_phrase_fails_the_gate() {
        let refusal = format!(
            "# Note\n\nI cannot produce a specification for this document. {}",
            "padding ".repeat(20)
        );
        let model = Scripted::new(vec![
            Ok(text_response(&refusal)),
            Ok(text_response(&good_markdown())),
        ]);
        // First response refused, second is clean — the retry recovers.
        let result = generate(Ok(doc()), &model, &fast_config()).await.unwrap();
        assert!(!result.markdown.to_lowercase().contains("i cannot"));
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn empty_content_list_is_a_retryable_invalid_response() {
        let empty = CompletionResponse {
            content: vec![],
            input_tokens: 0,
            output_tokens: 0,
            stop_reason: StopReason::EndTurn,
        };
        let model = Scripted::new(vec![Ok(empty), Ok(text_response(&good_markdown()))]);
        assert!(generate(Ok(doc()), &model, &fast_config()).await.is_ok());
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn invalid_request_is_terminal_after_one_attempt() {
        let model = Scripted::new(vec![Err(CompletionError::InvalidRequest(
            "prompt too large".into(),
        ))]);
        let err = generate(Ok(doc()), &model, &fast_config()).await.unwrap_err();
        assert!(!err.retryable());
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn rate_limit_is_retried() {
        let model = Scripted::new(vec![
            Err(CompletionError::RateLimited {
                retry_after_secs: Some(1),
            }),
            Ok(text_response(&good_markdown())),
        ]);
        assert!(generate(Ok(doc()), &model, &fast_config()).await.is_ok());
        assert_eq!(model.call_count(), 2);
    }

    #[test]
    fn polish_strips_outer_fence_and_normalizes_endings() {
        let fenced = "```markdown\n# Overview\r\nBody text\n```";
        assert_eq!(polish(fenced), "# Overview\nBody text\n");
        assert_eq!(polish("# Plain\n"), "# Plain\n");
    }

    #[test]
    fn validate_generated_checks_all_three_rules() {
        let long = "y".repeat(120);
        assert!(validate_generated(&format!("# H\n{long}"), 100).is_ok());
        assert!(validate_generated("# short", 100).is_err());
        assert!(validate_generated(&long, 100).is_err(), "no header");
        assert!(validate_generated(&format!("# H\nI CANNOT do this {long}"), 100).is_err());
    }
}
