//! Configuration for the document-to-specification pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built
//! via its [`PipelineConfigBuilder`]. Keeping every knob in one struct
//! makes it trivial to share configs across executions, serialise them for
//! logging, and diff two runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest.

use crate::pipeline::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// A configuration that cannot produce a valid pipeline.
///
/// Raised by [`PipelineConfigBuilder::build`] before any file is touched;
/// deliberately separate from [`crate::error::ProcessingError`], which
/// describes execution failures, not caller mistakes.
#[derive(Debug, Clone, Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(pub String);

/// Configuration for a pipeline execution.
///
/// Built via [`PipelineConfig::builder()`] or [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use doc2spec::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .max_attempts(5)
///     .temperature(0.2)
///     .environment("prod")
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Storage size ceiling for source files in bytes. Default: 10 MiB.
    ///
    /// Files over this are rejected outright. The store itself may accept
    /// larger objects; this is the pipeline's own ceiling.
    pub max_file_size_bytes: u64,

    /// Transport payload ceiling in bytes. Default: 200 KiB.
    ///
    /// Models the downstream orchestration payload limit, which is far
    /// smaller than the storage ceiling. A file can pass the storage check
    /// and still fail here — that failure gets its own error kind so
    /// subscribers can distinguish the two.
    pub max_transport_bytes: u64,

    /// Minimum extracted-content length in characters. Default: 10.
    ///
    /// Anything shorter carries too little signal to specify against.
    pub min_content_chars: usize,

    /// Maximum extracted-content length in characters. Default: 1,048,576.
    ///
    /// Bounds prompt size; violation is terminal, not retried.
    pub max_content_chars: usize,

    /// Minimum acceptable generated-specification length in characters.
    /// Default: 100.
    pub min_generated_chars: usize,

    /// Maximum tokens the model may generate. Default: 4000.
    pub max_output_tokens: u32,

    /// Sampling temperature for the completion call. Default: 0.3.
    ///
    /// Low temperature favours determinism — a specification document
    /// should not vary much between runs on the same input.
    pub temperature: f32,

    /// Maximum attempts per retried unit of work. Default: 3.
    pub max_attempts: u32,

    /// Initial retry delay. Default: 2s.
    ///
    /// Doubles per attempt at the default backoff rate: 2s → 4s.
    pub initial_retry_interval: Duration,

    /// Exponential backoff multiplier. Default: 2.0.
    pub backoff_rate: f64,

    /// Validity window for the signed download URL in the success
    /// notification. Default: 24 hours.
    pub download_ttl: Duration,

    /// Store location for generated specifications. `None` writes to the
    /// source bucket.
    pub output_bucket: Option<String>,

    /// Deployment tag attached to every notification for subscriber-side
    /// filtering. Default: "dev".
    pub environment: String,

    /// Custom system prompt. If `None`, uses the built-in default.
    pub system_prompt: Option<String>,

    /// End-to-end ceiling for one execution, excluding notification.
    /// Default: `None` (no internal timeout).
    ///
    /// A stuck execution that hits this is turned into a terminal failure
    /// for the stage it was in and routed to the failure notification. A
    /// small multiple of the per-stage timeout sum (8–10 minutes) is a
    /// sensible production value.
    #[serde(skip)]
    pub execution_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 10 * 1024 * 1024,
            max_transport_bytes: 200 * 1024,
            min_content_chars: 10,
            max_content_chars: 1_048_576,
            min_generated_chars: 100,
            max_output_tokens: 4000,
            temperature: 0.3,
            max_attempts: 3,
            initial_retry_interval: Duration::from_secs(2),
            backoff_rate: 2.0,
            download_ttl: Duration::from_secs(24 * 60 * 60),
            output_bucket: None,
            environment: "dev".to_string(),
            system_prompt: None,
            execution_timeout: None,
        }
    }
}

impl PipelineConfig {
    /// Create a new builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Retry policy derived from the configured attempt/backoff knobs.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_interval: self.initial_retry_interval,
            backoff_rate: self.backoff_rate,
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn max_file_size_bytes(mut self, bytes: u64) -> Self {
        self.config.max_file_size_bytes = bytes;
        self
    }

    pub fn max_transport_bytes(mut self, bytes: u64) -> Self {
        self.config.max_transport_bytes = bytes;
        self
    }

    pub fn content_bounds(mut self, min_chars: usize, max_chars: usize) -> Self {
        self.config.min_content_chars = min_chars;
        self.config.max_content_chars = max_chars;
        self
    }

    pub fn min_generated_chars(mut self, chars: usize) -> Self {
        self.config.min_generated_chars = chars;
        self
    }

    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.config.max_output_tokens = tokens.max(1);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 1.0);
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts.max(1);
        self
    }

    pub fn initial_retry_interval(mut self, interval: Duration) -> Self {
        self.config.initial_retry_interval = interval;
        self
    }

    pub fn backoff_rate(mut self, rate: f64) -> Self {
        self.config.backoff_rate = rate.max(1.0);
        self
    }

    pub fn download_ttl(mut self, ttl: Duration) -> Self {
        self.config.download_ttl = ttl;
        self
    }

    pub fn output_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.output_bucket = Some(bucket.into());
        self
    }

    pub fn environment(mut self, tag: impl Into<String>) -> Self {
        self.config.environment = tag.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn execution_timeout(mut self, limit: Duration) -> Self {
        self.config.execution_timeout = Some(limit);
        self
    }

    /// Build the configuration, validating cross-field constraints.
    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        let c = &self.config;
        if c.max_transport_bytes > c.max_file_size_bytes {
            return Err(ConfigError(format!(
                "transport ceiling ({} bytes) cannot exceed the storage limit ({} bytes)",
                c.max_transport_bytes, c.max_file_size_bytes
            )));
        }
        if c.min_content_chars >= c.max_content_chars {
            return Err(ConfigError(format!(
                "content bounds are inverted: min {} >= max {}",
                c.min_content_chars, c.max_content_chars
            )));
        }
        if c.environment.is_empty() {
            return Err(ConfigError("environment tag must not be empty".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = PipelineConfig::default();
        assert_eq!(c.max_file_size_bytes, 10 * 1024 * 1024);
        assert_eq!(c.max_transport_bytes, 200 * 1024);
        assert_eq!(c.min_content_chars, 10);
        assert_eq!(c.max_content_chars, 1_048_576);
        assert_eq!(c.max_output_tokens, 4000);
        assert!((c.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(c.max_attempts, 3);
        assert_eq!(c.initial_retry_interval, Duration::from_secs(2));
        assert_eq!(c.download_ttl, Duration::from_secs(86_400));
        assert_eq!(c.environment, "dev");
    }

    #[test]
    fn builder_rejects_transport_over_storage() {
        let result = PipelineConfig::builder()
            .max_file_size_bytes(1024)
            .max_transport_bytes(2048)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_rejects_inverted_content_bounds() {
        let result = PipelineConfig::builder().content_bounds(100, 100).build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_clamps_temperature_and_attempts() {
        let c = PipelineConfig::builder()
            .temperature(3.5)
            .max_attempts(0)
            .build()
            .unwrap();
        assert!(c.temperature <= 1.0);
        assert_eq!(c.max_attempts, 1);
    }

    #[test]
    fn retry_policy_mirrors_config() {
        let c = PipelineConfig::builder()
            .max_attempts(5)
            .initial_retry_interval(Duration::from_millis(100))
            .backoff_rate(3.0)
            .build()
            .unwrap();
        let policy = c.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_interval, Duration::from_millis(100));
        assert!((policy.backoff_rate - 3.0).abs() < f64::EPSILON);
    }
}
