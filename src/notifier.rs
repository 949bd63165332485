//! Pub/sub seam: where rendered outcome messages leave the pipeline.
//!
//! Exactly one publish happens per execution — a success body with a
//! download reference, or a failure body with kind/cause/guidance. The
//! notify stage renders; implementations of this trait only deliver.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Delivery failures. Not retried by the pipeline — a failed publish is
/// surfaced to the orchestrator in the [`crate::run::PipelineReport`].
#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    /// The messaging service is unreachable or down.
    #[error("notifier unavailable: {0}")]
    Unavailable(String),

    /// The service rejected the message (size, topic, permissions).
    #[error("notification rejected: {0}")]
    Rejected(String),

    /// Anything else.
    #[error("notifier error: {0}")]
    Other(String),
}

/// Minimal pub/sub contract: subject, body, and string attributes that
/// subscribers can filter on without parsing the body.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Publish one message, returning the provider's message identifier.
    async fn publish(
        &self,
        subject: &str,
        body: &str,
        attributes: &HashMap<String, String>,
    ) -> Result<String, NotifyError>;
}
