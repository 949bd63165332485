//! Pipeline coordinator: one trigger in, exactly one notification out.
//!
//! The stages are chained by a single coordinating function driving an
//! explicit state machine:
//!
//! ```text
//! Reading ──▶ Generating ──▶ Persisting ──▶ Notifying ──▶ Done
//!    │             │              │                         │
//!    └─────────────┴──────────────┴────── failure ──────▶ Failed
//! ```
//!
//! Each stage's `Result` feeds the next stage unchanged, so a failure
//! anywhere flows through the remaining stages untouched and reaches the
//! notify stage as the failure variant — no workflow engine required, and
//! the whole chain is testable in-process.
//!
//! An optional execution timeout covers Reading through Persisting. When
//! it fires, the state the machine was in decides the synthesized terminal
//! error, so even a stuck execution ends in exactly one failure
//! notification.

use crate::completion::CompletionModel;
use crate::config::PipelineConfig;
use crate::error::ProcessingError;
use crate::events::{NoopTraceSink, TraceSink};
use crate::notifier::{Notifier, NotifyError};
use crate::pipeline::{generate, notify, persist, read};
use crate::record::{FileReference, SpecificationRecord, TriggerEvent};
use crate::store::ObjectStore;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::time::timeout;
use tracing::{info, warn};

/// Where an execution currently is, or how it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Reading,
    Generating,
    Persisting,
    Notifying,
    Done,
    Failed,
}

impl ExecutionState {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Reading => "reading",
            Self::Generating => "generating",
            Self::Persisting => "persisting",
            Self::Notifying => "notifying",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// Everything one execution produced.
///
/// The outcome and the notification acknowledgement are reported
/// separately: a publish failure must not masquerade as a processing
/// failure (the artifact may well have been written), and vice versa.
#[derive(Debug)]
pub struct PipelineReport {
    /// The terminal success record, or the single error that ended the run.
    pub outcome: Result<SpecificationRecord, ProcessingError>,
    /// Message id of the published notification, or the publish failure.
    pub notification: Result<String, NotifyError>,
    /// `Done` or `Failed`.
    pub state: ExecutionState,
}

impl PipelineReport {
    /// True when the document was processed and persisted.
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// The assembled pipeline: collaborators plus configuration.
///
/// Cheap to clone behind the `Arc`s and safe to share across concurrent
/// executions — nothing in here is mutated by a run.
pub struct Pipeline {
    store: Arc<dyn ObjectStore>,
    model: Arc<dyn CompletionModel>,
    notifier: Arc<dyn Notifier>,
    trace: Arc<dyn TraceSink>,
    config: PipelineConfig,
}

impl Pipeline {
    /// Assemble a pipeline with the default (no-op) trace sink.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        model: Arc<dyn CompletionModel>,
        notifier: Arc<dyn Notifier>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            model,
            notifier,
            trace: Arc::new(NoopTraceSink),
            config,
        }
    }

    /// Replace the trace sink.
    pub fn with_trace(mut self, trace: Arc<dyn TraceSink>) -> Self {
        self.trace = trace;
        self
    }

    /// Process one uploaded file end to end.
    ///
    /// Runs Read → Generate → Persist, then publishes exactly one success
    /// or failure notification. Never panics on a processing failure —
    /// every path ends in a [`PipelineReport`].
    pub async fn run(&self, trigger: TriggerEvent) -> PipelineReport {
        let file = FileReference::from(trigger);
        info!("pipeline start for '{}/{}'", file.bucket, file.key);
        self.trace.annotate("source_key", &file.key);
        self.trace.annotate("source_bucket", &file.bucket);

        let state = Arc::new(Mutex::new(ExecutionState::Reading));
        let outcome = match self.config.execution_timeout {
            Some(limit) => match timeout(limit, self.execute(file.clone(), &state)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let stuck_in = *state.lock().unwrap();
                    warn!(
                        "execution for '{}' timed out after {:?} while {}",
                        file.key,
                        limit,
                        stuck_in.as_str()
                    );
                    Err(timeout_error(stuck_in, &file, limit.as_secs()))
                }
            },
            None => self.execute(file, &state).await,
        };

        *state.lock().unwrap() = ExecutionState::Notifying;
        let notify_start = Instant::now();
        let notification = notify::notify(
            &outcome,
            self.store.as_ref(),
            self.notifier.as_ref(),
            &self.config,
        )
        .await;
        self.trace.stage_finished(
            "notify",
            notify_start.elapsed().as_millis() as u64,
            notification.is_ok(),
        );
        if let Err(ref e) = notification {
            warn!("outcome notification failed: {e}");
        }

        let final_state = if outcome.is_ok() {
            ExecutionState::Done
        } else {
            ExecutionState::Failed
        };
        *state.lock().unwrap() = final_state;

        match &outcome {
            Ok(record) => info!(
                "pipeline done: '{}' → '{}'",
                record.source_key,
                record.output_location()
            ),
            Err(error) => info!("pipeline failed: {} ({})", error, error.kind()),
        }

        PipelineReport {
            outcome,
            notification,
            state: final_state,
        }
    }

    /// The Read → Generate → Persist chain, recording state transitions.
    async fn execute(
        &self,
        file: FileReference,
        state: &Arc<Mutex<ExecutionState>>,
    ) -> Result<SpecificationRecord, ProcessingError> {
        *state.lock().unwrap() = ExecutionState::Reading;
        let stage_start = Instant::now();
        let document = read::read(file, self.store.as_ref(), &self.config).await;
        self.trace.stage_finished(
            "read",
            stage_start.elapsed().as_millis() as u64,
            document.is_ok(),
        );

        *state.lock().unwrap() = ExecutionState::Generating;
        let stage_start = Instant::now();
        let generated = generate::generate(document, self.model.as_ref(), &self.config).await;
        self.trace.stage_finished(
            "generate",
            stage_start.elapsed().as_millis() as u64,
            generated.is_ok(),
        );

        *state.lock().unwrap() = ExecutionState::Persisting;
        let stage_start = Instant::now();
        let record = persist::persist(generated, self.store.as_ref(), &self.config).await;
        self.trace.stage_finished(
            "persist",
            stage_start.elapsed().as_millis() as u64,
            record.is_ok(),
        );

        record
    }
}

/// Terminal error for an execution the timeout cut off, shaped by the
/// stage it was stuck in so the failure notification names the right kind.
fn timeout_error(state: ExecutionState, file: &FileReference, limit_secs: u64) -> ProcessingError {
    let reason = format!("execution timed out after {limit_secs}s");
    match state {
        ExecutionState::Generating => ProcessingError::Generation {
            key: file.key.clone(),
            reason,
            retryable: false,
            at: Utc::now(),
        },
        ExecutionState::Persisting => ProcessingError::OutputWrite {
            key: file.key.clone(),
            output_key: None,
            reason,
            retryable: false,
            at: Utc::now(),
        },
        // Reading, or any state the timeout should not be able to observe.
        _ => ProcessingError::StoreRead {
            key: file.key.clone(),
            bucket: file.bucket.clone(),
            reason,
            at: Utc::now(),
        },
    }
}
