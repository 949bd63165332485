//! # doc2spec
//!
//! Turn uploaded documents into AI-generated technical specification
//! documents through a staged, typed pipeline.
//!
//! ## Why this crate?
//!
//! The interesting engineering in a document-to-specification service is
//! not the cloud wiring — it is the pipeline: the ordered set of typed
//! stage contracts, the error/retry discipline that ties them together,
//! and the content rules each stage enforces. This crate is exactly that
//! core. Storage, model and messaging are narrow traits
//! ([`ObjectStore`], [`CompletionModel`], [`Notifier`]) that deployments
//! implement against whatever services they run on; everything else is
//! plain, testable Rust.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload trigger
//!  │
//!  ├─ 1. Read      size/transport/format checks, fetch, extract + normalise
//!  ├─ 2. Generate  prompt the completion capability, gate the response
//!  ├─ 3. Persist   deterministic date-partitioned key, encrypted write
//!  └─ 4. Notify    one success/failure message with a download reference
//! ```
//!
//! A failure in any stage short-circuits the rest of the chain and flows
//! untouched to the notify stage — every execution ends in exactly one
//! notification. Generate and persist run under bounded
//! exponential-backoff retry; deterministic validation failures are never
//! retried.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doc2spec::{MemoryObjectStore, Pipeline, PipelineConfig, TriggerEvent};
//! use std::sync::Arc;
//!
//! # use doc2spec::{CompletionModel, CompletionRequest, CompletionResponse, CompletionError};
//! # struct MyModel;
//! # #[async_trait::async_trait]
//! # impl CompletionModel for MyModel {
//! #     async fn complete(&self, _r: CompletionRequest) -> Result<CompletionResponse, CompletionError> { unimplemented!() }
//! # }
//! # use doc2spec::{Notifier, NotifyError};
//! # struct MyNotifier;
//! # #[async_trait::async_trait]
//! # impl Notifier for MyNotifier {
//! #     async fn publish(&self, _s: &str, _b: &str, _a: &std::collections::HashMap<String, String>) -> Result<String, NotifyError> { unimplemented!() }
//! # }
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(MemoryObjectStore::new().with_bucket("uploads").await);
//!     let pipeline = Pipeline::new(
//!         store,
//!         Arc::new(MyModel),
//!         Arc::new(MyNotifier),
//!         PipelineConfig::default(),
//!     );
//!
//!     let trigger: TriggerEvent = serde_json::from_str(r#"{
//!         "bucket": "uploads", "key": "docs/spec.txt", "size": 42,
//!         "etag": "abc", "event_time": "2026-08-06T10:11:12Z",
//!         "event_name": "ObjectCreated:Put"
//!     }"#).unwrap();
//!
//!     let report = pipeline.run(trigger).await;
//!     match report.outcome {
//!         Ok(record) => println!("wrote {}", record.output_location()),
//!         Err(error) => eprintln!("failed: {error}"),
//!     }
//! }
//! ```
//!
//! ## Supported input formats
//!
//! | Kind | Extensions | Extraction |
//! |------|-----------|------------|
//! | Plain text | txt, md | UTF-8 decode + whitespace normalisation |
//! | Source code | java, rexx, py, js, ts | same as plain text |
//! | Rich text | rtf | control markup stripped, then normalised |
//! | Binary documents | pdf, doc, docx | base64-embedded, not parsed |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod completion;
pub mod config;
pub mod error;
pub mod events;
pub mod notifier;
pub mod pipeline;
pub mod prompts;
pub mod record;
pub mod run;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use completion::{
    CompletionError, CompletionModel, CompletionRequest, CompletionResponse, ContentBlock,
    StopReason,
};
pub use config::{ConfigError, PipelineConfig, PipelineConfigBuilder};
pub use error::{ErrorKind, ProcessingError};
pub use events::{LogTraceSink, NoopTraceSink, TraceSink};
pub use notifier::{Notifier, NotifyError};
pub use pipeline::persist::compute_output_key;
pub use pipeline::retry::RetryPolicy;
pub use record::{
    FileKind, FileReference, GenerationResult, NormalizedDocument, SpecificationRecord,
    TriggerEvent, SUPPORTED_EXTENSIONS,
};
pub use run::{ExecutionState, Pipeline, PipelineReport};
pub use store::{MemoryObjectStore, ObjectStore, PutRequest, StoreError, StoredObject};
