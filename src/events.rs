//! Optional trace side channel.
//!
//! Distributed-tracing annotations are useful in production but must never
//! be a dependency of the core logic. The coordinator calls this trait at
//! stage boundaries; the default wiring is [`NoopTraceSink`], so nothing
//! observable happens unless a caller injects a real sink.

use tracing::debug;

/// Receives per-execution annotations and stage completions.
///
/// Every method has an empty default body, so implementors override only
/// what they record.
pub trait TraceSink: Send + Sync {
    /// Attach a key/value annotation to the current execution.
    fn annotate(&self, _key: &str, _value: &str) {}

    /// A stage finished, successfully or not.
    fn stage_finished(&self, _stage: &str, _elapsed_ms: u64, _ok: bool) {}
}

/// Discards everything. The default sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTraceSink;

impl TraceSink for NoopTraceSink {}

/// Forwards annotations to the `tracing` subscriber at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTraceSink;

impl TraceSink for LogTraceSink {
    fn annotate(&self, key: &str, value: &str) {
        debug!(key, value, "trace annotation");
    }

    fn stage_finished(&self, stage: &str, elapsed_ms: u64, ok: bool) {
        debug!(stage, elapsed_ms, ok, "stage finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        stages: Mutex<Vec<(String, bool)>>,
    }

    impl TraceSink for Recording {
        fn stage_finished(&self, stage: &str, _elapsed_ms: u64, ok: bool) {
            self.stages.lock().unwrap().push((stage.to_string(), ok));
        }
    }

    #[test]
    fn noop_sink_accepts_everything() {
        let sink = NoopTraceSink;
        sink.annotate("file_key", "uploads/spec.txt");
        sink.stage_finished("read", 12, true);
    }

    #[test]
    fn custom_sink_only_overrides_what_it_wants() {
        let sink = Recording::default();
        sink.annotate("ignored", "by default body");
        sink.stage_finished("generate", 100, false);
        assert_eq!(
            sink.stages.lock().unwrap().as_slice(),
            &[("generate".to_string(), false)]
        );
    }
}
