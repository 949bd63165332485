//! Read stage: validate the uploaded file and produce normalised content.
//!
//! Validations run in a fixed order, each short-circuiting on failure:
//!
//! 1. storage size ceiling (10 MiB default)
//! 2. transport payload ceiling (200 KiB default) — a *distinct* error
//!    kind, because the store happily accepts files the downstream
//!    orchestration cannot carry
//! 3. extension against the supported set
//! 4. fetch from the object store
//! 5. extraction ([`super::extract`])
//!
//! Every failure here is deterministic, so this stage never retries:
//! the same file will fail the same check the same way.

use crate::config::PipelineConfig;
use crate::error::ProcessingError;
use crate::pipeline::extract;
use crate::record::{FileKind, FileReference, NormalizedDocument};
use crate::store::ObjectStore;
use chrono::Utc;
use tracing::{debug, info};

/// Validate, fetch and extract the uploaded file.
pub async fn read(
    file: FileReference,
    store: &dyn ObjectStore,
    config: &PipelineConfig,
) -> Result<NormalizedDocument, ProcessingError> {
    info!("reading '{}' from '{}' ({} bytes)", file.key, file.bucket, file.size);

    if file.size > config.max_file_size_bytes {
        return Err(ProcessingError::FileTooLarge {
            key: file.key,
            actual_size: file.size,
            max_size: config.max_file_size_bytes,
            at: Utc::now(),
        });
    }

    if file.size > config.max_transport_bytes {
        return Err(ProcessingError::TransportLimit {
            key: file.key,
            actual_size: file.size,
            limit: config.max_transport_bytes,
            at: Utc::now(),
        });
    }

    let kind = match FileKind::from_key(&file.key) {
        Some(kind) => kind,
        None => {
            let extension = file
                .file_name()
                .rsplit_once('.')
                .map(|(_, ext)| ext.to_ascii_lowercase())
                .unwrap_or_default();
            return Err(ProcessingError::UnsupportedFormat {
                key: file.key,
                extension,
                at: Utc::now(),
            });
        }
    };
    debug!("'{}' detected as {kind}", file.key);

    let bytes = store
        .get(&file.bucket, &file.key)
        .await
        .map_err(|e| ProcessingError::StoreRead {
            key: file.key.clone(),
            bucket: file.bucket.clone(),
            reason: e.to_string(),
            at: Utc::now(),
        })?;

    extract::extract(&bytes, &file, kind, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryObjectStore;

    fn file(key: &str, size: u64) -> FileReference {
        FileReference {
            bucket: "uploads".into(),
            key: key.into(),
            size,
            etag: "etag".into(),
            arrived_at: Utc::now(),
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    #[tokio::test]
    async fn file_at_exactly_max_size_passes_the_size_check() {
        // 10 MiB exactly is accepted by check 1 but tripped by check 2,
        // proving the boundary is inclusive and the checks are ordered.
        let store = MemoryObjectStore::new();
        let err = read(file("uploads/a.txt", 10 * 1024 * 1024), &store, &config())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessingError::TransportLimit { .. }));
    }

    #[tokio::test]
    async fn file_over_max_size_is_rejected_with_sizes() {
        let store = MemoryObjectStore::new();
        let err = read(file("uploads/a.txt", 10 * 1024 * 1024 + 1), &store, &config())
            .await
            .unwrap_err();
        match err {
            ProcessingError::FileTooLarge {
                actual_size,
                max_size,
                ..
            } => {
                assert_eq!(actual_size, 10 * 1024 * 1024 + 1);
                assert_eq!(max_size, 10 * 1024 * 1024);
            }
            other => panic!("expected FileTooLarge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_ceiling_gets_its_own_error_kind() {
        // 201 KiB: under the storage limit, over the 200 KiB ceiling.
        let store = MemoryObjectStore::new();
        let err = read(file("uploads/a.txt", 201 * 1024), &store, &config())
            .await
            .unwrap_err();
        assert_eq!(err.kind().as_str(), "file-too-large-for-transport");
    }

    #[tokio::test]
    async fn unsupported_extension_is_rejected_before_fetch() {
        // No object seeded: if the format check didn't short-circuit, the
        // fetch would produce a StoreRead error instead.
        let store = MemoryObjectStore::new();
        let err = read(file("uploads/malware.exe", 42), &store, &config())
            .await
            .unwrap_err();
        match &err {
            ProcessingError::UnsupportedFormat { extension, .. } => assert_eq!(extension, "exe"),
            other => panic!("expected UnsupportedFormat, got {other:?}"),
        }
        assert_eq!(err.kind().as_str(), "file-read");
    }

    #[tokio::test]
    async fn missing_object_is_a_store_read_error() {
        let store = MemoryObjectStore::new();
        let err = read(file("uploads/ghost.txt", 42), &store, &config())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessingError::StoreRead { .. }));
        assert!(!err.retryable());
    }

    #[tokio::test]
    async fn happy_path_extracts_normalized_text() {
        let store = MemoryObjectStore::new();
        store
            .seed(
                "uploads",
                "docs/spec.txt",
                b"Build a login page with email+password.\r\n".to_vec(),
            )
            .await;

        let doc = read(file("docs/spec.txt", 41), &store, &config())
            .await
            .unwrap();
        assert_eq!(doc.text, "Build a login page with email+password.");
        assert_eq!(doc.kind, FileKind::Txt);
        assert_eq!(doc.bucket, "uploads");
    }
}
