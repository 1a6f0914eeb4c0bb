//! Evidence hand-off to the external storage sink.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use interview_guard_core::{CaptureArtifact, EvidenceRef, ViolationKind};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

/// Envelope handed to an [`EvidenceSink`].
#[derive(Clone, PartialEq, Eq)]
pub struct EvidenceUpload {
    /// Deterministic key the sink uses to deduplicate retries.
    pub idempotency_key: String,
    /// Target file name.
    pub file_name: String,
    /// MIME type of `bytes`.
    pub mime_type: String,
    /// Evidence bytes.
    pub bytes: Vec<u8>,
    /// Local handle of the captured artifact, when this is an image capture.
    pub evidence_ref: Option<EvidenceRef>,
    /// Violation banner and capture timestamp drawn into an image capture.
    pub annotation: Option<String>,
}

impl std::fmt::Debug for EvidenceUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceUpload")
            .field("idempotency_key", &self.idempotency_key)
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("bytes_len", &self.bytes.len())
            .field("evidence_ref", &self.evidence_ref)
            .field("annotation", &self.annotation)
            .finish()
    }
}

impl EvidenceUpload {
    /// Wraps a captured screenshot. Takes ownership of the artifact.
    pub fn from_capture(artifact: CaptureArtifact, kind: ViolationKind) -> Self {
        let file_name = format!(
            "warning_screenshot_{}_{}_{}.jpg",
            artifact.created_at_ms,
            kind.label(),
            artifact.sequence
        );
        Self {
            idempotency_key: idempotency_key(&file_name, &artifact.bytes),
            file_name,
            mime_type: artifact.mime_type,
            bytes: artifact.bytes,
            evidence_ref: Some(artifact.evidence_ref),
            annotation: Some(artifact.annotation_text),
        }
    }

    /// Wraps the final session recording.
    pub fn recording(
        session_id: &str,
        created_at_ms: u64,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        let file_name = format!("interview_recording_{session_id}_{created_at_ms}.webm");
        Self {
            idempotency_key: idempotency_key(&file_name, &bytes),
            file_name,
            mime_type: mime_type.into(),
            bytes,
            evidence_ref: None,
            annotation: None,
        }
    }
}

/// Computes the SHA-256 idempotency key for an upload.
pub fn idempotency_key(file_name: &str, bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_name.as_bytes());
    hasher.update([0_u8]);
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// External evidence storage.
#[async_trait]
pub trait EvidenceSink: Send + Sync {
    /// Stores one upload and returns the sink's reference id.
    ///
    /// Implementations must accept a repeated call with the same idempotency
    /// key without storing a duplicate.
    async fn upload(&self, upload: &EvidenceUpload) -> Result<String, UploadError>;
}

/// Retry configuration for evidence uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay_ms: u64,
    /// Upper bound for any single delay.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay_ms: 1_000,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff for the `retry`-th retry (1-based), capped.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = 1_u64 << retry.saturating_sub(1).min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }
}

/// Upload failure categories.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// The sink did not answer in time.
    #[error("upload timed out")]
    Timeout,
    /// Sink-side failure with status code.
    #[error("sink server error: {0}")]
    Server(u16),
    /// Request rejected with status code.
    #[error("sink rejected upload: {0}")]
    Client(u16),
    /// Network or transport failure.
    #[error("upload transport failure: {0}")]
    Transport(String),
    /// Sink endpoint violates policy.
    #[error("invalid sink endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Whether an upload failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Transient; retry may succeed.
    Retriable,
    /// Retrying will not help.
    Permanent,
}

/// Classifies an upload failure.
pub fn classify_upload_error(error: &UploadError) -> FailureClass {
    match error {
        UploadError::Timeout | UploadError::Transport(_) => FailureClass::Retriable,
        UploadError::Server(status) if *status >= 500 => FailureClass::Retriable,
        UploadError::Client(429) => FailureClass::Retriable,
        _ => FailureClass::Permanent,
    }
}

/// Successful upload receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Reference id returned by the sink.
    pub reference_id: String,
    /// Attempts used, including the first.
    pub attempts: u32,
}

/// Final outcome of one evidence hand-off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The sink accepted the evidence.
    Uploaded {
        /// Local handle of the uploaded artifact, if any.
        evidence_ref: Option<EvidenceRef>,
        /// Sink receipt.
        receipt: UploadReceipt,
    },
    /// Upload gave up; the evidence is kept in the [`LocalEvidenceStore`].
    RetainedLocally {
        /// Local handle of the retained artifact, if any.
        evidence_ref: Option<EvidenceRef>,
        /// Retained file name.
        file_name: String,
        /// Last failure.
        error: UploadError,
        /// Attempts used.
        attempts: u32,
    },
}

impl UploadOutcome {
    /// Returns `true` for [`UploadOutcome::Uploaded`].
    pub fn is_uploaded(&self) -> bool {
        matches!(self, Self::Uploaded { .. })
    }
}

/// Local retention for evidence the sink did not accept.
#[derive(Debug, Default)]
pub struct LocalEvidenceStore {
    retained: Mutex<Vec<EvidenceUpload>>,
}

impl LocalEvidenceStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps one upload.
    pub fn retain(&self, upload: EvidenceUpload) {
        if let Ok(mut retained) = self.retained.lock() {
            retained.push(upload);
        }
    }

    /// Number of retained uploads.
    pub fn len(&self) -> usize {
        self.retained.lock().map(|retained| retained.len()).unwrap_or(0)
    }

    /// Returns `true` when nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// File names of retained uploads, oldest first.
    pub fn file_names(&self) -> Vec<String> {
        self.retained
            .lock()
            .map(|retained| retained.iter().map(|u| u.file_name.clone()).collect())
            .unwrap_or_default()
    }
}

/// Sends evidence to a sink with retry and local fallback.
#[derive(Clone)]
pub struct EvidenceUploader {
    sink: Arc<dyn EvidenceSink>,
    policy: RetryPolicy,
    local: Arc<LocalEvidenceStore>,
}

impl EvidenceUploader {
    /// Creates an uploader.
    pub fn new(
        sink: Arc<dyn EvidenceSink>,
        policy: RetryPolicy,
        local: Arc<LocalEvidenceStore>,
    ) -> Self {
        Self {
            sink,
            policy,
            local,
        }
    }

    /// Returns the local fallback store.
    pub fn local_store(&self) -> &Arc<LocalEvidenceStore> {
        &self.local
    }

    /// Uploads `upload`, retrying retriable failures up to the policy limit.
    /// On final failure the upload is moved into the local store.
    pub async fn upload(&self, upload: EvidenceUpload) -> UploadOutcome {
        let mut attempts = 0_u32;
        loop {
            attempts += 1;
            match self.sink.upload(&upload).await {
                Ok(reference_id) => {
                    info!(
                        file_name = %upload.file_name,
                        %reference_id,
                        attempts,
                        "evidence uploaded"
                    );
                    return UploadOutcome::Uploaded {
                        evidence_ref: upload.evidence_ref,
                        receipt: UploadReceipt {
                            reference_id,
                            attempts,
                        },
                    };
                }
                Err(error) => {
                    let retry = attempts - 1;
                    let retriable = classify_upload_error(&error) == FailureClass::Retriable;
                    if retriable && retry < self.policy.max_retries {
                        warn!(
                            file_name = %upload.file_name,
                            %error,
                            attempts,
                            "evidence upload failed; retrying"
                        );
                        tokio::time::sleep(self.policy.delay_for_retry(retry + 1)).await;
                        continue;
                    }

                    warn!(
                        file_name = %upload.file_name,
                        %error,
                        attempts,
                        "evidence upload failed; retaining locally"
                    );
                    let evidence_ref = upload.evidence_ref.clone();
                    let file_name = upload.file_name.clone();
                    self.local.retain(upload);
                    return UploadOutcome::RetainedLocally {
                        evidence_ref,
                        file_name,
                        error,
                        attempts,
                    };
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct StoredEvidence {
    reference_id: String,
    file_name: String,
    bytes_len: usize,
    annotation: Option<String>,
}

/// In-memory [`EvidenceSink`] with a simulated delay and injectable failures.
#[derive(Debug)]
pub struct InMemoryEvidenceSink {
    endpoint: Url,
    simulated_delay: Duration,
    stored: Mutex<HashMap<String, StoredEvidence>>,
    scripted_failures: Mutex<VecDeque<UploadError>>,
    calls: AtomicU32,
}

impl InMemoryEvidenceSink {
    /// Creates a sink rooted at an HTTPS `endpoint`.
    ///
    /// # Errors
    /// Returns [`UploadError::InvalidEndpoint`] for unparsable or non-HTTPS URLs.
    pub fn new(endpoint: &str, simulated_delay: Duration) -> Result<Self, UploadError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|error| UploadError::InvalidEndpoint(format!("invalid sink url: {error}")))?;
        if endpoint.scheme() != "https" {
            return Err(UploadError::InvalidEndpoint(
                "sink endpoint must use https".to_string(),
            ));
        }

        Ok(Self {
            endpoint,
            simulated_delay,
            stored: Mutex::new(HashMap::new()),
            scripted_failures: Mutex::new(VecDeque::new()),
            calls: AtomicU32::new(0),
        })
    }

    /// Makes the next calls fail with `errors`, in order.
    pub fn fail_next(&self, errors: Vec<UploadError>) {
        if let Ok(mut scripted) = self.scripted_failures.lock() {
            scripted.extend(errors);
        }
    }

    /// Number of `upload` calls received.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of distinct uploads stored.
    pub fn stored_count(&self) -> usize {
        self.stored.lock().map(|stored| stored.len()).unwrap_or(0)
    }

    /// Annotation received with the stored upload named `file_name`.
    pub fn annotation(&self, file_name: &str) -> Option<String> {
        self.stored.lock().ok().and_then(|stored| {
            stored
                .values()
                .find(|entry| entry.file_name == file_name)
                .and_then(|entry| entry.annotation.clone())
        })
    }

    /// File names of stored uploads, sorted.
    pub fn stored_file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .stored
            .lock()
            .map(|stored| stored.values().map(|entry| entry.file_name.clone()).collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Total stored bytes.
    pub fn stored_bytes(&self) -> usize {
        self.stored
            .lock()
            .map(|stored| stored.values().map(|entry| entry.bytes_len).sum())
            .unwrap_or(0)
    }
}

#[async_trait]
impl EvidenceSink for InMemoryEvidenceSink {
    async fn upload(&self, upload: &EvidenceUpload) -> Result<String, UploadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.simulated_delay.is_zero() {
            tokio::time::sleep(self.simulated_delay).await;
        }

        let scripted = self
            .scripted_failures
            .lock()
            .map_err(|_| UploadError::Transport("sink failure script lock poisoned".to_string()))?
            .pop_front();
        if let Some(error) = scripted {
            return Err(error);
        }

        let mut stored = self
            .stored
            .lock()
            .map_err(|_| UploadError::Transport("sink store lock poisoned".to_string()))?;
        let entry = stored
            .entry(upload.idempotency_key.clone())
            .or_insert_with(|| StoredEvidence {
                reference_id: format!(
                    "{}/{}",
                    self.endpoint.as_str().trim_end_matches('/'),
                    upload.file_name
                ),
                file_name: upload.file_name.clone(),
                bytes_len: upload.bytes.len(),
                annotation: upload.annotation.clone(),
            });
        Ok(entry.reference_id.clone())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for classification and idempotent storage.

    use super::*;

    fn sample_upload() -> EvidenceUpload {
        EvidenceUpload::recording("session-1", 42, "video/webm", vec![1, 2, 3])
    }

    #[test]
    fn classifies_transient_and_permanent_failures() {
        assert_eq!(
            classify_upload_error(&UploadError::Server(503)),
            FailureClass::Retriable
        );
        assert_eq!(
            classify_upload_error(&UploadError::Client(400)),
            FailureClass::Permanent
        );
        assert_eq!(
            classify_upload_error(&UploadError::Timeout),
            FailureClass::Retriable
        );
    }

    #[test]
    fn rejects_plain_http_sink() {
        assert!(matches!(
            InMemoryEvidenceSink::new("http://drive.example.test/evidence", Duration::ZERO),
            Err(UploadError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 3_000,
        };
        assert_eq!(policy.delay_for_retry(1), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for_retry(2), Duration::from_millis(2_000));
        assert_eq!(policy.delay_for_retry(3), Duration::from_millis(3_000));
    }

    #[tokio::test]
    async fn repeated_upload_is_deduplicated() {
        let sink = InMemoryEvidenceSink::new("https://drive.example.test/evidence/", Duration::ZERO)
            .expect("sink should build");
        let upload = sample_upload();

        let first = sink.upload(&upload).await.expect("first upload");
        let second = sink.upload(&upload).await.expect("second upload");

        assert_eq!(first, second);
        assert_eq!(
            first,
            "https://drive.example.test/evidence/interview_recording_session-1_42.webm"
        );
        assert_eq!(sink.calls(), 2);
        assert_eq!(sink.stored_count(), 1);
    }
}
