//! In-memory collaborators for driving `BatchController` in tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use url::Url;

use transcribe_intake::backoff::BackoffPolicy;
use transcribe_intake::controller::{BatchController, ControllerSettings};
use transcribe_intake::messaging::{MessageQueue, MessageSink, QueueError, ReceivedMessage};
use transcribe_intake::storage::{ObjectStorage, StorageError};
use transcribe_intake::transcription::{SubmitError, TranscriptionDefinition, TranscriptionService};

pub const INPUT: &str = "audio-input";
pub const ERROR_REPORT: &str = "error-report";
pub const ERROR_FILES: &str = "error-files";
pub const LEASE: Duration = Duration::from_secs(300);

pub fn blob_url(container: &str, name: &str) -> String {
    format!("https://acct.blob.core.windows.net/{container}/{name}")
}

/// Body of a blob-created notification for `name` in the input container.
pub fn arrival(name: &str, retry_count: u32) -> Vec<u8> {
    arrival_in(INPUT, name, retry_count)
}

pub fn arrival_in(container: &str, name: &str, retry_count: u32) -> Vec<u8> {
    serde_json::json!({
        "eventType": "Microsoft.Storage.BlobCreated",
        "subject": format!("/blobServices/default/containers/{container}/blobs/{name}"),
        "data": { "url": blob_url(container, name) },
        "retryCount": retry_count,
    })
    .to_string()
    .into_bytes()
}

// ── Queue ──────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeQueue {
    next_tag: AtomicUsize,
    pending: Mutex<VecDeque<ReceivedMessage>>,
    pub acked: Mutex<Vec<u64>>,
    /// Deliveries handed back unsettled.
    pub released: Mutex<Vec<u64>>,
    pub renewals: Mutex<Vec<u64>>,
    pub enqueued: Mutex<Vec<(Vec<u8>, Duration)>>,
    /// Deliveries whose lease can no longer be renewed.
    pub lost: Mutex<HashSet<u64>>,
    pub fail_receive: AtomicBool,
    pub fail_enqueue: AtomicBool,
    in_flight_acks: AtomicUsize,
    pub max_in_flight_acks: AtomicUsize,
}

impl FakeQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue `body` with a fresh lease; returns its delivery tag.
    pub fn push(&self, body: Vec<u8>) -> u64 {
        self.push_with_lease(body, LEASE)
    }

    pub fn push_with_lease(&self, body: Vec<u8>, lease: Duration) -> u64 {
        let tag = self.next_tag.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        let locked_until = Utc::now() + chrono::Duration::from_std(lease).unwrap();
        self.pending.lock().unwrap().push_back(ReceivedMessage {
            delivery_tag: tag,
            session: 0,
            body,
            locked_until,
        });
        tag
    }

    pub fn acked(&self) -> Vec<u64> {
        self.acked.lock().unwrap().clone()
    }

    pub fn released(&self) -> Vec<u64> {
        self.released.lock().unwrap().clone()
    }

    pub fn renewals(&self) -> Vec<u64> {
        self.renewals.lock().unwrap().clone()
    }

    pub fn enqueued(&self) -> Vec<(Vec<u8>, Duration)> {
        self.enqueued.lock().unwrap().clone()
    }

    pub fn lose_lease(&self, tag: u64) {
        self.lost.lock().unwrap().insert(tag);
    }
}

#[async_trait]
impl MessageSink for FakeQueue {
    async fn enqueue(&self, payload: Vec<u8>, visibility_delay: Duration) -> Result<(), QueueError> {
        if self.fail_enqueue.load(Ordering::SeqCst) {
            return Err(QueueError::Publish("broker unavailable".into()));
        }
        self.enqueued.lock().unwrap().push((payload, visibility_delay));
        Ok(())
    }
}

#[async_trait]
impl MessageQueue for FakeQueue {
    async fn receive(
        &self,
        max_count: usize,
        _timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        if self.fail_receive.load(Ordering::SeqCst) {
            return Err(QueueError::Receive("connection reset".into()));
        }
        let mut pending = self.pending.lock().unwrap();
        let n = max_count.min(pending.len());
        Ok(pending.drain(..n).collect())
    }

    async fn renew_lease(&self, message: &mut ReceivedMessage) -> Result<(), QueueError> {
        if self.lost.lock().unwrap().contains(&message.delivery_tag) {
            return Err(QueueError::LeaseLost {
                delivery_tag: message.delivery_tag,
            });
        }
        message.locked_until = Utc::now() + chrono::Duration::from_std(LEASE).unwrap();
        self.renewals.lock().unwrap().push(message.delivery_tag);
        Ok(())
    }

    async fn acknowledge(&self, message: &ReceivedMessage) -> Result<(), QueueError> {
        let now = self.in_flight_acks.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight_acks.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight_acks.fetch_sub(1, Ordering::SeqCst);

        self.acked.lock().unwrap().push(message.delivery_tag);
        Ok(())
    }

    async fn release(&self, message: &ReceivedMessage) -> Result<(), QueueError> {
        self.released.lock().unwrap().push(message.delivery_tag);
        Ok(())
    }
}

// ── Storage ────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeStorage {
    /// `(container, path) -> content`
    pub written: Mutex<HashMap<(String, String), String>>,
    /// `(source container, source name, target container, target name)`
    pub moved: Mutex<Vec<(String, String, String, String)>>,
    pub fail: AtomicBool,
}

impl FakeStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn written(&self, container: &str, path: &str) -> Option<String> {
        self.written
            .lock()
            .unwrap()
            .get(&(container.to_owned(), path.to_owned()))
            .cloned()
    }

    pub fn moved(&self) -> Vec<(String, String, String, String)> {
        self.moved.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::Config("storage unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn shareable_read_link(&self, url: &Url) -> Result<Url, StorageError> {
        self.check()?;
        let mut signed = url.clone();
        signed.set_query(Some("sig=test"));
        Ok(signed)
    }

    async fn write_text(
        &self,
        content: &str,
        container: &str,
        path: &str,
    ) -> Result<(), StorageError> {
        self.check()?;
        self.written
            .lock()
            .unwrap()
            .insert((container.to_owned(), path.to_owned()), content.to_owned());
        Ok(())
    }

    async fn move_file(
        &self,
        source_container: &str,
        source_name: &str,
        target_container: &str,
        target_name: &str,
    ) -> Result<(), StorageError> {
        self.check()?;
        self.moved.lock().unwrap().push((
            source_container.to_owned(),
            source_name.to_owned(),
            target_container.to_owned(),
            target_name.to_owned(),
        ));
        Ok(())
    }
}

// ── Transcription service ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeService {
    /// HTTP statuses to fail the next submissions with, in order. Once empty,
    /// submissions succeed.
    pub failures: Mutex<VecDeque<u16>>,
    pub submitted: Mutex<Vec<TranscriptionDefinition>>,
    /// Simulated service latency per submission.
    pub latency: Mutex<Option<Duration>>,
    /// When each submission call started.
    pub calls: Mutex<Vec<tokio::time::Instant>>,
}

impl FakeService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next(&self, status: u16) {
        self.failures.lock().unwrap().push_back(status);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    pub fn submitted(&self) -> Vec<TranscriptionDefinition> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<tokio::time::Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscriptionService for FakeService {
    async fn submit(&self, definition: &TranscriptionDefinition) -> Result<Url, SubmitError> {
        self.calls.lock().unwrap().push(tokio::time::Instant::now());
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let failure = self.failures.lock().unwrap().pop_front();
        if let Some(status) = failure {
            return Err(SubmitError::Status {
                status,
                message: format!("status {status}"),
            });
        }

        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(definition.clone());
        Ok(Url::parse(&format!(
            "https://speech.example/speechtotext/v3.0/transcriptions/{}",
            submitted.len()
        ))
        .unwrap())
    }
}

// ── Harness ────────────────────────────────────────────────────────────────────

pub fn settings() -> ControllerSettings {
    ControllerSettings::new(
        INPUT,
        ERROR_REPORT,
        ERROR_FILES,
        BackoffPolicy::new(Duration::from_secs(120), Duration::from_secs(180 * 60), 4),
    )
}

pub struct Harness {
    pub input: Arc<FakeQueue>,
    pub output: Arc<FakeQueue>,
    pub storage: Arc<FakeStorage>,
    pub service: Arc<FakeService>,
    pub controller: BatchController,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(settings())
    }

    pub fn with_settings(settings: ControllerSettings) -> Self {
        let input = FakeQueue::new();
        let output = FakeQueue::new();
        let storage = FakeStorage::new();
        let service = FakeService::new();

        let controller = BatchController::new(
            input.clone(),
            output.clone(),
            storage.clone(),
            service.clone(),
            settings,
        );

        Self {
            input,
            output,
            storage,
            service,
            controller,
        }
    }
}
