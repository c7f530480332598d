mod drain;
mod router;
mod submit;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use uuid::Uuid;

use crate::backoff::BackoffPolicy;
use crate::batch::{BatchJob, BatchMember};
use crate::config::Config;
use crate::messaging::{MessageQueue, MessageSink, ReceivedMessage};
use crate::model::{CodecError, FileArrivalMessage};
use crate::storage::{self, ObjectStorage};
use crate::transcription::{
    parse_model_id, ProfanityFilterMode, PunctuationMode, TranscriptionProperties,
    TranscriptionService,
};

pub use submit::BatchFailure;

// ── Timing constants ───────────────────────────────────────────────────────────

/// How long a cycle waits for the first message before giving up.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(60);
/// Deliveries with less lease than this left are not worth starting.
pub const LEASE_SAFETY_MARGIN: Duration = Duration::from_secs(5);
/// Leases of not-yet-submitted messages are renewed once this much time has
/// passed since the last renewal.
pub const RENEW_INTERVAL: Duration = Duration::from_secs(120);
/// Pause between two job submissions.
pub const INTER_BATCH_DELAY: Duration = Duration::from_millis(500);
/// Acknowledgments issued concurrently per sub-group.
pub const ACK_GROUP_SIZE: usize = 10;

// ── Settings ───────────────────────────────────────────────────────────────────

/// Everything the controller needs from configuration, already validated.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub input_container: String,
    pub error_report_container: String,
    pub error_files_container: String,

    pub messages_per_invocation: usize,
    pub files_per_job: usize,
    pub backoff: BackoffPolicy,

    pub locale: String,
    pub properties: TranscriptionProperties,
    pub custom_model: Option<Uuid>,
    /// Submit raw blob URLs; the service has its own read access.
    pub server_side_access: bool,

    pub receive_timeout: Duration,
    pub lease_safety_margin: Duration,
    pub renew_interval: Duration,
    pub inter_batch_delay: Duration,
    pub ack_group_size: usize,
}

impl ControllerSettings {
    /// Settings with the default batching, locale and recognition options.
    pub fn new(
        input_container: impl Into<String>,
        error_report_container: impl Into<String>,
        error_files_container: impl Into<String>,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            input_container: input_container.into(),
            error_report_container: error_report_container.into(),
            error_files_container: error_files_container.into(),
            messages_per_invocation: crate::config::DEFAULT_MESSAGES_PER_INVOCATION,
            files_per_job: crate::config::DEFAULT_FILES_PER_TRANSCRIPTION_JOB,
            backoff,
            locale: "en-US".to_owned(),
            properties: TranscriptionProperties {
                profanity_filter_mode: ProfanityFilterMode::Masked,
                punctuation_mode: PunctuationMode::DictatedAndAutomatic,
                diarization_enabled: false,
                word_level_timestamps_enabled: false,
            },
            custom_model: None,
            server_side_access: false,
            receive_timeout: RECEIVE_TIMEOUT,
            lease_safety_margin: LEASE_SAFETY_MARGIN,
            renew_interval: RENEW_INTERVAL,
            inter_batch_delay: INTER_BATCH_DELAY,
            ack_group_size: ACK_GROUP_SIZE,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        let custom_model = parse_model_id(cfg.custom_model_id.as_deref());
        if cfg.custom_model_id.is_some() && custom_model.is_none() {
            tracing::warn!(
                value = cfg.custom_model_id.as_deref().unwrap_or_default(),
                "CUSTOM_MODEL_ID is not a UUID; using the base model"
            );
        }

        Self {
            messages_per_invocation: cfg.messages_per_invocation,
            files_per_job: cfg.files_per_job,
            locale: cfg.locale.clone(),
            properties: cfg.properties,
            custom_model,
            server_side_access: cfg.byos_enabled,
            ..Self::new(
                cfg.audio_input_container.clone(),
                cfg.error_report_container.clone(),
                cfg.error_files_container.clone(),
                BackoffPolicy::new(
                    cfg.initial_polling_delay,
                    cfg.max_polling_delay,
                    cfg.retry_limit,
                ),
            )
        }
    }
}

// ── Report ─────────────────────────────────────────────────────────────────────

/// What one invocation did with the messages it received.
///
/// `retried` and `dead_lettered` count routing outcomes; the acknowledgments
/// that follow them are included in `acknowledged`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub received: usize,
    /// Malformed or foreign notifications, acknowledged without processing.
    pub dropped: usize,
    /// Lease too close to expiry to start work on.
    pub skipped: usize,
    /// Lease could not be renewed; the queue will redeliver.
    pub lease_lost: usize,
    /// Repeats of a file already taken this cycle, acknowledged without a job.
    pub duplicates: usize,
    pub jobs_submitted: usize,
    /// Messages removed from the queue as part of a batch outcome.
    pub acknowledged: usize,
    pub retried: usize,
    pub dead_lettered: usize,
    /// Left unacknowledged after a routing or acknowledgment error.
    pub deferred: usize,
}

impl CycleReport {
    pub fn log(&self) {
        tracing::info!(
            received       = self.received,
            dropped        = self.dropped,
            skipped        = self.skipped,
            lease_lost     = self.lease_lost,
            duplicates     = self.duplicates,
            jobs_submitted = self.jobs_submitted,
            acknowledged   = self.acknowledged,
            retried        = self.retried,
            dead_lettered  = self.dead_lettered,
            deferred       = self.deferred,
            "cycle finished"
        );
    }
}

// ── Controller ─────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
enum Rejection {
    #[error(transparent)]
    Malformed(#[from] CodecError),
    #[error("event type '{0}' is not a blob creation")]
    NotBlobCreated(String),
    #[error("container {0:?} is not the input container")]
    ForeignContainer(Option<String>),
}

/// Drains the input queue and turns file-arrival notifications into batch
/// transcription jobs.
///
/// Holds no state between invocations; all coordination with other instances
/// goes through the queue's leases.
pub struct BatchController {
    input: Arc<dyn MessageQueue>,
    output: Arc<dyn MessageSink>,
    storage: Arc<dyn ObjectStorage>,
    service: Arc<dyn TranscriptionService>,
    settings: ControllerSettings,
}

impl BatchController {
    pub fn new(
        input: Arc<dyn MessageQueue>,
        output: Arc<dyn MessageSink>,
        storage: Arc<dyn ObjectStorage>,
        service: Arc<dyn TranscriptionService>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            input,
            output,
            storage,
            service,
            settings,
        }
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Submit one notification as a job of its own, named after the audio
    /// file. Invalid notifications are acknowledged and dropped.
    pub async fn start_single(&self, delivery: ReceivedMessage) -> CycleReport {
        let mut report = CycleReport {
            received: 1,
            ..CycleReport::default()
        };

        let message = match self.accept(&delivery.body) {
            Ok(message) => message,
            Err(rejection) => {
                self.drop_invalid(&delivery, &rejection, &mut report).await;
                return report;
            }
        };

        let name = match storage::file_name(&message.data.url) {
            Ok(name) => name,
            Err(e) => {
                self.drop_invalid(&delivery, &e, &mut report).await;
                return report;
            }
        };

        let batch = BatchJob {
            name,
            members: vec![BatchMember { delivery, message }],
        };
        self.process_batch(batch, &mut HashSet::new(), &mut report).await;
        report
    }

    /// Decode `body` and check it is a blob creation in the input container.
    fn accept(&self, body: &[u8]) -> Result<FileArrivalMessage, Rejection> {
        let message = FileArrivalMessage::decode(body)?;

        if !message.is_blob_created() {
            return Err(Rejection::NotBlobCreated(message.event_type));
        }

        let container = storage::container_name(&message.data.url);
        if container.as_deref() != Some(self.settings.input_container.as_str()) {
            return Err(Rejection::ForeignContainer(container));
        }

        Ok(message)
    }

    async fn drop_invalid(
        &self,
        delivery: &ReceivedMessage,
        reason: &(dyn std::fmt::Display + Sync),
        report: &mut CycleReport,
    ) {
        tracing::warn!(
            delivery_tag = delivery.delivery_tag,
            "dropping invalid notification: {reason}"
        );

        match self.input.acknowledge(delivery).await {
            Ok(()) => report.dropped += 1,
            Err(e) => {
                tracing::warn!(delivery_tag = delivery.delivery_tag, error = %e, "could not acknowledge invalid notification");
                report.deferred += 1;
            }
        }
    }

    /// Submit one batch and settle every member: acknowledge on success,
    /// route on failure.
    ///
    /// Files already in `seen` are acknowledged up front and never reach the
    /// job or the failure routing.
    async fn process_batch(
        &self,
        batch: BatchJob,
        seen: &mut HashSet<String>,
        report: &mut CycleReport,
    ) {
        let BatchJob { name, members } = batch;
        let (fresh, repeats): (Vec<_>, Vec<_>) = members
            .into_iter()
            .partition(|member| seen.insert(member.message.absolute_url()));

        if !repeats.is_empty() {
            for member in &repeats {
                tracing::warn!(job = %name, url = %member.message.data.url, "received the same audio file twice, skipping");
            }
            report.duplicates += repeats.len();
            self.acknowledge_all(&repeats, report).await;
        }

        if fresh.is_empty() {
            tracing::info!(job = %name, "every file in batch was a duplicate, nothing to submit");
            return;
        }

        let batch = BatchJob {
            name,
            members: fresh,
        };
        match self.submit(&batch).await {
            Ok(()) => {
                report.jobs_submitted += 1;
                self.acknowledge_all(&batch.members, report).await;
            }
            Err(failure) => self.route_failure(&batch, &failure, report).await,
        }
    }

    /// Hand `delivery` back to the queue unsettled so another attempt can
    /// pick it up without waiting for a lease to run out.
    async fn release(&self, delivery: &ReceivedMessage) {
        if let Err(e) = self.input.release(delivery).await {
            tracing::debug!(
                delivery_tag = delivery.delivery_tag,
                error = %e,
                "could not release notification; it returns when its lease ends"
            );
        }
    }

    /// Acknowledge `members` in sequential sub-groups of concurrent acks.
    async fn acknowledge_all(&self, members: &[BatchMember], report: &mut CycleReport) {
        for group in members.chunks(self.settings.ack_group_size.max(1)) {
            let results = join_all(
                group
                    .iter()
                    .map(|member| self.input.acknowledge(&member.delivery)),
            )
            .await;

            for (member, result) in group.iter().zip(results) {
                match result {
                    Ok(()) => report.acknowledged += 1,
                    Err(e) => {
                        tracing::warn!(
                            delivery_tag = member.delivery.delivery_tag,
                            error = %e,
                            "acknowledge failed; message will be redelivered"
                        );
                        report.deferred += 1;
                    }
                }
            }
        }
    }
}
