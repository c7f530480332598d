use url::Url;

use super::BatchController;
use crate::batch::BatchJob;
use crate::model::{AudioFileInfo, JobStartedMessage};
use crate::storage;
use crate::transcription::{FailureKind, TranscriptionDefinition, JOB_DESCRIPTION};

/// A batch that could not be handed to the transcription service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct BatchFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl BatchFailure {
    fn new(kind: FailureKind, job: &str, cause: impl std::fmt::Display) -> Self {
        Self {
            kind,
            message: format!("Exception in job {job}: {cause}"),
        }
    }
}

impl BatchController {
    /// Submit `batch` and publish the job-started hand-off.
    pub(super) async fn submit(&self, batch: &BatchJob) -> Result<(), BatchFailure> {
        let mut content_urls = Vec::with_capacity(batch.len());
        let mut files = Vec::with_capacity(batch.len());

        for member in &batch.members {
            let file_name = storage::file_name(&member.message.data.url)
                .map_err(|e| BatchFailure::new(FailureKind::Permanent, &batch.name, e))?;

            let content_url = if self.settings.server_side_access {
                let mut raw = member.message.data.url.clone();
                raw.set_fragment(None);
                raw
            } else {
                self.storage
                    .shareable_read_link(&member.message.data.url)
                    .await
                    .map_err(|e| BatchFailure::new(FailureKind::Permanent, &batch.name, e))?
            };

            content_urls.push(content_url);
            files.push(AudioFileInfo::new(
                member.message.absolute_url(),
                member.message.retry_count,
                file_name,
            ));
        }

        let definition = TranscriptionDefinition {
            display_name: batch.name.clone(),
            description: JOB_DESCRIPTION.to_owned(),
            locale: self.settings.locale.clone(),
            content_urls,
            properties: self.settings.properties,
            model: self.settings.custom_model,
        };

        let location: Url = self
            .service
            .submit(&definition)
            .await
            .map_err(|e| BatchFailure::new(e.kind(), &batch.name, e))?;

        tracing::info!(job = %batch.name, files = files.len(), location = %location, "🚀 transcription job created");

        let started = JobStartedMessage::new(
            location.to_string(),
            batch.name.clone(),
            self.settings.locale.clone(),
            self.settings.custom_model.is_some(),
            files,
        );
        let payload = started
            .encode()
            .map_err(|e| BatchFailure::new(FailureKind::Permanent, &batch.name, e))?;

        let first_poll = self.settings.backoff.delay(0);
        self.output
            .enqueue(payload, first_poll)
            .await
            .map_err(|e| BatchFailure::new(FailureKind::Transient, &batch.name, e))?;

        tracing::info!(
            job = %batch.name,
            delay_secs = first_poll.as_secs(),
            "fetch queue informed about job"
        );
        Ok(())
    }
}
