use super::{BatchController, BatchFailure, CycleReport};
use crate::backoff::RetryDecision;
use crate::batch::{BatchJob, BatchMember};
use crate::storage::{self, StorageError};
use crate::transcription::FailureKind;

impl BatchController {
    /// Settle every member of a batch whose submission failed.
    ///
    /// A member is acknowledged only after its re-queue or dead-letter step
    /// has completed; otherwise it stays on the queue for redelivery.
    pub(super) async fn route_failure(
        &self,
        batch: &BatchJob,
        failure: &BatchFailure,
        report: &mut CycleReport,
    ) {
        tracing::error!(job = %batch.name, kind = ?failure.kind, "{}", failure.message);

        if failure.kind == FailureKind::Permanent {
            let path = format!("jobs/{}.txt", batch.name);
            if let Err(e) = self
                .storage
                .write_text(&failure.message, &self.settings.error_report_container, &path)
                .await
            {
                tracing::error!(job = %batch.name, error = %e, "could not write job error report");
            }

            for member in &batch.members {
                self.dead_letter(member, &failure.message, report).await;
            }
            return;
        }

        for member in &batch.members {
            let retry_count = member.message.retry_count;
            match self
                .settings
                .backoff
                .decide(retry_count, failure.kind.is_throttled())
            {
                RetryDecision::Retry { delay, .. } => self.requeue(member, delay, report).await,
                RetryDecision::DeadLetter => {
                    tracing::error!(
                        url = %member.message.data.url,
                        retry_count,
                        "exceeded retry count for transcription"
                    );
                    self.dead_letter(member, &failure.message, report).await;
                }
            }
        }
    }

    async fn requeue(
        &self,
        member: &BatchMember,
        delay: std::time::Duration,
        report: &mut CycleReport,
    ) {
        let retry = member.message.next_attempt();

        let result = match retry.encode() {
            Ok(payload) => self.input.enqueue(payload, delay).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        if let Err(e) = result {
            tracing::error!(
                delivery_tag = member.delivery.delivery_tag,
                error = %e,
                "could not re-queue notification, leaving it for redelivery"
            );
            report.deferred += 1;
            self.release(&member.delivery).await;
            return;
        }

        tracing::info!(
            url = %member.message.data.url,
            retry_count = retry.retry_count,
            delay_secs = delay.as_secs(),
            "🔁 notification re-queued"
        );
        report.retried += 1;
        self.acknowledge_settled(member, report).await;
    }

    /// Write the per-file error record, move the audio file out of the input
    /// container, then acknowledge. Both storage steps overwrite, so replaying
    /// them after a redelivery is harmless.
    async fn dead_letter(&self, member: &BatchMember, error: &str, report: &mut CycleReport) {
        if let Err(e) = self.archive_failed_file(member, error).await {
            tracing::error!(
                url = %member.message.data.url,
                error = %e,
                "storage error while dead-lettering, leaving notification for redelivery"
            );
            report.deferred += 1;
            self.release(&member.delivery).await;
            return;
        }

        report.dead_lettered += 1;
        self.acknowledge_settled(member, report).await;
    }

    async fn archive_failed_file(
        &self,
        member: &BatchMember,
        error: &str,
    ) -> Result<(), StorageError> {
        let file_name = storage::file_name(&member.message.data.url)?;
        let settings = &self.settings;

        self.storage
            .write_text(error, &settings.error_report_container, &format!("{file_name}.txt"))
            .await?;
        self.storage
            .move_file(
                &settings.input_container,
                &file_name,
                &settings.error_files_container,
                &file_name,
            )
            .await?;

        tracing::warn!(file = %file_name, "☠️ audio file moved to error container");
        Ok(())
    }

    async fn acknowledge_settled(&self, member: &BatchMember, report: &mut CycleReport) {
        match self.input.acknowledge(&member.delivery).await {
            Ok(()) => report.acknowledged += 1,
            Err(e) => {
                tracing::warn!(
                    delivery_tag = member.delivery.delivery_tag,
                    error = %e,
                    "acknowledge after routing failed"
                );
                report.deferred += 1;
            }
        }
    }
}
