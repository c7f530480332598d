use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use super::{BatchController, CycleReport};
use crate::batch::{partition, BatchJob, BatchMember, InvocationStamp};
use crate::messaging::QueueError;

impl BatchController {
    /// One bounded drain-and-submit cycle.
    ///
    /// Only a failed receive is returned as an error. Everything after that
    /// is settled per message or per batch and shows up in the report.
    pub async fn run_once(&self, invoked_at: DateTime<Utc>) -> Result<CycleReport, QueueError> {
        let mut report = CycleReport::default();

        let received = self
            .input
            .receive(
                self.settings.messages_per_invocation,
                self.settings.receive_timeout,
            )
            .await?;

        report.received = received.len();
        if received.is_empty() {
            tracing::debug!("no notifications waiting");
            return Ok(report);
        }

        tracing::info!(count = received.len(), "📥 received notifications");

        let valid = self.validate(received, &mut report).await;
        if valid.is_empty() {
            tracing::info!("no valid notifications in this cycle");
            return Ok(report);
        }

        let stamp = InvocationStamp::new(invoked_at);
        let mut pending: VecDeque<BatchJob> =
            partition(valid, self.settings.files_per_job, &stamp).into();

        tracing::info!(
            batches = pending.len(),
            files_per_job = self.settings.files_per_job,
            invocation = %stamp,
            "partitioned notifications"
        );

        let mut seen = HashSet::new();
        let mut last_renewal = Instant::now();

        while let Some(batch) = pending.pop_front() {
            self.process_batch(batch, &mut seen, &mut report).await;

            if last_renewal.elapsed() > self.settings.renew_interval {
                self.renew_pending(&mut pending, &mut report).await;
                last_renewal = Instant::now();
            }

            if !pending.is_empty() {
                tokio::time::sleep(self.settings.inter_batch_delay).await;
            }
        }

        Ok(report)
    }

    /// Filter received deliveries down to the ones worth submitting, renewing
    /// the lease of each one kept.
    async fn validate(
        &self,
        received: Vec<crate::messaging::ReceivedMessage>,
        report: &mut CycleReport,
    ) -> Vec<BatchMember> {
        let mut valid = Vec::with_capacity(received.len());

        for mut delivery in received {
            if delivery.lease_remaining(Utc::now()) <= self.settings.lease_safety_margin {
                tracing::warn!(
                    delivery_tag = delivery.delivery_tag,
                    locked_until = %delivery.locked_until,
                    "lease about to expire, leaving notification for redelivery"
                );
                report.skipped += 1;
                self.release(&delivery).await;
                continue;
            }

            let message = match self.accept(&delivery.body) {
                Ok(message) => message,
                Err(rejection) => {
                    self.drop_invalid(&delivery, &rejection, report).await;
                    continue;
                }
            };

            if let Err(e) = self.input.renew_lease(&mut delivery).await {
                tracing::warn!(
                    delivery_tag = delivery.delivery_tag,
                    url = %message.data.url,
                    error = %e,
                    "could not renew lease, skipping notification"
                );
                report.lease_lost += 1;
                self.release(&delivery).await;
                continue;
            }

            valid.push(BatchMember { delivery, message });
        }

        valid
    }

    /// Renew every member of the batches still waiting. Members whose lease
    /// is lost are removed so they cannot be submitted without ownership.
    async fn renew_pending(&self, pending: &mut VecDeque<BatchJob>, report: &mut CycleReport) {
        tracing::info!(
            batches = pending.len(),
            "renewing leases of pending notifications"
        );

        for batch in pending.iter_mut() {
            let members = std::mem::take(&mut batch.members);
            for mut member in members {
                match self.input.renew_lease(&mut member.delivery).await {
                    Ok(()) => batch.members.push(member),
                    Err(e) => {
                        tracing::warn!(
                            job = %batch.name,
                            delivery_tag = member.delivery.delivery_tag,
                            error = %e,
                            "lease lost before submission"
                        );
                        report.lease_lost += 1;
                        self.release(&member.delivery).await;
                    }
                }
            }
        }

        pending.retain(|batch| !batch.is_empty());
    }
}
