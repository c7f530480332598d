use std::fmt;

use chrono::{DateTime, Utc};

use crate::messaging::ReceivedMessage;
use crate::model::FileArrivalMessage;

/// Identifies one drain cycle. Job names are `{stamp}_{batch_index}`.
///
/// The second-granularity UTC timestamp is followed by a random suffix so two
/// cycles started within the same second still produce distinct job names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationStamp(String);

impl InvocationStamp {
    pub fn new(invoked_at: DateTime<Utc>) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self::with_suffix(invoked_at, &suffix[..8])
    }

    pub fn with_suffix(invoked_at: DateTime<Utc>, suffix: &str) -> Self {
        Self(format!("{}-{suffix}", invoked_at.format("%Y-%m-%dT%H:%M:%S")))
    }

    pub fn job_name(&self, batch_index: usize) -> String {
        format!("{}_{batch_index}", self.0)
    }
}

impl fmt::Display for InvocationStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated notification together with the delivery that carried it.
#[derive(Debug, Clone)]
pub struct BatchMember {
    pub delivery: ReceivedMessage,
    pub message: FileArrivalMessage,
}

/// Notifications submitted together as one transcription job.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub name: String,
    pub members: Vec<BatchMember>,
}

impl BatchJob {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Split `members` into consecutive batches of at most `files_per_job`,
/// keeping arrival order within and across batches.
pub fn partition(
    members: Vec<BatchMember>,
    files_per_job: usize,
    stamp: &InvocationStamp,
) -> Vec<BatchJob> {
    let size = files_per_job.max(1);
    let mut batches = Vec::with_capacity(members.len().div_ceil(size));
    let mut members = members.into_iter().peekable();

    while members.peek().is_some() {
        let chunk: Vec<BatchMember> = members.by_ref().take(size).collect();
        batches.push(BatchJob {
            name: stamp.job_name(batches.len()),
            members: chunk,
        });
    }

    batches
}
