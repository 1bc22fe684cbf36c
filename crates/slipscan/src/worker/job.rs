use tokio::sync::oneshot;

use crate::error::WorkerError;
use crate::pipeline::{PipelineError, ProcessOutcome};
use crate::processor::Verdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Validate,
    Process,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutput {
    Validated(Verdict),
    Processed(ProcessOutcome),
}

pub type JobResult = Result<JobOutput, PipelineError>;

/// A unit of work for the pool, carrying its own reply channel.
#[derive(Debug)]
pub struct Job {
    pub id: String,
    pub file_id: String,
    pub kind: JobKind,
    pub(crate) reply: oneshot::Sender<JobResult>,
}

impl Job {
    pub fn new(file_id: impl Into<String>, kind: JobKind) -> (Self, JobHandle) {
        let id = uuid::Uuid::new_v4().to_string();
        let (reply, receiver) = oneshot::channel();

        let job = Self {
            id: id.clone(),
            file_id: file_id.into(),
            kind,
            reply,
        };
        (job, JobHandle { id, receiver })
    }
}

/// The caller's side of a submitted job.
#[derive(Debug)]
pub struct JobHandle {
    pub id: String,
    receiver: oneshot::Receiver<JobResult>,
}

impl JobHandle {
    /// Waits for the result without blocking the async runtime.
    pub async fn wait(self) -> JobResult {
        let id = self.id;
        self.receiver
            .await
            .unwrap_or_else(|_| Err(WorkerError::WorkerLost(id).into()))
    }

    /// Waits for the result from a plain thread.
    pub fn blocking_wait(self) -> JobResult {
        let id = self.id;
        self.receiver
            .blocking_recv()
            .unwrap_or_else(|_| Err(WorkerError::WorkerLost(id).into()))
    }
}
