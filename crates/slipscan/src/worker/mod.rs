pub mod job;
pub mod pool;

pub use job::{Job, JobHandle, JobKind, JobOutput, JobResult};
pub use pool::WorkerPool;
