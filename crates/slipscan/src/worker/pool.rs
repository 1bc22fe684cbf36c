use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, error, info};

use crate::error::WorkerError;
use crate::pipeline::{PipelineCoordinator, PipelineError};
use crate::worker::job::{Job, JobHandle, JobKind, JobOutput, JobResult};

/// File ids a worker is currently running, each with the jobs for the same id
/// that arrived meanwhile. Those jobs run on the owning worker after the
/// current one, so no worker ever sits waiting on another's file.
#[derive(Default)]
struct Dispatch {
    active: Mutex<HashMap<String, VecDeque<Job>>>,
}

impl Dispatch {
    /// Claims `job.file_id` for the calling worker. Returns the job back if
    /// the id was free, or `None` if it was deferred behind the owner.
    fn claim(&self, job: Job) -> Option<Job> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match active.get_mut(&job.file_id) {
            Some(waiting) => {
                debug!("Deferring job {} behind running {}", job.id, job.file_id);
                waiting.push_back(job);
                None
            }
            None => {
                active.insert(job.file_id.clone(), VecDeque::new());
                Some(job)
            }
        }
    }

    /// Next deferred job for `file_id`, releasing the id when none is left.
    fn next(&self, file_id: &str) -> Option<Job> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        let job = active.get_mut(file_id).and_then(VecDeque::pop_front);
        if job.is_none() {
            active.remove(file_id);
        }
        job
    }

    fn deferred(&self) -> usize {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(VecDeque::len)
            .sum()
    }
}

/// Fixed set of OS threads running blocking pipeline work off the caller's
/// thread, fed through a bounded queue.
pub struct WorkerPool {
    job_sender: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    dispatch: Arc<Dispatch>,
    capacity: usize,
}

impl WorkerPool {
    pub fn new(
        coordinator: Arc<PipelineCoordinator>,
        worker_count: usize,
        queue_depth: usize,
    ) -> Result<Self, WorkerError> {
        if worker_count == 0 || queue_depth == 0 {
            return Err(WorkerError::SpawnFailed(
                "worker_count and queue_depth must be > 0".to_string(),
            ));
        }

        let (job_sender, job_receiver) = bounded::<Job>(queue_depth);
        let shutdown = Arc::new(AtomicBool::new(false));
        let dispatch = Arc::new(Dispatch::default());

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_dispatch = Arc::clone(&dispatch);
            let worker_coordinator = Arc::clone(&coordinator);

            let handle = thread::Builder::new()
                .name(format!("slipscan-worker-{}", worker_id))
                .spawn(move || {
                    run_worker(
                        worker_id,
                        job_rx,
                        shutdown_flag,
                        worker_dispatch,
                        worker_coordinator,
                    );
                })
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

            workers.push(handle);
        }

        info!(
            "Started {} workers (queue depth {})",
            worker_count, queue_depth
        );

        Ok(Self {
            job_sender,
            workers,
            shutdown,
            dispatch,
            capacity: queue_depth,
        })
    }

    /// Queues a job. Fails immediately instead of blocking when the queue,
    /// counting jobs deferred behind a busy file, is full.
    pub fn submit(&self, file_id: &str, kind: JobKind) -> Result<JobHandle, WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }
        if self.dispatch.deferred() >= self.capacity {
            return Err(WorkerError::QueueFull {
                capacity: self.capacity,
            });
        }

        let (job, handle) = Job::new(file_id, kind);
        match self.job_sender.try_send(job) {
            Ok(()) => Ok(handle),
            Err(TrySendError::Full(_)) => Err(WorkerError::QueueFull {
                capacity: self.capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(WorkerError::ChannelClosed),
        }
    }

    /// Submits and awaits the job.
    pub async fn run(&self, file_id: &str, kind: JobKind) -> JobResult {
        self.submit(file_id, kind)?.wait().await
    }

    /// Jobs waiting for a worker, including those deferred behind a busy file.
    pub fn queued(&self) -> usize {
        self.job_sender.len() + self.dispatch.deferred()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn wait(self) {
        // Drop sender to signal workers to exit
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<Job>,
    shutdown: Arc<AtomicBool>,
    dispatch: Arc<Dispatch>,
    coordinator: Arc<PipelineCoordinator>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(job) => {
                let Some(job) = dispatch.claim(job) else {
                    continue;
                };
                let file_id = job.file_id.clone();
                let mut next = Some(job);
                while let Some(job) = next {
                    run_job(worker_id, &coordinator, job);
                    next = dispatch.next(&file_id);
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

fn run_job(worker_id: usize, coordinator: &PipelineCoordinator, job: Job) {
    let Job {
        id,
        file_id,
        kind,
        reply,
    } = job;
    debug!("Worker {} running {:?} for {}", worker_id, kind, file_id);

    let result = panic::catch_unwind(AssertUnwindSafe(|| execute(coordinator, &file_id, kind)))
        .unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            error!("Worker {} panicked on job {}: {}", worker_id, id, message);
            Err(PipelineError::Internal(format!("job panicked: {}", message)))
        });

    if reply.send(result).is_err() {
        debug!("Worker {}: caller for job {} went away", worker_id, id);
    }
}

fn execute(coordinator: &PipelineCoordinator, file_id: &str, kind: JobKind) -> JobResult {
    match kind {
        JobKind::Validate => coordinator.validate(file_id).map(JobOutput::Validated),
        JobKind::Process => coordinator.process(file_id).map(JobOutput::Processed),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::error::ProcessError;
    use crate::processor::{Rasterizer, ScratchImage, TextExtractor};
    use crate::storage::FileStorage;
    use std::path::Path;
    use tempfile::TempDir;

    struct NoRasterizer;

    impl Rasterizer for NoRasterizer {
        fn rasterize_first_page(&self, _source: &Path) -> Result<ScratchImage, ProcessError> {
            Err(ProcessError::Rasterization("not available".to_string()))
        }
    }

    struct NoExtractor;

    impl TextExtractor for NoExtractor {
        fn extract_text(&self, _image: ScratchImage) -> Result<String, ProcessError> {
            Err(ProcessError::Extraction("not available".to_string()))
        }
    }

    fn test_coordinator(temp: &TempDir) -> Arc<PipelineCoordinator> {
        Arc::new(PipelineCoordinator::new(
            Database::open_in_memory().unwrap(),
            FileStorage::new(temp.path()),
            Box::new(NoRasterizer),
            Box::new(NoExtractor),
        ))
    }

    #[test]
    fn test_worker_pool_creation() {
        let temp = TempDir::new().unwrap();
        let pool = WorkerPool::new(test_coordinator(&temp), 2, 4).unwrap();

        assert!(!pool.is_shutdown());
        assert_eq!(pool.queued(), 0);
        pool.shutdown();
        assert!(pool.is_shutdown());
        pool.wait();
    }

    #[test]
    fn test_zero_workers_rejected() {
        let temp = TempDir::new().unwrap();
        let result = WorkerPool::new(test_coordinator(&temp), 0, 4);
        assert!(matches!(result, Err(WorkerError::SpawnFailed(_))));
    }

    #[test]
    fn test_job_result_is_delivered() {
        let temp = TempDir::new().unwrap();
        let pool = WorkerPool::new(test_coordinator(&temp), 1, 4).unwrap();

        let handle = pool.submit("missing", JobKind::Validate).unwrap();
        match handle.blocking_wait() {
            Err(PipelineError::NotFound(id)) => assert_eq!(id, "missing"),
            other => panic!("Expected NotFound, got {:?}", other),
        }

        pool.wait();
    }

    #[test]
    fn test_submit_after_shutdown() {
        let temp = TempDir::new().unwrap();
        let pool = WorkerPool::new(test_coordinator(&temp), 1, 4).unwrap();
        pool.shutdown();

        let result = pool.submit("f1", JobKind::Process);
        assert!(matches!(result, Err(WorkerError::ChannelClosed)));
        pool.wait();
    }

    #[test]
    fn test_dispatch_defers_jobs_for_busy_file() {
        let dispatch = Dispatch::default();
        let (first, _h1) = Job::new("f1", JobKind::Process);
        let (second, _h2) = Job::new("f1", JobKind::Process);
        let (other, _h3) = Job::new("f2", JobKind::Validate);
        let second_id = second.id.clone();

        assert!(dispatch.claim(first).is_some());
        assert!(dispatch.claim(second).is_none());
        assert!(dispatch.claim(other).is_some());
        assert_eq!(dispatch.deferred(), 1);

        assert_eq!(dispatch.next("f1").map(|j| j.id), Some(second_id));
        assert!(dispatch.next("f1").is_none());
        assert!(dispatch.next("f2").is_none());
        assert_eq!(dispatch.deferred(), 0);

        let (again, _h4) = Job::new("f1", JobKind::Validate);
        assert!(dispatch.claim(again).is_some());
    }

    #[test]
    fn test_panic_message_variants() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(s.as_ref()), "static");
        let s: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(s.as_ref()), "owned");
        let s: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(s.as_ref()), "unknown panic");
    }
}
