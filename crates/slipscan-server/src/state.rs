use std::sync::Arc;

use slipscan::{PipelineCoordinator, WorkerPool};

/// Shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<PipelineCoordinator>,
    pub pool: Arc<WorkerPool>,
}

impl AppState {
    pub fn new(coordinator: Arc<PipelineCoordinator>, pool: Arc<WorkerPool>) -> Self {
        Self { coordinator, pool }
    }
}
