//! HTTP surface for the slipscan receipt pipeline.
//!
//! Handlers stay thin: uploads and reads go straight to the
//! [`PipelineCoordinator`](slipscan::PipelineCoordinator) on the blocking
//! thread pool, validate/process requests are queued on the
//! [`WorkerPool`](slipscan::WorkerPool).

pub mod error;
pub mod handlers;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use server::{router, run_server};
pub use state::AppState;
