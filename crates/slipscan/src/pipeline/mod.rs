pub mod config;
pub mod coordinator;
pub mod error;
pub mod inflight;

pub use config::PipelineConfig;
pub use coordinator::{PipelineCoordinator, ProcessOutcome, ASSET_MISSING_REASON};
pub use error::PipelineError;
pub use inflight::{InFlight, InFlightGuard};
