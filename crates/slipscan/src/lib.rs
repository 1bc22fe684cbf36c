pub mod config;
pub mod db;
pub mod error;
pub mod fields;
pub mod pipeline;
pub mod processor;
pub mod sanitize;
pub mod storage;
pub mod worker;

pub use config::{load_config, Config};
pub use db::{Database, FileState, ReceiptRow, SourceFileRow};
pub use error::{ConfigError, ProcessError, Result, SlipscanError, StorageError, WorkerError};
pub use fields::{parse_fields, ReceiptFields};
pub use pipeline::{PipelineConfig, PipelineCoordinator, PipelineError, ProcessOutcome};
pub use processor::{Rasterizer, ScratchImage, TextExtractor, Verdict};
pub use worker::{JobKind, JobOutput, WorkerPool};
