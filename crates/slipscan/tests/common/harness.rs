//! Test harness for isolated pipeline execution.
//!
//! The `TestHarness` wires a real `PipelineCoordinator` to:
//! - temporary upload/scratch/config directories
//! - an in-memory database
//! - fake rasterizer and extractor stages

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use slipscan::config::schema::Config;
use slipscan::db::{source_file_repo, FileState};
use slipscan::storage::FileStorage;
use slipscan::{Database, PipelineCoordinator, SourceFileRow};

use super::builders::{receipt_pdf, SAMPLE_RECEIPT_TEXT};
use super::fakes::{FakeControl, FakeExtractor, FakeRasterizer};

pub struct TestHarness {
    temp_dir: TempDir,
    pub upload_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub config_dir: PathBuf,
    pub db: Database,
    pub rasterizer: Arc<FakeControl>,
    pub extractor: Arc<FakeControl>,
    /// Every image path the extractor was handed.
    pub seen_images: Arc<Mutex<Vec<PathBuf>>>,
    pub coordinator: Arc<PipelineCoordinator>,
}

impl TestHarness {
    /// Create a harness whose OCR stage returns the sample receipt.
    pub fn new() -> Self {
        Self::with_ocr_text(SAMPLE_RECEIPT_TEXT)
    }

    /// Create a harness whose OCR stage returns `text`.
    pub fn with_ocr_text(text: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let upload_dir = base.join("uploads");
        let scratch_dir = base.join("scratch");
        let config_dir = base.join("config");
        std::fs::create_dir_all(&config_dir).expect("Failed to create config dir");

        let db = Database::open_in_memory().expect("Failed to open test database");
        let rasterizer = Arc::new(FakeControl::default());
        let extractor = Arc::new(FakeControl::default());
        let seen_images = Arc::new(Mutex::new(Vec::new()));

        let coordinator = Arc::new(PipelineCoordinator::new(
            db.clone(),
            FileStorage::new(&upload_dir),
            Box::new(FakeRasterizer::new(
                scratch_dir.clone(),
                Arc::clone(&rasterizer),
            )),
            Box::new(FakeExtractor::new(
                text,
                Arc::clone(&extractor),
                Arc::clone(&seen_images),
            )),
        ));

        Self {
            temp_dir,
            upload_dir,
            scratch_dir,
            config_dir,
            db,
            rasterizer,
            extractor,
            seen_images,
            coordinator,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Register an upload through the coordinator.
    pub fn upload(&self, name: &str, bytes: &[u8]) -> SourceFileRow {
        self.coordinator
            .register_upload(name, bytes)
            .expect("Failed to register upload")
    }

    /// Register a well-formed PDF and return its id.
    pub fn upload_pdf(&self) -> String {
        self.upload("receipt.pdf", &receipt_pdf("Grocery Store A")).id
    }

    /// Register and validate a well-formed PDF and return its id.
    pub fn upload_validated(&self) -> String {
        let id = self.upload_pdf();
        let verdict = self.coordinator.validate(&id).expect("validate failed");
        assert!(verdict.valid, "test PDF should be valid: {:?}", verdict);
        id
    }

    pub fn state(&self, file_id: &str) -> FileState {
        self.file(file_id).state()
    }

    pub fn file(&self, file_id: &str) -> SourceFileRow {
        source_file_repo::find_by_id(&self.db, file_id)
            .expect("query failed")
            .expect("file row missing")
    }

    pub fn stored_path(&self, file_id: &str) -> PathBuf {
        PathBuf::from(self.file(file_id).file_path)
    }

    pub fn receipt_count(&self) -> u32 {
        self.db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM receipts", [], |r| r.get(0))?))
            .expect("count failed")
    }

    /// Files currently left in the scratch directory.
    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(&self.scratch_dir)
            .map(|d| d.count())
            .unwrap_or(0)
    }

    /// Write a config file to the config directory.
    pub fn write_config(&self, filename: &str, config: &Config) -> PathBuf {
        let path = self.config_dir.join(filename);
        let json = serde_json::to_string_pretty(config).expect("Failed to serialize config");
        std::fs::write(&path, json).expect("Failed to write config file");
        path
    }
}
