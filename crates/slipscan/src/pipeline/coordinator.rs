use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use tracing::{debug, info, info_span, warn};

use crate::db::receipt_repo::{self, CommitOutcome, ReceiptRow};
use crate::db::source_file_repo::{self, SourceFileRow, Validity};
use crate::db::Database;
use crate::error::{ConfigError, ProcessError, StorageError};
use crate::fields::parse_fields;
use crate::processor::{
    validate_bytes, PdftoppmRasterizer, Rasterizer, TesseractExtractor, TextExtractor, Verdict,
};
use crate::sanitize;
use crate::storage::FileStorage;

use super::config::PipelineConfig;
use super::error::PipelineError;
use super::inflight::InFlight;

/// Reason recorded when a file's stored bytes have disappeared.
pub const ASSET_MISSING_REASON: &str = "asset missing";

const NOT_VALIDATED_REASON: &str = "file has not been validated";

/// Result of a successful `process` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    pub receipt: ReceiptRow,
    /// True when the receipt already existed and no extraction ran.
    pub already_processed: bool,
}

/// Drives a source file through `Uploaded -> Valid/Invalid -> Processed`.
///
/// All collaborators are injected. Work on one file id is serialized; work on
/// different ids runs in parallel.
pub struct PipelineCoordinator {
    db: Database,
    storage: FileStorage,
    rasterizer: Box<dyn Rasterizer>,
    extractor: Box<dyn TextExtractor>,
    in_flight: InFlight,
}

impl PipelineCoordinator {
    /// Production constructor. Fails if the rasterization tool is unusable.
    pub fn from_config(config: &PipelineConfig, db: Database) -> Result<Self, ConfigError> {
        let rasterizer = PdftoppmRasterizer::new(
            config.rasterizer_program.clone(),
            config.scratch_directory.clone(),
            config.rasterizer_timeout,
        );
        rasterizer.check_available()?;
        let extractor = TesseractExtractor::new(&config.ocr_languages);

        Ok(Self::new(
            db,
            FileStorage::new(&config.upload_directory),
            Box::new(rasterizer),
            Box::new(extractor),
        ))
    }

    pub fn new(
        db: Database,
        storage: FileStorage,
        rasterizer: Box<dyn Rasterizer>,
        extractor: Box<dyn TextExtractor>,
    ) -> Self {
        Self {
            db,
            storage,
            rasterizer,
            extractor,
            in_flight: InFlight::new(),
        }
    }

    /// Stores the uploaded bytes and records a new file in state `Uploaded`.
    pub fn register_upload(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<SourceFileRow, PipelineError> {
        let _span = info_span!("pipeline.register_upload", size = bytes.len()).entered();

        if bytes.is_empty() {
            return Err(StorageError::EmptyUpload(file_name.to_string()).into());
        }

        let stored_path = self.storage.store_upload(file_name, bytes)?;
        let row = SourceFileRow::uploaded(
            uuid::Uuid::new_v4().to_string(),
            file_name.to_string(),
            stored_path.to_string_lossy().into_owned(),
            now(),
        );

        if let Err(e) = source_file_repo::insert(&self.db, &row) {
            self.storage.remove(&stored_path);
            return Err(e.into());
        }

        info!(
            "Registered upload {} as {}",
            sanitize::redact_path(&stored_path),
            row.id
        );
        Ok(row)
    }

    /// Runs the structural check and persists the verdict, replacing any
    /// earlier one.
    pub fn validate(&self, file_id: &str) -> Result<Verdict, PipelineError> {
        let _span = info_span!("pipeline.validate", file_id = %file_id).entered();

        self.load(file_id)?;
        let _guard = self.in_flight.acquire(file_id);
        let file = self.load(file_id)?;

        let path = PathBuf::from(&file.file_path);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.persist_verdict(file_id, &Verdict::invalid(ASSET_MISSING_REASON))?;
                return Err(PipelineError::AssetMissing {
                    file_id: file_id.to_string(),
                    path,
                });
            }
            Err(e) => {
                return Err(ProcessError::ReadDocument { path, source: e }.into());
            }
        };

        let verdict = validate_bytes(&bytes);
        self.persist_verdict(file_id, &verdict)?;

        info!(
            "Validated {}: {}",
            file_id,
            if verdict.valid { "valid" } else { "invalid" }
        );
        Ok(verdict)
    }

    /// Extracts a receipt from a valid file. Repeated calls return the
    /// receipt produced by the first successful one.
    pub fn process(&self, file_id: &str) -> Result<ProcessOutcome, PipelineError> {
        let _span = info_span!("pipeline.process", file_id = %file_id).entered();

        self.load(file_id)?;
        let _guard = self.in_flight.acquire(file_id);
        // Re-read under the guard: a previous holder may have committed.
        let file = self.load(file_id)?;

        if file.is_processed {
            debug!("{} already processed", file_id);
            return Ok(ProcessOutcome {
                receipt: self.existing_receipt(&file)?,
                already_processed: true,
            });
        }

        match file.validity() {
            Validity::Valid => {}
            Validity::Unknown => {
                return Err(PipelineError::NotValidated {
                    file_id: file_id.to_string(),
                    reason: NOT_VALIDATED_REASON.to_string(),
                })
            }
            Validity::Invalid(reason) => {
                return Err(PipelineError::NotValidated {
                    file_id: file_id.to_string(),
                    reason,
                })
            }
        }

        let source = PathBuf::from(&file.file_path);
        if !source.is_file() {
            return Err(PipelineError::AssetMissing {
                file_id: file_id.to_string(),
                path: source,
            });
        }

        let text = self.extract_text(&source)?;

        let fields = {
            let _step = info_span!("parse_fields").entered();
            parse_fields(&text)
        };

        let timestamp = now();
        let receipt = ReceiptRow {
            id: uuid::Uuid::new_v4().to_string(),
            file_id: file_id.to_string(),
            merchant_name: fields.merchant_name,
            total_amount: fields.total_amount,
            purchase_date: fields.purchased_at,
            raw_text: text,
            created_at: timestamp.clone(),
            updated_at: timestamp,
        };

        match receipt_repo::commit_extraction(&self.db, &receipt)? {
            CommitOutcome::Committed(receipt) => {
                info!("Processed {} into receipt {}", file_id, receipt.id);
                Ok(ProcessOutcome {
                    receipt,
                    already_processed: false,
                })
            }
            CommitOutcome::AlreadyCommitted(winner) => {
                warn!(
                    "Receipt for {} was committed concurrently; returning {}",
                    file_id, winner.id
                );
                Ok(ProcessOutcome {
                    receipt: winner,
                    already_processed: true,
                })
            }
        }
    }

    pub fn source_file(&self, file_id: &str) -> Result<SourceFileRow, PipelineError> {
        self.load(file_id)
    }

    pub fn receipt(&self, receipt_id: &str) -> Result<ReceiptRow, PipelineError> {
        receipt_repo::find_by_id(&self.db, receipt_id)?
            .ok_or_else(|| PipelineError::NotFound(receipt_id.to_string()))
    }

    /// All receipts, newest first.
    pub fn receipts(&self) -> Result<Vec<ReceiptRow>, PipelineError> {
        Ok(receipt_repo::list(&self.db)?)
    }

    fn load(&self, file_id: &str) -> Result<SourceFileRow, PipelineError> {
        source_file_repo::find_by_id(&self.db, file_id)?
            .ok_or_else(|| PipelineError::NotFound(file_id.to_string()))
    }

    fn persist_verdict(&self, file_id: &str, verdict: &Verdict) -> Result<(), PipelineError> {
        let applied = source_file_repo::update_validity(
            &self.db,
            file_id,
            verdict.valid,
            verdict.reason.as_deref(),
            &now(),
        )?;
        if !applied {
            warn!(
                "Verdict for {} not stored: file is already processed",
                file_id
            );
        }
        Ok(())
    }

    /// Rasterizes page one and runs OCR. The scratch image is released by the
    /// extractor, or by its guard if rasterization succeeded but OCR never ran.
    fn extract_text(&self, source: &Path) -> Result<String, PipelineError> {
        let image = {
            let _step = info_span!("rasterize").entered();
            self.rasterizer.rasterize_first_page(source)?
        };
        let _step = info_span!("ocr").entered();
        Ok(self.extractor.extract_text(image)?)
    }

    fn existing_receipt(&self, file: &SourceFileRow) -> Result<ReceiptRow, PipelineError> {
        let by_link = match &file.receipt_id {
            Some(id) => receipt_repo::find_by_id(&self.db, id)?,
            None => None,
        };
        let found = match by_link {
            Some(receipt) => Some(receipt),
            None => receipt_repo::find_by_file_id(&self.db, &file.id)?,
        };
        found.ok_or_else(|| {
            PipelineError::Inconsistent(format!(
                "source file {} is processed but has no receipt",
                file.id
            ))
        })
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_from_config_requires_rasterizer() {
        let temp = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            upload_directory: temp.path().join("uploads"),
            scratch_directory: temp.path().join("scratch"),
            ocr_languages: vec!["eng".to_string()],
            rasterizer_program: "slipscan-no-such-rasterizer".to_string(),
            rasterizer_timeout: Duration::from_secs(5),
        };
        let db = Database::open_in_memory().unwrap();

        match PipelineCoordinator::from_config(&config, db) {
            Err(ConfigError::MissingTool { program, .. }) => {
                assert_eq!(program, "slipscan-no-such-rasterizer");
            }
            Err(e) => panic!("Expected MissingTool, got {}", e),
            Ok(_) => panic!("Expected MissingTool, got a coordinator"),
        }
    }

    #[test]
    fn test_now_is_sortable_utc() {
        let a = now();
        std::thread::sleep(Duration::from_millis(2));
        let b = now();
        assert!(a.ends_with('Z'));
        assert!(a < b);
    }
}
