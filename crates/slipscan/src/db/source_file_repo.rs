//! Source file repository: registration and validity tracking for the
//! `source_files` table.

use rusqlite::{params, Connection, Row};
use serde::Serialize;

use super::{Database, DatabaseError};

/// A raw source file row from the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFileRow {
    pub id: String,
    pub file_name: String,
    pub file_path: String,
    /// `None` until the file has been validated once.
    pub is_valid: Option<bool>,
    pub invalid_reason: Option<String>,
    pub is_processed: bool,
    pub receipt_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Outcome of the most recent validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validity {
    Unknown,
    Valid,
    Invalid(String),
}

/// Lifecycle state derived from the stored flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileState {
    Uploaded,
    Valid,
    Invalid,
    Processed,
}

impl SourceFileRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            file_name: row.get("file_name")?,
            file_path: row.get("file_path")?,
            is_valid: row.get("is_valid")?,
            invalid_reason: row.get("invalid_reason")?,
            is_processed: row.get("is_processed")?,
            receipt_id: row.get("receipt_id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Builds a freshly uploaded row with unknown validity.
    pub fn uploaded(id: String, file_name: String, file_path: String, now: String) -> Self {
        Self {
            id,
            file_name,
            file_path,
            is_valid: None,
            invalid_reason: None,
            is_processed: false,
            receipt_id: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn validity(&self) -> Validity {
        match self.is_valid {
            None => Validity::Unknown,
            Some(true) => Validity::Valid,
            Some(false) => Validity::Invalid(
                self.invalid_reason
                    .clone()
                    .unwrap_or_else(|| "invalid document".to_string()),
            ),
        }
    }

    pub fn state(&self) -> FileState {
        if self.is_processed {
            return FileState::Processed;
        }
        match self.is_valid {
            None => FileState::Uploaded,
            Some(true) => FileState::Valid,
            Some(false) => FileState::Invalid,
        }
    }
}

/// Inserts a new source file row.
pub fn insert(db: &Database, file: &SourceFileRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO source_files (id, file_name, file_path, is_valid, invalid_reason,
             is_processed, receipt_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                file.id,
                file.file_name,
                file.file_path,
                file.is_valid,
                file.invalid_reason,
                file.is_processed,
                file.receipt_id,
                file.created_at,
                file.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a source file by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<SourceFileRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM source_files WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], SourceFileRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Records a validation verdict.
///
/// A processed file is never downgraded: an invalid verdict against a
/// processed row is ignored and `false` is returned.
pub fn update_validity(
    db: &Database,
    id: &str,
    valid: bool,
    reason: Option<&str>,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE source_files SET is_valid = ?2, invalid_reason = ?3, updated_at = ?4
             WHERE id = ?1 AND (is_processed = 0 OR ?2 = 1)",
            params![id, valid, reason, updated_at],
        )?;
        Ok(changed == 1)
    })
}

/// Flips a valid, unprocessed file to processed and links its receipt.
///
/// Takes a bare connection so it can run inside the caller's transaction.
/// Returns `false` when the row was not in a state that allows the flip.
pub(crate) fn mark_processed(
    conn: &Connection,
    id: &str,
    receipt_id: &str,
    updated_at: &str,
) -> Result<bool, rusqlite::Error> {
    let changed = conn.execute(
        "UPDATE source_files SET is_processed = 1, receipt_id = ?2, updated_at = ?3
         WHERE id = ?1 AND is_valid = 1 AND is_processed = 0",
        params![id, receipt_id, updated_at],
    )?;
    Ok(changed == 1)
}
