//! Receipt repository: reads for the `receipts` table and the single
//! transactional commit that turns a validated file into a processed one.

use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;
use serde::Serialize;

use super::{source_file_repo, Database, DatabaseError};

/// A receipt row. `total_amount` is stored as decimal text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptRow {
    pub id: String,
    pub file_id: String,
    pub merchant_name: Option<String>,
    pub total_amount: Option<Decimal>,
    pub purchase_date: Option<NaiveDateTime>,
    pub raw_text: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ReceiptRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let total_amount = match row.get::<_, Option<String>>("total_amount")? {
            Some(text) => Some(Decimal::from_str(&text).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e))
            })?),
            None => None,
        };

        Ok(Self {
            id: row.get("id")?,
            file_id: row.get("file_id")?,
            merchant_name: row.get("merchant_name")?,
            total_amount,
            purchase_date: row.get("purchase_date")?,
            raw_text: row.get("raw_text")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Result of [`commit_extraction`].
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// This call created the receipt and flipped the file to processed.
    Committed(ReceiptRow),
    /// Another writer already holds the receipt for this file.
    AlreadyCommitted(ReceiptRow),
}

fn insert_on(conn: &Connection, receipt: &ReceiptRow) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO receipts (id, file_id, merchant_name, total_amount, purchase_date,
         raw_text, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            receipt.id,
            receipt.file_id,
            receipt.merchant_name,
            receipt.total_amount.map(|d| d.to_string()),
            receipt.purchase_date,
            receipt.raw_text,
            receipt.created_at,
            receipt.updated_at,
        ],
    )?;
    Ok(())
}

fn find_one(
    conn: &Connection,
    sql: &str,
    key: &str,
) -> Result<Option<ReceiptRow>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query_map(params![key], ReceiptRow::from_row)?;
    match rows.next() {
        Some(Ok(row)) => Ok(Some(row)),
        Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
        None => Ok(None),
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Finds a receipt by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<ReceiptRow>, DatabaseError> {
    db.with_conn(|conn| find_one(conn, "SELECT * FROM receipts WHERE id = ?1", id))
}

/// Finds the receipt produced from the given source file, if any.
pub fn find_by_file_id(db: &Database, file_id: &str) -> Result<Option<ReceiptRow>, DatabaseError> {
    db.with_conn(|conn| find_one(conn, "SELECT * FROM receipts WHERE file_id = ?1", file_id))
}

/// Lists all receipts, newest first.
pub fn list(db: &Database) -> Result<Vec<ReceiptRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM receipts ORDER BY created_at DESC, rowid DESC")?;
        let rows = stmt
            .query_map([], ReceiptRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Persists a receipt and marks its source file processed in one transaction.
///
/// The file must currently be valid and unprocessed. If a receipt for the
/// file already exists the transaction is rolled back and the existing
/// receipt is returned instead.
pub fn commit_extraction(
    db: &Database,
    receipt: &ReceiptRow,
) -> Result<CommitOutcome, DatabaseError> {
    db.with_tx(|tx| {
        match insert_on(tx, receipt) {
            Ok(()) => {}
            Err(e) if is_unique_violation(&e) => {
                // Nothing was written; the empty transaction commits harmlessly.
                let existing = find_one(
                    tx,
                    "SELECT * FROM receipts WHERE file_id = ?1",
                    &receipt.file_id,
                )?
                .ok_or_else(|| DatabaseError::StateConflict {
                    id: receipt.file_id.clone(),
                    reason: "receipt conflict without an existing receipt".to_string(),
                })?;
                return Ok(CommitOutcome::AlreadyCommitted(existing));
            }
            Err(e) => return Err(e.into()),
        }

        let flipped = source_file_repo::mark_processed(
            tx,
            &receipt.file_id,
            &receipt.id,
            &receipt.updated_at,
        )?;
        if !flipped {
            return Err(DatabaseError::StateConflict {
                id: receipt.file_id.clone(),
                reason: "file is not valid and unprocessed".to_string(),
            });
        }

        Ok(CommitOutcome::Committed(receipt.clone()))
    })
}
