//! SQLite-backed vector index for knowledge passages.
//!
//! Vectors are stored as little-endian f32 blobs next to the passage
//! metadata. Search is an exhaustive dot-product scan, which is fine for
//! catalogue-sized corpora.

use crate::embeddings::dot;
use crate::filter::MetadataFilter;
use crate::passage::{IndexStats, Passage, RetrievedPassage};
use crate::vector_index::VectorIndex;
use grounded_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite vector index.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
    dimensions: usize,
}

impl SqliteIndex {
    /// Open (or create) the index at `db_path`.
    ///
    /// Fails if the file was created with a different embedding dimension.
    pub fn open(db_path: &Path, dimensions: usize) -> AppResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::Knowledge(format!("Failed to create index directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Knowledge(format!("Failed to open SQLite index: {}", e)))?;

        let index = Self::init(conn, dimensions)?;
        tracing::debug!("Opened SQLite index at {:?} ({} dims)", db_path, dimensions);
        Ok(index)
    }

    /// Create a throwaway in-memory index.
    pub fn in_memory(dimensions: usize) -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Knowledge(format!("Failed to open SQLite index: {}", e)))?;
        Self::init(conn, dimensions)
    }

    fn init(conn: Connection, dimensions: usize) -> AppResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS passages (
                id TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                sku TEXT,
                source TEXT,
                lang TEXT NOT NULL,
                valid_from TEXT,
                valid_to TEXT,
                version TEXT,
                section_id TEXT,
                tags TEXT NOT NULL,
                embedding BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_passages_sku ON passages(sku);
            "#,
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to create tables: {}", e)))?;

        let stored: Option<String> = conn
            .query_row("SELECT value FROM meta WHERE key = 'dimensions'", [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| AppError::Knowledge(format!("Failed to read index metadata: {}", e)))?;

        match stored {
            Some(value) => {
                let existing: usize = value.parse().map_err(|_| {
                    AppError::Knowledge(format!("Corrupt index dimension: {}", value))
                })?;
                if existing != dimensions {
                    return Err(AppError::Knowledge(format!(
                        "Index was built with {} dimensions but {} are configured; point retrieval.index_path at a new file or fix the embedding settings",
                        existing, dimensions
                    )));
                }
            }
            None => {
                conn.execute(
                    "INSERT INTO meta (key, value) VALUES ('dimensions', ?1)",
                    params![dimensions.to_string()],
                )
                .map_err(|e| AppError::Knowledge(format!("Failed to write index metadata: {}", e)))?;
            }
        }

        Ok(Self {
            conn: Mutex::new(conn),
            dimensions,
        })
    }

    fn check_dimensions(&self, batch: &[(Passage, Vec<f32>)]) -> AppResult<()> {
        match batch.iter().find(|(_, v)| v.len() != self.dimensions) {
            Some((passage, _)) => Err(AppError::Knowledge(format!(
                "Embedding for passage {} has wrong dimension (expected {})",
                passage.id, self.dimensions
            ))),
            None => Ok(()),
        }
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Knowledge("Index lock poisoned".to_string()))
    }
}

impl VectorIndex for SqliteIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn upsert(&self, batch: &[(Passage, Vec<f32>)]) -> AppResult<usize> {
        self.check_dimensions(batch)?;

        let mut conn = self.lock()?;
        let tx = begin(&mut conn)?;
        write_rows(&tx, batch)?;
        tx.commit()
            .map_err(|e| AppError::Knowledge(format!("Failed to commit upsert: {}", e)))?;

        Ok(batch.len())
    }

    fn replace_all(&self, batch: &[(Passage, Vec<f32>)]) -> AppResult<usize> {
        self.check_dimensions(batch)?;

        let mut conn = self.lock()?;
        let tx = begin(&mut conn)?;
        tx.execute("DELETE FROM passages", [])
            .map_err(|e| AppError::Knowledge(format!("Failed to delete passages: {}", e)))?;
        write_rows(&tx, batch)?;
        tx.commit()
            .map_err(|e| AppError::Knowledge(format!("Failed to commit replacement: {}", e)))?;

        tracing::info!("Replaced index contents with {} passages", batch.len());
        Ok(batch.len())
    }

    fn search(
        &self,
        query_embedding: &[f32],
        filter: &MetadataFilter,
        top_k: usize,
    ) -> AppResult<Vec<RetrievedPassage>> {
        if query_embedding.len() != self.dimensions {
            return Err(AppError::Knowledge(format!(
                "Query embedding has {} dimensions, index has {}",
                query_embedding.len(),
                self.dimensions
            )));
        }

        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, text, sku, source, lang, valid_from, valid_to, version, section_id, tags, embedding
                 FROM passages",
            )
            .map_err(|e| AppError::Knowledge(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], read_row)
            .map_err(|e| AppError::Knowledge(format!("Failed to query passages: {}", e)))?;

        let mut results = Vec::new();
        for row in rows {
            let (passage, embedding) =
                row.map_err(|e| AppError::Knowledge(format!("Failed to read passage: {}", e)))?;
            if !filter.matches(&passage) {
                continue;
            }
            let score = dot(query_embedding, &embedding);
            results.push(RetrievedPassage { passage, score });
        }

        // Sort by score descending
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);

        tracing::debug!(
            "Retrieved {} passages (requested top-{}, filter: {})",
            results.len(),
            top_k,
            filter
        );

        Ok(results)
    }

    fn stats(&self) -> AppResult<IndexStats> {
        let conn = self.lock()?;
        let (passages, stale_passages): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), COUNT(valid_to) FROM passages",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| AppError::Knowledge(format!("Failed to count passages: {}", e)))?;

        Ok(IndexStats {
            passages: passages as u64,
            stale_passages: stale_passages as u64,
        })
    }

    fn flush(&self) -> AppResult<()> {
        let conn = self.lock()?;
        // No-op outside WAL mode
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
            .map_err(|e| AppError::Knowledge(format!("Failed to checkpoint index: {}", e)))
    }
}

fn begin(conn: &mut Connection) -> AppResult<Transaction<'_>> {
    conn.transaction()
        .map_err(|e| AppError::Knowledge(format!("Failed to begin transaction: {}", e)))
}

fn write_rows(tx: &Transaction<'_>, batch: &[(Passage, Vec<f32>)]) -> AppResult<()> {
    let mut stmt = tx
        .prepare_cached(
            "INSERT OR REPLACE INTO passages
             (id, text, sku, source, lang, valid_from, valid_to, version, section_id, tags, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to prepare upsert: {}", e)))?;

    for (passage, embedding) in batch {
        let tags = serde_json::to_string(&passage.tags)?;
        stmt.execute(params![
            passage.id,
            passage.text,
            passage.sku,
            passage.source,
            passage.lang,
            passage.valid_from,
            passage.valid_to,
            passage.version,
            passage.section_id,
            tags,
            embedding_to_bytes(embedding),
        ])
        .map_err(|e| AppError::Knowledge(format!("Failed to upsert passage: {}", e)))?;
    }
    Ok(())
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<(Passage, Vec<f32>)> {
    let tags_json: String = row.get(9)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e)))?;

    let embedding_bytes: Vec<u8> = row.get(10)?;

    let passage = Passage {
        id: row.get(0)?,
        text: row.get(1)?,
        sku: row.get(2)?,
        source: row.get(3)?,
        lang: row.get(4)?,
        valid_from: row.get(5)?,
        valid_to: row.get(6)?,
        version: row.get(7)?,
        section_id: row.get(8)?,
        tags,
    };

    Ok((passage, bytes_to_embedding(&embedding_bytes)))
}

/// Convert embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Convert bytes back to embedding vector. Trailing partial floats are ignored.
fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
