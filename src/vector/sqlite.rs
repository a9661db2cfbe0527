//! `SQLite`-backed [`VectorIndex`].
//!
//! Persists chunk embeddings the same way the teacher's `chunk_embeddings`
//! table did: one row per chunk, a BLOB of little-endian `f32`s, scored by
//! a full in-process cosine scan. No HNSW or other approximate index — at
//! the scale of curated legal-procedure collections (hundreds to low
//! thousands of chunks per collection) a linear scan inside a
//! `rusqlite` connection is simple and fast enough, and it keeps the
//! dependency footprint aligned with the teacher rather than pulling in a
//! native ANN library for an external-interface reference adapter.

use crate::core::{Chunk, ChunkMetadata, Collection, DocumentId};
use crate::embedding::cosine_similarity;
use crate::error::OracleError;
use crate::vector::{Filter, SearchHit, VectorIndex};
use async_trait::async_trait;
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::Mutex;

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    collection TEXT NOT NULL,
    document_id TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    content TEXT NOT NULL,
    metadata_json TEXT NOT NULL,
    embedding BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_collection ON chunks(collection);
";

fn encode_embedding(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// A persisted, `SQLite`-backed vector index.
pub struct SqliteVectorIndex {
    conn: Mutex<Connection>,
}

impl SqliteVectorIndex {
    /// Opens (creating if absent) a database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be created.
    pub fn open<P: AsRef<Path>>(path: P) -> std::result::Result<Self, OracleError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory database, useful for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> std::result::Result<Self, OracleError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Inserts or replaces a chunk's embedding in the given collection.
    ///
    /// # Errors
    ///
    /// Returns an error on a database failure or if metadata fails to
    /// serialize.
    pub fn upsert(
        &self,
        collection: &str,
        chunk: &Chunk,
        embedding: &[f32],
    ) -> std::result::Result<(), OracleError> {
        let metadata_json = serde_json::to_string(&chunk.metadata)
            .map_err(|e| OracleError::VectorIndex(e.to_string()))?;
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT OR REPLACE INTO chunks (id, collection, document_id, chunk_index, content, metadata_json, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                chunk.id,
                collection,
                chunk.document_id.as_ref(),
                i64::try_from(chunk.index).unwrap_or(i64::MAX),
                chunk.content,
                metadata_json,
                encode_embedding(embedding),
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn search_in_collection(
        &self,
        collection: &str,
        query_embedding: &[f32],
        k: usize,
        threshold: f32,
        filter: Option<&Filter>,
    ) -> std::result::Result<Vec<SearchHit>, OracleError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(
            "SELECT id, document_id, chunk_index, content, metadata_json, embedding
             FROM chunks WHERE collection = ?1",
        )?;
        let rows = stmt.query_map(params![collection], |row| {
            let id: String = row.get(0)?;
            let document_id: String = row.get(1)?;
            let index: i64 = row.get(2)?;
            let content: String = row.get(3)?;
            let metadata_json: String = row.get(4)?;
            let embedding_bytes: Vec<u8> = row.get(5)?;
            Ok((id, document_id, index, content, metadata_json, embedding_bytes))
        })?;

        let mut hits = Vec::new();
        for row in rows {
            let (id, document_id, index, content, metadata_json, embedding_bytes) = row?;
            let metadata: ChunkMetadata =
                serde_json::from_str(&metadata_json).unwrap_or_default();
            #[allow(clippy::cast_sign_loss)]
            let chunk = Chunk::new(id, DocumentId::from(document_id), index as usize, content)
                .with_metadata(metadata);

            if let Some(filter) = filter
                && !filter.matches(&chunk)
            {
                continue;
            }

            let embedding = decode_embedding(&embedding_bytes);
            let similarity = cosine_similarity(query_embedding, &embedding);
            if similarity >= threshold {
                hits.push(SearchHit { chunk, similarity });
            }
        }

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn list_collections(&self) -> std::result::Result<Vec<Collection>, OracleError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(
            "SELECT collection, COUNT(DISTINCT document_id) FROM chunks GROUP BY collection",
        )?;
        let rows = stmt.query_map([], |row| {
            let name: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((name, count))
        })?;
        let mut collections = Vec::new();
        for row in rows {
            let (name, count) = row?;
            #[allow(clippy::cast_sign_loss)]
            collections.push(Collection::new(name.clone(), name, count as usize));
        }
        Ok(collections)
    }
}
