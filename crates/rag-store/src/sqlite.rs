//! SQLite-backed vector index.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info};
use ulid::Ulid;

use rag_core::{
    Chunk, ChunkMetadata, IndexStats, RagError, Result, SearchResult, VectorStore,
};

use crate::lock::DirLock;
use crate::schema::{meta, DISTANCE_METRIC, SCHEMA, SCHEMA_VERSION};

/// Index file name inside the persist directory.
pub const INDEX_FILE: &str = "index.sqlite";

/// Name used while a build is in progress; renamed to [`INDEX_FILE`] by
/// [`SqliteVectorIndex::finish`].
const PARTIAL_FILE: &str = "index.sqlite.partial";

/// Persisted (chunk, embedding) collection searched by cosine similarity.
///
/// A handle is either a builder (from [`create`](Self::create), holding the
/// directory lock exclusively) or a read-only reader (from
/// [`open`](Self::open), sharing it).
pub struct SqliteVectorIndex {
    /// Connection wrapped in blocking Mutex.
    conn: Mutex<Connection>,

    /// Persist directory.
    dir: PathBuf,

    /// Database file backing this handle.
    path: PathBuf,

    /// Whether writes are rejected.
    read_only: bool,

    _lock: DirLock,
}

impl SqliteVectorIndex {
    /// Path of the index database inside `dir`.
    pub fn index_path(dir: impl AsRef<Path>) -> PathBuf {
        dir.as_ref().join(INDEX_FILE)
    }

    /// Whether a completed index is persisted in `dir`.
    pub fn exists(dir: impl AsRef<Path>) -> bool {
        Self::index_path(dir).is_file()
    }

    /// Start building a new index in `dir`.
    ///
    /// The index becomes visible to [`exists`](Self::exists) and
    /// [`open`](Self::open) only after [`finish`](Self::finish); a build that
    /// is dropped midway leaves nothing behind that a later run would reuse.
    pub fn create(dir: impl AsRef<Path>, embedding_model: &str) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let lock = DirLock::exclusive(dir)?;

        if Self::exists(dir) {
            return Err(RagError::precondition(format!(
                "A vector index already exists in {}",
                dir.display()
            )));
        }

        let path = dir.join(PARTIAL_FILE);
        if path.exists() {
            debug!("Removing abandoned build at {:?}", path);
            std::fs::remove_file(&path)?;
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| RagError::database(format!("Failed to create database: {}", e)))?;

        conn.execute_batch(
            r#"
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 30000;
            PRAGMA temp_store = MEMORY;
            "#,
        )
        .map_err(|e| RagError::database(format!("Failed to configure connection: {}", e)))?;

        conn.execute_batch(SCHEMA)
            .map_err(|e| RagError::database(format!("Failed to initialize schema: {}", e)))?;

        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        for (key, value) in [
            (meta::SCHEMA_VERSION, SCHEMA_VERSION.to_string()),
            (meta::DISTANCE_METRIC, DISTANCE_METRIC.to_string()),
            (meta::EMBEDDING_MODEL, embedding_model.to_string()),
            (meta::CREATED_AT, created_at.to_string()),
        ] {
            Self::put_meta(&conn, key, &value)?;
        }

        info!("Building vector index at {:?}", dir);

        Ok(Self {
            conn: Mutex::new(conn),
            dir: dir.to_path_buf(),
            path,
            read_only: false,
            _lock: lock,
        })
    }

    /// Open the index persisted in `dir` read-only.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !Self::exists(dir) {
            return Err(RagError::precondition(format!(
                "No vector index in {}; run ingestion first",
                dir.display()
            )));
        }
        let lock = DirLock::shared(dir)?;

        let path = Self::index_path(dir);
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| RagError::database(format!("Failed to open database: {}", e)))?;

        conn.execute_batch("PRAGMA busy_timeout = 30000;")
            .map_err(|e| RagError::database(format!("Failed to configure connection: {}", e)))?;

        let metric = Self::get_meta(&conn, meta::DISTANCE_METRIC)?;
        if metric.as_deref() != Some(DISTANCE_METRIC) {
            return Err(RagError::database(format!(
                "Unsupported distance metric {:?} in {:?}",
                metric, path
            )));
        }

        info!("Opened vector index at {:?}", dir);

        Ok(Self {
            conn: Mutex::new(conn),
            dir: dir.to_path_buf(),
            path,
            read_only: true,
            _lock: lock,
        })
    }

    /// Delete the index persisted in `dir`, if any. Returns whether one was
    /// removed. Fails with `IndexLocked` while any handle is open.
    pub fn destroy(dir: impl AsRef<Path>) -> Result<bool> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Ok(false);
        }
        let _lock = DirLock::exclusive(dir)?;

        let partial = dir.join(PARTIAL_FILE);
        if partial.exists() {
            std::fs::remove_file(&partial)?;
        }

        let path = Self::index_path(dir);
        if path.exists() {
            std::fs::remove_file(&path)?;
            info!("Removed vector index at {:?}", dir);
            return Ok(true);
        }
        Ok(false)
    }

    /// Complete a build and publish the index under its final name.
    pub fn finish(self) -> Result<()> {
        if self.read_only {
            return Err(RagError::precondition("Cannot finish a read-only index"));
        }

        let conn = self
            .conn
            .into_inner()
            .map_err(|e| RagError::database(e.to_string()))?;
        conn.close()
            .map_err(|(_, e)| RagError::database(format!("Failed to close database: {}", e)))?;

        std::fs::rename(&self.path, Self::index_path(&self.dir))?;
        info!("Vector index ready at {:?}", self.dir);
        Ok(())
    }

    /// Persist directory of this handle.
    pub fn directory(&self) -> &Path {
        &self.dir
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Read an `index_meta` value.
    pub fn meta(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| Self::get_meta(conn, key))
    }

    /// Embedding model recorded at build time.
    pub fn embedding_model(&self) -> Result<Option<String>> {
        self.meta(meta::EMBEDDING_MODEL)
    }

    /// Corpus fingerprint recorded at build time.
    pub fn corpus_fingerprint(&self) -> Result<Option<String>> {
        self.meta(meta::CORPUS_FINGERPRINT)
    }

    pub fn set_corpus_fingerprint(&self, fingerprint: &str) -> Result<()> {
        self.ensure_writable()?;
        self.with_conn(|conn| Self::put_meta(conn, meta::CORPUS_FINGERPRINT, fingerprint))
    }

    /// Embedding dimension, fixed by the first insert.
    pub fn dimension(&self) -> Result<Option<usize>> {
        self.with_conn(|conn| Self::stored_dimension(conn))
    }

    /// Number of stored chunks.
    pub fn count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
                .map_err(|e| RagError::database(e.to_string()))
        })
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(RagError::precondition(format!(
                "Vector index in {} was opened read-only",
                self.dir.display()
            )));
        }
        Ok(())
    }

    /// Execute a blocking operation on the connection.
    fn with_conn<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        let conn = self.conn.lock().map_err(|e| RagError::database(e.to_string()))?;
        f(&conn)
    }

    fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
        conn.query_row(
            "SELECT value FROM index_meta WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| RagError::database(e.to_string()))
    }

    fn put_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO index_meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .map_err(|e| RagError::database(format!("Failed to write {}: {}", key, e)))?;
        Ok(())
    }

    fn stored_dimension(conn: &Connection) -> Result<Option<usize>> {
        match Self::get_meta(conn, meta::DIMENSION)? {
            Some(value) => value
                .parse::<usize>()
                .map(Some)
                .map_err(|e| RagError::database(format!("Corrupt dimension {:?}: {}", value, e))),
            None => Ok(None),
        }
    }

    /// Convert a row to a Chunk.
    fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chunk> {
        let id_str: String = row.get(0)?;
        Ok(Chunk {
            id: Ulid::from_string(&id_str).unwrap_or_else(|_| Ulid::nil()),
            text: row.get(4)?,
            metadata: ChunkMetadata {
                source: row.get(1)?,
                chunk_index: row.get(2)?,
                start_char: row.get::<_, i64>(3)? as usize,
            },
        })
    }

    /// Convert f32 vector to bytes (little-endian).
    fn vec_to_bytes(v: &[f32]) -> Vec<u8> {
        v.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn bytes_to_vec(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }
}

/// Cosine similarity; 0 for empty, mismatched or zero-norm inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

#[async_trait]
impl VectorStore for SqliteVectorIndex {
    async fn add(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        self.ensure_writable()?;
        if chunks.len() != embeddings.len() {
            return Err(RagError::invalid_argument(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }
        if chunks.is_empty() {
            return Ok(());
        }

        self.with_conn(|conn| {
            let dimension = match Self::stored_dimension(conn)? {
                Some(d) => d,
                None => {
                    let d = embeddings[0].len();
                    if d == 0 {
                        return Err(RagError::invalid_argument("Empty embedding vector"));
                    }
                    Self::put_meta(conn, meta::DIMENSION, &d.to_string())?;
                    d
                }
            };
            if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
                return Err(RagError::invalid_argument(format!(
                    "Embedding dimension {} does not match index dimension {}",
                    bad.len(),
                    dimension
                )));
            }

            let tx = conn
                .unchecked_transaction()
                .map_err(|e| RagError::database(e.to_string()))?;

            {
                let mut stmt = tx
                    .prepare(
                        r#"
                        INSERT INTO chunks (id, source, chunk_index, start_char, content,
                                            content_hash, embedding)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                        "#,
                    )
                    .map_err(|e| RagError::database(e.to_string()))?;

                for (chunk, embedding) in chunks.iter().zip(embeddings) {
                    stmt.execute(params![
                        chunk.id.to_string(),
                        chunk.metadata.source,
                        chunk.metadata.chunk_index,
                        chunk.metadata.start_char as i64,
                        chunk.text,
                        chunk.content_hash().to_vec(),
                        Self::vec_to_bytes(embedding),
                    ])
                    .map_err(|e| RagError::database(format!("Failed to insert chunk: {}", e)))?;
                }
            }

            tx.commit()
                .map_err(|e| RagError::database(e.to_string()))?;

            debug!("Inserted {} chunks", chunks.len());
            Ok(())
        })
    }

    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored = self.with_conn(|conn| {
            if let Some(dimension) = Self::stored_dimension(conn)? {
                if dimension != embedding.len() {
                    return Err(RagError::invalid_argument(format!(
                        "Query dimension {} does not match index dimension {}",
                        embedding.len(),
                        dimension
                    )));
                }
            }

            let mut stmt = conn
                .prepare(
                    r#"
                    SELECT id, source, chunk_index, start_char, content, embedding
                    FROM chunks
                    ORDER BY seq
                    "#,
                )
                .map_err(|e| RagError::database(e.to_string()))?;

            let rows = stmt
                .query_map([], |row| {
                    let blob: Vec<u8> = row.get(5)?;
                    Ok((Self::row_to_chunk(row)?, blob))
                })
                .map_err(|e| RagError::database(e.to_string()))?;

            let mut scored = Vec::new();
            for row in rows {
                let (chunk, blob) = row.map_err(|e| RagError::database(e.to_string()))?;
                let score = cosine_similarity(embedding, &Self::bytes_to_vec(&blob));
                scored.push((score, chunk));
            }
            Ok(scored)
        })?;

        // Stable sort: equal scores keep insertion order.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(k);

        debug!("Vector search returned {} of k={} results", scored.len(), k);

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(i, (score, chunk))| SearchResult {
                rank: i as u32 + 1,
                score,
                chunk,
            })
            .collect())
    }

    async fn stats(&self) -> Result<IndexStats> {
        self.with_conn(|conn| {
            let chunks: u64 = conn
                .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
                .map_err(|e| RagError::database(e.to_string()))?;

            let sources: u64 = conn
                .query_row("SELECT COUNT(DISTINCT source) FROM chunks", [], |row| {
                    row.get(0)
                })
                .map_err(|e| RagError::database(e.to_string()))?;

            // Get page count and page size to estimate storage
            let page_count: u64 = conn
                .query_row("PRAGMA page_count", [], |row| row.get(0))
                .unwrap_or(0);
            let page_size: u64 = conn
                .query_row("PRAGMA page_size", [], |row| row.get(0))
                .unwrap_or(4096);

            Ok(IndexStats {
                chunks,
                sources,
                dimension: Self::stored_dimension(conn)?,
                embedding_model: Self::get_meta(conn, meta::EMBEDDING_MODEL)?,
                distance_metric: Self::get_meta(conn, meta::DISTANCE_METRIC)?
                    .unwrap_or_else(|| DISTANCE_METRIC.to_string()),
                storage_bytes: page_count * page_size,
            })
        })
    }
}
