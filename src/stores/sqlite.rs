//! SQLite + sqlite-vec backed vector index.
//!
//! The whole index is one SQLite file: a `listings` table holding chunk rows
//! and a `listings_embeddings` vec0 virtual table holding their vectors,
//! linked by rowid. The file is the persisted artifact — copy it, don't
//! hand-parse it.

use std::os::raw::c_char;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use rig::OneOrMany;
use rig::embeddings::{Embedding, EmbeddingModel};
use rig_sqlite::{Column, ColumnValue, SqliteVectorStore, SqliteVectorStoreTable};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{Connection, ffi};
use tracing::debug;

use super::{ListingChunk, ListingStore};
use crate::types::PipelineError;

/// One chunk row as stored in the `listings` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListingDocument {
    pub id: String,
    pub source: String,
    pub city: String,
    pub service_type: String,
    pub provider: String,
    #[serde(deserialize_with = "deserialize_chunk_index")]
    pub chunk_index: usize,
    pub content: String,
}

impl SqliteVectorStoreTable for ListingDocument {
    fn name() -> &'static str {
        "listings"
    }

    fn schema() -> Vec<Column> {
        vec![
            Column::new("id", "TEXT PRIMARY KEY"),
            Column::new("source", "TEXT").indexed(),
            Column::new("city", "TEXT").indexed(),
            Column::new("service_type", "TEXT"),
            Column::new("provider", "TEXT"),
            Column::new("chunk_index", "TEXT"),
            Column::new("content", "TEXT"),
        ]
    }

    fn id(&self) -> String {
        self.id.clone()
    }

    fn column_values(&self) -> Vec<(&'static str, Box<dyn ColumnValue>)> {
        vec![
            ("id", Box::new(self.id.clone())),
            ("source", Box::new(self.source.clone())),
            ("city", Box::new(self.city.clone())),
            ("service_type", Box::new(self.service_type.clone())),
            ("provider", Box::new(self.provider.clone())),
            ("chunk_index", Box::new(self.chunk_index.to_string())),
            ("content", Box::new(self.content.clone())),
        ]
    }
}

// chunk_index is stored as TEXT; accept both representations when reading.
fn deserialize_chunk_index<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Num(u64),
        Text(String),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Num(value) => usize::try_from(value)
            .map_err(|_| de::Error::custom(format!("chunk_index {value} does not fit in usize"))),
        Repr::Text(text) => text.parse::<usize>().map_err(|err| {
            de::Error::custom(format!("unable to parse chunk_index '{text}': {err}"))
        }),
    }
}

/// Persistent vector index over listing chunks.
///
/// Built once via [`create`](Self::create) and loaded read-only via
/// [`open`](Self::open). Queries never mutate the index, so concurrent
/// readers of an opened index are safe; rebuilding the same artifact
/// requires exclusive access.
#[derive(Clone)]
pub struct SqliteListingIndex<E>
where
    E: EmbeddingModel + 'static,
{
    inner: SqliteVectorStore<E, ListingDocument>,
    /// Separate handle for direct queries not covered by rig-sqlite.
    conn: Connection,
    path: PathBuf,
}

impl<E> std::fmt::Debug for SqliteListingIndex<E>
where
    E: EmbeddingModel + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteListingIndex")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl<E> SqliteListingIndex<E>
where
    E: EmbeddingModel + Clone + Send + Sync + 'static,
{
    /// Creates a fresh index at `path`, replacing any existing artifact.
    ///
    /// Overwriting is deliberate: the pipeline has no index versioning, and
    /// a rebuild always starts from nothing.
    pub async fn create(path: impl AsRef<Path>, model: &E) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        register_sqlite_vec()?;

        if path.exists() {
            std::fs::remove_file(path)?;
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .await
            .map_err(|err| PipelineError::Storage(err.to_string()))?;
        verify_vec_extension(&conn)
            .await
            .map_err(PipelineError::Storage)?;

        let conn_for_queries = conn.clone();
        let inner = SqliteVectorStore::new(conn, model)
            .await
            .map_err(|err| PipelineError::Storage(err.to_string()))?;

        debug!(path = %path.display(), "created listing index");
        Ok(Self {
            inner,
            conn: conn_for_queries,
            path: path.to_path_buf(),
        })
    }

    /// Opens a previously persisted index.
    ///
    /// Fails with [`PipelineError::IndexNotFound`] when nothing exists at
    /// `path`, and [`PipelineError::CorruptIndex`] when the file is not a
    /// readable index (not a SQLite database, or missing the listings
    /// schema).
    pub async fn open(path: impl AsRef<Path>, model: &E) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        register_sqlite_vec()?;

        if !path.exists() {
            return Err(PipelineError::IndexNotFound(path.to_path_buf()));
        }

        let conn = Connection::open(path)
            .await
            .map_err(|err| PipelineError::CorruptIndex(err.to_string()))?;
        verify_vec_extension(&conn)
            .await
            .map_err(PipelineError::CorruptIndex)?;

        let has_schema = conn
            .call(|conn| {
                let count: i64 = conn
                    .query_row(
                        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'listings'",
                        [],
                        |row| row.get(0),
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(count > 0)
            })
            .await
            .map_err(|err| PipelineError::CorruptIndex(err.to_string()))?;
        if !has_schema {
            return Err(PipelineError::CorruptIndex(
                "listings table is missing".to_string(),
            ));
        }

        let conn_for_queries = conn.clone();
        let inner = SqliteVectorStore::new(conn, model)
            .await
            .map_err(|err| PipelineError::CorruptIndex(err.to_string()))?;

        debug!(path = %path.display(), "opened listing index");
        Ok(Self {
            inner,
            conn: conn_for_queries,
            path: path.to_path_buf(),
        })
    }

    /// Location of the on-disk artifact.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Batch-inserts chunk rows with their embedding vectors.
    pub async fn add_chunks(
        &self,
        documents: Vec<(ListingDocument, Vec<f32>)>,
    ) -> Result<(), PipelineError> {
        if documents.is_empty() {
            return Ok(());
        }
        let mut rows = Vec::with_capacity(documents.len());
        for (doc, embedding) in documents {
            let converted: Vec<f64> = embedding.into_iter().map(f64::from).collect();
            let embed = Embedding {
                document: doc.content.clone(),
                vec: converted,
            };
            rows.push((doc, OneOrMany::one(embed)));
        }
        self.inner
            .add_rows(rows)
            .await
            .map_err(|err| PipelineError::Storage(err.to_string()))?;
        Ok(())
    }

    /// Returns the `top_k` most similar chunks to `query_embedding`.
    ///
    /// Cosine similarity, descending; tie order is implementation-defined.
    /// `top_k < 1` is an [`PipelineError::InvalidArgument`]; a `top_k`
    /// larger than the index is capped, so results have length
    /// `min(top_k, size)`.
    pub async fn search_similar(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(ListingDocument, f32)>, PipelineError> {
        self.search(query_embedding, top_k, None).await
    }

    /// [`search_similar`](Self::search_similar) restricted to one city.
    pub async fn search_similar_in_city(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        city: &str,
    ) -> Result<Vec<(ListingDocument, f32)>, PipelineError> {
        self.search(query_embedding, top_k, Some(city.to_string()))
            .await
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        city: Option<String>,
    ) -> Result<Vec<(ListingDocument, f32)>, PipelineError> {
        if top_k < 1 {
            return Err(PipelineError::InvalidArgument(
                "top_k must be at least 1".to_string(),
            ));
        }

        let size = self.count().await?;
        let limit = top_k.min(size);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let embedding_json = serde_json::to_string(query_embedding)
            .map_err(|err| PipelineError::Storage(err.to_string()))?;

        self.conn
            .call(move |conn| {
                let filter = if city.is_some() { "WHERE c.city = ?2 " } else { "" };
                let sql = format!(
                    "SELECT c.id, c.source, c.city, c.service_type, c.provider, \
                     c.chunk_index, c.content, \
                     vec_distance_cosine(e.embedding, vec_f32(?1)) AS distance \
                     FROM listings c \
                     JOIN listings_embeddings e ON e.rowid = c.rowid \
                     {filter}\
                     ORDER BY distance ASC \
                     LIMIT {limit}"
                );
                let mut stmt = conn.prepare(&sql).map_err(tokio_rusqlite::Error::Rusqlite)?;

                let mut params = vec![embedding_json];
                params.extend(city);

                let rows = stmt
                    .query_map(tokio_rusqlite::params_from_iter(params.iter()), |row| {
                        let doc = ListingDocument {
                            id: row.get(0)?,
                            source: row.get(1)?,
                            city: row.get(2)?,
                            service_type: row.get(3)?,
                            provider: row.get(4)?,
                            chunk_index: row.get::<_, String>(5)?.parse().unwrap_or(0),
                            content: row.get(6)?,
                        };
                        let distance: f32 = row.get(7)?;
                        // Cosine distance to similarity.
                        Ok((doc, 1.0 - distance))
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let mut results = Vec::new();
                for row in rows {
                    results.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(results)
            })
            .await
            .map_err(|err| PipelineError::Storage(err.to_string()))
    }

    /// Total number of stored chunks.
    pub async fn count(&self) -> Result<usize, PipelineError> {
        self.conn
            .call(|conn| {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| PipelineError::Storage(err.to_string()))
    }
}

/// Registers the sqlite-vec extension for every subsequent connection.
///
/// SQLite auto-extensions are process-global, so this runs exactly once.
fn register_sqlite_vec() -> Result<(), PipelineError> {
    static REGISTERED: OnceLock<Result<(), String>> = OnceLock::new();

    REGISTERED
        .get_or_init(|| unsafe {
            type SqliteExtensionInit = unsafe extern "C" fn(
                *mut ffi::sqlite3,
                *mut *mut c_char,
                *const ffi::sqlite3_api_routines,
            ) -> i32;

            let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
            let init_fn: SqliteExtensionInit =
                std::mem::transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
            let rc = ffi::sqlite3_auto_extension(Some(init_fn));
            if rc != ffi::SQLITE_OK {
                Err(format!("failed to register sqlite-vec extension (code {rc})"))
            } else {
                Ok(())
            }
        })
        .clone()
        .map_err(PipelineError::Storage)
}

async fn verify_vec_extension(conn: &Connection) -> Result<(), String> {
    conn.call(|conn| {
        conn.query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0))
            .map_err(tokio_rusqlite::Error::Rusqlite)
    })
    .await
    .map(|_| ())
    .map_err(|err| err.to_string())
}

#[async_trait::async_trait]
impl<E> ListingStore for SqliteListingIndex<E>
where
    E: EmbeddingModel + Clone + Send + Sync + 'static,
{
    async fn insert_chunks(&self, chunks: Vec<ListingChunk>) -> Result<(), PipelineError> {
        let documents: Vec<(ListingDocument, Vec<f32>)> = chunks
            .into_iter()
            .filter_map(|chunk| {
                let embedding = chunk.embedding.clone()?;
                Some((ListingDocument::from(chunk), embedding))
            })
            .collect();
        self.add_chunks(documents).await
    }

    async fn search_similar(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(ListingChunk, f32)>, PipelineError> {
        let rows = Self::search_similar(self, query_embedding, top_k).await?;
        Ok(rows
            .into_iter()
            .map(|(doc, score)| (ListingChunk::from(doc), score))
            .collect())
    }

    async fn search_similar_in_city(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        city: &str,
    ) -> Result<Vec<(ListingChunk, f32)>, PipelineError> {
        let rows = Self::search_similar_in_city(self, query_embedding, top_k, city).await?;
        Ok(rows
            .into_iter()
            .map(|(doc, score)| (ListingChunk::from(doc), score))
            .collect())
    }

    async fn count(&self) -> Result<usize, PipelineError> {
        Self::count(self).await
    }
}
