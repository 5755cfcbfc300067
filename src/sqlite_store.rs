//! SQLite-backed [`VectorIndex`].
//!
//! Chunks live in a single `chunks` table with their metadata serialized as
//! JSON and their vector stored as a little-endian `f32` BLOB. Queries are
//! a brute-force cosine scan, which is plenty for a personal vault of a few
//! thousand notes.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use forge_vault_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use forge_vault_core::store::{IndexEntry, SourceEntry, VectorIndex};
use forge_vault_core::{Chunk, ChunkMeta};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// Vector index persisted in the Forge Vault SQLite database.
#[derive(Clone)]
pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    /// Wrap a pool whose schema has already been migrated.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_chunk(row: &SqliteRow) -> Result<Chunk> {
    let id: String = row.get("id");
    let metadata_json: String = row.get("metadata_json");
    let meta: ChunkMeta = serde_json::from_str(&metadata_json)
        .with_context(|| format!("corrupt metadata for chunk {id}"))?;
    Ok(Chunk {
        id,
        text: row.get("text"),
        meta,
    })
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn add(&self, entries: Vec<IndexEntry>) -> Result<Vec<String>> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(entries.len());

        for entry in entries {
            let metadata_json = serde_json::to_string(&entry.meta)?;
            sqlx::query(
                r#"
                INSERT INTO chunks (id, source, chunk_index, content_hash, text, metadata_json, dims, vector, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    source = excluded.source,
                    chunk_index = excluded.chunk_index,
                    content_hash = excluded.content_hash,
                    text = excluded.text,
                    metadata_json = excluded.metadata_json,
                    dims = excluded.dims,
                    vector = excluded.vector,
                    created_at = excluded.created_at
                "#,
            )
            .bind(&entry.id)
            .bind(&entry.meta.source)
            .bind(entry.meta.chunk_index as i64)
            .bind(&entry.meta.content_hash)
            .bind(&entry.text)
            .bind(&metadata_json)
            .bind(entry.vector.len() as i64)
            .bind(vec_to_blob(&entry.vector))
            .bind(now)
            .execute(&mut *tx)
            .await?;
            ids.push(entry.id);
        }

        tx.commit().await?;
        Ok(ids)
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<(Chunk, f32)>> {
        let rows = sqlx::query(
            "SELECT id, source, chunk_index, text, metadata_json, dims, vector FROM chunks",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<(Chunk, f32)> = Vec::with_capacity(rows.len());
        let mut mismatched = 0usize;
        for row in &rows {
            let dims: i64 = row.get("dims");
            if dims as usize != vector.len() {
                mismatched += 1;
                continue;
            }
            let blob: Vec<u8> = row.get("vector");
            let distance = cosine_distance(vector, &blob_to_vec(&blob));
            scored.push((row_to_chunk(row)?, distance));
        }
        if mismatched > 0 {
            debug!(mismatched, "ignored chunks embedded with different dimensions");
        }

        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.meta.source.cmp(&b.0.meta.source))
                .then_with(|| a.0.meta.chunk_index.cmp(&b.0.meta.chunk_index))
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0u64;
        for id in ids {
            removed += sqlx::query("DELETE FROM chunks WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(removed as usize)
    }

    async fn get_all(&self) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            "SELECT id, text, metadata_json FROM chunks ORDER BY source, chunk_index",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_chunk).collect()
    }

    async fn sources(&self) -> Result<BTreeMap<String, SourceEntry>> {
        let rows = sqlx::query(
            "SELECT id, source, content_hash FROM chunks ORDER BY source, chunk_index",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out: BTreeMap<String, SourceEntry> = BTreeMap::new();
        for row in rows {
            let source: String = row.get("source");
            let entry = out.entry(source).or_insert_with(|| SourceEntry {
                content_hash: row.get("content_hash"),
                chunk_ids: Vec::new(),
            });
            entry.chunk_ids.push(row.get("id"));
        }
        Ok(out)
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
