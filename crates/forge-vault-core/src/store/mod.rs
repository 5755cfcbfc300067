//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the narrow contract the indexer and ranker
//! depend on: add entries, query by vector distance, delete by id, and
//! enumerate everything. The index exclusively owns stored vectors; callers
//! only ever see [`Chunk`]s and distances.
//!
//! Implementations must be `Send + Sync` so one index can be shared between
//! a reindex task and concurrent queries.

pub mod memory;

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, ChunkMeta};

pub use memory::InMemoryIndex;

/// One chunk ready to be stored: text, embedding, and metadata.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
    pub meta: ChunkMeta,
}

impl IndexEntry {
    pub fn to_chunk(&self) -> Chunk {
        Chunk {
            id: self.id.clone(),
            text: self.text.clone(),
            meta: self.meta.clone(),
        }
    }
}

/// Pluggable nearest-neighbour store over chunk embeddings.
///
/// Distances use the cosine convention: `0.0` is identical direction and
/// `2.0` is opposite.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add`](VectorIndex::add) | Store entries, returning their ids |
/// | [`query`](VectorIndex::query) | `k` nearest chunks, closest first |
/// | [`delete`](VectorIndex::delete) | Remove by id, returning the count removed |
/// | [`get_all`](VectorIndex::get_all) | Every stored chunk |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn add(&self, entries: Vec<IndexEntry>) -> Result<Vec<String>>;

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<(Chunk, f32)>>;

    async fn delete(&self, ids: &[String]) -> Result<usize>;

    async fn get_all(&self) -> Result<Vec<Chunk>>;

    /// Content hash and chunk ids per source path.
    ///
    /// The default walks [`get_all`](VectorIndex::get_all); backends with a
    /// cheaper path should override it.
    async fn sources(&self) -> Result<BTreeMap<String, SourceEntry>> {
        let mut out: BTreeMap<String, SourceEntry> = BTreeMap::new();
        for chunk in self.get_all().await? {
            let entry = out
                .entry(chunk.meta.source.clone())
                .or_insert_with(|| SourceEntry {
                    content_hash: chunk.meta.content_hash.clone(),
                    chunk_ids: Vec::new(),
                });
            entry.chunk_ids.push(chunk.id);
        }
        Ok(out)
    }

    /// Number of stored chunks.
    async fn count(&self) -> Result<usize> {
        Ok(self.get_all().await?.len())
    }
}

/// What the index holds for one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEntry {
    pub content_hash: String,
    pub chunk_ids: Vec<String>,
}

/// Sort chunks by `(source, chunk_index)`.
pub fn sort_chunks(chunks: &mut [Chunk]) {
    chunks.sort_by(|a, b| {
        a.meta
            .source
            .cmp(&b.meta.source)
            .then(a.meta.chunk_index.cmp(&b.meta.chunk_index))
    });
}
