//! In-memory [`VectorIndex`] for tests and embedded use.
//!
//! Entries live in a `Vec` behind a `std::sync::RwLock`; queries are a
//! brute-force cosine scan.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::models::Chunk;

use super::{sort_chunks, IndexEntry, VectorIndex};

/// In-memory vector index.
#[derive(Default)]
pub struct InMemoryIndex {
    entries: RwLock<Vec<IndexEntry>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory index lock poisoned")
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn add(&self, entries: Vec<IndexEntry>) -> Result<Vec<String>> {
        let ids = entries.iter().map(|e| e.id.clone()).collect();
        let mut guard = self.entries.write().map_err(poisoned)?;
        for entry in entries {
            guard.retain(|e| e.id != entry.id);
            guard.push(entry);
        }
        Ok(ids)
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<(Chunk, f32)>> {
        let guard = self.entries.read().map_err(poisoned)?;
        let mut scored: Vec<(&IndexEntry, f32)> = guard
            .iter()
            .map(|e| (e, cosine_distance(vector, &e.vector)))
            .collect();
        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.meta.source.cmp(&b.0.meta.source))
                .then_with(|| a.0.meta.chunk_index.cmp(&b.0.meta.chunk_index))
        });
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(e, d)| (e.to_chunk(), d))
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        let mut guard = self.entries.write().map_err(poisoned)?;
        let before = guard.len();
        guard.retain(|e| !ids.contains(&e.id));
        Ok(before - guard.len())
    }

    async fn get_all(&self) -> Result<Vec<Chunk>> {
        let guard = self.entries.read().map_err(poisoned)?;
        let mut chunks: Vec<Chunk> = guard.iter().map(IndexEntry::to_chunk).collect();
        sort_chunks(&mut chunks);
        Ok(chunks)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().map_err(poisoned)?.len())
    }
}
