//! Incremental indexing pipeline.
//!
//! Coordinates the full flow: load → chunk → embed → store. Files are
//! compared against the index by SHA-256 content hash so an unchanged vault
//! costs one directory walk and no embedding calls.
//!
//! # Write discipline
//!
//! Reindex runs are serialized by a writer [`Mutex`]. For each changed file
//! the fresh chunks are embedded first; only then are the file's old chunks
//! deleted and the new ones inserted, back to back. An embedding failure
//! therefore leaves the previous chunks in place. Queries never take the
//! writer lock and may briefly miss a file that is mid-replacement.
//!
//! A [`ReindexMode::Full`] run clears every stored chunk before embedding,
//! so a file that fails to embed during a full run has no chunks afterwards.
//!
//! # Cancellation
//!
//! The [`CancellationToken`] is checked between files. A cancelled run
//! returns the partial [`IndexReport`] with `cancelled = true`.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use forge_vault_core::chunk::{chunk_document, ChunkingParams};
use forge_vault_core::embedding::Embedder;
use forge_vault_core::error::Result;
use forge_vault_core::store::{IndexEntry, SourceEntry, VectorIndex};
use forge_vault_core::{Document, RagError};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::loader::{load_directory, LoadOptions};
use crate::progress::{IndexProgressEvent, NoProgress, ProgressMode, ProgressReporter};
use crate::rag::VaultRag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReindexMode {
    /// Drop every stored chunk, then embed the whole vault.
    Full,
    /// Re-embed only new and changed files.
    Incremental,
}

/// Outcome of one reindex run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexReport {
    pub files_scanned: usize,
    pub files_indexed: usize,
    pub files_unchanged: usize,
    pub files_skipped: usize,
    pub files_removed: usize,
    pub chunks_written: usize,
    pub chunks_removed: usize,
    pub warnings: Vec<String>,
    pub cancelled: bool,
}

/// Keeps a [`VectorIndex`] in sync with a vault directory.
pub struct Indexer {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    load_opts: LoadOptions,
    chunking: ChunkingParams,
    progress: Box<dyn ProgressReporter>,
    writer: Mutex<()>,
}

impl Indexer {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        load_opts: LoadOptions,
        chunking: ChunkingParams,
    ) -> Self {
        Self {
            index,
            embedder,
            load_opts,
            chunking,
            progress: Box::new(NoProgress),
            writer: Mutex::new(()),
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Bring the index in line with the notes under `root`.
    ///
    /// Per-file failures are recorded in [`IndexReport::warnings`]; only an
    /// invalid root or a failing index backend abort the run.
    pub async fn reindex(
        &self,
        root: &Path,
        mode: ReindexMode,
        cancel: &CancellationToken,
    ) -> Result<IndexReport> {
        let _writer = self.writer.lock().await;

        if !root.is_dir() {
            return Err(RagError::InvalidRoot(root.display().to_string()));
        }

        self.progress.report(IndexProgressEvent::Scanning);
        let loaded = load_directory(root, &self.load_opts)
            .map_err(|e| RagError::InvalidRoot(format!("{e:#}")))?;

        let mut report = IndexReport {
            files_scanned: loaded.documents.len() + loaded.skipped.len(),
            ..Default::default()
        };

        // Unreadable files keep whatever the index already holds for them
        let mut on_disk: HashSet<String> = HashSet::new();
        for skipped in &loaded.skipped {
            report.files_skipped += 1;
            report
                .warnings
                .push(format!("{}: {}", skipped.path.display(), skipped.reason));
            let path = skipped
                .path
                .canonicalize()
                .unwrap_or_else(|_| skipped.path.clone());
            on_disk.insert(path.to_string_lossy().to_string());
        }
        on_disk.extend(loaded.documents.iter().map(Document::source));

        let mut stored = self.index.sources().await.map_err(RagError::index)?;
        self.remove_missing(&stored, &on_disk, &mut report).await?;
        if mode == ReindexMode::Full {
            self.purge(&stored, &on_disk, &mut report).await?;
            stored.clear();
        }

        let total = loaded.documents.len() as u64;
        for (i, doc) in loaded.documents.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(processed = i, total, "reindex cancelled");
                report.cancelled = true;
                break;
            }
            self.progress.report(IndexProgressEvent::Indexing {
                n: i as u64 + 1,
                total,
            });

            let previous = stored.get(&doc.source());
            if mode == ReindexMode::Incremental
                && previous.is_some_and(|p| p.content_hash == doc.content_hash)
            {
                report.files_unchanged += 1;
                continue;
            }

            self.index_document(doc, previous, &mut report).await?;
        }

        info!(
            scanned = report.files_scanned,
            indexed = report.files_indexed,
            unchanged = report.files_unchanged,
            skipped = report.files_skipped,
            removed = report.files_removed,
            chunks = report.chunks_written,
            cancelled = report.cancelled,
            "reindex complete"
        );
        Ok(report)
    }

    async fn remove_missing(
        &self,
        stored: &BTreeMap<String, SourceEntry>,
        on_disk: &HashSet<String>,
        report: &mut IndexReport,
    ) -> Result<()> {
        for (source, entry) in stored {
            if on_disk.contains(source) {
                continue;
            }
            let removed = self
                .index
                .delete(&entry.chunk_ids)
                .await
                .map_err(RagError::index)?;
            debug!(source = %source, removed, "removed chunks of deleted file");
            report.files_removed += 1;
            report.chunks_removed += removed;
        }
        Ok(())
    }

    async fn purge(
        &self,
        stored: &BTreeMap<String, SourceEntry>,
        on_disk: &HashSet<String>,
        report: &mut IndexReport,
    ) -> Result<()> {
        let ids: Vec<String> = stored
            .iter()
            .filter(|(source, _)| on_disk.contains(*source))
            .flat_map(|(_, entry)| entry.chunk_ids.iter().cloned())
            .collect();
        if ids.is_empty() {
            return Ok(());
        }
        let removed = self.index.delete(&ids).await.map_err(RagError::index)?;
        debug!(removed, "full reindex cleared existing chunks");
        report.chunks_removed += removed;
        Ok(())
    }

    async fn index_document(
        &self,
        doc: &Document,
        previous: Option<&SourceEntry>,
        report: &mut IndexReport,
    ) -> Result<()> {
        let chunks = chunk_document(doc, &self.chunking);
        let stem = doc.stem();
        let texts: Vec<String> = chunks
            .iter()
            .map(|c| format!("[{}] {}", stem, c.text))
            .collect();

        let vectors = match self.embedder.embed(&texts).await {
            Ok(v) if v.len() == texts.len() => v,
            Ok(v) => {
                self.skip(
                    doc,
                    format!("embedder returned {} vectors for {} chunks", v.len(), texts.len()),
                    report,
                );
                return Ok(());
            }
            Err(e) => {
                let reason = match e.downcast_ref::<RagError>() {
                    Some(rag) => rag.to_string(),
                    None => RagError::embedding(&e).to_string(),
                };
                self.skip(doc, reason, report);
                return Ok(());
            }
        };

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(texts)
            .zip(vectors)
            .map(|((chunk, text), vector)| IndexEntry {
                id: chunk.id,
                text,
                vector,
                meta: chunk.meta,
            })
            .collect();
        let written = entries.len();

        if let Some(prev) = previous {
            report.chunks_removed += self
                .index
                .delete(&prev.chunk_ids)
                .await
                .map_err(RagError::index)?;
        }
        self.index.add(entries).await.map_err(RagError::index)?;

        debug!(path = %doc.rel_path, chunks = written, "indexed");
        report.files_indexed += 1;
        report.chunks_written += written;
        Ok(())
    }

    fn skip(&self, doc: &Document, reason: String, report: &mut IndexReport) {
        warn!(path = %doc.rel_path, reason = %reason, "skipping file, previous chunks kept");
        report.files_skipped += 1;
        report.warnings.push(format!("{}: {}", doc.rel_path, reason));
    }
}

/// Run the index command and print a summary.
pub async fn run_index(
    config: &Config,
    full: bool,
    progress: ProgressMode,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let rag = VaultRag::open_with_progress(config, progress.reporter()).await?;
    let mode = if full {
        ReindexMode::Full
    } else {
        ReindexMode::Incremental
    };
    let report = rag.reindex(mode, &cancel).await?;

    println!("index {}", config.vault.root.display());
    println!("  files scanned:   {}", report.files_scanned);
    println!("  files indexed:   {}", report.files_indexed);
    println!("  files unchanged: {}", report.files_unchanged);
    println!("  files skipped:   {}", report.files_skipped);
    println!("  files removed:   {}", report.files_removed);
    println!("  chunks written:  {}", report.chunks_written);
    println!("  chunks removed:  {}", report.chunks_removed);
    for warning in &report.warnings {
        println!("  warning: {}", warning);
    }
    if report.cancelled {
        println!("cancelled");
    } else {
        println!("ok");
    }
    Ok(())
}
