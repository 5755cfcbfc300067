//! The `VaultRag` facade.
//!
//! Ties one vector index and one embedder to the indexer, the hybrid
//! ranker, the query classifier and context assembly. The CLI talks to a
//! vault only through this type; tests build it over [`InMemoryIndex`]
//! with a [`HashEmbedder`].
//!
//! [`InMemoryIndex`]: forge_vault_core::store::InMemoryIndex
//! [`HashEmbedder`]: forge_vault_core::embedding::HashEmbedder

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use forge_vault_core::cache::{MetadataCache, SystemClock, VaultOverview};
use forge_vault_core::context::{assemble_context, ContextParams};
use forge_vault_core::embedding::Embedder;
use forge_vault_core::error::Result;
use forge_vault_core::folder::FolderType;
use forge_vault_core::rank::HybridRanker;
use forge_vault_core::store::VectorIndex;
use forge_vault_core::strategy::{classify_query, QueryIntent, QueryStrategy};
use forge_vault_core::{Metadata, RagError, ScoredResult};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{Config, RetrievalConfig};
use crate::embedding::create_embedder;
use crate::indexer::{IndexReport, Indexer, ReindexMode};
use crate::loader::LoadOptions;
use crate::progress::ProgressReporter;
use crate::sqlite_store::SqliteIndex;
use crate::{db, migrate};

/// Characters of first-chunk text shown by [`VaultRag::browse`].
const PREVIEW_CHARS: usize = 200;
/// Candidates considered when checking a claim against one file.
const VERIFY_K: usize = 10;

/// One indexed file, as listed by [`VaultRag::browse`].
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub filename: String,
    pub source_path: String,
    pub rel_path: String,
    pub folder_type: FolderType,
    pub chunks: usize,
    pub metadata: Metadata,
    pub preview: String,
}

/// Evidence for or against a claim about one file.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimVerification {
    pub found: bool,
    /// The file name the claim was checked against.
    pub source: String,
    pub excerpt: Option<String>,
    /// Score of the best matching chunk from the file, `0.0` when none.
    pub confidence: f64,
}

pub struct VaultRag {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    indexer: Indexer,
    ranker: HybridRanker,
    root: PathBuf,
    retrieval: RetrievalConfig,
    context: ContextParams,
    cache: Mutex<MetadataCache<SystemClock>>,
}

impl VaultRag {
    pub fn new(config: &Config, index: Arc<dyn VectorIndex>, embedder: Arc<dyn Embedder>) -> Self {
        let indexer = Indexer::new(
            Arc::clone(&index),
            Arc::clone(&embedder),
            LoadOptions::from(&config.vault),
            config.chunking.clone(),
        );
        Self {
            index,
            embedder,
            indexer,
            ranker: HybridRanker::new(config.ranking.clone()),
            root: config.vault.root.clone(),
            retrieval: config.retrieval.clone(),
            context: config.context.clone(),
            cache: Mutex::new(MetadataCache::new(
                SystemClock,
                Duration::from_secs(config.context.metadata_ttl_secs),
            )),
        }
    }

    /// Open the SQLite index and embedder described by `config`.
    ///
    /// Fails when the database has not been initialized with `forge init`.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(config).await?;
        if !migrate::is_initialized(&pool)
            .await
            .context("failed to inspect database")?
        {
            return Err(RagError::IndexUnavailable(format!(
                "database {} is not initialized (run `forge init`)",
                config.db.path.display()
            ))
            .into());
        }
        let embedder = create_embedder(&config.embedding)?;
        Ok(Self::new(config, Arc::new(SqliteIndex::new(pool)), embedder))
    }

    pub async fn open_with_progress(
        config: &Config,
        progress: Box<dyn ProgressReporter>,
    ) -> anyhow::Result<Self> {
        let mut rag = Self::open(config).await?;
        rag.indexer = rag.indexer.with_progress(progress);
        Ok(rag)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Reindex the configured vault root and drop the cached overview.
    pub async fn reindex(&self, mode: ReindexMode, cancel: &CancellationToken) -> Result<IndexReport> {
        let report = self.indexer.reindex(&self.root, mode, cancel).await?;
        self.cache.lock().await.invalidate();
        Ok(report)
    }

    pub fn classify_query(&self, query: &str) -> QueryStrategy {
        classify_query(query)
    }

    /// Ranked results for `query`, using the configured defaults for
    /// anything left as `None`.
    pub async fn search(
        &self,
        query: &str,
        k: Option<usize>,
        boost_inventory: Option<bool>,
    ) -> Result<Vec<ScoredResult>> {
        self.search_at(query, k, boost_inventory, Utc::now()).await
    }

    /// [`search`](Self::search) with an explicit "now" for recency scoring.
    pub async fn search_at(
        &self,
        query: &str,
        k: Option<usize>,
        boost_inventory: Option<bool>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScoredResult>> {
        let k = k.unwrap_or(self.retrieval.final_limit);
        let boost = boost_inventory.unwrap_or(self.retrieval.boost_inventory);
        self.ranker
            .rank(self.index.as_ref(), self.embedder.as_ref(), query, k, boost, now)
            .await
    }

    /// Vault overview, served from the metadata cache while fresh.
    pub async fn overview(&self) -> Result<VaultOverview> {
        self.cache
            .lock()
            .await
            .get_or_refresh(self.index.as_ref())
            .await
            .map_err(RagError::index)
    }

    /// Retrieve and assemble the context block for `query`.
    pub async fn build_context(&self, query: &str, k: Option<usize>) -> Result<String> {
        let strategy = classify_query(query);
        let results = self.search(query, k, None).await?;
        let overview = if strategy.active_intents().contains(&QueryIntent::Structural) {
            Some(self.overview().await?)
        } else {
            None
        };
        debug!(
            intent = %strategy.primary,
            results = results.len(),
            overview = overview.is_some(),
            "assembling context"
        );
        Ok(assemble_context(
            query,
            &results,
            &strategy,
            overview.as_ref(),
            &self.context,
        ))
    }

    /// Every indexed file once, ordered by relative path.
    pub async fn browse(&self) -> Result<Vec<DocumentSummary>> {
        let chunks = self.index.get_all().await.map_err(RagError::index)?;

        let mut by_source: BTreeMap<String, DocumentSummary> = BTreeMap::new();
        let mut first_index: BTreeMap<String, usize> = BTreeMap::new();
        for chunk in chunks {
            let source = chunk.meta.source.clone();
            let is_first = first_index
                .get(&source)
                .map_or(true, |i| chunk.meta.chunk_index < *i);
            let summary = by_source.entry(source.clone()).or_insert_with(|| DocumentSummary {
                filename: chunk.meta.file_name.clone(),
                source_path: source.clone(),
                rel_path: chunk.meta.rel_path.clone(),
                folder_type: FolderType::General,
                chunks: 0,
                metadata: chunk.meta.front.clone(),
                preview: String::new(),
            });
            summary.chunks += 1;
            if is_first {
                first_index.insert(source, chunk.meta.chunk_index);
                summary.folder_type = chunk.folder_type();
                summary.preview = preview(chunk.body());
            }
        }

        let mut docs: Vec<DocumentSummary> = by_source.into_values().collect();
        docs.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        Ok(docs)
    }

    /// Look for support for `claim` inside the file named `filename`.
    ///
    /// `filename` matches a file name with or without its extension, or a
    /// relative path.
    pub async fn verify_claim(&self, filename: &str, claim: &str) -> Result<ClaimVerification> {
        let query = format!("{} {}", claim, filename);
        let results = self.search(&query, Some(VERIFY_K), None).await?;

        let best = results
            .iter()
            .filter(|r| matches_file(r, filename))
            .max_by(|a, b| a.score.total_cmp(&b.score));

        Ok(match best {
            Some(r) => ClaimVerification {
                found: true,
                source: filename.to_string(),
                excerpt: Some(r.content.clone()),
                confidence: r.score,
            },
            None => ClaimVerification {
                found: false,
                source: filename.to_string(),
                excerpt: None,
                confidence: 0.0,
            },
        })
    }
}

fn matches_file(result: &ScoredResult, filename: &str) -> bool {
    let wanted = filename.trim().to_lowercase();
    let name = result.filename.to_lowercase();
    let rel = result.meta.rel_path.to_lowercase();
    name == wanted || result.meta.stem().to_lowercase() == wanted || rel == wanted
}

fn preview(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() > PREVIEW_CHARS {
        let cut: String = trimmed.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        trimmed.to_string()
    }
}
