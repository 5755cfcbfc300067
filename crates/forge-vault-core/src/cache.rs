//! Time-bounded cache of vault-wide metadata.
//!
//! Structural queries ("how many projects do I have") need an overview of
//! the whole vault, which means enumerating the index. [`MetadataCache`]
//! keeps the last [`VaultOverview`] for a fixed TTL. The cache is an
//! ordinary value owned by its caller, and time comes from an injected
//! [`Clock`] so expiry is testable.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::chunk::{is_checklist_line, is_open_task};
use crate::folder::FolderType;
use crate::frontmatter::split_list;
use crate::models::Chunk;
use crate::store::VectorIndex;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Summary statistics for the indexed vault.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VaultOverview {
    pub files: usize,
    pub chunks: usize,
    pub by_folder: BTreeMap<FolderType, usize>,
    /// Most frequent tags with file counts, most frequent first.
    pub top_tags: Vec<(String, usize)>,
    pub open_tasks: usize,
    pub completed_tasks: usize,
}

const TOP_TAGS: usize = 10;

impl VaultOverview {
    /// Build an overview from every chunk in the index.
    ///
    /// Checklist lines are counted once per file even when chunk overlap
    /// repeats them.
    pub fn from_chunks(chunks: &[Chunk]) -> Self {
        let mut by_source: BTreeMap<&str, Vec<&Chunk>> = BTreeMap::new();
        for c in chunks {
            by_source.entry(c.meta.source.as_str()).or_default().push(c);
        }

        let mut overview = VaultOverview {
            files: by_source.len(),
            chunks: chunks.len(),
            ..Default::default()
        };
        let mut tag_counts: HashMap<String, usize> = HashMap::new();

        for file_chunks in by_source.values() {
            let Some(first) = file_chunks.iter().min_by_key(|c| c.meta.chunk_index) else {
                continue;
            };
            *overview.by_folder.entry(first.folder_type()).or_default() += 1;

            if let Some(tags) = first.meta.front.get("tags") {
                for tag in split_list(tags).into_iter().collect::<BTreeSet<_>>() {
                    *tag_counts.entry(tag).or_default() += 1;
                }
            }

            let lines: BTreeSet<&str> = file_chunks
                .iter()
                .flat_map(|c| c.body().lines())
                .map(str::trim)
                .filter(|l| is_checklist_line(l))
                .collect();
            for line in lines {
                if is_open_task(line) {
                    overview.open_tasks += 1;
                } else {
                    overview.completed_tasks += 1;
                }
            }
        }

        let mut tags: Vec<(String, usize)> = tag_counts.into_iter().collect();
        tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        tags.truncate(TOP_TAGS);
        overview.top_tags = tags;
        overview
    }

    pub fn folder_count(&self, folder: FolderType) -> usize {
        self.by_folder.get(&folder).copied().unwrap_or(0)
    }
}

/// Holds one [`VaultOverview`] for at most `ttl`.
pub struct MetadataCache<C: Clock = SystemClock> {
    clock: C,
    ttl: Duration,
    entry: Option<(DateTime<Utc>, VaultOverview)>,
}

impl<C: Clock> MetadataCache<C> {
    pub fn new(clock: C, ttl: Duration) -> Self {
        Self {
            clock,
            ttl,
            entry: None,
        }
    }

    /// The cached overview, if it has not expired.
    pub fn get(&self) -> Option<&VaultOverview> {
        let (stored_at, overview) = self.entry.as_ref()?;
        let fresh = (self.clock.now() - *stored_at)
            .to_std()
            .map(|elapsed| elapsed < self.ttl)
            .unwrap_or(true);
        fresh.then_some(overview)
    }

    pub fn insert(&mut self, overview: VaultOverview) {
        self.entry = Some((self.clock.now(), overview));
    }

    /// Drop the cached value, e.g. after a reindex.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    /// Return the cached overview or rebuild it from `index`.
    pub async fn get_or_refresh(&mut self, index: &dyn VectorIndex) -> anyhow::Result<VaultOverview> {
        if let Some(overview) = self.get() {
            return Ok(overview.clone());
        }
        let chunks = index.get_all().await?;
        let overview = VaultOverview::from_chunks(&chunks);
        tracing::debug!(files = overview.files, chunks = overview.chunks, "vault overview refreshed");
        self.insert(overview.clone());
        Ok(overview)
    }
}
