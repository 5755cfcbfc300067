//! Core data models used throughout Forge Vault.
//!
//! These types represent the notes, chunks, and scored results that flow
//! through the indexing and retrieval pipeline.

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::folder::{detect_folder_type, FolderType};

/// Front-matter metadata with every value normalized to a scalar string.
///
/// A `BTreeMap` keeps iteration order stable, which matters for
/// deterministic scoring and serialization.
pub type Metadata = BTreeMap<String, String>;

/// A markdown note loaded from the vault.
#[derive(Debug, Clone)]
pub struct Document {
    /// Absolute path of the source file (unique key).
    pub path: PathBuf,
    /// Path relative to the vault root, `/`-separated.
    pub rel_path: String,
    /// Body text with the front-matter block removed.
    pub body: String,
    /// Normalized front-matter.
    pub metadata: Metadata,
    /// Filesystem modification time (unix seconds).
    pub modified: i64,
    /// SHA-256 of the raw file text, used for change detection.
    pub content_hash: String,
}

impl Document {
    /// File name including extension (`Omada Controller.md`).
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.rel_path.clone())
    }

    /// File name without extension (`Omada Controller`).
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Source path as a string, as stored in chunk metadata.
    pub fn source(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    /// Folder-type classification from the relative path and body, falling
    /// back to the front-matter `type` field.
    pub fn folder_type(&self) -> FolderType {
        match detect_folder_type(&self.rel_path, &self.body) {
            FolderType::General => self
                .metadata
                .get("type")
                .map(|t| FolderType::from_doc_type(t))
                .unwrap_or(FolderType::General),
            detected => detected,
        }
    }
}

/// Metadata stored alongside every chunk in the vector index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMeta {
    /// Absolute source path of the owning document.
    pub source: String,
    /// Path relative to the vault root.
    pub rel_path: String,
    /// File name including extension.
    pub file_name: String,
    /// Position of this chunk within its document (0-based, contiguous).
    pub chunk_index: usize,
    /// Nearest preceding markdown heading, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Modification time of the owning document (unix seconds).
    pub modified: i64,
    /// Content hash of the owning document.
    pub content_hash: String,
    /// The owning document's full front-matter.
    #[serde(default)]
    pub front: Metadata,
    /// Byte range of the document body this chunk was cut from.
    #[serde(default)]
    pub span: Range<usize>,
    /// Folder type of the owning document, fixed when it was chunked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_type: Option<FolderType>,
}

impl ChunkMeta {
    /// File stem (file name without its extension).
    pub fn stem(&self) -> &str {
        match self.file_name.rfind('.') {
            Some(pos) if pos > 0 => &self.file_name[..pos],
            _ => &self.file_name,
        }
    }

    /// Front-matter `type`, lowercased.
    pub fn doc_type(&self) -> Option<String> {
        self.front.get("type").map(|t| t.trim().to_lowercase())
    }

    /// `text` without the leading `[stem] ` added at index time.
    pub fn strip_stem_prefix<'a>(&self, text: &'a str) -> &'a str {
        text.strip_prefix('[')
            .and_then(|rest| rest.strip_prefix(self.stem()))
            .and_then(|rest| rest.strip_prefix("] "))
            .unwrap_or(text)
    }
}

/// A chunk of a document's body text.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Opaque identifier used for deletion.
    pub id: String,
    /// Chunk content. Once indexed this carries the `[stem] ` prefix.
    pub text: String,
    /// Inherited document metadata.
    pub meta: ChunkMeta,
}

impl Chunk {
    /// Chunk text without the `[stem] ` prefix.
    pub fn body(&self) -> &str {
        self.meta.strip_stem_prefix(&self.text)
    }

    /// Folder type of the chunk's source document.
    ///
    /// Chunks written before the document type was recorded fall back to
    /// classifying the path and the chunk body.
    pub fn folder_type(&self) -> FolderType {
        if let Some(folder) = self.meta.folder_type {
            return folder;
        }
        match detect_folder_type(&self.meta.rel_path, self.body()) {
            FolderType::General => self
                .meta
                .front
                .get("type")
                .map(|t| FolderType::from_doc_type(t))
                .unwrap_or(FolderType::General),
            detected => detected,
        }
    }
}

/// Per-signal score components for a ranked chunk.
///
/// Every component is non-negative; [`total`](ScoreBreakdown::total) is
/// their sum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub semantic: f64,
    pub keyword: f64,
    pub path: f64,
    pub recency: f64,
    pub frontmatter: f64,
    pub task: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.semantic + self.keyword + self.path + self.recency + self.frontmatter + self.task
    }
}

/// A ranked chunk returned from [`HybridRanker::rank`](crate::rank::HybridRanker::rank).
#[derive(Debug, Clone, Serialize)]
pub struct ScoredResult {
    /// Chunk identifier.
    pub chunk_id: String,
    /// Composite relevance score (sum of `components`).
    pub score: f64,
    /// Score breakdown for diagnostics.
    pub components: ScoreBreakdown,
    /// Display excerpt, truncated to the configured length.
    pub content: String,
    /// Untruncated chunk text.
    pub full_content: String,
    /// File name of the source document.
    pub filename: String,
    /// Absolute source path.
    pub source_path: String,
    /// Folder-type classification of the source.
    pub folder_type: FolderType,
    /// Inherited chunk metadata.
    #[serde(skip)]
    pub meta: ChunkMeta,
    /// `[Source: <filename>]`.
    pub citation: String,
}

impl ScoredResult {
    /// Untruncated chunk text without the `[stem] ` prefix.
    pub fn body(&self) -> &str {
        self.meta.strip_stem_prefix(&self.full_content)
    }
}
