//! Vault document loader.
//!
//! Walks the vault root with `walkdir`, filters files through include and
//! exclude glob sets, and turns each note into a [`Document`] with parsed
//! front-matter and a SHA-256 content hash.
//!
//! Nothing in here aborts a scan because of one bad file: unreadable files
//! and invalid UTF-8 are logged and recorded in [`LoadReport::skipped`],
//! malformed front-matter is logged and the whole file becomes the body.

use anyhow::{bail, Result};
use forge_vault_core::frontmatter::parse_front_matter;
use forge_vault_core::Document;
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::VaultConfig;

/// Directories never indexed, whatever the configured globs say.
const DEFAULT_EXCLUDES: &[&str] = &[
    "**/.git/**",
    "**/.obsidian/**",
    "**/.trash/**",
    "**/node_modules/**",
];

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub follow_symlinks: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            include_globs: vec!["**/*.md".to_string()],
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

impl From<&VaultConfig> for LoadOptions {
    fn from(vault: &VaultConfig) -> Self {
        Self {
            include_globs: vault.include_globs.clone(),
            exclude_globs: vault.exclude_globs.clone(),
            follow_symlinks: vault.follow_symlinks,
        }
    }
}

/// A file the loader matched but could not read.
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    /// Loaded notes, sorted by relative path.
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedFile>,
}

/// Load every matching note under `root`.
///
/// Fails only when `root` is not a directory or a glob pattern is invalid.
pub fn load_directory(root: &Path, opts: &LoadOptions) -> Result<LoadReport> {
    if !root.is_dir() {
        bail!("vault root is not a directory: {}", root.display());
    }

    let include_set = build_globset(&opts.include_globs)?;
    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(opts.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut report = LoadReport::default();

    let walker = WalkDir::new(root).follow_links(opts.follow_symlinks);
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let rel_str = relative_path(root, path);

        // Apply exclude patterns
        if exclude_set.is_match(&rel_str) {
            continue;
        }

        // Apply include patterns
        if !include_set.is_match(&rel_str) {
            continue;
        }

        if is_hidden_or_temp(path) {
            debug!(path = %rel_str, "skipping hidden or temporary file");
            continue;
        }

        match load_file(path, &rel_str) {
            Ok(doc) => report.documents.push(doc),
            Err(e) => {
                warn!(path = %rel_str, error = %format!("{e:#}"), "skipping unreadable file");
                report.skipped.push(SkippedFile {
                    path: path.to_path_buf(),
                    reason: format!("{e:#}"),
                });
            }
        }
    }

    // Sort for deterministic ordering
    report.documents.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

    debug!(
        documents = report.documents.len(),
        skipped = report.skipped.len(),
        "vault scan complete"
    );
    Ok(report)
}

/// Read one note from disk.
pub fn load_file(path: &Path, rel_path: &str) -> Result<Document> {
    let bytes = std::fs::read(path)?;
    let raw = String::from_utf8(bytes)
        .map_err(|_| anyhow::anyhow!("file is not valid UTF-8: {}", path.display()))?;

    let modified = std::fs::metadata(path)?
        .modified()
        .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;

    let parsed = parse_front_matter(&raw);
    if let Some(err) = &parsed.error {
        warn!(path = %rel_path, error = %err, "invalid front-matter, indexing whole file as body");
    }

    let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

    Ok(Document {
        path: absolute,
        rel_path: rel_path.to_string(),
        body: parsed.body,
        metadata: parsed.metadata,
        modified,
        content_hash: content_hash(&raw),
    })
}

/// Hex SHA-256 of the raw file text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.to_string_lossy().replace('\\', "/")
}

fn is_hidden_or_temp(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    name.starts_with('.') || name.starts_with('~') || name.ends_with(".tmp")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
