//! Library-level pipeline tests: load → chunk → embed → index → rank.
//!
//! Everything runs against `InMemoryIndex` and the hashing embedder over
//! throwaway vaults, so no network or database is involved.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use forge_vault::config::Config;
use forge_vault::{ReindexMode, VaultRag};
use forge_vault_core::embedding::{Embedder, HashEmbedder};
use forge_vault_core::folder::FolderType;
use forge_vault_core::store::{InMemoryIndex, VectorIndex};
use forge_vault_core::RagError;
use tokio_util::sync::CancellationToken;

const DIMS: usize = 512;

struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        bail!("connection refused")
    }
}

fn config_for(root: &Path) -> Config {
    toml::from_str(&format!(
        r#"
[db]
path = 'unused.sqlite'

[vault]
root = '{}'

[embedding]
provider = "hash"
dims = {}
"#,
        root.display(),
        DIMS
    ))
    .unwrap()
}

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn seed_vault(root: &Path) {
    write(root, "2025-09-17.md", "- [ ] buy milk\n- [x] call dentist\n");
    write(
        root,
        "Hardware/NAS.md",
        "---\ntype: hardware\nstatus: operational\n---\nSynology storage box running RAID 5 with 4 drives.\n",
    );
    write(
        root,
        "Services/Omada.md",
        "# Omada\n\nController for the switch and access points.\n",
    );
}

fn rag_with(root: &Path, index: Arc<InMemoryIndex>, embedder: Arc<dyn Embedder>) -> VaultRag {
    VaultRag::new(&config_for(root), index, embedder)
}

fn hash_rag(root: &Path, index: Arc<InMemoryIndex>) -> VaultRag {
    rag_with(root, index, Arc::new(HashEmbedder::new(DIMS)))
}

#[tokio::test]
async fn test_incremental_reindex_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    seed_vault(dir.path());
    let index = Arc::new(InMemoryIndex::new());
    let rag = hash_rag(dir.path(), index.clone());
    let cancel = CancellationToken::new();

    let first = rag.reindex(ReindexMode::Incremental, &cancel).await.unwrap();
    assert_eq!(first.files_scanned, 3);
    assert_eq!(first.files_indexed, 3);
    let count = index.count().await.unwrap();
    assert_eq!(first.chunks_written, count);

    let second = rag.reindex(ReindexMode::Incremental, &cancel).await.unwrap();
    assert_eq!(second.files_indexed, 0);
    assert_eq!(second.files_unchanged, 3);
    assert_eq!(second.chunks_written, 0);
    assert_eq!(index.count().await.unwrap(), count);
}

#[tokio::test]
async fn test_changed_file_replaces_its_chunks() {
    let dir = tempfile::tempdir().unwrap();
    seed_vault(dir.path());
    let index = Arc::new(InMemoryIndex::new());
    let rag = hash_rag(dir.path(), index.clone());
    let cancel = CancellationToken::new();
    rag.reindex(ReindexMode::Incremental, &cancel).await.unwrap();

    write(
        dir.path(),
        "Services/Omada.md",
        "# Omada\n\nController moved to the rack in the garage.\n",
    );
    let report = rag.reindex(ReindexMode::Incremental, &cancel).await.unwrap();
    assert_eq!(report.files_indexed, 1);
    assert_eq!(report.files_unchanged, 2);

    let omada: Vec<_> = index
        .get_all()
        .await
        .unwrap()
        .into_iter()
        .filter(|c| c.meta.file_name == "Omada.md")
        .collect();
    assert!(!omada.is_empty());
    assert!(omada.iter().all(|c| c.text.contains("garage")));
    assert!(omada.iter().all(|c| c.text.starts_with("[Omada] ")));
}

#[tokio::test]
async fn test_deleted_file_disappears_from_index_and_search() {
    let dir = tempfile::tempdir().unwrap();
    seed_vault(dir.path());
    let index = Arc::new(InMemoryIndex::new());
    let rag = hash_rag(dir.path(), index.clone());
    let cancel = CancellationToken::new();
    rag.reindex(ReindexMode::Incremental, &cancel).await.unwrap();

    fs::remove_file(dir.path().join("Hardware/NAS.md")).unwrap();
    let report = rag.reindex(ReindexMode::Incremental, &cancel).await.unwrap();
    assert_eq!(report.files_removed, 1);
    assert!(report.chunks_removed >= 1);

    let all = index.get_all().await.unwrap();
    assert!(all.iter().all(|c| c.meta.file_name != "NAS.md"));

    let results = rag
        .search("synology storage raid", Some(10), Some(true))
        .await
        .unwrap();
    assert!(results.iter().all(|r| r.filename != "NAS.md"));
}

#[tokio::test]
async fn test_open_tasks_query_surfaces_daily_note() {
    let dir = tempfile::tempdir().unwrap();
    seed_vault(dir.path());
    let index = Arc::new(InMemoryIndex::new());
    let rag = hash_rag(dir.path(), index.clone());
    rag.reindex(ReindexMode::Incremental, &CancellationToken::new())
        .await
        .unwrap();

    let now = Utc.with_ymd_and_hms(2025, 9, 18, 12, 0, 0).unwrap();
    let results = rag
        .search_at("what are my open tasks", Some(5), None, now)
        .await
        .unwrap();

    assert!(!results.is_empty());
    let top = &results[0];
    assert_eq!(top.filename, "2025-09-17.md");
    assert!(top.content.contains("- [ ] buy milk"), "{}", top.content);
    assert_eq!(top.citation, "[Source: 2025-09-17.md]");
    // one open (0.1) and one completed (0.05) item, doubled for a task question
    assert!((top.components.task - 0.3).abs() < 1e-9, "{:?}", top.components);

    let nas = results.iter().find(|r| r.filename == "NAS.md").unwrap();
    assert!(top.score > nas.score);
}

#[tokio::test]
async fn test_content_classified_project_ranks_every_chunk_as_project() {
    let dir = tempfile::tempdir().unwrap();
    seed_vault(dir.path());
    let mut body = String::from("# Rack rebuild\n\n## Goal\nMove the lab into the new rack.\n\n## Notes\n");
    for i in 0..200 {
        body.push_str(&format!("background note {i} about cabling and airflow\n"));
    }
    write(dir.path(), "notes/rebuild.md", &body);

    let index = Arc::new(InMemoryIndex::new());
    let rag = hash_rag(dir.path(), index.clone());
    rag.reindex(ReindexMode::Incremental, &CancellationToken::new())
        .await
        .unwrap();

    let stored: Vec<_> = index
        .get_all()
        .await
        .unwrap()
        .into_iter()
        .filter(|c| c.meta.file_name == "rebuild.md")
        .collect();
    assert!(stored.len() > 2);

    let results = rag
        .search("project progress on cabling", Some(50), Some(false))
        .await
        .unwrap();
    let rebuild: Vec<_> = results.iter().filter(|r| r.filename == "rebuild.md").collect();
    assert_eq!(rebuild.len(), stored.len());
    assert!(rebuild.iter().all(|r| r.folder_type == FolderType::Projects));
}

#[tokio::test]
async fn test_context_for_task_query_keeps_checklist() {
    let dir = tempfile::tempdir().unwrap();
    seed_vault(dir.path());
    let rag = hash_rag(dir.path(), Arc::new(InMemoryIndex::new()));
    rag.reindex(ReindexMode::Incremental, &CancellationToken::new())
        .await
        .unwrap();

    let context = rag
        .build_context("what are my open tasks", Some(5))
        .await
        .unwrap();
    assert!(context.starts_with("=== RELEVANT KNOWLEDGE FROM YOUR VAULT ==="));
    assert!(context.contains("- [ ] buy milk"));
}

#[tokio::test]
async fn test_cancelled_run_returns_partial_report() {
    let dir = tempfile::tempdir().unwrap();
    seed_vault(dir.path());
    let index = Arc::new(InMemoryIndex::new());
    let rag = hash_rag(dir.path(), index.clone());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = rag.reindex(ReindexMode::Incremental, &cancel).await.unwrap();
    assert!(report.cancelled);
    assert_eq!(report.files_indexed, 0);
    assert_eq!(index.count().await.unwrap(), 0);

    let report = rag
        .reindex(ReindexMode::Incremental, &CancellationToken::new())
        .await
        .unwrap();
    assert!(!report.cancelled);
    assert_eq!(report.files_indexed, 3);
}

#[tokio::test]
async fn test_embedding_failure_keeps_previous_chunks() {
    let dir = tempfile::tempdir().unwrap();
    seed_vault(dir.path());
    let index = Arc::new(InMemoryIndex::new());
    let cancel = CancellationToken::new();
    hash_rag(dir.path(), index.clone())
        .reindex(ReindexMode::Incremental, &cancel)
        .await
        .unwrap();
    let before = index.get_all().await.unwrap();

    write(dir.path(), "2025-09-17.md", "- [ ] buy bread\n");
    let failing = rag_with(dir.path(), index.clone(), Arc::new(FailingEmbedder));
    let report = failing
        .reindex(ReindexMode::Incremental, &cancel)
        .await
        .unwrap();

    assert_eq!(report.files_skipped, 1);
    assert_eq!(report.files_indexed, 0);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("2025-09-17.md"));
    assert!(report.warnings[0].contains("connection refused"));

    let after = index.get_all().await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_full_reindex_reembeds_everything_without_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    seed_vault(dir.path());
    let index = Arc::new(InMemoryIndex::new());
    let rag = hash_rag(dir.path(), index.clone());
    let cancel = CancellationToken::new();

    rag.reindex(ReindexMode::Full, &cancel).await.unwrap();
    let count = index.count().await.unwrap();

    let report = rag.reindex(ReindexMode::Full, &cancel).await.unwrap();
    assert_eq!(report.files_indexed, 3);
    assert_eq!(report.chunks_removed, count);
    assert_eq!(index.count().await.unwrap(), count);
}

#[tokio::test]
async fn test_browse_and_verify_claim() {
    let dir = tempfile::tempdir().unwrap();
    seed_vault(dir.path());
    let rag = hash_rag(dir.path(), Arc::new(InMemoryIndex::new()));
    rag.reindex(ReindexMode::Incremental, &CancellationToken::new())
        .await
        .unwrap();

    let docs = rag.browse().await.unwrap();
    let names: Vec<&str> = docs.iter().map(|d| d.rel_path.as_str()).collect();
    assert_eq!(names, vec!["2025-09-17.md", "Hardware/NAS.md", "Services/Omada.md"]);
    assert_eq!(docs[1].metadata["type"], "hardware");
    assert!(docs[0].preview.starts_with("- [ ] buy milk"));

    let verdict = rag.verify_claim("2025-09-17.md", "buy milk").await.unwrap();
    assert!(verdict.found);
    assert_eq!(verdict.source, "2025-09-17.md");
    assert!(verdict.confidence > 0.0);

    let missing = rag.verify_claim("Nope.md", "buy milk").await.unwrap();
    assert!(!missing.found);
    assert_eq!(missing.source, "Nope.md");
    assert_eq!(missing.confidence, 0.0);
}

#[tokio::test]
async fn test_missing_root_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let rag = hash_rag(&dir.path().join("nope"), Arc::new(InMemoryIndex::new()));
    let err = rag
        .reindex(ReindexMode::Incremental, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::InvalidRoot(_)));
}
