//! Index statistics and health overview.
//!
//! Provides a quick summary of what's indexed: file and chunk counts, the
//! split by folder type, task totals and the most common tags. Used by
//! `forge stats` to confirm that indexing is working as expected.

use anyhow::Result;

use crate::config::Config;
use crate::rag::VaultRag;

/// Run the stats command: read the index and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let rag = VaultRag::open(config).await?;
    let overview = rag.overview().await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Forge Vault: Index Stats");
    println!("=========================");
    println!();
    println!("  Vault:       {}", config.vault.root.display());
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!(
        "  Embedder:    {} ({})",
        rag.embedder().model_name(),
        config.embedding.provider
    );
    println!();
    println!("  Files:       {}", overview.files);
    println!("  Chunks:      {}", overview.chunks);
    println!(
        "  Tasks:       {} open / {} completed",
        overview.open_tasks, overview.completed_tasks
    );

    if !overview.by_folder.is_empty() {
        println!();
        println!("  By folder type:");
        for (folder, count) in &overview.by_folder {
            println!("    {:<12} {:>6}", folder.as_str(), count);
        }
    }

    if !overview.top_tags.is_empty() {
        println!();
        println!("  Top tags:");
        for (tag, count) in &overview.top_tags {
            println!("    {:<24} {:>6}", tag, count);
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
