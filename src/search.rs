//! `forge search`, `forge classify` and `forge context`.
//!
//! Thin printers over [`VaultRag`]. Ranked output is deterministic: score
//! descending, then source path, then chunk index.

use anyhow::Result;
use forge_vault_core::strategy::{classify_query, QueryStrategy};
use forge_vault_core::ScoredResult;

use crate::config::Config;
use crate::rag::VaultRag;

pub async fn run_search(
    config: &Config,
    query: &str,
    limit: Option<usize>,
    boost_inventory: bool,
    explain: bool,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let rag = VaultRag::open(config).await?;
    let boost = boost_inventory && config.retrieval.boost_inventory;
    let results = rag.search(query, limit, Some(boost)).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        print_result(i + 1, result, explain);
    }
    Ok(())
}

fn print_result(rank: usize, result: &ScoredResult, explain: bool) {
    let section = result
        .meta
        .section
        .as_deref()
        .map(|s| format!(" § {}", s))
        .unwrap_or_default();
    println!(
        "{}. [{:.2}] {}{} ({})",
        rank, result.score, result.filename, section, result.folder_type
    );
    println!("    source: {}", result.source_path);
    if explain {
        let c = &result.components;
        println!(
            "    score: semantic {:.3} + keyword {:.3} + path {:.3} + recency {:.3} + frontmatter {:.3} + task {:.3}",
            c.semantic, c.keyword, c.path, c.recency, c.frontmatter, c.task
        );
    }
    println!(
        "    excerpt: \"{}\"",
        result.content.replace('\n', " ").trim()
    );
    println!("    {}", result.citation);
    println!();
}

/// Print the strategy for `query`. Needs no database.
pub fn run_classify(query: &str) -> Result<()> {
    print_strategy(&classify_query(query));
    Ok(())
}

fn print_strategy(strategy: &QueryStrategy) {
    println!("primary: {}", strategy.primary);
    println!("ambiguous: {}", strategy.ambiguous);
    for score in &strategy.scores {
        println!("  {:<10} {}", score.intent, score.hits);
    }
}

pub async fn run_context(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    let rag = VaultRag::open(config).await?;
    let context = rag.build_context(query, limit).await?;
    if context.is_empty() {
        println!("No results.");
    } else {
        println!("{}", context);
    }
    Ok(())
}
