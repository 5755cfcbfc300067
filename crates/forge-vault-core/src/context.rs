//! Prompt context assembly.
//!
//! Turns ranked results into the bounded text block handed to the language
//! model. The layout depends on the query strategy: temporal questions see
//! a newest-first timeline, project questions get a task tally, structural
//! questions get a vault overview, and specific questions keep score order.
//! Ambiguous queries get the section of every intent that scored, in
//! priority order. Each result appears at most once.

use std::collections::HashSet;
use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::cache::VaultOverview;
use crate::chunk::count_tasks;
use crate::folder::FolderType;
use crate::models::ScoredResult;
use crate::rank::source_date;
use crate::strategy::{query_tokens, QueryIntent, QueryStrategy};

pub const CONTEXT_HEADER: &str = "=== RELEVANT KNOWLEDGE FROM YOUR VAULT ===";

/// Context budget, deserialized from the `[context]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextParams {
    /// Upper bound on the assembled context, in characters.
    pub max_chars: usize,
    /// Results scoring above this get the longer excerpt.
    pub high_relevance_score: f64,
    pub high_relevance_chars: usize,
    pub excerpt_chars: usize,
    /// Lifetime of the cached vault overview.
    pub metadata_ttl_secs: u64,
}

impl Default for ContextParams {
    fn default() -> Self {
        Self {
            max_chars: 6000,
            high_relevance_score: 0.7,
            high_relevance_chars: 600,
            excerpt_chars: 300,
            metadata_ttl_secs: 300,
        }
    }
}

const GAP_WORDS: &[&str] = &["gap", "gaps", "missing", "need", "needs"];

/// Character-budgeted string builder.
struct Budget {
    out: String,
    used: usize,
    max: usize,
}

impl Budget {
    fn fits(&self, blocks: &[&str]) -> bool {
        self.used + blocks.iter().map(|b| b.chars().count()).sum::<usize>() <= self.max
    }

    fn push(&mut self, block: &str) -> bool {
        let len = block.chars().count();
        if self.used + len > self.max {
            return false;
        }
        self.out.push_str(block);
        self.used += len;
        true
    }
}

/// Build the context block for `query` from ranked `results`.
///
/// Returns an empty string when there are no results. Blocks that would
/// push the output past `max_chars` are dropped.
pub fn assemble_context(
    query: &str,
    results: &[ScoredResult],
    strategy: &QueryStrategy,
    overview: Option<&VaultOverview>,
    params: &ContextParams,
) -> String {
    if results.is_empty() {
        return String::new();
    }

    let mut budget = Budget {
        out: String::new(),
        used: 0,
        max: params.max_chars,
    };
    if !budget.push(&format!("{CONTEXT_HEADER}\n\n")) {
        return String::new();
    }

    let analysis = document_analysis(query, results);
    if !analysis.is_empty() {
        budget.push(&analysis);
    }

    let mut emitted: HashSet<&str> = HashSet::new();
    for intent in strategy.active_intents() {
        match intent {
            QueryIntent::Temporal => {
                let mut dated: Vec<&ScoredResult> = results
                    .iter()
                    .filter(|r| r.folder_type == FolderType::Logs || source_date(&r.meta).is_some())
                    .collect();
                dated.sort_by(|a, b| {
                    source_date(&b.meta)
                        .cmp(&source_date(&a.meta))
                        .then_with(|| a.source_path.cmp(&b.source_path))
                });
                emit_section(&mut budget, "## Timeline (newest first)\n", &dated, &mut emitted, params);
            }
            QueryIntent::Project => {
                let (open, done) = results
                    .iter()
                    .map(|r| count_tasks(r.body()))
                    .fold((0, 0), |(o, d), (a, b)| (o + a, d + b));
                let header = format!("## Tasks ({open} open, {done} completed)\n");
                let related: Vec<&ScoredResult> = results
                    .iter()
                    .filter(|r| {
                        r.folder_type == FolderType::Projects || count_tasks(r.body()) != (0, 0)
                    })
                    .collect();
                emit_section(&mut budget, &header, &related, &mut emitted, params);
            }
            QueryIntent::Structural => {
                if let Some(o) = overview {
                    budget.push(&overview_block(o));
                }
            }
            QueryIntent::Specific => {
                let all: Vec<&ScoredResult> = results.iter().collect();
                emit_section(&mut budget, "## Most relevant notes\n", &all, &mut emitted, params);
            }
        }
    }

    let rest: Vec<&ScoredResult> = results
        .iter()
        .filter(|r| !emitted.contains(r.chunk_id.as_str()))
        .collect();
    emit_section(&mut budget, "## Other relevant notes\n", &rest, &mut emitted, params);

    budget.out.trim_end().to_string()
}

fn emit_section<'a>(
    budget: &mut Budget,
    header: &str,
    results: &[&'a ScoredResult],
    emitted: &mut HashSet<&'a str>,
    params: &ContextParams,
) {
    let pending: Vec<(&'a ScoredResult, String)> = results
        .iter()
        .copied()
        .filter(|r| !emitted.contains(r.chunk_id.as_str()))
        .map(|r| (r, excerpt(r, params)))
        .collect();
    let Some((_, first)) = pending.first() else {
        return;
    };
    if !budget.fits(&[header, first.as_str()]) {
        return;
    }
    budget.push(header);
    for (r, text) in pending {
        if budget.push(&text) {
            emitted.insert(r.chunk_id.as_str());
        }
    }
    budget.push("\n");
}

/// `**file.md** (relevance: 0.85):` followed by the excerpt.
pub fn excerpt(result: &ScoredResult, params: &ContextParams) -> String {
    let limit = if result.score > params.high_relevance_score {
        params.high_relevance_chars
    } else {
        params.excerpt_chars
    };
    let mut text: String = result.full_content.chars().take(limit).collect();
    if result.full_content.chars().count() > limit {
        text.push_str("...");
    }
    format!(
        "**{}** (relevance: {:.2}):\n{}\n\n",
        result.filename, result.score, text
    )
}

/// Counts of project, inventory, and service sources among the results,
/// with relationship hints.
pub fn document_analysis(query: &str, results: &[ScoredResult]) -> String {
    let mut files: Vec<(&str, FolderType)> = Vec::new();
    for r in results {
        if !files.iter().any(|(f, _)| *f == r.source_path) {
            files.push((r.source_path.as_str(), r.folder_type));
        }
    }
    let count = |ft: FolderType| files.iter().filter(|(_, f)| *f == ft).count();
    let (projects, inventory, services) = (
        count(FolderType::Projects),
        count(FolderType::Inventory),
        count(FolderType::Services),
    );

    let mut lines: Vec<String> = Vec::new();
    if files.len() > 1 {
        lines.push(format!(
            "Cross-referenced: {inventory} hardware, {projects} projects, {services} services"
        ));
        if projects > 0 && inventory > 0 {
            lines.push("Infrastructure relationship: projects and hardware appear together".into());
        }
        if inventory > 0 && services == 0 {
            lines.push("Hardware is documented but related services may need documentation".into());
        }
    }
    let tokens = query_tokens(query);
    if tokens.iter().any(|t| GAP_WORDS.contains(&t.as_str())) || query.to_lowercase().contains("should have") {
        lines.push("Gap analysis requested: compare documented items against what is needed".into());
    }

    if lines.is_empty() {
        return String::new();
    }
    let mut out = String::from("## Document analysis\n");
    for l in lines {
        let _ = writeln!(out, "- {l}");
    }
    out.push('\n');
    out
}

fn overview_block(o: &VaultOverview) -> String {
    let mut out = String::from("## Vault overview\n");
    let _ = writeln!(out, "- {} files, {} chunks", o.files, o.chunks);
    let folders: Vec<String> = o
        .by_folder
        .iter()
        .map(|(f, n)| format!("{f}: {n}"))
        .collect();
    if !folders.is_empty() {
        let _ = writeln!(out, "- {}", folders.join(", "));
    }
    if !o.top_tags.is_empty() {
        let tags: Vec<String> = o.top_tags.iter().map(|(t, n)| format!("{t} ({n})")).collect();
        let _ = writeln!(out, "- Top tags: {}", tags.join(", "));
    }
    let _ = writeln!(
        out,
        "- Tasks: {} open, {} completed",
        o.open_tasks, o.completed_tasks
    );
    out.push('\n');
    out
}
