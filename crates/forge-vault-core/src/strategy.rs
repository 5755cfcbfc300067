//! Query intent classification.
//!
//! [`classify_query`] buckets a raw query into one of four intents by
//! counting hits against fixed keyword sets. The resulting
//! [`QueryStrategy`] selects the ranker's intent profile and the sections
//! emitted by context assembly.

use serde::{Deserialize, Serialize};

/// The intent a query expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryIntent {
    Temporal,
    Structural,
    Project,
    Specific,
}

impl QueryIntent {
    /// Tie-break order: earlier wins when hit counts are equal.
    pub const PRIORITY: [QueryIntent; 4] = [
        QueryIntent::Temporal,
        QueryIntent::Project,
        QueryIntent::Structural,
        QueryIntent::Specific,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryIntent::Temporal => "temporal",
            QueryIntent::Structural => "structural",
            QueryIntent::Project => "project",
            QueryIntent::Specific => "specific",
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            QueryIntent::Temporal => TEMPORAL_KEYWORDS,
            QueryIntent::Structural => STRUCTURAL_KEYWORDS,
            QueryIntent::Project => PROJECT_KEYWORDS,
            QueryIntent::Specific => SPECIFIC_KEYWORDS,
        }
    }
}

impl std::fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

const TEMPORAL_KEYWORDS: &[&str] = &[
    "today",
    "yesterday",
    "tomorrow",
    "week",
    "weekly",
    "month",
    "monthly",
    "recent",
    "recently",
    "latest",
    "daily",
    "journal",
    "log",
    "logs",
    "when",
    "schedule",
    "date",
    "this week",
    "last week",
    "this month",
    "last month",
    "this morning",
];

const STRUCTURAL_KEYWORDS: &[&str] = &[
    "vault",
    "overview",
    "summary",
    "summarize",
    "structure",
    "organize",
    "organized",
    "count",
    "folders",
    "folder",
    "categories",
    "how many",
    "list all",
    "what do i have",
];

const PROJECT_KEYWORDS: &[&str] = &[
    "project",
    "projects",
    "progress",
    "task",
    "tasks",
    "todo",
    "todos",
    "milestone",
    "milestones",
    "goal",
    "goals",
    "status",
    "deadline",
    "working on",
    "open tasks",
    "next steps",
];

const SPECIFIC_KEYWORDS: &[&str] = &[
    "explain",
    "guide",
    "configure",
    "config",
    "setup",
    "install",
    "troubleshoot",
    "how to",
    "what is",
    "how do",
    "how does",
    "set up",
];

const TASK_WORDS: &[&str] = &["task", "tasks", "todo", "todos", "checklist", "open", "pending", "unfinished"];

/// Hit count for one intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IntentScore {
    pub intent: QueryIntent,
    pub hits: usize,
}

/// Classification result for a single query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryStrategy {
    pub primary: QueryIntent,
    /// Hit counts in [`QueryIntent::PRIORITY`] order.
    pub scores: [IntentScore; 4],
    /// More than one intent scored above zero.
    pub ambiguous: bool,
}

impl QueryStrategy {
    pub fn hits(&self, intent: QueryIntent) -> usize {
        self.scores
            .iter()
            .find(|s| s.intent == intent)
            .map(|s| s.hits)
            .unwrap_or(0)
    }

    /// Intents with at least one hit, in priority order. Falls back to the
    /// primary intent alone when nothing matched.
    pub fn active_intents(&self) -> Vec<QueryIntent> {
        let active: Vec<QueryIntent> = self
            .scores
            .iter()
            .filter(|s| s.hits > 0)
            .map(|s| s.intent)
            .collect();
        if active.is_empty() {
            vec![self.primary]
        } else {
            active
        }
    }
}

/// Lowercase alphanumeric tokens of a query (apostrophes and hyphens kept
/// inside words).
pub fn query_tokens(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '-'))
        .map(|t| t.trim_matches(|c| c == '\'' || c == '-'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Classify a query into a [`QueryStrategy`].
///
/// Single keywords must match a whole token; phrases match on the
/// whitespace-normalized query. The primary intent has the most hits, with
/// ties resolved by [`QueryIntent::PRIORITY`]. A query with no hits is
/// [`QueryIntent::Specific`].
pub fn classify_query(query: &str) -> QueryStrategy {
    let tokens = query_tokens(query);
    let padded = format!(" {} ", tokens.join(" "));

    let scores = QueryIntent::PRIORITY.map(|intent| IntentScore {
        intent,
        hits: intent
            .keywords()
            .iter()
            .filter(|kw| {
                if kw.contains(' ') {
                    padded.contains(&format!(" {kw} "))
                } else {
                    tokens.iter().any(|t| t == *kw)
                }
            })
            .count(),
    });

    let mut primary = QueryIntent::Specific;
    let mut best = 0;
    for score in &scores {
        if score.hits > best {
            best = score.hits;
            primary = score.intent;
        }
    }
    let ambiguous = scores.iter().filter(|s| s.hits > 0).count() > 1;

    QueryStrategy {
        primary,
        scores,
        ambiguous,
    }
}

/// Whether the query asks about tasks or checklists.
pub fn is_task_query(query: &str) -> bool {
    let tokens = query_tokens(query);
    tokens.iter().any(|t| TASK_WORDS.contains(&t.as_str())) || query.to_lowercase().contains("to do")
}
