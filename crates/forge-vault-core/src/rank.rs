//! Hybrid re-ranking of vector-search candidates.
//!
//! The ranker over-fetches nearest neighbours and re-scores each one with
//! independent additive signals:
//!
//! | Signal | Source |
//! |--------|--------|
//! | `semantic` | `max(0, 1 − distance/2)` from the vector index |
//! | `keyword` | query terms in the file stem and in the chunk text |
//! | `path` | folder type of the source, weighted by the query intent |
//! | `recency` | exponential decay on the file date or modification time |
//! | `frontmatter` | `type`, `tags`, and type-aware `status` matches |
//! | `task` | checklist density, doubled for task questions |
//!
//! After sorting, [`HybridRanker::mix_categories`] reserves slots for the
//! folder types the query most likely wants, so the right category is
//! represented even when its raw scores lose to noise.
//!
//! All weights live in [`RankingParams`]. Per-intent weights are a table of
//! [`IntentProfile`]s rather than branches in the scoring code.

use std::cmp::Ordering;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chunk::count_tasks;
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::folder::{parse_filename_date, FolderType};
use crate::frontmatter::split_list;
use crate::models::{Chunk, ChunkMeta, ScoreBreakdown, ScoredResult};
use crate::store::VectorIndex;
use crate::strategy::{classify_query, is_task_query, query_tokens, QueryIntent, QueryStrategy};

/// Path bonus per folder type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderBonuses {
    pub projects: f64,
    pub logs: f64,
    pub inventory: f64,
    pub services: f64,
    pub general: f64,
}

impl FolderBonuses {
    pub fn get(&self, folder: FolderType) -> f64 {
        match folder {
            FolderType::Projects => self.projects,
            FolderType::Logs => self.logs,
            FolderType::Inventory => self.inventory,
            FolderType::Services => self.services,
            FolderType::General => self.general,
        }
    }
}

/// Exponential recency decay: `max_bonus × 0.5^(age_days / half_life_days)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecencyCurve {
    pub max_bonus: f64,
    pub half_life_days: f64,
}

impl Default for RecencyCurve {
    fn default() -> Self {
        Self {
            max_bonus: 0.1,
            half_life_days: 30.0,
        }
    }
}

impl RecencyCurve {
    pub fn bonus(&self, age_days: f64) -> f64 {
        if self.half_life_days <= 0.0 || self.max_bonus <= 0.0 {
            return 0.0;
        }
        let age = age_days.max(0.0);
        self.max_bonus * 0.5f64.powf(age / self.half_life_days)
    }
}

/// Weights applied when a query has a given primary intent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentProfile {
    pub folder: FolderBonuses,
    pub recency: RecencyCurve,
    /// Folder types that get reserved result slots.
    pub reserve: Vec<FolderType>,
    /// Fraction of `k` reserved for `reserve`.
    pub reserve_fraction: f64,
}

/// Ranking weights, deserialized from the `[ranking]` config section.
///
/// The defaults are tuned by hand and carry no deeper meaning; every value
/// can be overridden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingParams {
    /// Candidates fetched per requested result.
    pub candidate_multiplier: usize,
    /// Characters of chunk text kept in `ScoredResult::content`.
    pub display_chars: usize,
    /// Query terms shorter than this are ignored by keyword matching.
    pub min_term_chars: usize,
    pub filename_bonus: f64,
    pub term_bonus: f64,
    /// Flat path bonus for inventory sources when inventory boosting is on.
    pub inventory_boost: f64,
    /// Fraction of `k` reserved for inventory sources when boosting.
    pub inventory_reserve_fraction: f64,
    pub type_match_bonus: f64,
    pub tag_match_bonus: f64,
    pub status_match_bonus: f64,
    pub open_task_bonus: f64,
    pub done_task_bonus: f64,
    pub task_cap: f64,
    pub task_query_multiplier: f64,
    pub temporal: IntentProfile,
    pub structural: IntentProfile,
    pub project: IntentProfile,
    pub specific: IntentProfile,
}

impl Default for RankingParams {
    fn default() -> Self {
        Self {
            candidate_multiplier: 10,
            display_chars: 300,
            min_term_chars: 3,
            filename_bonus: 0.5,
            term_bonus: 0.1,
            inventory_boost: 0.2,
            inventory_reserve_fraction: 0.5,
            type_match_bonus: 0.2,
            tag_match_bonus: 0.1,
            status_match_bonus: 0.3,
            open_task_bonus: 0.1,
            done_task_bonus: 0.05,
            task_cap: 0.3,
            task_query_multiplier: 2.0,
            temporal: IntentProfile {
                folder: FolderBonuses {
                    logs: 0.4,
                    projects: 0.1,
                    ..Default::default()
                },
                recency: RecencyCurve {
                    max_bonus: 0.4,
                    half_life_days: 3.0,
                },
                reserve: vec![FolderType::Logs],
                reserve_fraction: 0.5,
            },
            structural: IntentProfile {
                folder: FolderBonuses {
                    inventory: 0.2,
                    services: 0.15,
                    projects: 0.1,
                    ..Default::default()
                },
                ..Default::default()
            },
            project: IntentProfile {
                folder: FolderBonuses {
                    projects: 0.3,
                    logs: 0.15,
                    ..Default::default()
                },
                reserve: vec![FolderType::Projects, FolderType::Logs],
                reserve_fraction: 0.5,
                ..Default::default()
            },
            specific: IntentProfile {
                folder: FolderBonuses {
                    services: 0.1,
                    inventory: 0.1,
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }
}

impl RankingParams {
    pub fn profile(&self, intent: QueryIntent) -> &IntentProfile {
        match intent {
            QueryIntent::Temporal => &self.temporal,
            QueryIntent::Structural => &self.structural,
            QueryIntent::Project => &self.project,
            QueryIntent::Specific => &self.specific,
        }
    }
}

/// Status vocabularies keyed by document type. A status bonus applies only
/// when the document's `type` selects the rule and the query contains one
/// of a group's cues.
struct StatusRule {
    doc_types: &'static [&'static str],
    groups: &'static [(&'static [&'static str], &'static [&'static str])],
}

const STATUS_RULES: &[StatusRule] = &[
    StatusRule {
        doc_types: &["project"],
        groups: &[
            (
                &["active", "current", "ongoing", "in progress", "working on"],
                &["active", "in progress", "ongoing"],
            ),
            (
                &["completed", "complete", "done", "finished"],
                &["completed", "complete", "done", "finished"],
            ),
            (
                &["planned", "planning", "upcoming", "future", "next"],
                &["planned", "planning", "upcoming", "backlog"],
            ),
        ],
    },
    StatusRule {
        doc_types: &["hardware", "device", "inventory", "equipment"],
        groups: &[
            (
                &["operational", "running", "online", "working"],
                &["operational", "running", "online"],
            ),
            (
                &["offline", "broken", "down", "failed", "retired"],
                &["offline", "broken", "down", "failed", "retired"],
            ),
        ],
    },
    StatusRule {
        doc_types: &["research"],
        groups: &[
            (
                &["reading", "researching", "in progress", "current"],
                &["reading", "researching", "in progress"],
            ),
            (
                &["complete", "completed", "done", "finished", "read"],
                &["complete", "completed", "done", "read"],
            ),
        ],
    },
];

const STATUS_FIELDS: &[&str] = &["status", "project_status", "operational_status", "research-status"];

/// Per-query inputs shared by every candidate.
struct QueryContext<'a> {
    terms: Vec<String>,
    tokens: Vec<String>,
    padded: String,
    task_query: bool,
    profile: &'a IntentProfile,
}

impl QueryContext<'_> {
    fn has_cue(&self, cue: &str) -> bool {
        if cue.contains(' ') {
            self.padded.contains(&format!(" {cue} "))
        } else {
            self.tokens.iter().any(|t| t == cue)
        }
    }
}

/// Re-ranks vector-index candidates with the hybrid scoring signals.
#[derive(Debug, Clone, Default)]
pub struct HybridRanker {
    params: RankingParams,
}

impl HybridRanker {
    pub fn new(params: RankingParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RankingParams {
        &self.params
    }

    /// Retrieve, score, and mix up to `k` results for `query`.
    ///
    /// An embedding failure is logged and yields an empty list. A failing
    /// index yields [`RagError::IndexUnavailable`].
    pub async fn rank(
        &self,
        index: &dyn VectorIndex,
        embedder: &dyn Embedder,
        query: &str,
        k: usize,
        boost_inventory: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScoredResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let strategy = classify_query(query);

        let vector = match embedder.embed_query(query).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "query embedding failed, returning no results");
                return Ok(Vec::new());
            }
        };

        let fetch = k.saturating_mul(self.params.candidate_multiplier.max(1));
        let candidates = index.query(&vector, fetch).await.map_err(RagError::index)?;
        debug!(
            intent = %strategy.primary,
            candidates = candidates.len(),
            k,
            "scoring candidates"
        );

        let scored = self.score_candidates(query, &strategy, candidates, boost_inventory, now);
        Ok(self.mix_categories(scored, k, &strategy, boost_inventory))
    }

    /// Score every candidate and sort by descending score.
    ///
    /// Ties are broken by source path, then chunk index.
    pub fn score_candidates(
        &self,
        query: &str,
        strategy: &QueryStrategy,
        candidates: Vec<(Chunk, f32)>,
        boost_inventory: bool,
        now: DateTime<Utc>,
    ) -> Vec<ScoredResult> {
        let tokens = query_tokens(query);
        let mut terms: Vec<String> = Vec::new();
        for t in &tokens {
            if t.chars().count() >= self.params.min_term_chars && !terms.contains(t) {
                terms.push(t.clone());
            }
        }
        let ctx = QueryContext {
            padded: format!(" {} ", tokens.join(" ")),
            terms,
            tokens,
            task_query: is_task_query(query),
            profile: self.params.profile(strategy.primary),
        };

        let mut results: Vec<ScoredResult> = candidates
            .into_iter()
            .map(|(chunk, distance)| self.score_one(&ctx, chunk, distance, boost_inventory, now))
            .collect();
        results.sort_by(compare_results);
        results
    }

    fn score_one(
        &self,
        ctx: &QueryContext<'_>,
        chunk: Chunk,
        distance: f32,
        boost_inventory: bool,
        now: DateTime<Utc>,
    ) -> ScoredResult {
        let folder_type = chunk.folder_type();

        let mut path = ctx.profile.folder.get(folder_type);
        if boost_inventory && folder_type == FolderType::Inventory {
            path += self.params.inventory_boost;
        }

        let components = ScoreBreakdown {
            semantic: semantic_similarity(distance),
            keyword: self.keyword_bonus(&ctx.terms, chunk.meta.stem(), &chunk.text),
            path,
            recency: ctx.profile.recency.bonus(age_days(&chunk.meta, now).unwrap_or(f64::INFINITY)),
            frontmatter: self.frontmatter_bonus(ctx, &chunk.meta),
            task: self.task_bonus(chunk.body(), ctx.task_query),
        };

        let display_chars = self.params.display_chars;
        let content = if chunk.text.chars().count() > display_chars {
            let mut s: String = chunk.text.chars().take(display_chars).collect();
            s.push_str("...");
            s
        } else {
            chunk.text.clone()
        };

        ScoredResult {
            chunk_id: chunk.id,
            score: components.total(),
            components,
            content,
            full_content: chunk.text,
            filename: chunk.meta.file_name.clone(),
            source_path: chunk.meta.source.clone(),
            folder_type,
            citation: format!("[Source: {}]", chunk.meta.file_name),
            meta: chunk.meta,
        }
    }

    /// `filename_bonus` if the stem contains any term, plus `term_bonus`
    /// per term found in the text.
    pub fn keyword_bonus(&self, terms: &[String], stem: &str, text: &str) -> f64 {
        let stem = stem.to_lowercase();
        let text = text.to_lowercase();
        let mut bonus = 0.0;
        if terms.iter().any(|t| stem.contains(t.as_str())) {
            bonus += self.params.filename_bonus;
        }
        bonus += terms.iter().filter(|t| text.contains(t.as_str())).count() as f64 * self.params.term_bonus;
        bonus
    }

    fn frontmatter_bonus(&self, ctx: &QueryContext<'_>, meta: &ChunkMeta) -> f64 {
        let mut bonus = 0.0;
        let doc_type = meta.doc_type();

        if let Some(t) = doc_type.as_deref().filter(|t| !t.is_empty()) {
            let plural = format!("{t}s");
            if ctx.tokens.iter().any(|q| q == t || *q == plural) {
                bonus += self.params.type_match_bonus;
            }
        }

        if let Some(tags) = meta.front.get("tags") {
            let matches = split_list(tags)
                .iter()
                .filter(|tag| ctx.tokens.iter().any(|q| q == *tag))
                .count();
            bonus += matches as f64 * self.params.tag_match_bonus;
        }

        if let Some(rule) = doc_type
            .as_deref()
            .and_then(|t| STATUS_RULES.iter().find(|r| r.doc_types.contains(&t)))
        {
            let statuses: Vec<String> = STATUS_FIELDS
                .iter()
                .filter_map(|f| meta.front.get(*f))
                .map(|v| normalize_status(v))
                .filter(|v| !v.is_empty())
                .collect();
            let matched = rule.groups.iter().any(|(cues, values)| {
                cues.iter().any(|c| ctx.has_cue(c))
                    && statuses.iter().any(|s| values.contains(&s.as_str()))
            });
            if matched {
                bonus += self.params.status_match_bonus;
            }
        }

        bonus
    }

    /// Checklist density bonus, capped, then multiplied for task questions.
    ///
    /// `text` must not carry the `[stem] ` index prefix, or its first
    /// checklist line goes uncounted.
    pub fn task_bonus(&self, text: &str, task_query: bool) -> f64 {
        let (open, done) = count_tasks(text);
        let raw = open as f64 * self.params.open_task_bonus + done as f64 * self.params.done_task_bonus;
        let capped = raw.min(self.params.task_cap);
        if task_query {
            capped * self.params.task_query_multiplier
        } else {
            capped
        }
    }

    /// Pick `k` results, reserving slots for the categories the query
    /// favours, then re-sort by score.
    ///
    /// With `boost_inventory`, up to `⌊k × inventory_reserve_fraction⌋`
    /// slots go to inventory sources first. The primary intent's profile
    /// may reserve a further fraction for its own folder types. Remaining
    /// slots are filled from everything else by score.
    pub fn mix_categories(
        &self,
        ranked: Vec<ScoredResult>,
        k: usize,
        strategy: &QueryStrategy,
        boost_inventory: bool,
    ) -> Vec<ScoredResult> {
        if ranked.len() <= k {
            return ranked;
        }

        let mut taken = vec![false; ranked.len()];
        let mut picked = 0usize;

        if boost_inventory {
            let quota = (k as f64 * self.params.inventory_reserve_fraction).floor() as usize;
            picked += reserve_slots(&ranked, &mut taken, quota.min(k - picked), |r| {
                r.folder_type == FolderType::Inventory
            });
        }

        let profile = self.params.profile(strategy.primary);
        if profile.reserve_fraction > 0.0 && !profile.reserve.is_empty() {
            let quota = (k as f64 * profile.reserve_fraction).floor() as usize;
            picked += reserve_slots(&ranked, &mut taken, quota.min(k - picked), |r| {
                profile.reserve.contains(&r.folder_type)
            });
        }

        reserve_slots(&ranked, &mut taken, k - picked, |_| true);

        let mut out: Vec<ScoredResult> = ranked
            .into_iter()
            .zip(taken)
            .filter_map(|(r, t)| t.then_some(r))
            .collect();
        out.sort_by(compare_results);
        out
    }
}

/// Distance in `[0, 2]` to similarity in `[0, 1]`.
pub fn semantic_similarity(distance: f32) -> f64 {
    (1.0 - f64::from(distance) / 2.0).clamp(0.0, 1.0)
}

/// Date of a chunk's source: the date in a date-named file, otherwise the
/// modification time. `None` when neither is known.
pub fn source_date(meta: &ChunkMeta) -> Option<DateTime<Utc>> {
    parse_filename_date(meta.stem())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .or_else(|| {
            (meta.modified > 0)
                .then(|| Utc.timestamp_opt(meta.modified, 0).single())
                .flatten()
        })
}

/// Age of a chunk's source in days, from [`source_date`]. Future dates
/// count as age zero.
pub fn age_days(meta: &ChunkMeta, now: DateTime<Utc>) -> Option<f64> {
    let then = source_date(meta)?;
    let secs = (now - then).num_seconds().max(0);
    Some(secs as f64 / 86_400.0)
}

/// Mark up to `quota` untaken results matching `pred`, best first.
fn reserve_slots(
    ranked: &[ScoredResult],
    taken: &mut [bool],
    quota: usize,
    pred: impl Fn(&ScoredResult) -> bool,
) -> usize {
    let mut got = 0;
    for (r, slot) in ranked.iter().zip(taken.iter_mut()) {
        if got >= quota {
            break;
        }
        if !*slot && pred(r) {
            *slot = true;
            got += 1;
        }
    }
    got
}

fn normalize_status(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .replace(['-', '_'], " ")
}

fn compare_results(a: &ScoredResult, b: &ScoredResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.source_path.cmp(&b.source_path))
        .then_with(|| a.meta.chunk_index.cmp(&b.meta.chunk_index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::models::Metadata;
    use crate::store::{IndexEntry, InMemoryIndex};
    use async_trait::async_trait;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 20, 12, 0, 0).unwrap()
    }

    fn chunk(rel: &str, text: &str, modified: i64) -> Chunk {
        let file_name = rel.rsplit('/').next().unwrap().to_string();
        Chunk {
            id: format!("{rel}#0"),
            text: text.to_string(),
            meta: ChunkMeta {
                source: format!("/vault/{rel}"),
                rel_path: rel.to_string(),
                file_name,
                modified,
                ..Default::default()
            },
        }
    }

    fn with_front(mut c: Chunk, pairs: &[(&str, &str)]) -> Chunk {
        let mut front = Metadata::new();
        for (k, v) in pairs {
            front.insert((*k).into(), (*v).into());
        }
        c.meta.front = front;
        c
    }

    fn score(query: &str, chunks: Vec<(Chunk, f32)>, boost: bool) -> Vec<ScoredResult> {
        let ranker = HybridRanker::default();
        ranker.score_candidates(query, &classify_query(query), chunks, boost, now())
    }

    #[test]
    fn test_semantic_similarity_bounds() {
        assert_eq!(semantic_similarity(0.0), 1.0);
        assert_eq!(semantic_similarity(1.0), 0.5);
        assert_eq!(semantic_similarity(2.0), 0.0);
        assert_eq!(semantic_similarity(2.5), 0.0);
    }

    #[test]
    fn test_keyword_bonus_filename_and_terms() {
        let ranker = HybridRanker::default();
        let terms = vec!["omada".to_string(), "controller".to_string()];
        let b = ranker.keyword_bonus(&terms, "Omada Controller", "the omada controller config");
        assert!((b - 0.7).abs() < 1e-9);
        let b = ranker.keyword_bonus(&terms, "switch", "nothing relevant");
        assert_eq!(b, 0.0);
    }

    #[test]
    fn test_short_terms_ignored() {
        let results = score("my ap", vec![(chunk("notes/ap.md", "my ap", 0), 1.0)], false);
        assert_eq!(results[0].components.keyword, 0.0);
    }

    #[test]
    fn test_recency_monotonic_in_mtime() {
        let day = 86_400;
        let base = now().timestamp();
        for query in ["what happened this week", "router firmware"] {
            let newer = chunk("notes/a.md", "router firmware notes", base - 2 * day);
            let older = chunk("notes/b.md", "router firmware notes", base - 20 * day);
            let results = score(query, vec![(older, 1.0), (newer, 1.0)], false);
            let r_new = results.iter().find(|r| r.filename == "a.md").unwrap();
            let r_old = results.iter().find(|r| r.filename == "b.md").unwrap();
            assert!(r_new.components.recency >= r_old.components.recency);
        }
    }

    #[test]
    fn test_temporal_curve_is_larger() {
        let params = RankingParams::default();
        assert!(params.temporal.recency.bonus(0.0) > params.specific.recency.bonus(0.0));
        assert!(params.temporal.recency.bonus(1.0) > params.temporal.recency.bonus(10.0));
        assert!((params.temporal.recency.bonus(3.0) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_filename_date_takes_precedence() {
        let old_mtime = (now() - Duration::days(400)).timestamp();
        let c = chunk("2025-09-19.md", "notes", old_mtime);
        let age = age_days(&c.meta, now()).unwrap();
        assert!(age > 1.0 && age < 2.0);
    }

    #[test]
    fn test_future_date_is_age_zero() {
        let c = chunk("2030-01-01.md", "plans", 0);
        assert_eq!(age_days(&c.meta, now()), Some(0.0));
        let unknown = chunk("notes/x.md", "x", 0);
        assert_eq!(age_days(&unknown.meta, now()), None);
    }

    #[test]
    fn test_path_bonus_follows_intent() {
        let log = chunk("Daily/standup.md", "coffee and deploys", 0);
        let results = score("what did I do yesterday", vec![(log.clone(), 1.0)], false);
        assert!((results[0].components.path - 0.4).abs() < 1e-9);

        let results = score("homelab project progress", vec![(log, 1.0)], false);
        assert!((results[0].components.path - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_inventory_boost_adds_path_bonus() {
        let hw = chunk("Hardware/switch.md", "eight ports", 0);
        let plain = score("switch", vec![(hw.clone(), 1.0)], false)[0].components.path;
        let boosted = score("switch", vec![(hw, 1.0)], true)[0].components.path;
        assert!((boosted - plain - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_status_is_type_aware() {
        let project = with_front(
            chunk("Projects/homelab.md", "rack build", 0),
            &[("type", "project"), ("status", "Active")],
        );
        let hardware = with_front(
            chunk("Hardware/nas.md", "storage box", 0),
            &[("type", "hardware"), ("status", "active")],
        );
        let results = score(
            "which things are in progress",
            vec![(project, 1.0), (hardware, 1.0)],
            false,
        );
        let p = results.iter().find(|r| r.filename == "homelab.md").unwrap();
        let h = results.iter().find(|r| r.filename == "nas.md").unwrap();
        assert!((p.components.frontmatter - 0.3).abs() < 1e-9);
        assert_eq!(h.components.frontmatter, 0.0);
    }

    #[test]
    fn test_hardware_status_vocabulary() {
        let hw = with_front(
            chunk("Hardware/nas.md", "storage box", 0),
            &[("type", "hardware"), ("operational_status", "Operational")],
        );
        let results = score("is the nas operational", vec![(hw, 1.0)], false);
        assert!((results[0].components.frontmatter - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_type_and_tag_matches() {
        let c = with_front(
            chunk("notes/router.md", "firmware", 0),
            &[("type", "hardware"), ("tags", "network, homelab")],
        );
        let results = score("hardware for my network homelab", vec![(c, 1.0)], false);
        assert!((results[0].components.frontmatter - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_task_bonus_capped_and_doubled() {
        let ranker = HybridRanker::default();
        let text = "- [ ] a\n- [ ] b\n- [ ] c\n- [ ] d\n- [x] e";
        assert!((ranker.task_bonus(text, false) - 0.3).abs() < 1e-9);
        assert!((ranker.task_bonus(text, true) - 0.6).abs() < 1e-9);
        assert!((ranker.task_bonus("- [ ] a\n- [x] b", false) - 0.15).abs() < 1e-9);
        assert_eq!(ranker.task_bonus("no tasks here", true), 0.0);
    }

    #[test]
    fn test_task_bonus_counts_first_line_of_indexed_chunk() {
        let indexed = chunk("x.md", "[x] - [ ] a\n- [x] b", 0);
        let results = score("what are my open tasks", vec![(indexed, 1.0)], false);
        assert!((results[0].components.task - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_path_bonus_uses_document_folder_type() {
        let mut sibling = chunk("notes/plan.md", "[plan] cabling and airflow notes", 0);
        sibling.meta.folder_type = Some(FolderType::Projects);
        let results = score("homelab project progress", vec![(sibling, 1.0)], false);
        assert_eq!(results[0].folder_type, FolderType::Projects);
        assert!((results[0].components.path - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_display_truncation_and_citation() {
        let long = "x".repeat(500);
        let results = score("anything", vec![(chunk("notes/long.md", &long, 0), 1.0)], false);
        assert_eq!(results[0].content.chars().count(), 303);
        assert!(results[0].content.ends_with("..."));
        assert_eq!(results[0].full_content, long);
        assert_eq!(results[0].citation, "[Source: long.md]");
    }

    #[test]
    fn test_ties_broken_by_source_then_index() {
        let a = chunk("notes/b.md", "same", 0);
        let b = chunk("notes/a.md", "same", 0);
        let results = score("zzz", vec![(a, 1.0), (b, 1.0)], false);
        assert_eq!(results[0].filename, "a.md");
        assert_eq!(results[1].filename, "b.md");
    }

    #[test]
    fn test_category_mix_guarantees_inventory_share() {
        let ranker = HybridRanker::default();
        let mut candidates = Vec::new();
        for i in 0..6 {
            candidates.push((chunk(&format!("notes/n{i}.md"), "general text", 0), 0.0));
        }
        for i in 0..3 {
            candidates.push((chunk(&format!("Inventory/d{i}.md"), "device", 0), 1.9));
        }
        let strategy = classify_query("zzz");
        let scored = ranker.score_candidates("zzz", &strategy, candidates, true, now());
        let mixed = ranker.mix_categories(scored, 4, &strategy, true);
        assert_eq!(mixed.len(), 4);
        let inventory = mixed
            .iter()
            .filter(|r| r.folder_type == FolderType::Inventory)
            .count();
        assert!(inventory >= 2);
        for pair in mixed.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_category_mix_without_boost_is_top_k() {
        let ranker = HybridRanker::default();
        let mut candidates = Vec::new();
        for i in 0..6 {
            candidates.push((chunk(&format!("notes/n{i}.md"), "general text", 0), 0.0));
        }
        candidates.push((chunk("Inventory/d0.md", "device", 0), 1.9));
        let strategy = classify_query("zzz");
        let scored = ranker.score_candidates("zzz", &strategy, candidates, false, now());
        let mixed = ranker.mix_categories(scored, 3, &strategy, false);
        assert!(mixed.iter().all(|r| r.folder_type == FolderType::General));
    }

    #[test]
    fn test_temporal_reserves_logs() {
        let ranker = HybridRanker::default();
        let mut candidates = Vec::new();
        for i in 0..6 {
            candidates.push((chunk(&format!("notes/n{i}.md"), "general text", 0), 0.0));
        }
        for i in 0..3 {
            candidates.push((chunk(&format!("Journal/j{i}.md"), "entry", 0), 2.0));
        }
        let query = "yesterday";
        let strategy = classify_query(query);
        let scored = ranker.score_candidates(query, &strategy, candidates, false, now());
        let mixed = ranker.mix_categories(scored, 4, &strategy, false);
        let logs = mixed.iter().filter(|r| r.folder_type == FolderType::Logs).count();
        assert!(logs >= 2);
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            4
        }
        async fn embed(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            anyhow::bail!("connection refused")
        }
    }

    struct BrokenIndex;

    #[async_trait]
    impl VectorIndex for BrokenIndex {
        async fn add(&self, _entries: Vec<IndexEntry>) -> anyhow::Result<Vec<String>> {
            anyhow::bail!("disk full")
        }
        async fn query(&self, _vector: &[f32], _k: usize) -> anyhow::Result<Vec<(Chunk, f32)>> {
            anyhow::bail!("database is locked")
        }
        async fn delete(&self, _ids: &[String]) -> anyhow::Result<usize> {
            anyhow::bail!("database is locked")
        }
        async fn get_all(&self) -> anyhow::Result<Vec<Chunk>> {
            anyhow::bail!("database is locked")
        }
    }

    #[tokio::test]
    async fn test_rank_embedding_failure_is_empty() {
        let index = InMemoryIndex::new();
        let ranker = HybridRanker::default();
        let results = ranker
            .rank(&index, &FailingEmbedder, "anything", 5, true, now())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_rank_index_failure_is_typed() {
        let ranker = HybridRanker::default();
        let err = ranker
            .rank(&BrokenIndex, &HashEmbedder::new(16), "anything", 5, true, now())
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::IndexUnavailable(_)));
        assert!(err.to_string().contains("database is locked"));
    }

    #[tokio::test]
    async fn test_rank_returns_at_most_k() {
        let embedder = HashEmbedder::new(64);
        let index = InMemoryIndex::new();
        let mut entries = Vec::new();
        for i in 0..20 {
            let c = chunk(&format!("notes/n{i}.md"), &format!("[n{i}] router note {i}"), 0);
            entries.push(IndexEntry {
                id: c.id.clone(),
                vector: embedder.embed_text(&c.text),
                text: c.text,
                meta: c.meta,
            });
        }
        index.add(entries).await.unwrap();
        let ranker = HybridRanker::default();
        let results = ranker.rank(&index, &embedder, "router", 5, false, now()).await.unwrap();
        assert_eq!(results.len(), 5);
        assert!(ranker.rank(&index, &embedder, "router", 0, false, now()).await.unwrap().is_empty());
    }
}
