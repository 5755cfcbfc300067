//! Folder-type classification.
//!
//! A single pure function, [`detect_folder_type`], decides whether a note
//! lives in a projects, logs, inventory, or services area of the vault.
//! The chunker uses it to pick a splitting strategy, the ranker uses it for
//! path bonuses and category mixing, and context assembly uses it for the
//! document analysis header.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Coarse classification of where a note lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderType {
    Projects,
    Logs,
    Inventory,
    Services,
    General,
}

impl FolderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FolderType::Projects => "projects",
            FolderType::Logs => "logs",
            FolderType::Inventory => "inventory",
            FolderType::Services => "services",
            FolderType::General => "general",
        }
    }

    /// Map a front-matter `type` value onto a folder type.
    pub fn from_doc_type(doc_type: &str) -> FolderType {
        match doc_type.trim().to_lowercase().as_str() {
            "project" | "projects" | "task" | "goal" => FolderType::Projects,
            "log" | "daily" | "weekly" | "journal" | "diary" => FolderType::Logs,
            "hardware" | "device" | "inventory" | "equipment" => FolderType::Inventory,
            "service" | "tool" | "software" => FolderType::Services,
            _ => FolderType::General,
        }
    }
}

impl std::fmt::Display for FolderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

const PROJECT_PATTERNS: &[&str] = &["project", "task", "goal"];
const LOG_PATTERNS: &[&str] = &["log", "daily", "weekly", "journal", "diary"];
const INVENTORY_PATTERNS: &[&str] = &["inventory", "hardware", "device", "equipment"];
const SERVICE_PATTERNS: &[&str] = &["service", "tool", "software"];

const PROJECT_CONTENT_MARKERS: &[&str] = &["type: project", "status: active", "## goal", "## steps"];
const LOG_CONTENT_MARKERS: &[&str] = &["## today", "date:", "week:"];

/// Classify a note from its vault-relative path and its content.
///
/// Directory names are checked first, in the order projects, logs,
/// inventory, services. A file whose name starts with a recognized date is
/// a log. Only when the path gives no signal are content markers consulted.
pub fn detect_folder_type(rel_path: &str, content: &str) -> FolderType {
    let normalized = rel_path.replace('\\', "/").to_lowercase();
    let (dirs, file_name) = match normalized.rfind('/') {
        Some(pos) => (&normalized[..pos], &normalized[pos + 1..]),
        None => ("", normalized.as_str()),
    };

    let dir_matches = |patterns: &[&str]| patterns.iter().any(|p| dirs.contains(p));

    if dir_matches(PROJECT_PATTERNS) {
        return FolderType::Projects;
    }
    if dir_matches(LOG_PATTERNS) || is_date_named(file_name) {
        return FolderType::Logs;
    }
    if dir_matches(INVENTORY_PATTERNS) {
        return FolderType::Inventory;
    }
    if dir_matches(SERVICE_PATTERNS) {
        return FolderType::Services;
    }

    let content = content.to_lowercase();
    if PROJECT_CONTENT_MARKERS.iter().any(|m| content.contains(m)) {
        return FolderType::Projects;
    }
    if LOG_CONTENT_MARKERS.iter().any(|m| content.contains(m)) {
        return FolderType::Logs;
    }

    FolderType::General
}

/// Whether a file name (with or without extension) starts with a date.
pub fn is_date_named(file_name: &str) -> bool {
    let stem = match file_name.rfind('.') {
        Some(pos) if pos > 0 => &file_name[..pos],
        _ => file_name,
    };
    parse_filename_date(stem).is_some()
}

/// Parse a leading date out of a file stem.
///
/// Recognizes `YYYY-MM-DD`, `YYYY_MM_DD`, and `YYYY.MM.DD` prefixes (so
/// `2025-09-17 standup` works) as well as a bare `YYYYMMDD`.
pub fn parse_filename_date(stem: &str) -> Option<NaiveDate> {
    let stem = stem.trim();
    if let Some(prefix) = stem.get(..10) {
        for fmt in ["%Y-%m-%d", "%Y_%m_%d", "%Y.%m.%d"] {
            if let Ok(date) = NaiveDate::parse_from_str(prefix, fmt) {
                return Some(date);
            }
        }
    }
    if let Some(prefix) = stem.get(..8) {
        let rest_is_boundary = stem[8..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_ascii_digit());
        if prefix.chars().all(|c| c.is_ascii_digit()) && rest_is_boundary {
            return NaiveDate::parse_from_str(prefix, "%Y%m%d").ok();
        }
    }
    None
}
