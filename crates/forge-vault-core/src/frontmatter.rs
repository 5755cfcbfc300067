//! YAML front-matter extraction.
//!
//! A note may start with a block fenced by `---` lines. The interior is
//! parsed with `serde_yaml` and flattened into [`Metadata`]: every value is
//! reduced to a plain string so the index layer only ever stores scalars.
//!
//! Parsing never fails. A malformed block, a block that is not a mapping,
//! or a missing closing fence leaves the whole text as body with empty
//! metadata and reports the problem in [`FrontMatter::error`] so the caller
//! can log it against the file path.

use serde_yaml::Value;

use crate::models::Metadata;

/// Result of splitting a note into metadata and body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    pub metadata: Metadata,
    pub body: String,
    /// Why the front-matter block was ignored, if it was.
    pub error: Option<String>,
}

impl FrontMatter {
    fn plain(text: &str, error: Option<String>) -> Self {
        Self {
            metadata: Metadata::new(),
            body: text.to_string(),
            error,
        }
    }
}

/// Split `text` into normalized front-matter and body.
pub fn parse_front_matter(text: &str) -> FrontMatter {
    let text_no_bom = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut lines = text_no_bom.split_inclusive('\n');
    let first = match lines.next() {
        Some(line) => line,
        None => return FrontMatter::plain(text, None),
    };
    if first.trim_end() != "---" {
        return FrontMatter::plain(text, None);
    }

    let mut offset = first.len();
    let mut close: Option<(usize, usize)> = None;
    for line in lines {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            close = Some((offset, offset + line.len()));
            break;
        }
        offset += line.len();
    }

    let (interior_end, body_start) = match close {
        Some(span) => span,
        None => {
            return FrontMatter::plain(text, Some("missing closing `---` fence".to_string()));
        }
    };

    let interior = &text_no_bom[first.len()..interior_end];
    let body = text_no_bom[body_start..].trim_start_matches(['\r', '\n']);

    if interior.trim().is_empty() {
        return FrontMatter {
            metadata: Metadata::new(),
            body: body.to_string(),
            error: None,
        };
    }

    let value: Value = match serde_yaml::from_str(interior) {
        Ok(v) => v,
        Err(e) => return FrontMatter::plain(text, Some(format!("invalid YAML: {e}"))),
    };

    let mapping = match value {
        Value::Mapping(m) => m,
        Value::Null => {
            return FrontMatter {
                metadata: Metadata::new(),
                body: body.to_string(),
                error: None,
            }
        }
        _ => {
            return FrontMatter::plain(
                text,
                Some("front-matter is not a key/value mapping".to_string()),
            )
        }
    };

    let mut metadata = Metadata::new();
    for (key, value) in mapping {
        let key = scalar_to_string(&key);
        if key.is_empty() {
            continue;
        }
        metadata.insert(key, scalar_to_string(&value));
    }

    FrontMatter {
        metadata,
        body: body.to_string(),
        error: None,
    }
}

/// Flatten a YAML value into a display string.
///
/// Sequences become `a, b`, mappings become compact JSON, null becomes the
/// empty string.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(items) => items
            .iter()
            .map(scalar_to_string)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Mapping(_) => serde_json::to_string(value).unwrap_or_else(|_| {
            serde_yaml::to_string(value)
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        }),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
    }
}

/// Split a comma-separated metadata value (such as normalized `tags`) into
/// lowercase items, dropping any leading `#`.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().trim_start_matches('#').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_front_matter() {
        let fm = parse_front_matter("# Title\n\nBody text");
        assert!(fm.metadata.is_empty());
        assert_eq!(fm.body, "# Title\n\nBody text");
        assert!(fm.error.is_none());
    }

    #[test]
    fn test_scalar_values() {
        let text = "---\ntype: project\nstatus: active\npriority: 2\ndone: false\n---\n# Homelab\n";
        let fm = parse_front_matter(text);
        assert_eq!(fm.metadata["type"], "project");
        assert_eq!(fm.metadata["status"], "active");
        assert_eq!(fm.metadata["priority"], "2");
        assert_eq!(fm.metadata["done"], "false");
        assert_eq!(fm.body, "# Homelab\n");
    }

    #[test]
    fn test_list_and_date_normalization() {
        let text = "---\ntags: [network, homelab]\ncreated: 2025-09-17\nowner:\n---\nbody";
        let fm = parse_front_matter(text);
        assert_eq!(fm.metadata["tags"], "network, homelab");
        assert_eq!(fm.metadata["created"], "2025-09-17");
        assert_eq!(fm.metadata["owner"], "");
    }

    #[test]
    fn test_nested_mapping_becomes_json() {
        let text = "---\nspecs:\n  ram: 16GB\n  cpu: n100\n---\nbody";
        let fm = parse_front_matter(text);
        let specs: serde_json::Value = serde_json::from_str(&fm.metadata["specs"]).unwrap();
        assert_eq!(specs["ram"], "16GB");
        assert_eq!(specs["cpu"], "n100");
    }

    #[test]
    fn test_malformed_yaml_keeps_whole_text() {
        let text = "---\ntype: [unclosed\n---\nbody";
        let fm = parse_front_matter(text);
        assert!(fm.metadata.is_empty());
        assert_eq!(fm.body, text);
        assert!(fm.error.is_some());
    }

    #[test]
    fn test_missing_closing_fence() {
        let text = "---\ntype: project\nno end";
        let fm = parse_front_matter(text);
        assert!(fm.metadata.is_empty());
        assert_eq!(fm.body, text);
        assert!(fm.error.is_some());
    }

    #[test]
    fn test_non_mapping_block() {
        let text = "---\n- a\n- b\n---\nbody";
        let fm = parse_front_matter(text);
        assert!(fm.metadata.is_empty());
        assert_eq!(fm.body, text);
    }

    #[test]
    fn test_empty_block() {
        let fm = parse_front_matter("---\n---\nbody");
        assert!(fm.metadata.is_empty());
        assert_eq!(fm.body, "body");
        assert!(fm.error.is_none());
    }

    #[test]
    fn test_crlf_fences() {
        let fm = parse_front_matter("---\r\ntype: log\r\n---\r\nentry");
        assert_eq!(fm.metadata["type"], "log");
        assert_eq!(fm.body, "entry");
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("#network, Homelab ,"), vec!["network", "homelab"]);
        assert!(split_list("").is_empty());
    }
}
