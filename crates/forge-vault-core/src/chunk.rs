//! Markdown-aware text chunker.
//!
//! Splits a [`Document`] body into [`Chunk`]s. Every chunk is a contiguous
//! byte span of the body (recorded in [`ChunkMeta::span`]), so the chunk
//! sequence can always be checked against the text it came from.
//!
//! # Algorithm
//!
//! Default documents use recursive splitting:
//!
//! 1. Pick the first separator from [`DEFAULT_SEPARATORS`] present in the
//!    text and cut before each occurrence, so the separator stays at the
//!    start of the piece it introduces (a new section keeps its heading).
//! 2. Pieces longer than `chunk_size` are split again with the remaining
//!    separators, down to a per-character hard split.
//! 3. Adjacent pieces are merged greedily up to `chunk_size`; after each
//!    emitted chunk the window keeps up to `chunk_overlap` trailing
//!    characters as the start of the next chunk.
//!
//! Documents classified as [`FolderType::Projects`] are split on `\n## `
//! first. Sections under `project_section_threshold` become one chunk;
//! larger sections go through a line splitter that never cuts a run of
//! checklist lines (`- [ ]`, `- [x]`).
//!
//! Lengths are measured in characters, not bytes. Chunks are
//! whitespace-trimmed. An empty or all-whitespace body yields exactly one
//! chunk equal to the body.

use std::collections::VecDeque;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::folder::FolderType;
use crate::models::{Chunk, ChunkMeta, Document};

/// Separator priority list for recursive splitting.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n## ", "\n### ", "\n\n", "\n", " "];

/// Chunk sizing parameters, deserialized from the `[chunking]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingParams {
    /// Target chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks (recursive splitter only).
    pub chunk_overlap: usize,
    /// Project sections shorter than this stay whole.
    pub project_section_threshold: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            project_section_threshold: 1200,
        }
    }
}

/// Split a document into chunks with contiguous indices starting at 0.
///
/// Chunk text is the raw body span. The indexer adds the `[stem] ` prefix
/// afterwards.
pub fn chunk_document(doc: &Document, params: &ChunkingParams) -> Vec<Chunk> {
    let body = doc.body.as_str();

    let folder_type = doc.folder_type();
    let mut spans = if folder_type == FolderType::Projects {
        split_project(body, params)
    } else {
        split_text(body, params)
    };
    if spans.is_empty() {
        spans.push(0..body.len());
    }

    let headings = heading_positions(body);
    let file_name = doc.file_name();
    let source = doc.source();

    spans
        .into_iter()
        .enumerate()
        .map(|(index, span)| Chunk {
            id: Uuid::new_v4().to_string(),
            text: body[span.clone()].to_string(),
            meta: ChunkMeta {
                source: source.clone(),
                rel_path: doc.rel_path.clone(),
                file_name: file_name.clone(),
                chunk_index: index,
                section: section_for(&headings, span.start),
                modified: doc.modified,
                content_hash: doc.content_hash.clone(),
                front: doc.metadata.clone(),
                span,
                folder_type: Some(folder_type),
            },
        })
        .collect()
}

/// Recursive split of `body` into trimmed, non-empty spans.
pub fn split_text(body: &str, params: &ChunkingParams) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    split_recursive(body, 0..body.len(), DEFAULT_SEPARATORS, params, &mut out);
    out
}

/// Whether a line is a markdown checklist item.
pub fn is_checklist_line(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("- [ ]") || t.starts_with("- [x]") || t.starts_with("- [X]")
}

/// Whether a line is an unchecked checklist item.
pub fn is_open_task(line: &str) -> bool {
    line.trim_start().starts_with("- [ ]")
}

/// Count `(open, completed)` checklist lines in `text`.
pub fn count_tasks(text: &str) -> (usize, usize) {
    text.lines()
        .filter(|l| is_checklist_line(l))
        .fold((0, 0), |(open, done), l| {
            if is_open_task(l) {
                (open + 1, done)
            } else {
                (open, done + 1)
            }
        })
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn split_recursive(
    body: &str,
    range: Range<usize>,
    separators: &[&str],
    params: &ChunkingParams,
    out: &mut Vec<Range<usize>>,
) {
    let slice = &body[range.clone()];
    let Some(idx) = separators.iter().position(|sep| slice.contains(sep)) else {
        hard_split(body, range, params, out);
        return;
    };
    let remaining = &separators[idx + 1..];

    let mut good: Vec<Range<usize>> = Vec::new();
    for piece in split_keep_start(body, range, separators[idx]) {
        if char_len(&body[piece.clone()]) <= params.chunk_size {
            good.push(piece);
            continue;
        }
        if !good.is_empty() {
            merge_pieces(body, &good, params, out);
            good.clear();
        }
        if remaining.is_empty() {
            hard_split(body, piece, params, out);
        } else {
            split_recursive(body, piece, remaining, params, out);
        }
    }
    if !good.is_empty() {
        merge_pieces(body, &good, params, out);
    }
}

/// Cut `range` before every occurrence of `sep`, keeping the separator at
/// the start of the following piece. Empty pieces are dropped.
fn split_keep_start(body: &str, range: Range<usize>, sep: &str) -> Vec<Range<usize>> {
    let slice = &body[range.clone()];
    let mut bounds = vec![range.start];
    bounds.extend(
        slice
            .match_indices(sep)
            .map(|(pos, _)| pos)
            .filter(|&pos| pos > 0)
            .map(|pos| range.start + pos),
    );
    bounds.push(range.end);
    bounds
        .windows(2)
        .filter(|w| w[1] > w[0])
        .map(|w| w[0]..w[1])
        .collect()
}

/// Greedy merge of contiguous pieces (each at most `chunk_size`) with a
/// sliding overlap window.
fn merge_pieces(
    body: &str,
    pieces: &[Range<usize>],
    params: &ChunkingParams,
    out: &mut Vec<Range<usize>>,
) {
    let mut window: VecDeque<(Range<usize>, usize)> = VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let len = char_len(&body[piece.clone()]);
        if total + len > params.chunk_size && !window.is_empty() {
            emit_window(body, &window, out);
            while total > params.chunk_overlap || (total + len > params.chunk_size && total > 0) {
                match window.pop_front() {
                    Some((_, dropped)) => total -= dropped,
                    None => break,
                }
            }
        }
        window.push_back((piece.clone(), len));
        total += len;
    }
    emit_window(body, &window, out);
}

fn emit_window(body: &str, window: &VecDeque<(Range<usize>, usize)>, out: &mut Vec<Range<usize>>) {
    if let (Some((first, _)), Some((last, _))) = (window.front(), window.back()) {
        push_trimmed(body, first.start..last.end, out);
    }
}

/// Fixed-width character windows for text with no usable separator.
fn hard_split(body: &str, range: Range<usize>, params: &ChunkingParams, out: &mut Vec<Range<usize>>) {
    let slice = &body[range.clone()];
    let mut offsets: Vec<usize> = slice.char_indices().map(|(i, _)| i).collect();
    offsets.push(slice.len());
    let chars = offsets.len() - 1;

    let size = params.chunk_size.max(1);
    let step = size.saturating_sub(params.chunk_overlap).max(1);
    let mut start = 0;
    loop {
        let end = (start + size).min(chars);
        push_trimmed(body, range.start + offsets[start]..range.start + offsets[end], out);
        if end >= chars {
            break;
        }
        start += step;
    }
}

/// Push `span` with surrounding whitespace removed, skipping blank spans.
fn push_trimmed(body: &str, span: Range<usize>, out: &mut Vec<Range<usize>>) {
    let s = &body[span.clone()];
    let lead = s.len() - s.trim_start().len();
    let trail = s.len() - s.trim_end().len();
    if lead + trail >= s.len() {
        return;
    }
    out.push(span.start + lead..span.end - trail);
}

fn split_project(body: &str, params: &ChunkingParams) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    for section in split_keep_start(body, 0..body.len(), "\n## ") {
        if char_len(&body[section.clone()]) < params.project_section_threshold {
            push_trimmed(body, section, &mut out);
        } else {
            split_task_preserving(body, section, params, &mut out);
        }
    }
    out
}

/// Line accumulator that treats each checklist run as one indivisible block.
fn split_task_preserving(
    body: &str,
    section: Range<usize>,
    params: &ChunkingParams,
    out: &mut Vec<Range<usize>>,
) {
    let mut acc: Option<Range<usize>> = None;
    let mut acc_len = 0usize;

    for (block, is_run) in line_blocks(body, section) {
        let len = char_len(&body[block.clone()]);

        if !is_run && len > params.chunk_size {
            if let Some(r) = acc.take() {
                push_trimmed(body, r, out);
            }
            acc_len = 0;
            split_recursive(body, block, DEFAULT_SEPARATORS, params, out);
            continue;
        }

        if acc.is_some() && acc_len + len > params.chunk_size {
            if let Some(r) = acc.take() {
                push_trimmed(body, r, out);
            }
            acc_len = 0;
        }

        acc = Some(match acc {
            Some(r) => r.start..block.end,
            None => block,
        });
        acc_len += len;
    }

    if let Some(r) = acc {
        push_trimmed(body, r, out);
    }
}

/// Group the lines of `section` into blocks. A checklist run (checklist
/// lines with blank lines between them) is one block flagged `true`;
/// every other line is its own block.
fn line_blocks(body: &str, section: Range<usize>) -> Vec<(Range<usize>, bool)> {
    let mut lines = Vec::new();
    let mut offset = section.start;
    for line in body[section].split_inclusive('\n') {
        lines.push(offset..offset + line.len());
        offset += line.len();
    }

    let is_check = |r: &Range<usize>| is_checklist_line(&body[r.clone()]);
    let is_blank = |r: &Range<usize>| body[r.clone()].trim().is_empty();

    let mut blocks = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        if !is_check(&lines[i]) {
            blocks.push((lines[i].clone(), false));
            i += 1;
            continue;
        }
        let mut last_check = i;
        let mut j = i + 1;
        while j < lines.len() && (is_check(&lines[j]) || is_blank(&lines[j])) {
            if is_check(&lines[j]) {
                last_check = j;
            }
            j += 1;
        }
        blocks.push((lines[i].start..lines[last_check].end, true));
        i = last_check + 1;
    }
    blocks
}

/// Byte offsets and titles of markdown ATX headings.
fn heading_positions(body: &str) -> Vec<(usize, String)> {
    let mut headings = Vec::new();
    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        let trimmed = line.trim_end();
        let hashes = trimmed.chars().take_while(|&c| c == '#').count();
        if (1..=6).contains(&hashes) && trimmed[hashes..].starts_with(' ') {
            let title = trimmed[hashes..].trim();
            if !title.is_empty() {
                headings.push((offset, title.to_string()));
            }
        }
        offset += line.len();
    }
    headings
}

fn section_for(headings: &[(usize, String)], start: usize) -> Option<String> {
    headings
        .iter()
        .take_while(|(pos, _)| *pos <= start)
        .last()
        .map(|(_, title)| title.clone())
}
