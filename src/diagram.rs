//! Mermaid diagram extraction from free-form model output.
//!
//! Two independent passes: explicit `--- START/END MERMAID CODE ---` markers
//! first, then ```` ```mermaid ```` fences that do not overlap a marker block.
//! Offsets are byte offsets into the original content.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

const START_MARKER: &str = "--- START MERMAID CODE ---";
const END_MARKER: &str = "--- END MERMAID CODE ---";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramBlock {
    pub code: String,
    pub start: usize,
    pub end: usize,
}

impl DiagramBlock {
    fn overlaps(&self, start: usize, end: usize) -> bool {
        (start >= self.start && start < self.end) || (self.start >= start && self.start < end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagramKind {
    Sequence,
    Graph,
    Flowchart,
    GitGraph,
    Pie,
    Journey,
    Gantt,
    Class,
    State,
    Er,
}

const KINDS: &[(&str, DiagramKind)] = &[
    ("sequenceDiagram", DiagramKind::Sequence),
    ("graph", DiagramKind::Graph),
    ("flowchart", DiagramKind::Flowchart),
    ("gitgraph", DiagramKind::GitGraph),
    ("pie", DiagramKind::Pie),
    ("journey", DiagramKind::Journey),
    ("gantt", DiagramKind::Gantt),
    ("classDiagram", DiagramKind::Class),
    ("stateDiagram", DiagramKind::State),
    ("erDiagram", DiagramKind::Er),
];

impl DiagramKind {
    pub fn keyword(self) -> &'static str {
        KINDS
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(kw, _)| *kw)
            .unwrap_or("graph")
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiagramError {
    #[error("Empty chart content after cleaning")]
    Empty,
    #[error("Invalid Mermaid diagram. Must start with: {}", keyword_list())]
    UnknownKind,
}

fn keyword_list() -> String {
    KINDS.iter().map(|(kw, _)| *kw).collect::<Vec<_>>().join(", ")
}

fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?s){}(.*?){}",
            regex::escape(START_MARKER),
            regex::escape(END_MARKER)
        ))
        .expect("marker pattern is valid")
    })
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```mermaid\s*\n(.*?)\n```").expect("fence pattern is valid")
    })
}

fn blank_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("blank-run pattern is valid"))
}

fn marker_blocks(content: &str) -> Vec<DiagramBlock> {
    marker_re()
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let code = caps.get(1)?.as_str().trim();
            (!code.is_empty()).then(|| DiagramBlock {
                code: code.to_string(),
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

fn fenced_blocks(content: &str) -> Vec<DiagramBlock> {
    fence_re()
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let code = caps.get(1)?.as_str().trim();
            (!code.is_empty()).then(|| DiagramBlock {
                code: code.to_string(),
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

/// All diagram blocks in `content`, in source order.
pub fn extract(content: &str) -> Vec<DiagramBlock> {
    let mut blocks = marker_blocks(content);
    let marked = blocks.len();
    for fenced in fenced_blocks(content) {
        let overlaps = blocks[..marked]
            .iter()
            .any(|existing| existing.overlaps(fenced.start, fenced.end));
        if !overlaps {
            blocks.push(fenced);
        }
    }
    // Stable: on an exact start tie the marker block stays first.
    blocks.sort_by_key(|b| b.start);
    tracing::trace!(count = blocks.len(), "extracted diagram blocks");
    blocks
}

/// `content` with every diagram block removed and blank runs collapsed.
pub fn strip(content: &str) -> String {
    let without_markers = marker_re().replace_all(content, "");
    let without_fences = fence_re().replace_all(&without_markers, "");
    blank_run_re()
        .replace_all(&without_fences, "\n\n")
        .trim()
        .to_string()
}

/// Check that `code` names a diagram type the renderer understands.
pub fn validate(code: &str) -> Result<DiagramKind, DiagramError> {
    let cleaned = code.trim();
    if cleaned.is_empty() {
        return Err(DiagramError::Empty);
    }
    let lower = cleaned.to_lowercase();
    KINDS
        .iter()
        .find(|(kw, _)| lower.starts_with(&kw.to_lowercase()))
        .map(|(_, kind)| *kind)
        .ok_or(DiagramError::UnknownKind)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(code: &str) -> String {
        format!("{START_MARKER}\n{code}\n{END_MARKER}")
    }

    fn fence(code: &str) -> String {
        format!("```mermaid\n{code}\n```")
    }

    #[test]
    fn extracts_marker_block_with_offsets() {
        let content = format!("intro\n{}\noutro", marker("graph TD\nA-->B"));
        let blocks = extract(&content);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].code, "graph TD\nA-->B");
        assert_eq!(blocks[0].start, 6);
        assert_eq!(&content[blocks[0].start..blocks[0].end], marker("graph TD\nA-->B"));
    }

    #[test]
    fn mixed_styles_come_back_in_source_order() {
        let content = format!(
            "{}\ntext\n{}\nmore\n{}",
            fence("pie\n\"a\": 1"),
            marker("graph LR\nX-->Y"),
            fence("sequenceDiagram\nA->>B: hi")
        );
        let blocks = extract(&content);
        let codes: Vec<&str> = blocks.iter().map(|b| b.code.as_str()).collect();
        assert_eq!(
            codes,
            vec!["pie\n\"a\": 1", "graph LR\nX-->Y", "sequenceDiagram\nA->>B: hi"]
        );
        assert!(blocks.windows(2).all(|w| w[0].start < w[1].start));
    }

    #[test]
    fn fence_inside_marker_is_not_duplicated() {
        let content = format!("{START_MARKER}\n{}\n{END_MARKER}", fence("graph TD\nA-->B"));
        let blocks = extract(&content);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].start, 0);
    }

    #[test]
    fn whitespace_only_blocks_are_dropped() {
        let content = format!("{START_MARKER}   \n\t  {END_MARKER}\n```mermaid\n  \n```");
        assert!(extract(&content).is_empty());
    }

    #[test]
    fn extraction_after_strip_is_empty() {
        let content = format!(
            "Here:\n\n{}\n\n\n\nand\n{}\nend",
            marker("graph TD\nA-->B"),
            fence("flowchart LR\nC-->D")
        );
        let stripped = strip(&content);
        assert!(extract(&stripped).is_empty());
        assert!(!stripped.contains("\n\n\n"));
        assert!(stripped.starts_with("Here:"));
        assert!(stripped.ends_with("end"));
    }

    #[test]
    fn extraction_is_idempotent() {
        let content = format!("{}\n{}", fence("gantt\ntitle x"), marker("journey\ntitle y"));
        assert_eq!(extract(&content), extract(&content));
    }

    #[test]
    fn invalid_code_is_still_extracted() {
        let content = marker("not a diagram");
        let blocks = extract(&content);
        assert_eq!(blocks.len(), 1);
        assert_eq!(validate(&blocks[0].code), Err(DiagramError::UnknownKind));
    }

    #[test]
    fn validation_is_case_insensitive() {
        assert_eq!(validate("  FlowChart TD\nA-->B"), Ok(DiagramKind::Flowchart));
        assert_eq!(validate("ERDIAGRAM\n"), Ok(DiagramKind::Er));
        assert_eq!(validate("   "), Err(DiagramError::Empty));
    }

    #[test]
    fn non_mermaid_fences_are_ignored() {
        let content = "```rust\nfn main() {}\n```";
        assert!(extract(content).is_empty());
        assert_eq!(strip(content), content);
    }

    #[test]
    fn error_message_lists_keywords() {
        let msg = DiagramError::UnknownKind.to_string();
        assert!(msg.starts_with("Invalid Mermaid diagram. Must start with: sequenceDiagram, graph"));
    }
}
