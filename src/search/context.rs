/// RAG context assembly
///
/// Turns the final selection into the grounding string handed to a language
/// model plus one citation per included hit. Snippets are sanitized wiki text
/// and share a single character budget.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::index::PointId;

use super::{truncate_chars, Candidate, ScoreBreakdown};

static WIKI_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*==+\s*([^=]+?)\s*==+\s*").expect("valid heading regex"));
static TABLE_ROW_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\|-+").expect("valid table row regex"));
static PIPE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\|+").expect("valid pipe regex"));
static TEMPLATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{[^}]*\}\}").expect("valid template regex"));

/// Strip wiki markup noise and collapse whitespace.
pub fn sanitize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let text = WIKI_HEADING_RE.replace_all(text, "\n$1\n");
    let text = TABLE_ROW_RE.replace_all(&text, " ");
    let text = PIPE_RE.replace_all(&text, " ");
    let text = TEMPLATE_RE.replace_all(&text, " ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One cited chunk of the assembled context.
#[derive(Debug, Clone, Serialize)]
pub struct Citation {
    pub rank: usize,
    pub id: PointId,
    pub score: f64,
    pub title: String,
    pub source: String,
    pub chunk_index: u64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<ScoreBreakdown>,
}

#[derive(Debug, Clone, Default)]
pub struct AssembledContext {
    pub context: String,
    pub citations: Vec<Citation>,
}

/// Build the context string and citations within `context_chars` characters
/// of snippet text. A budget of 0 means unlimited.
pub fn assemble(selected: &[Candidate], context_chars: usize, include_debug: bool) -> AssembledContext {
    let mut parts: Vec<String> = Vec::new();
    let mut citations: Vec<Citation> = Vec::new();
    let mut used = 0usize;

    for (i, hit) in selected.iter().enumerate() {
        let rank = i + 1;
        let d = &hit.display;
        let header = format!("[{}] {} ({}, chunk {})", rank, d.title, d.source, d.chunk_index);
        let raw = if context_chars > 0 {
            truncate_chars(&d.text, context_chars.saturating_sub(used))
        } else {
            d.text.as_str()
        };
        let snippet = sanitize(raw);
        parts.push(format!("{}\n{}", header.trim(), snippet));
        used += snippet.chars().count();

        citations.push(Citation {
            rank,
            id: hit.id.clone(),
            score: hit.score,
            title: d.title.clone(),
            source: d.source.clone(),
            chunk_index: d.chunk_index,
            text: snippet,
            debug: include_debug.then(|| hit.breakdown()),
        });

        if context_chars > 0 && used >= context_chars {
            break;
        }
    }

    AssembledContext {
        context: parts.join("\n\n"),
        citations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::test_support::candidate;

    #[test]
    fn test_sanitize_wiki_markup() {
        assert_eq!(sanitize("== Реализация ==\nкод"), "Реализация код");
        assert_eq!(sanitize("{| class\n|-\n| a || b\n|}"), "{ class a b }");
        assert_eq!(sanitize("до {{шаблон|x}} после"), "до после");
        assert_eq!(sanitize("  много   \n\n пробелов "), "много пробелов");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn test_header_and_join() {
        let selected = vec![candidate(1, 2.0, "первый"), candidate(2, 1.0, "второй")];
        let ctx = assemble(&selected, 2000, false);
        assert_eq!(
            ctx.context,
            "[1] title 1 (doc1.tex, chunk 0)\nпервый\n\n[2] title 2 (doc2.tex, chunk 0)\nвторой"
        );
        assert_eq!(ctx.citations.len(), 2);
        assert_eq!(ctx.citations[1].rank, 2);
        assert!(ctx.citations[0].debug.is_none());
    }

    #[test]
    fn test_budget_stops_assembly() {
        let selected = vec![
            candidate(1, 3.0, &"а".repeat(80)),
            candidate(2, 2.0, &"б".repeat(80)),
            candidate(3, 1.0, &"в".repeat(80)),
        ];
        let ctx = assemble(&selected, 100, true);
        assert_eq!(ctx.citations.len(), 2);
        assert_eq!(ctx.citations[0].text.chars().count(), 80);
        assert_eq!(ctx.citations[1].text.chars().count(), 20);
        assert!(ctx.citations[0].debug.is_some());
    }

    #[test]
    fn test_citation_serialization_skips_missing_debug() {
        let ctx = assemble(&[candidate(7, 1.5, "текст")], 0, false);
        let json = serde_json::to_value(&ctx.citations[0]).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["chunk_index"], 0);
        assert!(json.get("debug").is_none());
    }
}
