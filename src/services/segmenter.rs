// Clause Segmenter
// Splits extracted contract text into ordered clauses using heading patterns,
// escalating through paragraph, line and whole-text fallbacks.

use std::sync::Arc;
use tracing::{debug, info};

use crate::models::{Clause, ClauseKind};
use crate::services::rules::CompiledRules;

const INTRO_ID: &str = "Intro";
const PARAGRAPH_MIN_CHARS: usize = 20;
const LINE_MIN_CHARS: usize = 10;

/// A fallback strategy: produce candidate blocks, or nothing when it does not apply.
pub trait BlockSplitter: Send + Sync {
    fn name(&self) -> &'static str;
    fn split(&self, text: &str) -> Vec<String>;
}

/// Blocks separated by blank lines.
pub struct ParagraphBlocks {
    pub min_chars: usize,
}

impl BlockSplitter for ParagraphBlocks {
    fn name(&self) -> &'static str {
        "paragraphs"
    }

    fn split(&self, text: &str) -> Vec<String> {
        text.split("\n\n")
            .map(str::trim)
            .filter(|p| p.chars().count() > self.min_chars)
            .map(str::to_string)
            .collect()
    }
}

/// Individual non-blank lines.
pub struct LineBlocks {
    pub min_chars: usize,
}

impl BlockSplitter for LineBlocks {
    fn name(&self) -> &'static str {
        "lines"
    }

    fn split(&self, text: &str) -> Vec<String> {
        text.split('\n')
            .map(str::trim)
            .filter(|l| l.chars().count() > self.min_chars)
            .map(str::to_string)
            .collect()
    }
}

/// The whole input as one block.
pub struct WholeText;

impl BlockSplitter for WholeText {
    fn name(&self) -> &'static str {
        "whole_text"
    }

    fn split(&self, text: &str) -> Vec<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.to_string()]
        }
    }
}

pub fn default_fallbacks() -> Vec<Box<dyn BlockSplitter>> {
    vec![
        Box::new(ParagraphBlocks {
            min_chars: PARAGRAPH_MIN_CHARS,
        }),
        Box::new(LineBlocks {
            min_chars: LINE_MIN_CHARS,
        }),
        Box::new(WholeText),
    ]
}

pub struct ClauseSegmenter {
    rules: Arc<CompiledRules>,
    fallbacks: Vec<Box<dyn BlockSplitter>>,
}

impl ClauseSegmenter {
    pub fn new(rules: Arc<CompiledRules>) -> Self {
        Self::with_fallbacks(rules, default_fallbacks())
    }

    pub fn with_fallbacks(rules: Arc<CompiledRules>, fallbacks: Vec<Box<dyn BlockSplitter>>) -> Self {
        Self { rules, fallbacks }
    }

    /// Never fails: empty input yields no clauses, anything else at least one.
    pub fn segment(&self, text: &str) -> Vec<Clause> {
        let clauses = self.segment_by_headings(text);
        if clauses.len() > 1 {
            debug!(clauses = clauses.len(), "segmenter.headings");
            return clauses;
        }

        for splitter in &self.fallbacks {
            let blocks = splitter.split(text);
            if blocks.is_empty() {
                continue;
            }
            info!(
                strategy = splitter.name(),
                blocks = blocks.len(),
                "segmenter.fallback"
            );
            return blocks
                .into_iter()
                .enumerate()
                .map(|(i, block)| Clause::new(format!("Section {}", i + 1), block, ClauseKind::Clause))
                .collect();
        }

        clauses
    }

    /// Heading scan only, without fallback escalation.
    pub fn segment_by_headings(&self, text: &str) -> Vec<Clause> {
        let mut clauses = Vec::new();
        let mut current = Clause::new(INTRO_ID, "", ClauseKind::Preamble);

        for line in text.split('\n').map(str::trim).filter(|l| !l.is_empty()) {
            match self.match_heading(line) {
                Some((id, rest)) => {
                    let finished = std::mem::replace(&mut current, Clause::new(id, rest, ClauseKind::Clause));
                    if !finished.text.trim().is_empty() {
                        clauses.push(finished);
                    }
                }
                None => {
                    if !current.text.is_empty() {
                        current.text.push(' ');
                    }
                    current.text.push_str(line);
                }
            }
        }

        if !current.text.trim().is_empty() {
            clauses.push(current);
        }

        clauses
    }

    /// First matching heading pattern wins; returns (label, remainder).
    fn match_heading(&self, line: &str) -> Option<(String, String)> {
        for heading in &self.rules.headings {
            let caps = match heading.regex.captures(line) {
                Some(c) => c,
                None => continue,
            };
            let groups: Vec<&str> = caps
                .iter()
                .skip(1)
                .flatten()
                .map(|m| m.as_str())
                .filter(|s| !s.is_empty())
                .collect();
            if groups.len() >= 2 {
                return Some((groups[0].to_string(), groups[groups.len() - 1].to_string()));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter() -> ClauseSegmenter {
        ClauseSegmenter::new(CompiledRules::builtin())
    }

    #[test]
    fn test_dotted_headings() {
        let text = "1.1 The Supplier shall not indemnify the Client.\n1.2 The Client may terminate at any time.";
        let clauses = segmenter().segment(text);
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].id, "1.1");
        assert_eq!(clauses[0].text, "The Supplier shall not indemnify the Client.");
        assert_eq!(clauses[0].kind, ClauseKind::Clause);
        assert_eq!(clauses[1].id, "1.2");
    }

    #[test]
    fn test_preamble_and_continuation_lines() {
        let text = "SERVICE AGREEMENT\nbetween the parties below\n\n1. Definitions apply\nacross lines\n2. Payment terms\nArticle IV: Governing law\n(a) first item\nb) second item";
        let clauses = segmenter().segment(text);
        let ids: Vec<&str> = clauses.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["Intro", "1.", "2.", "Article IV", "(a)", "b)"]);
        assert_eq!(clauses[0].kind, ClauseKind::Preamble);
        assert_eq!(clauses[0].text, "SERVICE AGREEMENT between the parties below");
        assert_eq!(clauses[1].text, "Definitions apply across lines");
        assert_eq!(clauses[3].text, "Governing law");
    }

    #[test]
    fn test_dotted_pattern_beats_single_level() {
        let clauses = segmenter().segment_by_headings("1.2.3 Deep heading text\n2. Next");
        assert_eq!(clauses[0].id, "1.2.3");
        assert_eq!(clauses[0].text, "Deep heading text");
    }

    #[test]
    fn test_empty_input_yields_no_clauses() {
        assert!(segmenter().segment("").is_empty());
        assert!(segmenter().segment("  \n\n \n").is_empty());
    }

    #[test]
    fn test_paragraph_fallback() {
        let text = "This agreement is made between two parties.\n\nThe supplier delivers goods every month.";
        let clauses = segmenter().segment(text);
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].id, "Section 1");
        assert_eq!(clauses[1].id, "Section 2");
        assert_eq!(clauses[1].text, "The supplier delivers goods every month.");
    }

    #[test]
    fn test_line_fallback_when_paragraphs_are_short() {
        let text = "Parties agree.\n\nPay monthly.\n\nok";
        let clauses = segmenter().segment(text);
        let texts: Vec<&str> = clauses.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["Parties agree.", "Pay monthly."]);
    }

    #[test]
    fn test_whole_text_fallback() {
        let clauses = segmenter().segment("Short.");
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].id, "Section 1");
        assert_eq!(clauses[0].text, "Short.");
    }

    #[test]
    fn test_single_heading_escalates_to_fallback() {
        let clauses = segmenter().segment("1.1 Only one heading here");
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].id, "Section 1");
    }

    #[test]
    fn test_custom_fallback_chain() {
        let seg = ClauseSegmenter::with_fallbacks(CompiledRules::builtin(), vec![Box::new(WholeText)]);
        let clauses = seg.segment("Line one is long enough\n\nLine two is long enough");
        assert_eq!(clauses.len(), 1);
        assert!(clauses[0].text.contains("Line two"));
    }
}
