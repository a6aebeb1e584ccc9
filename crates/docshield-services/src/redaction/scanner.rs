//! Text scanning: run selected rules and substitute replacement tokens.

use docshield_core::models::PatternUsage;
use docshield_core::AppError;
use serde::Serialize;
use std::sync::Arc;

use super::library::{PatternLibrary, RuleSelection, SelectedRule};

/// Token used when a redacted span was produced by more than one rule.
pub const MERGED_TOKEN: &str = "[REDACTED]";

/// One raw rule match, byte offsets into the scanned text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternMatch {
    pub start: usize,
    pub end: usize,
    pub rule_id: String,
    pub template_id: Option<String>,
    pub text: String,
}

/// A span that was replaced in the output, after merging overlaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedactedSpan {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextScanResult {
    pub redacted_text: String,
    /// Raw matches across all rules, counted before overlaps are merged
    pub total_matches: usize,
    /// Rules with at least one match, in selection order
    pub patterns_used: Vec<PatternUsage>,
    pub spans: Vec<RedactedSpan>,
}

#[derive(Clone)]
pub struct ContentScanner {
    library: Arc<PatternLibrary>,
}

impl ContentScanner {
    pub fn new(library: Arc<PatternLibrary>) -> Self {
        Self { library }
    }

    pub fn library(&self) -> &Arc<PatternLibrary> {
        &self.library
    }

    /// Every non-empty match of every selected rule, ordered by position.
    pub fn find_matches(
        &self,
        text: &str,
        selection: &RuleSelection,
    ) -> Result<Vec<PatternMatch>, AppError> {
        let rules = self.library.resolve(selection)?;
        let mut matches: Vec<PatternMatch> = collect(text, &rules)
            .into_iter()
            .map(|m| PatternMatch {
                start: m.start,
                end: m.end,
                rule_id: rules[m.rule].compiled.rule.id.clone(),
                template_id: rules[m.rule].template_id.clone(),
                text: text[m.start..m.end].to_string(),
            })
            .collect();
        matches.sort_by(|a, b| (a.start, a.end).cmp(&(b.start, b.end)));
        Ok(matches)
    }

    /// Replace every match with its rule's token.
    ///
    /// Overlapping matches are merged into one span. A span produced by a
    /// single rule gets that rule's token; a span produced by several gets
    /// [`MERGED_TOKEN`]. Touching spans stay separate.
    pub fn scan(&self, text: &str, selection: &RuleSelection) -> Result<TextScanResult, AppError> {
        let rules = self.library.resolve(selection)?;
        let mut raw = collect(text, &rules);
        let total_matches = raw.len();

        let mut counts = vec![0usize; rules.len()];
        for m in &raw {
            counts[m.rule] += 1;
        }
        let patterns_used = rules
            .iter()
            .zip(&counts)
            .filter(|(_, count)| **count > 0)
            .map(|(selected, count)| PatternUsage {
                template_id: selected.template_id.clone(),
                rule_id: selected.compiled.rule.id.clone(),
                count: *count,
            })
            .collect();

        raw.sort_by_key(|m| (m.start, m.end));
        let spans = merge(&raw, &rules);

        let mut redacted_text = String::with_capacity(text.len());
        let mut cursor = 0;
        for span in &spans {
            redacted_text.push_str(&text[cursor..span.start]);
            redacted_text.push_str(&span.replacement);
            cursor = span.end;
        }
        redacted_text.push_str(&text[cursor..]);

        tracing::debug!(
            rules = rules.len(),
            total_matches,
            spans = spans.len(),
            "Text scanned"
        );

        Ok(TextScanResult {
            redacted_text,
            total_matches,
            patterns_used,
            spans,
        })
    }
}

struct RawMatch {
    start: usize,
    end: usize,
    rule: usize,
}

fn collect(text: &str, rules: &[SelectedRule]) -> Vec<RawMatch> {
    rules
        .iter()
        .enumerate()
        .flat_map(|(index, selected)| {
            selected
                .compiled
                .regex
                .find_iter(text)
                .filter(|m| !m.is_empty())
                .map(move |m| RawMatch {
                    start: m.start(),
                    end: m.end(),
                    rule: index,
                })
        })
        .collect()
}

/// `raw` must be sorted by start offset.
fn merge(raw: &[RawMatch], rules: &[SelectedRule]) -> Vec<RedactedSpan> {
    let mut spans = Vec::new();
    let mut iter = raw.iter();
    let Some(first) = iter.next() else {
        return spans;
    };

    let (mut start, mut end, mut rule, mut mixed) = (first.start, first.end, first.rule, false);
    let token = |rule: usize, mixed: bool| {
        if mixed {
            MERGED_TOKEN.to_string()
        } else {
            rules[rule].compiled.rule.replacement_token()
        }
    };

    for m in iter {
        if m.start < end {
            end = end.max(m.end);
            mixed |= m.rule != rule;
        } else {
            spans.push(RedactedSpan {
                start,
                end,
                replacement: token(rule, mixed),
            });
            (start, end, rule, mixed) = (m.start, m.end, m.rule, false);
        }
    }
    spans.push(RedactedSpan {
        start,
        end,
        replacement: token(rule, mixed),
    });
    spans
}
