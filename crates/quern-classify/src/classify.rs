use serde::{Deserialize, Serialize};

use quern_core::config::ClassifyConfig;

use crate::index::{tokenize, SectionIndex};

/// One routed query produced from a coalesced message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionQuery {
    /// Canonical section name, `None` for unlabeled queries.
    pub section: Option<String>,
    /// Metadata filter predicate for the answer call, e.g.
    /// `department="growth"`. Set exactly when `section` is.
    pub filter: Option<String>,
    /// Trimmed question text.
    pub query: String,
}

impl SectionQuery {
    fn labeled(section: &str, query: &str, config: &ClassifyConfig) -> Self {
        Self {
            section: Some(section.to_string()),
            filter: Some(format!(r#"{}="{}""#, config.filter_key, section)),
            query: query.to_string(),
        }
    }

    fn unlabeled(query: &str) -> Self {
        Self {
            section: None,
            filter: None,
            query: query.to_string(),
        }
    }
}

/// Split a message into routed queries.
///
/// Explicit `section:` prefixes (any known alias, case-insensitive, any
/// count) partition the text into labeled spans; empty spans are dropped.
/// Without a prefix, sections are inferred by token overlap and accepted at
/// `config.min_score`; ties break lexicographically so classification is
/// deterministic. When nothing matches, the whole text becomes one
/// unlabeled query.
pub fn classify(text: &str, index: &SectionIndex, config: &ClassifyConfig) -> Vec<SectionQuery> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if let Some(re) = index.prefix_regex() {
        let matches: Vec<(usize, usize, String)> = re
            .captures_iter(trimmed)
            .map(|caps| {
                let whole = caps.get(0).unwrap();
                (whole.start(), whole.end(), caps[1].to_string())
            })
            .collect();

        if !matches.is_empty() {
            let mut queries = Vec::with_capacity(matches.len());
            for (i, (_, end, alias)) in matches.iter().enumerate() {
                let span_end = matches
                    .get(i + 1)
                    .map(|(next_start, _, _)| *next_start)
                    .unwrap_or(trimmed.len());
                let span = trimmed[*end..span_end].trim();
                if span.is_empty() {
                    continue;
                }
                // The alias came out of the index's own regex, so the
                // canonical lookup cannot miss.
                if let Some(section) = index.canonical(alias) {
                    queries.push(SectionQuery::labeled(section, span, config));
                }
            }
            return queries;
        }
    }

    if let Some(section) = infer_section(trimmed, index, config) {
        return vec![SectionQuery::labeled(&section, trimmed, config)];
    }

    vec![SectionQuery::unlabeled(trimmed)]
}

/// Token-overlap inference. Returns the best-scoring section at or above the
/// configured threshold, lexicographically first among ties.
fn infer_section(text: &str, index: &SectionIndex, config: &ClassifyConfig) -> Option<String> {
    if index.is_empty() {
        return None;
    }

    let tokens = tokenize(text);
    let mut best: Option<(&str, u32)> = None;

    for section in index.sections() {
        let mut score = 0u32;
        if tokens.iter().any(|t| t == section) {
            score += config.name_weight;
        }
        for token in &tokens {
            if let Some(sections) = index.sections_for_token(token) {
                if sections.contains(section) {
                    score += config.token_weight;
                }
            }
        }
        // Strictly-greater keeps the lexicographically first section on ties
        // (sections() iterates in order).
        if score > best.map(|(_, s)| s).unwrap_or(0) {
            best = Some((section, score));
        }
    }

    match best {
        Some((section, score)) if score >= config.min_score => Some(section.to_string()),
        _ => None,
    }
}
