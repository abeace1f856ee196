use std::collections::{BTreeMap, BTreeSet, HashMap};

use regex::Regex;
use tracing::{debug, warn};

use quern_core::config::ClassifyConfig;
use quern_kb::DocumentListing;

/// Minimum token length indexed for inference. Shorter path fragments
/// ("md", "a") are pure noise.
const MIN_TOKEN_LEN: usize = 3;

/// Immutable routing index built from the document store listing.
///
/// Sections are the first path segment of each document (`growth/…` →
/// `growth`). Every alphanumeric path component of at least
/// [`MIN_TOKEN_LEN`] characters becomes an inference token for its section.
/// Aliases map user-typed prefixes to canonical section names; the singular
/// form of a plural section ("incident" for "incidents") is generated
/// automatically, and deployments can add more through config.
pub struct SectionIndex {
    sections: BTreeSet<String>,
    tokens: HashMap<String, BTreeSet<String>>,
    aliases: BTreeMap<String, String>,
    prefix_re: Option<Regex>,
}

impl SectionIndex {
    /// Build the index from a listing. Pure: same listing + config in, same
    /// index out.
    pub fn build(listing: &DocumentListing, config: &ClassifyConfig) -> Self {
        let mut sections: BTreeSet<String> = BTreeSet::new();
        let mut tokens: HashMap<String, BTreeSet<String>> = HashMap::new();

        for doc in &listing.documents {
            let Some(section) = section_of(&doc.path) else {
                continue;
            };
            sections.insert(section.clone());
            for token in tokenize(&doc.path) {
                tokens.entry(token).or_default().insert(section.clone());
            }
            for value in doc.metadata.values() {
                for token in tokenize(value) {
                    tokens.entry(token).or_default().insert(section.clone());
                }
            }
        }

        let mut aliases: BTreeMap<String, String> = BTreeMap::new();
        for section in &sections {
            aliases.insert(section.clone(), section.clone());
            // "incidents" also answers to "incident".
            if section.len() > MIN_TOKEN_LEN {
                if let Some(singular) = section.strip_suffix('s') {
                    aliases
                        .entry(singular.to_string())
                        .or_insert_with(|| section.clone());
                }
            }
        }
        for (alias, canonical) in &config.aliases {
            let alias = alias.to_lowercase();
            let canonical = canonical.to_lowercase();
            if sections.contains(&canonical) {
                aliases.insert(alias, canonical);
            } else {
                warn!(%alias, %canonical, "configured alias targets unknown section, ignored");
            }
        }

        let prefix_re = compile_prefix_regex(&aliases);
        debug!(
            sections = sections.len(),
            tokens = tokens.len(),
            aliases = aliases.len(),
            "section index built"
        );

        Self {
            sections,
            tokens,
            aliases,
            prefix_re,
        }
    }

    /// Index with no sections — explicit-prefix and inference routing both
    /// disabled, every message becomes one unlabeled query.
    pub fn empty() -> Self {
        Self {
            sections: BTreeSet::new(),
            tokens: HashMap::new(),
            aliases: BTreeMap::new(),
            prefix_re: None,
        }
    }

    /// Known canonical sections, lexicographically ordered.
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Canonical section for an alias, case-insensitive.
    pub fn canonical(&self, alias: &str) -> Option<&str> {
        self.aliases.get(&alias.to_lowercase()).map(String::as_str)
    }

    /// Sections whose documents mention `token`.
    pub fn sections_for_token(&self, token: &str) -> Option<&BTreeSet<String>> {
        self.tokens.get(token)
    }

    /// Compiled `<alias>:` prefix matcher, `None` when no sections exist.
    pub fn prefix_regex(&self) -> Option<&Regex> {
        self.prefix_re.as_ref()
    }
}

fn section_of(path: &str) -> Option<String> {
    let first = path.split('/').next()?.trim().to_lowercase();
    if first.is_empty() {
        None
    } else {
        Some(first)
    }
}

/// Lowercased alphanumeric runs of at least [`MIN_TOKEN_LEN`] characters.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= MIN_TOKEN_LEN)
        .map(str::to_string)
        .collect()
}

fn compile_prefix_regex(aliases: &BTreeMap<String, String>) -> Option<Regex> {
    if aliases.is_empty() {
        return None;
    }
    // Longest alternative first so "incidents:" never half-matches as
    // "incident" + stray "s".
    let mut alternatives: Vec<String> = aliases.keys().map(|a| regex::escape(a)).collect();
    alternatives.sort_by_key(|a| std::cmp::Reverse(a.len()));
    let pattern = format!(r"(?i)\b({})\s*:\s*", alternatives.join("|"));
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(error = %e, "failed to compile section prefix regex");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quern_kb::DocumentInfo;

    fn listing(paths: &[&str]) -> DocumentListing {
        let documents: Vec<DocumentInfo> = paths
            .iter()
            .map(|p| DocumentInfo {
                id: format!("doc-{p}"),
                path: p.to_string(),
                metadata: Default::default(),
            })
            .collect();
        DocumentListing {
            count: documents.len(),
            documents,
        }
    }

    #[test]
    fn sections_come_from_first_path_segment() {
        let idx = SectionIndex::build(
            &listing(&["growth/campaigns/launch.md", "handbook/refunds.md"]),
            &ClassifyConfig::default(),
        );
        let sections: Vec<&str> = idx.sections().collect();
        assert_eq!(sections, vec!["growth", "handbook"]);
    }

    #[test]
    fn path_tokens_map_to_their_section() {
        let idx = SectionIndex::build(
            &listing(&["handbook/refund-policy.md"]),
            &ClassifyConfig::default(),
        );
        let hits = idx.sections_for_token("refund").unwrap();
        assert!(hits.contains("handbook"));
        // Two-character fragments are not indexed.
        assert!(idx.sections_for_token("md").is_none());
    }

    #[test]
    fn singular_alias_is_generated_for_plural_sections() {
        let idx = SectionIndex::build(
            &listing(&["incidents/postmortem-2025.md"]),
            &ClassifyConfig::default(),
        );
        assert_eq!(idx.canonical("incident"), Some("incidents"));
        assert_eq!(idx.canonical("INCIDENTS"), Some("incidents"));
    }

    #[test]
    fn configured_alias_overrides_only_known_sections() {
        let mut config = ClassifyConfig::default();
        config.aliases.insert("people".into(), "handbook".into());
        config.aliases.insert("ghost".into(), "nowhere".into());
        let idx = SectionIndex::build(&listing(&["handbook/onboarding.md"]), &config);
        assert_eq!(idx.canonical("people"), Some("handbook"));
        assert_eq!(idx.canonical("ghost"), None);
    }

    #[test]
    fn empty_index_has_no_prefix_regex() {
        let idx = SectionIndex::empty();
        assert!(idx.is_empty());
        assert!(idx.prefix_regex().is_none());
    }

    #[test]
    fn prefix_regex_prefers_longest_alias() {
        let idx = SectionIndex::build(
            &listing(&["incidents/review.md"]),
            &ClassifyConfig::default(),
        );
        let re = idx.prefix_regex().unwrap();
        let caps = re.captures("incidents: what happened?").unwrap();
        assert_eq!(&caps[1], "incidents");
    }
}
