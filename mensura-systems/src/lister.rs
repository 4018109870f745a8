//! Read-only name lookup with suggestions for misspelled names

use std::collections::{BTreeMap, HashSet};

use mensura_core::{Result, UnitError};

/// Reject names reserved for internals: empty or starting with `_`
pub fn guard_attribute(owner: &str, name: &str) -> Result<()> {
    if name.is_empty() || name.starts_with('_') {
        return Err(UnitError::UnknownAttribute {
            owner: owner.to_string(),
            name: name.to_string(),
            suggestions: Vec::new(),
        });
    }
    Ok(())
}

/// Closeness of `candidate` to `query`; 0 means unrelated
fn similarity_score(query: &str, candidate: &str) -> usize {
    let query = query.to_lowercase();
    let candidate = candidate.to_lowercase();
    let mut score = 0;

    if candidate.starts_with(&query) {
        score += 100;
    } else if candidate.contains(&query) {
        score += 50;
    } else if query.contains(&candidate) {
        score += 30;
    }

    let query_chars: HashSet<char> = query.chars().collect();
    let candidate_chars: HashSet<char> = candidate.chars().collect();
    score += query_chars.intersection(&candidate_chars).count() * 2;

    let len_diff = query.chars().count().abs_diff(candidate.chars().count());
    if len_diff < 5 && score > 0 {
        score += 5 - len_diff;
    }

    score
}

/// Up to five names closest to `query`, best first
pub(crate) fn suggest<'a>(query: &str, names: impl Iterator<Item = &'a str>) -> Vec<String> {
    // Require more than a shared character or two
    let threshold = query.chars().count().min(3) * 2 + 1;
    let mut matches: Vec<(&str, usize)> = names
        .map(|name| (name, similarity_score(query, name)))
        .filter(|(_, score)| *score > threshold)
        .collect();
    matches.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    matches.into_iter().take(5).map(|(name, _)| name.to_string()).collect()
}

/// Named view over a snapshot of a mapping
#[derive(Debug, Clone)]
pub struct Lister<V> {
    owner: String,
    entries: BTreeMap<String, V>,
}

impl<V> Lister<V> {
    pub fn new(owner: impl Into<String>, entries: BTreeMap<String, V>) -> Self {
        Self { owner: owner.into(), entries }
    }

    /// Look up `name`; unknown names report similar ones
    pub fn get(&self, name: &str) -> Result<&V> {
        guard_attribute(&self.owner, name)?;
        self.entries.get(name).ok_or_else(|| UnitError::UnknownAttribute {
            owner: self.owner.clone(),
            name: name.to_string(),
            suggestions: suggest(name, self.names()),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(|name| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> + '_ {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }
}
