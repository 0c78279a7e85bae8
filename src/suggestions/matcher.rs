use std::fmt;

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

/// Narrows candidate values to those matching an in-progress seed
pub struct SeedMatcher {
    matcher: SkimMatcherV2,
}

impl fmt::Debug for SeedMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedMatcher").finish_non_exhaustive()
    }
}

impl Default for SeedMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl SeedMatcher {
    pub fn new() -> Self {
        Self {
            matcher: SkimMatcherV2::default().ignore_case(),
        }
    }

    /// Indices of matching entries, best match first
    ///
    /// Prefix matches always outrank fuzzy matches. Equal scores keep the
    /// incoming order, so the store ranking breaks ties.
    pub fn filter(&self, seed: &str, entries: &[&str]) -> Vec<usize> {
        let seed = seed.trim();
        if seed.is_empty() {
            return (0..entries.len()).collect();
        }
        let lowered_seed = seed.to_lowercase();

        let mut scored: Vec<(usize, bool, i64)> = entries
            .iter()
            .enumerate()
            .filter_map(|(idx, entry)| {
                let is_prefix = entry.to_lowercase().starts_with(&lowered_seed);
                let score = self.matcher.fuzzy_match(entry, seed)?;
                Some((idx, is_prefix, score))
            })
            .collect();

        scored.sort_by(|a, b| b.1.cmp(&a.1).then(b.2.cmp(&a.2)));

        scored.into_iter().map(|(idx, _, _)| idx).collect()
    }
}

#[cfg(test)]
#[path = "matcher_tests.rs"]
mod matcher_tests;
