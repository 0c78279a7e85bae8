//! Suggestion Query Engine
//!
//! Ranks candidates for a field. Same-site history comes first; history from
//! other sites is merged in when the current site has little of its own.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;

use super::matcher::SeedMatcher;
use super::types::{QueryError, SuggestionQuery};
use crate::store::{SharedStore, StoreError, SuggestionRecord, with_store};

/// Default number of candidates returned
pub const DEFAULT_LIMIT: usize = 15;

/// Below this many scoped results the unscoped tier is merged in
pub const MIN_SCOPED_RESULTS: usize = 5;

/// Tier size for seeded queries, large enough to cover a whole field
const SEEDED_POOL_LIMIT: usize = u32::MAX as usize;

#[derive(Debug, Clone)]
pub struct SuggestionEngine {
    store: SharedStore,
    min_scoped_results: usize,
}

impl SuggestionEngine {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            min_scoped_results: MIN_SCOPED_RESULTS,
        }
    }

    pub fn with_min_scoped_results(mut self, min_scoped_results: usize) -> Self {
        self.min_scoped_results = min_scoped_results;
        self
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Ranked candidates for `field_identifier`
    pub fn get_suggestions(
        &self,
        field_identifier: &str,
        current_url_scope: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SuggestionRecord>, StoreError> {
        let query = SuggestionQuery::new(field_identifier)
            .with_scope(current_url_scope.map(str::to_string))
            .with_limit(limit);
        match self.run(&query, &CancellationToken::new()) {
            Ok(candidates) => Ok(candidates),
            Err(QueryError::Store(e)) => Err(e),
            Err(QueryError::Cancelled) => Ok(Vec::new()),
        }
    }

    /// Execute a query, checking `cancel_token` between the store tiers
    pub fn run(
        &self,
        query: &SuggestionQuery,
        cancel_token: &CancellationToken,
    ) -> Result<Vec<SuggestionRecord>, QueryError> {
        if cancel_token.is_cancelled() {
            return Err(QueryError::Cancelled);
        }
        let field = query.field_identifier.as_str();
        let seed = query.seed.as_deref().map(str::trim).filter(|s| !s.is_empty());
        // A seed narrows afterwards, so the tiers must not be cut to `limit` first
        let fetch_limit = if seed.is_some() {
            SEEDED_POOL_LIMIT
        } else {
            query.limit
        };

        let scoped = match query.url_scope.as_deref() {
            Some(scope) => Some(with_store(&self.store, |s| {
                s.query_by_field_and_scope(field, scope, fetch_limit)
            })?),
            None => None,
        };

        if cancel_token.is_cancelled() {
            return Err(QueryError::Cancelled);
        }

        let merged = match scoped {
            Some(scoped) if scoped.len() >= self.min_scoped_results => {
                merge_candidates(scoped, Vec::new(), fetch_limit)
            }
            Some(scoped) => {
                // Scoped rows can reappear in the unscoped tier, so over-fetch by that many
                let fetch = fetch_limit.saturating_add(scoped.len());
                let unscoped = with_store(&self.store, |s| s.query_by_field(field, fetch))?;
                merge_candidates(scoped, unscoped, fetch_limit)
            }
            None => {
                let unscoped = with_store(&self.store, |s| s.query_by_field(field, fetch_limit))?;
                merge_candidates(Vec::new(), unscoped, fetch_limit)
            }
        };

        if cancel_token.is_cancelled() {
            return Err(QueryError::Cancelled);
        }

        Ok(match seed {
            Some(seed) => {
                let mut refined = refine_with_seed(merged, seed);
                refined.truncate(query.limit);
                refined
            }
            None => merged,
        })
    }
}

/// Scoped records first, then unscoped records not already present, capped at `limit`
pub fn merge_candidates(
    scoped: Vec<SuggestionRecord>,
    unscoped: Vec<SuggestionRecord>,
    limit: usize,
) -> Vec<SuggestionRecord> {
    let mut seen = HashSet::new();
    scoped
        .into_iter()
        .chain(unscoped)
        .filter(|record| seen.insert(record.id))
        .take(limit)
        .collect()
}

/// Keep candidates matching the in-progress value, best match first
fn refine_with_seed(candidates: Vec<SuggestionRecord>, seed: &str) -> Vec<SuggestionRecord> {
    let matcher = SeedMatcher::new();
    let values: Vec<&str> = candidates.iter().map(|c| c.value.as_str()).collect();
    let order = matcher.filter(seed, &values);

    let mut slots: Vec<Option<SuggestionRecord>> = candidates.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|idx| slots.get_mut(idx).and_then(Option::take))
        .collect()
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod engine_tests;
