//! Multi-keyword retrieval with a fair per-keyword allocation

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;

use docqa_core::{EvidenceStore, Passage};

/// Passage budget used when the caller does not pick one
pub const DEFAULT_BUDGET: usize = 10;

/// How a passage budget is split across keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Allocation {
    /// Passages each keyword may contribute in the first pass
    pub per_keyword: usize,
    /// Extra passages handed out one per keyword in the second pass
    pub remainder: usize,
    /// `k` requested from the store for each keyword
    pub search_k: usize,
}

impl Allocation {
    /// Split `budget` across `keyword_count` keywords. `None` when there are no keywords.
    pub fn new(keyword_count: usize, budget: usize) -> Option<Self> {
        if keyword_count == 0 {
            return None;
        }
        let per_keyword = (budget / keyword_count).max(1);
        Some(Self {
            per_keyword,
            remainder: budget % keyword_count,
            search_k: per_keyword.saturating_mul(2),
        })
    }
}

/// Merge per-keyword result lists into one deduplicated, budget-bounded list.
///
/// `results` must be in keyword order with placeholders already removed.
/// The first pass takes up to `per_keyword` unseen passages from each list;
/// the second takes at most one more from each list while remainder is left.
/// Shortfalls are never backfilled from other keywords.
pub fn merge_fair(results: Vec<Vec<Passage>>, allocation: Allocation, budget: usize) -> Vec<Passage> {
    let available: usize = results.iter().map(Vec::len).sum();
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::with_capacity(available.min(budget));
    let mut pools: Vec<std::vec::IntoIter<Passage>> =
        results.into_iter().map(Vec::into_iter).collect();

    for pool in pools.iter_mut() {
        let mut taken = 0;
        while taken < allocation.per_keyword && merged.len() < budget {
            let Some(passage) = pool.next() else { break };
            if seen.insert(passage.content.clone()) {
                merged.push(passage);
                taken += 1;
            }
        }
    }

    let mut remainder = allocation.remainder;
    for pool in pools.iter_mut() {
        if remainder == 0 || merged.len() >= budget {
            break;
        }
        for passage in pool.by_ref() {
            if seen.insert(passage.content.clone()) {
                merged.push(passage);
                remainder -= 1;
                break;
            }
        }
    }

    merged
}

/// Retrieves evidence for a keyword set from a shared store
pub struct MultiKeywordRetriever {
    store: Arc<dyn EvidenceStore>,
}

impl MultiKeywordRetriever {
    pub fn new(store: Arc<dyn EvidenceStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn EvidenceStore> {
        &self.store
    }

    /// Retrieve at most `budget` unique passages, fairly split across `keywords`.
    ///
    /// Empty keywords are ignored. No store call is made when nothing is left
    /// or the budget is zero. A failing lookup contributes nothing.
    pub async fn retrieve(&self, keywords: &[String], budget: usize) -> Vec<Passage> {
        let keywords: Vec<&str> = keywords
            .iter()
            .map(String::as_str)
            .filter(|k| !k.is_empty())
            .collect();

        let Some(allocation) = Allocation::new(keywords.len(), budget) else {
            return Vec::new();
        };
        if budget == 0 {
            return Vec::new();
        }

        tracing::debug!(
            keywords = keywords.len(),
            budget,
            per_keyword = allocation.per_keyword,
            remainder = allocation.remainder,
            "Retrieving passages"
        );

        let results = join_all(
            keywords
                .iter()
                .map(|keyword| self.lookup(keyword, allocation.search_k)),
        )
        .await;

        let merged = merge_fair(results, allocation, budget);
        tracing::info!(count = merged.len(), budget, "Retrieved passages");
        merged
    }

    /// Single similarity lookup for `text`, bypassing the keyword allocation
    pub async fn retrieve_by_query(&self, text: &str, budget: usize) -> Vec<Passage> {
        if budget == 0 {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let mut passages: Vec<Passage> = self
            .lookup(text, budget)
            .await
            .into_iter()
            .filter(|p| seen.insert(p.content.clone()))
            .collect();
        passages.truncate(budget);
        passages
    }

    async fn lookup(&self, text: &str, k: usize) -> Vec<Passage> {
        match self.store.similarity_search(text, k).await {
            Ok(passages) => {
                let passages: Vec<Passage> =
                    passages.into_iter().filter(|p| !p.is_placeholder()).collect();
                tracing::debug!(keyword = text, found = passages.len(), "Store lookup");
                passages
            }
            Err(e) => {
                tracing::warn!(keyword = text, error = %e, "Store lookup failed, using no passages");
                Vec::new()
            }
        }
    }
}
