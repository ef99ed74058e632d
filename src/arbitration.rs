//! Source arbitration: decides which knowledge source answers a question.
//!
//! Tiers are evaluated in order; the first tier whose hits satisfy its
//! qualifier wins and later tiers are never queried. When no tier qualifies
//! the caller falls back to the web.

use tracing::{debug, info};

use crate::config::Settings;
use crate::types::{SearchHit, SourceLabel};
use crate::vector_search::VectorSearch;

/// Condition a tier's hits must meet to be accepted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Qualifier {
    /// The top hit's score must be strictly greater than the threshold.
    TopScoreAbove(f32),
    /// Any hit at all qualifies.
    AnyHit,
}

impl Qualifier {
    /// Checks `hits` (sorted by descending score) against this qualifier.
    pub fn accepts(&self, hits: &[SearchHit]) -> bool {
        match self {
            Qualifier::TopScoreAbove(threshold) => {
                hits.first().is_some_and(|top| top.score > *threshold)
            }
            Qualifier::AnyHit => !hits.is_empty(),
        }
    }
}

/// One knowledge source in the priority chain.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTier {
    /// Label reported when this tier wins.
    pub label: SourceLabel,
    /// Vector collection searched for this tier.
    pub collection: String,
    /// Acceptance rule for the tier's hits.
    pub qualifier: Qualifier,
}

impl SourceTier {
    /// Creates a tier.
    pub fn new(label: SourceLabel, collection: impl Into<String>, qualifier: Qualifier) -> Self {
        Self {
            label,
            collection: collection.into(),
            qualifier,
        }
    }
}

/// Outcome of one arbitration round.
#[derive(Debug, Clone, PartialEq)]
pub struct Arbitration {
    /// Hits of the winning tier; empty when the web was chosen.
    pub hits: Vec<SearchHit>,
    /// Winning source.
    pub source: SourceLabel,
}

/// Ordered chain of knowledge tiers with a web fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceArbitrator {
    tiers: Vec<SourceTier>,
    limit: usize,
}

impl SourceArbitrator {
    /// Builds an arbitrator over explicit tiers.
    pub fn new(tiers: Vec<SourceTier>, limit: usize) -> Self {
        Self {
            tiers,
            limit: limit.max(1),
        }
    }

    /// References first (confidence-gated), then notes (presence-only).
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            vec![
                SourceTier::new(
                    SourceLabel::References,
                    &settings.references_collection,
                    Qualifier::TopScoreAbove(settings.confidence_threshold),
                ),
                SourceTier::new(
                    SourceLabel::Notes,
                    &settings.notes_collection,
                    Qualifier::AnyHit,
                ),
            ],
            settings.search_limit,
        )
    }

    /// Tiers in evaluation order.
    pub fn tiers(&self) -> &[SourceTier] {
        &self.tiers
    }

    /// Picks the first qualifying tier, or [`SourceLabel::Web`].
    ///
    /// Must not be called with an empty vector.
    pub fn choose_source(&self, search: &dyn VectorSearch, vector: &[f32]) -> Arbitration {
        for tier in &self.tiers {
            let hits = search.search(&tier.collection, vector, self.limit);
            let top_score = hits.first().map(|hit| hit.score);
            if tier.qualifier.accepts(&hits) {
                info!(
                    source = %tier.label,
                    collection = %tier.collection,
                    hits = hits.len(),
                    top_score,
                    "knowledge source selected"
                );
                return Arbitration {
                    hits,
                    source: tier.label,
                };
            }
            debug!(
                collection = %tier.collection,
                hits = hits.len(),
                top_score,
                "tier did not qualify"
            );
        }
        info!("no knowledge base qualified; falling back to web search");
        Arbitration {
            hits: Vec::new(),
            source: SourceLabel::Web,
        }
    }
}
