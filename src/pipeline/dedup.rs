//! Record validation and near-duplicate removal.
//!
//! Two layers, with two scopes. The [`SiteValidator`] runs inside each
//! worker and rejects records with missing mandatory fields or a colliding
//! site-scoped uniqueness key. The [`Deduplicator`] runs once over the
//! merged batch and collapses near-duplicates (same normalized title and
//! price within tolerance, or title similarity above a ratio). Both keep
//! the first-seen instance and count what they drop: this stage is where
//! thousands of raw candidates shrink to a clean batch, and the shrinkage
//! has to be accountable.

use serde::Serialize;
use std::collections::HashSet;

use crate::config::DedupConfig;
use crate::pipeline::normalize::NormalizedRecord;
use crate::pipeline::utils::{normalize_title, similarity};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    MissingTitle,
    MissingPrice,
    PriceParse,
    DuplicateKey,
    NearDuplicate,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::MissingTitle => "missing_title",
            DropReason::MissingPrice => "missing_price",
            DropReason::PriceParse => "price_parse",
            DropReason::DuplicateKey => "duplicate_key",
            DropReason::NearDuplicate => "near_duplicate",
        }
    }
}

/// Drop counts per reason, reported in site and run summaries.
#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq)]
pub struct RejectionCounts {
    pub missing_title: u64,
    pub missing_price: u64,
    pub price_parse: u64,
    pub duplicate_key: u64,
    pub near_duplicate: u64,
}

impl RejectionCounts {
    pub fn record(&mut self, reason: DropReason) {
        match reason {
            DropReason::MissingTitle => self.missing_title += 1,
            DropReason::MissingPrice => self.missing_price += 1,
            DropReason::PriceParse => self.price_parse += 1,
            DropReason::DuplicateKey => self.duplicate_key += 1,
            DropReason::NearDuplicate => self.near_duplicate += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.missing_title
            + self.missing_price
            + self.price_parse
            + self.duplicate_key
            + self.near_duplicate
    }

    pub fn merge(&mut self, other: &RejectionCounts) {
        self.missing_title += other.missing_title;
        self.missing_price += other.missing_price;
        self.price_parse += other.price_parse;
        self.duplicate_key += other.duplicate_key;
        self.near_duplicate += other.near_duplicate;
    }
}

/// Site-scoped validity gate. Owned by one worker, like the crawl state.
#[derive(Default)]
pub struct SiteValidator {
    seen_keys: HashSet<String>,
}

impl SiteValidator {
    /// The record id doubles as the uniqueness key (site + normalized
    /// title + price), so a collision means the same listing again.
    pub fn admit(&mut self, record: &NormalizedRecord) -> Result<(), DropReason> {
        if !self.seen_keys.insert(record.id.clone()) {
            return Err(DropReason::DuplicateKey);
        }
        Ok(())
    }
}

/// Cross-site near-duplicate collapse over the merged batch.
pub struct Deduplicator {
    price_tolerance: f64,
    similarity_threshold: f64,
}

impl Deduplicator {
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            price_tolerance: config.price_tolerance,
            similarity_threshold: config.similarity_threshold,
        }
    }

    /// Keeps first-seen instances in input order; returns survivors and
    /// the number dropped.
    pub fn dedupe(&self, batch: Vec<NormalizedRecord>) -> (Vec<NormalizedRecord>, u64) {
        let mut kept: Vec<NormalizedRecord> = Vec::with_capacity(batch.len());
        let mut kept_titles: Vec<String> = Vec::with_capacity(batch.len());
        let mut dropped = 0u64;

        for record in batch {
            let title = normalize_title(&record.title);
            let duplicate = kept
                .iter()
                .zip(kept_titles.iter())
                .any(|(seen, seen_title)| self.is_near_duplicate(seen, seen_title, &record, &title));
            if duplicate {
                dropped += 1;
            } else {
                kept.push(record);
                kept_titles.push(title);
            }
        }
        (kept, dropped)
    }

    fn is_near_duplicate(
        &self,
        seen: &NormalizedRecord,
        seen_title: &str,
        candidate: &NormalizedRecord,
        candidate_title: &str,
    ) -> bool {
        let tolerance = self.price_tolerance * seen.price_amount.max(1.0);
        if (seen.price_amount - candidate.price_amount).abs() > tolerance {
            return false;
        }
        if seen_title == candidate_title {
            return true;
        }
        similarity(seen_title, candidate_title) >= self.similarity_threshold
    }
}
