//! Drives the crawl: one worker per site, bounded by a semaphore.
//!
//! Isolation contract: a site's fatal failure terminates only that worker's
//! loop and is recorded in its report; the run always finishes and returns
//! whatever the other sites produced. Sessions are released on every exit
//! path by dropping the boxed session at the end of the worker.

use chrono::{DateTime, Utc};
use scraper::Html;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::ports::{PageSession, PageSnapshot, SessionProvider};
use crate::common::error::FetchError;
use crate::config::RunConfig;
use crate::infra::backoff::BackoffPolicy;
use crate::observability::metrics as obs;
use crate::pipeline::dedup::{Deduplicator, RejectionCounts, SiteValidator};
use crate::pipeline::extract::{extract_item, select_items};
use crate::pipeline::normalize::{NormalizeContext, NormalizedRecord, Normalizer};
use crate::pipeline::pagination::{paginator_for, CrawlState, CrawlStatus};
use crate::registry::SiteConfig;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteOutcome {
    Completed,
    PartiallyCompleted { reason: String },
    Failed { reason: String },
}

#[derive(Clone, Debug, Serialize)]
pub struct SiteReport {
    pub site: String,
    pub outcome: SiteOutcome,
    pub pages_fetched: u32,
    pub items_seen: u64,
    pub extracted: u64,
    pub normalized: u64,
    pub rejected: RejectionCounts,
}

impl SiteReport {
    fn new(site: &str) -> Self {
        Self {
            site: site.to_string(),
            outcome: SiteOutcome::Completed,
            pages_fetched: 0,
            items_seen: 0,
            extracted: 0,
            normalized: 0,
            rejected: RejectionCounts::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sites: Vec<SiteReport>,
    /// Item containers seen across all pages of all sites.
    pub raw_items: u64,
    /// Records that survived per-site validation.
    pub validated_records: u64,
    /// Records in the final batch after cross-site deduplication.
    pub final_records: u64,
    pub rejected: RejectionCounts,
}

pub struct CrawlOrchestrator {
    sites: Vec<SiteConfig>,
    provider: Arc<dyn SessionProvider>,
    config: Arc<RunConfig>,
}

impl CrawlOrchestrator {
    pub fn new(
        sites: Vec<SiteConfig>,
        provider: Arc<dyn SessionProvider>,
        config: Arc<RunConfig>,
    ) -> Self {
        Self { sites, provider, config }
    }

    /// Crawl every configured site and return the deduplicated batch plus
    /// the run summary. Never fails because a site failed.
    pub async fn run(&self, cancel: CancellationToken) -> (Vec<NormalizedRecord>, RunSummary) {
        let started_at = Utc::now();
        let semaphore = Arc::new(Semaphore::new(self.config.crawler.concurrency.max(1)));
        let mut workers = JoinSet::new();

        for site in self.sites.clone() {
            let semaphore = Arc::clone(&semaphore);
            let provider = Arc::clone(&self.provider);
            let config = Arc::clone(&self.config);
            let cancel = cancel.clone();
            workers.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                crawl_site(site, provider, config, cancel).await
            });
        }

        let mut reports = Vec::new();
        let mut merged: Vec<NormalizedRecord> = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((report, records)) => {
                    // per-site batches stay contiguous in the merged order
                    merged.extend(records);
                    reports.push(report);
                }
                Err(e) => error!(error = %e, "site worker panicked"),
            }
        }

        let raw_items: u64 = reports.iter().map(|r| r.items_seen).sum();
        let validated_records = merged.len() as u64;
        let (records, near_duplicates) = Deduplicator::new(&self.config.dedup).dedupe(merged);

        let mut rejected = RejectionCounts::default();
        for report in &reports {
            rejected.merge(&report.rejected);
        }
        rejected.near_duplicate += near_duplicates;

        info!(
            sites = reports.len(),
            raw_items,
            validated_records,
            final_records = records.len(),
            near_duplicates,
            "crawl run finished"
        );

        let summary = RunSummary {
            run_id: Uuid::new_v4().to_string(),
            started_at,
            finished_at: Utc::now(),
            sites: reports,
            raw_items,
            validated_records,
            final_records: records.len() as u64,
            rejected,
        };
        (records, summary)
    }
}

#[tracing::instrument(skip_all, fields(site = %site.name))]
async fn crawl_site(
    site: SiteConfig,
    provider: Arc<dyn SessionProvider>,
    config: Arc<RunConfig>,
    cancel: CancellationToken,
) -> (SiteReport, Vec<NormalizedRecord>) {
    let mut report = SiteReport::new(&site.name);
    let mut batch: Vec<NormalizedRecord> = Vec::new();

    let paginator = match paginator_for(&site) {
        Ok(p) => p,
        Err(e) => {
            report.outcome = SiteOutcome::Failed { reason: format!("pagination setup: {e}") };
            obs::site_failed(&site.name);
            return (report, batch);
        }
    };
    let first = match paginator.first_page() {
        Ok(p) => p,
        Err(e) => {
            report.outcome = SiteOutcome::Failed { reason: format!("first page ref: {e}") };
            obs::site_failed(&site.name);
            return (report, batch);
        }
    };

    let mut session = match provider.acquire(&site).await {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "could not acquire session");
            report.outcome = SiteOutcome::Failed { reason: format!("session: {e}") };
            obs::site_failed(&site.name);
            return (report, batch);
        }
    };

    let backoff = BackoffPolicy::from_config(&config.retry);
    let normalizer = Normalizer::new(&config.normalize);
    let mut validator = SiteValidator::default();
    let mut state = CrawlState::new(&site.name, first);

    while state.status == CrawlStatus::Active {
        if cancel.is_cancelled() {
            info!(page = state.current.number, "cancellation requested, stopping between pages");
            report.outcome = SiteOutcome::PartiallyCompleted { reason: "cancelled".to_string() };
            break;
        }

        let snapshot = match fetch_with_retry(session.as_mut(), &state, &backoff, &cancel).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(page = state.current.number, error = %e, "fetch failed after retries");
                state.status = CrawlStatus::Failed;
                report.outcome = SiteOutcome::Failed { reason: e.to_string() };
                obs::site_failed(&site.name);
                break;
            }
        };
        report.pages_fetched += 1;
        obs::page_fetched(&site.name);
        let fetched_at = Utc::now();

        // scraper::Html is not Send; the document must not live across the
        // next await, so the whole page is processed inside this block.
        let advanced = {
            let document = Html::parse_document(&snapshot.html);
            let items = select_items(&document, &site.item_selectors);
            report.items_seen += items.len() as u64;
            obs::items_seen(&site.name, items.len() as u64);
            let ctx = NormalizeContext { site: &site, page_url: &snapshot.url, fetched_at };
            for item in &items {
                let fields = extract_item(item, &site.fields);
                if fields.is_empty() {
                    continue;
                }
                report.extracted += 1;
                let admitted = normalizer
                    .normalize(&fields, &ctx)
                    .and_then(|record| validator.admit(&record).map(|()| record));
                match admitted {
                    Ok(record) => {
                        report.normalized += 1;
                        obs::record_normalized(&site.name);
                        batch.push(record);
                    }
                    Err(reason) => {
                        report.rejected.record(reason);
                        obs::record_dropped(&site.name, reason.as_str());
                    }
                }
            }
            paginator.advance(&mut state, items.len())
        };

        if let Err(e) = advanced {
            error!(error = %e, "pagination state could not be advanced");
            report.outcome = SiteOutcome::Failed { reason: e.to_string() };
            obs::site_failed(&site.name);
            break;
        }
        debug!(
            next_page = state.current.number,
            status = ?state.status,
            "page processed"
        );
    }

    // Session released here on every path: completion, exhaustion, fatal
    // error or cancellation.
    drop(session);
    info!(
        pages = report.pages_fetched,
        records = report.normalized,
        outcome = ?report.outcome,
        "site crawl finished"
    );
    (report, batch)
}

async fn fetch_with_retry(
    session: &mut dyn PageSession,
    state: &CrawlState,
    policy: &BackoffPolicy,
    cancel: &CancellationToken,
) -> Result<PageSnapshot, FetchError> {
    let mut attempt = 1u32;
    loop {
        match session.fetch(&state.current).await {
            Ok(snapshot) => return Ok(snapshot),
            Err(err) => {
                if attempt >= policy.max_attempts || cancel.is_cancelled() {
                    return Err(err);
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    site = %state.site,
                    page = state.current.number,
                    attempt,
                    error = %err,
                    ?delay,
                    "transient fetch failure, backing off"
                );
                obs::fetch_retry(&state.site);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
