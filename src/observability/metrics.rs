//! Stage counters for the crawl pipeline.
//!
//! Uses the `metrics` facade only; without a recorder installed the calls
//! are no-ops, so library users pay nothing unless they wire an exporter.

/// Metric names, Prometheus-style.
pub mod names {
    pub const PAGES_FETCHED: &str = "souk_pages_fetched_total";
    pub const FETCH_RETRIES: &str = "souk_fetch_retries_total";
    pub const ITEMS_SEEN: &str = "souk_items_seen_total";
    pub const RECORDS_NORMALIZED: &str = "souk_records_normalized_total";
    pub const RECORDS_DROPPED: &str = "souk_records_dropped_total";
    pub const SITES_FAILED: &str = "souk_sites_failed_total";
}

pub fn page_fetched(site: &str) {
    metrics::counter!(names::PAGES_FETCHED, "site" => site.to_string()).increment(1);
}

pub fn fetch_retry(site: &str) {
    metrics::counter!(names::FETCH_RETRIES, "site" => site.to_string()).increment(1);
}

pub fn items_seen(site: &str, count: u64) {
    metrics::counter!(names::ITEMS_SEEN, "site" => site.to_string()).increment(count);
}

pub fn record_normalized(site: &str) {
    metrics::counter!(names::RECORDS_NORMALIZED, "site" => site.to_string()).increment(1);
}

pub fn record_dropped(site: &str, reason: &'static str) {
    metrics::counter!(
        names::RECORDS_DROPPED,
        "site" => site.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn site_failed(site: &str) {
    metrics::counter!(names::SITES_FAILED, "site" => site.to_string()).increment(1);
}
