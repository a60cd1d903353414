//! Output sinks: JSON and CSV record dumps plus a run summary with
//! per-site price statistics.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::common::error::Result;
use crate::pipeline::normalize::NormalizedRecord;
use crate::pipeline::orchestrator::RunSummary;

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SiteStats {
    pub site: String,
    pub count: u64,
    pub min_price: f64,
    pub max_price: f64,
    pub mean_price: f64,
    pub median_price: f64,
}

/// Per-site price statistics over the final batch, sites in name order.
pub fn compute_stats(records: &[NormalizedRecord]) -> Vec<SiteStats> {
    let mut by_site: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for record in records {
        by_site.entry(&record.source_site).or_default().push(record.price_amount);
    }
    by_site
        .into_iter()
        .map(|(site, mut prices)| {
            prices.sort_by(|a, b| a.partial_cmp(b).expect("prices are finite"));
            let count = prices.len();
            let sum: f64 = prices.iter().sum();
            let median = if count % 2 == 1 {
                prices[count / 2]
            } else {
                (prices[count / 2 - 1] + prices[count / 2]) / 2.0
            };
            SiteStats {
                site: site.to_string(),
                count: count as u64,
                min_price: prices[0],
                max_price: prices[count - 1],
                mean_price: round2(sum / count as f64),
                median_price: round2(median),
            }
        })
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Serialize)]
struct SummaryDocument<'a> {
    #[serde(flatten)]
    summary: &'a RunSummary,
    site_stats: &'a [SiteStats],
}

pub struct RecordSink {
    out_dir: PathBuf,
    stamp: String,
}

impl RecordSink {
    pub fn new(out_dir: &Path, started_at: DateTime<Utc>) -> Result<Self> {
        fs::create_dir_all(out_dir)?;
        Ok(Self {
            out_dir: out_dir.to_path_buf(),
            stamp: started_at.format("%Y%m%d_%H%M%S").to_string(),
        })
    }

    fn path(&self, prefix: &str, ext: &str) -> PathBuf {
        self.out_dir.join(format!("{}_{}.{}", prefix, self.stamp, ext))
    }

    pub fn write_json(&self, records: &[NormalizedRecord]) -> Result<PathBuf> {
        let path = self.path("listings", "json");
        let file = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(file, records)?;
        info!(path = %path.display(), count = records.len(), "wrote JSON batch");
        Ok(path)
    }

    pub fn write_csv(&self, records: &[NormalizedRecord]) -> Result<PathBuf> {
        let path = self.path("listings", "csv");
        let mut writer = csv::Writer::from_path(&path)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        info!(path = %path.display(), count = records.len(), "wrote CSV batch");
        Ok(path)
    }

    pub fn write_summary(&self, summary: &RunSummary, stats: &[SiteStats]) -> Result<PathBuf> {
        let path = self.path("summary", "json");
        let file = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(file, &SummaryDocument { summary, site_stats: stats })?;
        info!(path = %path.display(), "wrote run summary");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::dedup::RejectionCounts;
    use crate::pipeline::orchestrator::{SiteOutcome, SiteReport};
    use chrono::TimeZone;

    fn record(site: &str, title: &str, price: f64) -> NormalizedRecord {
        NormalizedRecord {
            id: format!("{site}:{title}"),
            title: title.to_string(),
            price_amount: price,
            currency: "TND".to_string(),
            unit: Some("piece".to_string()),
            category: "other".to_string(),
            location: None,
            region: None,
            area_m2: None,
            rooms: None,
            baths: None,
            supplier: None,
            description: None,
            image_url: None,
            source_site: site.to_string(),
            source_url: format!("https://{site}.tn/p/1"),
            fetched_at: Utc.with_ymd_and_hms(2025, 6, 11, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn stats_cover_each_site() {
        let records = vec![
            record("brico_direct", "a", 10.0),
            record("brico_direct", "b", 20.0),
            record("brico_direct", "c", 40.0),
            record("remax", "d", 100.0),
        ];
        let stats = compute_stats(&records);
        assert_eq!(stats.len(), 2);
        let brico = &stats[0];
        assert_eq!(brico.site, "brico_direct");
        assert_eq!(brico.count, 3);
        assert_eq!(brico.min_price, 10.0);
        assert_eq!(brico.max_price, 40.0);
        assert_eq!(brico.median_price, 20.0);
        assert_eq!(brico.mean_price, 23.33);
        assert_eq!(stats[1].median_price, 100.0);
    }

    #[test]
    fn even_count_median_averages_middle_pair() {
        let records = vec![
            record("comaf", "a", 10.0),
            record("comaf", "b", 30.0),
        ];
        let stats = compute_stats(&records);
        assert_eq!(stats[0].median_price, 20.0);
    }

    #[test]
    fn json_numbers_stay_plain() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordSink::new(dir.path(), Utc.with_ymd_and_hms(2025, 6, 11, 9, 0, 0).unwrap())
            .unwrap();
        let path = sink.write_json(&[record("brico_direct", "Ciment", 24.9)]).unwrap();
        let text = fs::read_to_string(path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(parsed[0]["price_amount"].is_f64());
        assert_eq!(parsed[0]["price_amount"].as_f64(), Some(24.9));
        assert_eq!(parsed[0]["currency"], "TND");
    }

    #[test]
    fn csv_has_one_row_per_record_plus_header() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordSink::new(dir.path(), Utc.with_ymd_and_hms(2025, 6, 11, 9, 0, 0).unwrap())
            .unwrap();
        let path = sink
            .write_csv(&[record("brico_direct", "Ciment", 24.9), record("comaf", "Sable", 8.5)])
            .unwrap();
        let text = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("price_amount"));
        assert!(lines[1].contains("24.9"));
    }

    #[test]
    fn summary_document_embeds_site_stats() {
        let dir = tempfile::tempdir().unwrap();
        let started = Utc.with_ymd_and_hms(2025, 6, 11, 9, 0, 0).unwrap();
        let sink = RecordSink::new(dir.path(), started).unwrap();
        let summary = RunSummary {
            run_id: "test-run".to_string(),
            started_at: started,
            finished_at: started,
            sites: vec![SiteReport {
                site: "brico_direct".to_string(),
                outcome: SiteOutcome::Completed,
                pages_fetched: 2,
                items_seen: 40,
                extracted: 38,
                normalized: 35,
                rejected: RejectionCounts::default(),
            }],
            raw_items: 40,
            validated_records: 35,
            final_records: 30,
            rejected: RejectionCounts::default(),
        };
        let stats = compute_stats(&[record("brico_direct", "Ciment", 24.9)]);
        let path = sink.write_summary(&summary, &stats).unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed["run_id"], "test-run");
        assert_eq!(parsed["final_records"], 30);
        assert_eq!(parsed["site_stats"][0]["site"], "brico_direct");
    }
}
