// Observability: stage counters for the crawl pipeline

pub mod metrics;
