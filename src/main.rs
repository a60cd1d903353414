use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use souk_scraper::config::RunConfig;
use souk_scraper::infra::SessionManager;
use souk_scraper::logging;
use souk_scraper::pipeline::orchestrator::{CrawlOrchestrator, SiteOutcome};
use souk_scraper::registry::SiteRegistry;
use souk_scraper::sink::{compute_stats, RecordSink};

#[derive(Parser)]
#[command(name = "souk_scraper")]
#[command(about = "Tunisian marketplace listing scraper")]
#[command(version = "0.1.0")]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Json,
    Csv,
    Both,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the configured sites and write one batch of normalized records
    Crawl {
        /// Specific sites to crawl (comma-separated). Default: all enabled
        #[arg(long)]
        sites: Option<String>,
        /// Sites file (TOML). Default: sites.toml if present, else built-ins
        #[arg(long)]
        sites_file: Option<PathBuf>,
        /// Override every site's page budget
        #[arg(long)]
        max_pages: Option<u32>,
        /// Concurrent site workers
        #[arg(long)]
        concurrency: Option<usize>,
        /// Output directory
        #[arg(long, default_value = "output")]
        output: PathBuf,
        /// Output format
        #[arg(long, value_enum, default_value = "both")]
        format: Format,
    },
    /// List and validate the configured sites
    Sites {
        /// Sites file (TOML). Default: sites.toml if present, else built-ins
        #[arg(long)]
        sites_file: Option<PathBuf>,
    },
}

fn load_registry(sites_file: Option<&PathBuf>) -> anyhow::Result<SiteRegistry> {
    match sites_file {
        Some(path) => Ok(SiteRegistry::load(path)?),
        None => {
            let default_path = PathBuf::from("sites.toml");
            if default_path.exists() {
                Ok(SiteRegistry::load(&default_path)?)
            } else {
                Ok(SiteRegistry::builtin())
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    match cli.command {
        Commands::Crawl { sites, sites_file, max_pages, concurrency, output, format } => {
            let mut config = RunConfig::load_or_default()?;
            if let Some(concurrency) = concurrency {
                config.crawler.concurrency = concurrency.max(1);
            }

            let registry = load_registry(sites_file.as_ref())?;
            let wanted: Option<Vec<String>> = sites
                .map(|list| list.split(',').map(|s| s.trim().to_string()).collect());
            let mut selected = registry.select(wanted.as_deref());
            if let Some(max_pages) = max_pages {
                for site in &mut selected {
                    site.max_pages = max_pages.max(1);
                }
            }
            if selected.is_empty() {
                println!("⚠️  No sites selected, nothing to do");
                return Ok(());
            }

            println!("🚀 Crawling {} site(s)...", selected.len());
            info!(sites = selected.len(), "starting crawl run");

            // Ctrl-C stops workers between page iterations, never mid-fetch
            let cancel = CancellationToken::new();
            let signal_cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    println!("\n🛑 Cancellation requested, finishing current pages...");
                    signal_cancel.cancel();
                }
            });

            let provider = Arc::new(SessionManager::new(config.crawler.clone()));
            let orchestrator =
                CrawlOrchestrator::new(selected, provider, Arc::new(config));
            let (records, summary) = orchestrator.run(cancel).await;

            let sink = RecordSink::new(&output, summary.started_at)?;
            let stats = compute_stats(&records);
            match format {
                Format::Json => {
                    sink.write_json(&records)?;
                }
                Format::Csv => {
                    sink.write_csv(&records)?;
                }
                Format::Both => {
                    sink.write_json(&records)?;
                    sink.write_csv(&records)?;
                }
            }
            sink.write_summary(&summary, &stats)?;

            println!("\n📊 Run {} finished:", summary.run_id);
            for report in &summary.sites {
                let status = match &report.outcome {
                    SiteOutcome::Completed => "✅ completed".to_string(),
                    SiteOutcome::PartiallyCompleted { reason } => {
                        format!("🟡 partial ({reason})")
                    }
                    SiteOutcome::Failed { reason } => format!("❌ failed ({reason})"),
                };
                println!(
                    "   {}: {} | pages: {}, items: {}, records: {}, rejected: {}",
                    report.site,
                    status,
                    report.pages_fetched,
                    report.items_seen,
                    report.normalized,
                    report.rejected.total()
                );
            }
            println!(
                "   Totals: {} raw → {} validated → {} after dedup",
                summary.raw_items, summary.validated_records, summary.final_records
            );
            if summary.sites.iter().any(|r| matches!(r.outcome, SiteOutcome::Failed { .. })) {
                error!("one or more sites failed; run still completed");
            }
        }
        Commands::Sites { sites_file } => {
            let registry = load_registry(sites_file.as_ref())?;
            println!("📋 Configured sites:");
            for site in registry.sites() {
                println!(
                    "   {}: {} | pagination: {:?}, fetch: {:?}, max_pages: {}, fields: {}{}",
                    site.name,
                    site.base_url,
                    site.pagination,
                    site.fetch_mode,
                    site.max_pages,
                    site.fields.len(),
                    if site.enabled { "" } else { " (disabled)" }
                );
            }
        }
    }
    Ok(())
}
