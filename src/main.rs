use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use imoscout_core::{
    collect_files, create_record_table, dedupe, load_config, Config, CsvSink, Database,
    DirectoryUploader, EnrichedRecord, JsonSink, MetricsRecorder, RecordFilter, ScoutError,
    SiteKind, StopPolicy, UploadKind, Uploader,
};
use imoscout_scrapers::{CrawlOutcome, ScrapeQuery, Scraper, ScraperFactory};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_CONFIG_PATH: &str = "imoscout.toml";
const LOG_FILE_NAME: &str = "imoscout.log";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (--config)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log at debug level, overriding RUST_LOG (-v, --verbose)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl listing pages, enrich them and store the results
    #[command(about = "Crawl listing pages, enrich them and store the results")]
    #[command(long_about = "Crawl every configured typology of a site, deduplicate the listings, visit each detail page and store the enriched records. Currently supports Imovirtual.")]
    Scrape(ScrapeCommand),

    /// Print the page count a site advertises for a typology
    #[command(about = "Print the page count a site advertises for a typology")]
    Pages(PagesCommand),

    /// List stored listings
    #[command(about = "List stored listings")]
    List(ListCommand),

    /// Export stored listings to CSV
    #[command(about = "Export stored listings to CSV")]
    Export(ExportCommand),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliSiteType {
    Imovirtual,
}

impl From<CliSiteType> for SiteKind {
    fn from(value: CliSiteType) -> Self {
        match value {
            CliSiteType::Imovirtual => SiteKind::Imovirtual,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliStopPolicy {
    EmptyPage,
    RepeatPage,
}

impl From<CliStopPolicy> for StopPolicy {
    fn from(value: CliStopPolicy) -> Self {
        match value {
            CliStopPolicy::EmptyPage => StopPolicy::EmptyPage,
            CliStopPolicy::RepeatPage => StopPolicy::RepeatPage,
        }
    }
}

#[derive(Parser)]
struct ScrapeCommand {
    /// The site to crawl (-s, --site)
    #[arg(short = 's', long, value_enum, default_value_t = CliSiteType::Imovirtual)]
    site: CliSiteType,

    /// Typologies to crawl (-t, --typology). Defaults to the configured ones.
    #[arg(short = 't', long, num_args = 1.., value_delimiter = ',')]
    typology: Vec<String>,

    /// Maximum number of pages per typology (-c, --max-pages)
    #[arg(short = 'c', long)]
    max_pages: Option<u32>,

    /// First page to fetch (--start-page)
    #[arg(long)]
    start_page: Option<u32>,

    /// How to detect the end of the listing (--policy)
    #[arg(long, value_enum)]
    policy: Option<CliStopPolicy>,

    /// Stop after writing the raw title -> link mapping (--no-enrich)
    #[arg(long)]
    no_enrich: bool,
}

#[derive(Parser)]
struct PagesCommand {
    /// The site to probe (-s, --site)
    #[arg(short = 's', long, value_enum, default_value_t = CliSiteType::Imovirtual)]
    site: CliSiteType,

    /// Typology to probe (-t, --typology)
    #[arg(short = 't', long)]
    typology: String,
}

#[derive(Parser)]
struct ListCommand {
    /// Source site to filter by (-s, --site)
    #[arg(short = 's', long, value_enum)]
    site: Option<CliSiteType>,

    /// Typology to filter by (-t, --typology)
    #[arg(short = 't', long)]
    typology: Option<String>,

    /// Maximum number of listings to display (-l, --limit)
    #[arg(short = 'l', long, default_value_t = 10)]
    limit: i64,

    /// Number of listings to skip (-o, --offset)
    #[arg(short = 'o', long, default_value_t = 0)]
    offset: i64,

    /// Database file path (-d, --database)
    #[arg(short = 'd', long)]
    database: Option<PathBuf>,
}

#[derive(Parser)]
struct ExportCommand {
    /// Output file path (-o, --output)
    #[arg(short = 'o', long, default_value = "listings.csv")]
    output: PathBuf,

    /// Source site to filter by (-s, --site)
    #[arg(short = 's', long, value_enum)]
    site: Option<CliSiteType>,

    /// Database file path (-d, --database)
    #[arg(short = 'd', long)]
    database: Option<PathBuf>,
}

/// Reads the configuration file. A missing file is only tolerated when
/// `fallback_allowed` is set, and then yields the built-in defaults.
fn read_config(path: &Path, fallback_allowed: bool) -> anyhow::Result<Config> {
    let config = if path.exists() {
        load_config(path).with_context(|| format!("failed to load {}", path.display()))?
    } else if fallback_allowed {
        Config::from_toml_str("")?
    } else {
        bail!("configuration file {} not found", path.display());
    };
    Ok(config.with_env_overrides())
}

/// `--verbose` wins over `RUST_LOG`, which wins over the `info` default.
fn filter_directive(verbose: bool, env: Option<String>) -> String {
    if verbose {
        return "debug".to_string();
    }
    env.filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "info".to_string())
}

/// Non-blocking writer for the daily-rotated log file under `log_dir`.
fn log_file_writer(log_dir: &Path) -> anyhow::Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    Ok(tracing_appender::non_blocking(appender))
}

/// Logs to stderr and to the rotating file. The returned guard flushes the
/// file on drop and must live until `main` returns.
fn init_logging(log_dir: &Path, verbose: bool) -> anyhow::Result<WorkerGuard> {
    let directive = filter_directive(verbose, std::env::var(EnvFilter::DEFAULT_ENV).ok());
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("invalid log filter '{}'", directive))?;
    let (file_writer, guard) = log_file_writer(log_dir)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let using_default_config = cli.config == Path::new(DEFAULT_CONFIG_PATH);
    let mut config = read_config(&cli.config, using_default_config)?;
    let _log_guard = init_logging(&config.output.log_dir, cli.verbose)?;
    if !cli.config.exists() {
        info!("{} not found, using defaults", cli.config.display());
    }

    match cli.command {
        Commands::Scrape(cmd) => {
            if let Some(max_pages) = cmd.max_pages {
                if max_pages == 0 {
                    bail!("--max-pages must be at least 1");
                }
                config.crawl.max_pages = Some(max_pages);
            }
            if let Some(start_page) = cmd.start_page {
                if start_page == 0 {
                    bail!("--start-page must be at least 1");
                }
                config.crawl.start_page = start_page;
            }
            if let Some(policy) = cmd.policy {
                config.crawl.stop_policy = policy.into();
            }

            run_scrape(&config, cmd.site.into(), cmd.typology, !cmd.no_enrich).await?;
        }
        Commands::Pages(cmd) => {
            let site: SiteKind = cmd.site.into();
            let settings = config.site(site)?;
            let scraper = ScraperFactory::create_scraper(site, &config.crawl)?;

            let query = ScrapeQuery::from_site(settings, &cmd.typology);
            match scraper.probe_page_count(&query).await {
                Some(pages) => println!("{} {}: {} pages", site, cmd.typology, pages),
                None => println!("{} {}: page count unknown", site, cmd.typology),
            }
        }
        Commands::List(cmd) => {
            let path = cmd.database.unwrap_or_else(|| config.output.database_path.clone());
            let db = Database::new(&path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;

            let filter = RecordFilter {
                source: cmd.site.map(|s| SiteKind::from(s).key().to_string()),
                typology: cmd.typology,
                limit: Some(cmd.limit),
                offset: Some(cmd.offset),
            };
            let listings = db.list_records(&filter).await?;

            println!("{}", create_record_table(&listings));
            println!("Showing {} of {} stored listings", listings.len(), db.count().await?);
        }
        Commands::Export(cmd) => {
            let path = cmd.database.unwrap_or_else(|| config.output.database_path.clone());
            let db = Database::new(&path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;

            let filter = RecordFilter {
                source: cmd.site.map(|s| SiteKind::from(s).key().to_string()),
                ..RecordFilter::default()
            };
            let records: Vec<EnrichedRecord> = db
                .list_records(&filter)
                .await?
                .into_iter()
                .map(|stored| stored.record)
                .collect();

            CsvSink::write_records(&cmd.output, &records)
                .with_context(|| format!("failed to write {}", cmd.output.display()))?;
            println!("Exported {} listings to {}", records.len(), cmd.output.display());
        }
    }

    Ok(())
}

/// Crawl, deduplicate, enrich and store every typology of `site` in turn, then
/// ship the produced files when an upload destination is configured.
async fn run_scrape(
    config: &Config,
    site: SiteKind,
    typologies: Vec<String>,
    enrich: bool,
) -> anyhow::Result<()> {
    let settings = config.site(site)?;
    let typologies = if typologies.is_empty() {
        settings.typologies.clone()
    } else {
        typologies
    };

    let scraper: Arc<dyn Scraper> = ScraperFactory::create_scraper(site, &config.crawl)?;
    let data_dir = &config.output.data_dir;
    let metrics = MetricsRecorder::new(data_dir);
    let json_sink = JsonSink::new(data_dir);
    let csv_sink = CsvSink::new(data_dir);
    let db = if enrich {
        let path = &config.output.database_path;
        Some(
            Database::new(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?,
        )
    } else {
        None
    };

    for typology in &typologies {
        let mut query = ScrapeQuery::from_site(settings, typology);
        query.page = config.crawl.start_page;
        info!("Crawling {} {} from page {}", site, typology, query.page);

        let outcome = metrics
            .measure_outcome(
                "crawl",
                scraper.scrape_listing(query, None),
                CrawlOutcome::is_clean,
            )
            .await;
        println!("{} {}: {}", site, typology, outcome.summary());

        let listings = dedupe(outcome.stubs);
        println!("{} unique listings after deduplication", listings.len());
        if listings.is_empty() {
            continue;
        }

        json_sink
            .write_raw(site.key(), typology, &listings)
            .context("failed to write raw listings")?;

        let Some(db) = &db else {
            continue;
        };

        let report = metrics
            .measure_outcome("enrich", scraper.enrich(&listings), |report| {
                report.failures.is_empty()
            })
            .await;
        for failure in &report.failures {
            println!("  skipped: {}", failure);
        }
        println!(
            "Enriched {} listings ({} failed)",
            report.records.len(),
            report.failures.len()
        );

        metrics
            .measure("store", async {
                db.save_records(site.key(), typology, &report.records).await?;
                let path = csv_sink.write_processed(site.key(), typology, &report.records)?;
                Ok::<_, ScoutError>(path)
            })
            .await
            .context("failed to store enriched records")?;
    }

    if let Some(destination) = &config.upload.destination {
        upload_outputs(destination, &json_sink, &csv_sink).await?;
    }

    Ok(())
}

async fn upload_outputs(
    destination: &Path,
    json_sink: &JsonSink,
    csv_sink: &CsvSink,
) -> anyhow::Result<()> {
    let uploader = DirectoryUploader::new(destination);

    for (dir, kind) in [
        (json_sink.dir(), UploadKind::Json),
        (csv_sink.dir(), UploadKind::Csv),
    ] {
        let files = collect_files(dir, kind)?;
        if files.is_empty() {
            continue;
        }
        let uploaded = uploader
            .upload(&files, kind)
            .await
            .with_context(|| format!("failed to upload to {}", destination.display()))?;
        if uploaded < files.len() {
            warn!("{} of {} {} files were not uploaded", files.len() - uploaded, files.len(), kind.extension());
        }
    }

    Ok(())
}
