mod audit;
mod batch;
mod config;
mod error;
mod extract;
mod fetch;
mod index;
mod jobs;
mod merge;
mod prune;
mod record;
mod responses;
mod sitemap;
mod store;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::batch::{BatchOptions, Job};
use crate::config::Settings;
use crate::fetch::{FetchConfig, Fetcher};
use crate::merge::MergePolicy;
use crate::record::Platform;
use crate::store::{resolve_target, RecordStore, SlugFilter, Target};

#[derive(Parser)]
#[command(name = "companydir", about = "Company directory maintenance: scrape, merge, regenerate")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct ScrapeArgs {
    /// Record file, slug, or store directory (default: the configured store)
    path: Option<PathBuf>,
    /// Report what would change without writing anything
    #[arg(long)]
    dry_run: bool,
    /// Max records to process
    #[arg(short = 'n', long)]
    limit: Option<usize>,
    /// Only slugs containing this text (case-insensitive)
    #[arg(short, long)]
    filter: Option<String>,
    /// Only slugs matching this regex (case-insensitive)
    #[arg(long)]
    filter_regex: Option<String>,
    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
    /// Overwrite curated name/tagline/about (logos: re-download)
    #[arg(long)]
    force: bool,
    /// Verify TLS certificates
    #[arg(long)]
    verify_ssl: bool,
    /// Parallel workers (1 = sequential)
    #[arg(short, long)]
    workers: Option<usize>,
    /// Pause between requests, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Find social media links on company websites
    Social(ScrapeArgs),
    /// Fill name, about, tagline and details from LinkedIn company pages
    Linkedin(ScrapeArgs),
    /// Download company logos and set the logo field
    Logos(ScrapeArgs),
    /// Regenerate the company index (companies.json)
    Index,
    /// Regenerate the sitemap from the company index
    Sitemap,
    /// Report records with missing social links
    Audit {
        /// Write every incomplete record to this CSV file
        #[arg(long)]
        export: Option<PathBuf>,
        /// Write slugs missing --platform to this file, one per line
        #[arg(long)]
        missing_list: Option<PathBuf>,
        #[arg(long, default_value = "linkedin")]
        platform: String,
        /// Records to list in the "missing the most" section
        #[arg(long, default_value = "20")]
        top: usize,
    },
    /// Delete records without a LinkedIn link (dry run unless --confirm)
    Prune {
        #[arg(long)]
        confirm: bool,
        /// Skip copying files into a backup directory first
        #[arg(long)]
        no_backup: bool,
    },
    /// Merge saved LinkedIn page dumps (*.txt) from a directory
    Responses {
        dir: PathBuf,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        force: bool,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy)]
enum ScrapeKind {
    Social,
    Linkedin,
    Logos,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;

    let result = match cli.command {
        Commands::Social(args) => scrape(ScrapeKind::Social, args, &settings).await,
        Commands::Linkedin(args) => scrape(ScrapeKind::Linkedin, args, &settings).await,
        Commands::Logos(args) => scrape(ScrapeKind::Logos, args, &settings).await,
        Commands::Index => regenerate_index(&settings),
        Commands::Sitemap => {
            let entries = index::read_index(&settings.index_path)
                .with_context(|| format!("Failed to read {} (run `companydir index` first)", settings.index_path.display()))?;
            let today = chrono::Local::now().date_naive();
            let report = sitemap::generate(&settings.site_url, &entries, &settings.sitemap_path, today)?;
            println!("Sitemap written: {}", settings.sitemap_path.display());
            println!(
                "{} URLs ({} static, {} company pages)",
                report.total, report.static_pages, report.company_pages
            );
            if let Some(changes) = report.changes {
                println!("Since last sitemap: +{} / -{}", changes.added, changes.removed);
            }
            Ok(())
        }
        Commands::Audit {
            export,
            missing_list,
            platform,
            top,
        } => {
            let store = RecordStore::open(&settings.store_dir)?;
            let report = audit::audit_store(&store)?;
            report.print(top);

            if let Some(path) = export {
                let file = std::fs::File::create(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                audit::export_csv(&report, file)?;
                println!("\nCSV written: {} ({} records)", path.display(), report.incomplete.len());
            }
            if let Some(path) = missing_list {
                let Some(platform) = Platform::from_key(&platform) else {
                    bail!("Unknown platform '{}'", platform);
                };
                let file = std::fs::File::create(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                let n = audit::write_missing_list(&report, platform, std::io::BufWriter::new(file))?;
                println!("{} slugs missing {} written to {}", n, platform, path.display());
            }
            Ok(())
        }
        Commands::Prune { confirm, no_backup } => run_prune(&settings, confirm, no_backup),
        Commands::Responses {
            dir,
            dry_run,
            force,
            limit,
        } => {
            if !dir.is_dir() {
                bail!("Response directory not found: {}", dir.display());
            }
            let store = RecordStore::open(&settings.store_dir)?;
            if dry_run {
                println!("Dry run: no files will be written");
            }
            let summary = responses::process_responses(&dir, &store, MergePolicy { force }, dry_run, limit)?;
            summary.print();
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn scrape(kind: ScrapeKind, args: ScrapeArgs, settings: &Settings) -> Result<()> {
    let filter = SlugFilter::new(args.filter.as_deref(), args.filter_regex.as_deref())
        .context("Invalid --filter-regex")?;
    let entries = match resolve_target(args.path.as_deref(), &settings.store_dir)? {
        Target::Store(store) => store.select(&filter, args.limit)?,
        Target::Single(entry) => vec![entry],
    };
    if entries.is_empty() {
        println!("No records matched.");
        return Ok(());
    }

    let mut http = FetchConfig::from_settings(&settings.http);
    let default_timeout = match kind {
        ScrapeKind::Linkedin => settings.http.linkedin_timeout_secs,
        _ => settings.http.timeout_secs,
    };
    http.timeout = Duration::from_secs(args.timeout.unwrap_or(default_timeout));
    http.verify_ssl |= args.verify_ssl;
    let fetcher = Fetcher::new(http).context("Failed to build HTTP client")?;

    let policy = MergePolicy { force: args.force };
    let (job, default_delay, verb): (Arc<dyn Job>, u64, &str) = match kind {
        ScrapeKind::Social => (
            Arc::new(jobs::SocialJob {
                fetcher,
                policy,
                dry_run: args.dry_run,
            }),
            settings.batch.delay_ms,
            "Scanning websites of",
        ),
        ScrapeKind::Linkedin => (
            Arc::new(jobs::LinkedinJob {
                fetcher,
                policy,
                dry_run: args.dry_run,
            }),
            settings.batch.linkedin_delay_ms,
            "Fetching LinkedIn pages of",
        ),
        ScrapeKind::Logos => (
            Arc::new(jobs::LogoJob {
                fetcher,
                logo_dir: settings.logo_dir.clone(),
                logo_prefix: settings.logo_prefix.clone(),
                force: args.force,
                dry_run: args.dry_run,
            }),
            settings.batch.logo_delay_ms,
            "Fetching logos of",
        ),
    };

    let opts = BatchOptions {
        workers: args.workers.unwrap_or(settings.batch.workers).max(1),
        delay: Duration::from_millis(args.delay_ms.unwrap_or(default_delay)),
        progress: true,
    };
    println!(
        "{} {} records ({} worker{}){}...",
        verb,
        entries.len(),
        opts.workers,
        if opts.workers == 1 { "" } else { "s" },
        if args.dry_run { ", dry run" } else { "" }
    );

    let summary = batch::run_batch(job, entries, &opts).await;
    summary.print();
    Ok(())
}

fn regenerate_index(settings: &Settings) -> Result<()> {
    let store = RecordStore::open(&settings.store_dir)?;
    let previous: HashSet<String> = index::read_index(&settings.index_path)
        .map(|old| old.into_iter().map(|e| e.slug).collect())
        .unwrap_or_default();

    let entries = index::build_index(&store, &settings.logo_prefix)?;
    index::write_index(&settings.index_path, &entries)?;

    let current: HashSet<&str> = entries.iter().map(|e| e.slug.as_str()).collect();
    let removed = previous.iter().filter(|s| !current.contains(s.as_str())).count();
    let added = current.iter().filter(|s| !previous.contains(**s)).count();
    println!("Index written: {} ({} companies)", settings.index_path.display(), entries.len());
    if !previous.is_empty() {
        println!("Since last index: +{} / -{}", added, removed);
    }
    Ok(())
}

fn run_prune(settings: &Settings, confirm: bool, no_backup: bool) -> Result<()> {
    let store = RecordStore::open(&settings.store_dir)?;
    let plan = prune::plan(&store)?;

    for (slug, err) in &plan.errors {
        println!("  unreadable {}: {}", slug, err);
    }
    println!("{} of {} records have no LinkedIn link", plan.candidates.len(), plan.scanned);
    for (i, c) in plan.candidates.iter().take(30).enumerate() {
        let name = if c.name.is_empty() { "(no name)" } else { c.name.as_str() };
        println!("{:>3}. {:<38} | {:<25} | {}", i + 1, truncate(name, 35), truncate(&c.entry.slug, 25), c.reason);
    }
    if plan.candidates.len() > 30 {
        println!("     ... and {} more", plan.candidates.len() - 30);
    }

    if plan.candidates.is_empty() {
        return Ok(());
    }
    if !confirm {
        println!("\nDry run: nothing deleted. Re-run with --confirm to delete.");
        return Ok(());
    }

    let backup = (!no_backup).then(|| PathBuf::from(prune::backup_dir_name(chrono::Local::now().naive_local())));
    let deleted = prune::execute(&plan, backup.as_deref())?;
    println!("\nDeleted {} records.", deleted);
    if let Some(dir) = backup {
        println!("Backup: {}", dir.display());
    }
    println!("Run `companydir index` and `companydir sitemap` to refresh derived files.");
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
