use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::Result;
use crate::record::Field;
use crate::store::StoreEntry;

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Updated(Vec<Field>),
    Unchanged,
    /// The page was fetched but nothing usable was found on it.
    NoData,
    Skipped(String),
}

impl Outcome {
    fn describe(&self) -> String {
        match self {
            Outcome::Updated(fields) => format!("updated {}", fields.iter().join(", ")),
            Outcome::Unchanged => "unchanged".to_string(),
            Outcome::NoData => "no data found".to_string(),
            Outcome::Skipped(why) => format!("skipped ({})", why),
        }
    }
}

/// Per-record unit of work run by the driver.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    async fn run(&self, entry: &StoreEntry) -> Result<Outcome>;
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// 1 runs records one after another; more runs a bounded pool.
    pub workers: usize,
    /// Pause after each record, per worker.
    pub delay: Duration,
    pub progress: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        BatchOptions {
            workers: 1,
            delay: Duration::ZERO,
            progress: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub slug: String,
    pub reason: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub no_data: usize,
    pub skipped: usize,
    /// In record order, regardless of completion order.
    pub failures: Vec<Failure>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.updated + self.unchanged
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn failed_by_reason(&self) -> BTreeMap<String, usize> {
        self.failures
            .iter()
            .map(|f| f.reason.clone())
            .counts()
            .into_iter()
            .collect()
    }

    fn add(&mut self, result: RecordResult) {
        match result {
            Ok(Outcome::Updated(_)) => self.updated += 1,
            Ok(Outcome::Unchanged) => self.unchanged += 1,
            Ok(Outcome::NoData) => self.no_data += 1,
            Ok(Outcome::Skipped(_)) => self.skipped += 1,
            Err(failure) => self.failures.push(failure),
        }
    }

    pub fn print(&self) {
        println!("\n=== Summary ===");
        println!("Processed:     {}", self.total);
        println!(
            "Succeeded:     {} ({} updated, {} unchanged)",
            self.succeeded(),
            self.updated,
            self.unchanged
        );
        println!("No data found: {}", self.no_data);
        println!("Skipped:       {}", self.skipped);
        println!("Failed:        {}", self.failed());
        for (reason, count) in self.failed_by_reason() {
            println!("  {:<20} {}", reason, count);
        }
    }
}

type RecordResult = std::result::Result<Outcome, Failure>;

/// Run the job in its own task so an error or panic stays with this record.
async fn run_isolated(job: Arc<dyn Job>, entry: StoreEntry) -> RecordResult {
    let slug = entry.slug.clone();
    let handle = tokio::spawn(async move { job.run(&entry).await });
    match handle.await {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(e)) => Err(Failure {
            slug,
            reason: e.reason().to_string(),
            message: e.to_string(),
        }),
        Err(e) => Err(Failure {
            slug,
            reason: "panic".to_string(),
            message: e.to_string(),
        }),
    }
}

fn progress_bar(total: usize, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

fn report(pb: &ProgressBar, total: usize, slug: &str, result: &RecordResult) {
    let line = match result {
        Ok(outcome) => format!("[{}/{}] {}: {}", pb.position() + 1, total, slug, outcome.describe()),
        Err(f) => {
            warn!(slug = %f.slug, reason = %f.reason, "{}", f.message);
            format!("[{}/{}] {}: failed ({})", pb.position() + 1, total, slug, f.reason)
        }
    };
    pb.println(line);
    pb.inc(1);
}

/// Run `job` over `entries` and aggregate the outcomes.
pub async fn run_batch(job: Arc<dyn Job>, entries: Vec<StoreEntry>, opts: &BatchOptions) -> BatchSummary {
    let total = entries.len();
    let pb = progress_bar(total, opts.progress);
    let mut summary = BatchSummary {
        total,
        ..Default::default()
    };

    if opts.workers <= 1 {
        for (i, entry) in entries.into_iter().enumerate() {
            if i > 0 && !opts.delay.is_zero() {
                tokio::time::sleep(opts.delay).await;
            }
            let slug = entry.slug.clone();
            let result = run_isolated(Arc::clone(&job), entry).await;
            report(&pb, total, &slug, &result);
            summary.add(result);
        }
        pb.finish_and_clear();
        return summary;
    }

    let workers = opts.workers;
    let semaphore = Arc::new(Semaphore::new(workers));
    let (tx, mut rx) = tokio::sync::mpsc::channel::<(usize, String, RecordResult)>(workers * 2);

    for (idx, entry) in entries.into_iter().enumerate() {
        let job = Arc::clone(&job);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();
        let delay = opts.delay;

        tokio::spawn(async move {
            let _permit = sem.acquire().await.ok();
            let slug = entry.slug.clone();
            let result = run_isolated(job, entry).await;
            let _ = tx.send((idx, slug, result)).await;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        });
    }
    drop(tx);

    // Completion order is arbitrary; slot results back into record order.
    let mut slots: Vec<Option<RecordResult>> = (0..total).map(|_| None).collect();
    while let Some((idx, slug, result)) = rx.recv().await {
        report(&pb, total, &slug, &result);
        if let Some(slot) = slots.get_mut(idx) {
            *slot = Some(result);
        }
    }
    pb.finish_and_clear();

    for (idx, slot) in slots.into_iter().enumerate() {
        match slot {
            Some(result) => summary.add(result),
            None => debug!(idx, "worker exited without a result"),
        }
    }
    summary
}
