// src/core/engine.rs
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::io::Write;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{WatchError, Result};
use super::{
    split_lines, ContentExtractor, DiffRecord, DiffStats, DiffStrategy, DispatchReport,
    ExtractedContent, Fetcher, LcsDiffer, Message, Notifier, Report, ReportRenderer,
    SnapshotStore,
};

/// What to do when one URL cannot be checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the whole batch on the first error
    FailFast,
    /// Log the error, keep going, report it in the summary
    Continue,
}

/// Where the report of a detected change went
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// Dry run: written to standard output
    Printed,
    /// Handed to the notifier
    Notified(DispatchReport),
}

/// Result of checking one URL against its snapshot
#[derive(Debug, Clone)]
pub enum Outcome {
    /// First observation, baseline stored
    NowMonitored,
    /// Body byte-for-byte identical to the snapshot
    Unchanged,
    /// Body changed but the content region did not
    ContentUnchanged,
    /// Content region changed
    Changed {
        stats: DiffStats,
        report: Report,
        dispatch: Dispatch,
    },
}

impl Outcome {
    /// One user-facing line describing the outcome
    pub fn describe(&self, url: &str) -> String {
        match self {
            Outcome::NowMonitored => format!("This URL will now be monitored: {}", url),
            Outcome::Unchanged => format!("This URL didn't change: {}", url),
            Outcome::ContentUnchanged => {
                format!("The website changed, but the content stayed the same: {}", url)
            }
            Outcome::Changed { stats, dispatch, .. } => {
                let summary = format!("+{} -{} lines", stats.added, stats.removed);
                match dispatch {
                    Dispatch::Printed => {
                        format!("Content changed ({}), report printed (dry run): {}", summary, url)
                    }
                    Dispatch::Notified(report) if report.failed.is_empty() => format!(
                        "Content changed ({}), notified {} recipient(s): {}",
                        summary,
                        report.delivered.len(),
                        url
                    ),
                    Dispatch::Notified(report) => format!(
                        "Content changed ({}), notified {} recipient(s), {} failed: {}",
                        summary,
                        report.delivered.len(),
                        report.failed.len(),
                        url
                    ),
                }
            }
        }
    }
}

/// Tally of one pass over the URL list
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub now_monitored: usize,
    pub unchanged: usize,
    pub content_unchanged: usize,
    pub changed: usize,
    pub undelivered: usize,
    pub failures: Vec<(String, String)>,
}

impl RunSummary {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            now_monitored: 0,
            unchanged: 0,
            content_unchanged: 0,
            changed: 0,
            undelivered: 0,
            failures: Vec::new(),
        }
    }

    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::NowMonitored => self.now_monitored += 1,
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::ContentUnchanged => self.content_unchanged += 1,
            Outcome::Changed { dispatch, .. } => {
                self.changed += 1;
                if let Dispatch::Notified(report) = dispatch {
                    self.undelivered += report.failed.len();
                }
            }
        }
    }

    pub fn checked(&self) -> usize {
        self.now_monitored + self.unchanged + self.content_unchanged + self.changed
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn log(&self) {
        info!(
            "📊 Run complete in {} ms, {} URL(s) checked:",
            (self.finished_at - self.started_at).num_milliseconds(),
            self.checked()
        );
        info!("  - {} now monitored", self.now_monitored);
        info!("  - {} unchanged", self.unchanged);
        info!("  - {} changed outside the content region", self.content_unchanged);
        info!("  - {} changed", self.changed);
        if self.undelivered > 0 {
            warn!("  - {} notifications could not be delivered", self.undelivered);
        }
        for (url, error) in &self.failures {
            warn!("  - failed: {} ({})", url, error);
        }
    }
}

/// Drives fetch, compare, diff, report and snapshot update for each URL
pub struct Engine {
    fetcher: Option<Box<dyn Fetcher>>,
    store: SnapshotStore,
    extractor: ContentExtractor,
    differ: Box<dyn DiffStrategy>,
    renderer: ReportRenderer,
    notifier: Option<Box<dyn Notifier>>,
    sender: String,
    subject: String,
    dry_run: bool,
    policy: FailurePolicy,
    concurrency: usize,
}

impl Engine {
    /// Engine without a fetcher, enough for `check` and `compare`. Use
    /// `with_fetcher` before `run`.
    pub fn new(config: &Config) -> Result<Self> {
        let extractor = ContentExtractor::new(&config.content.region_id)?;
        let renderer = ReportRenderer::new()?;

        debug!(
            "Engine: cache={}, region=#{}",
            config.paths.cache_dir.display(),
            extractor.region_id()
        );

        Ok(Self {
            fetcher: None,
            store: SnapshotStore::new(config.paths.cache_dir.clone()),
            extractor,
            differ: Box::new(LcsDiffer),
            renderer,
            notifier: None,
            sender: config.mail.sender.clone(),
            subject: config.mail.subject.clone(),
            dry_run: false,
            policy: FailurePolicy::FailFast,
            concurrency: config.fetch.concurrency.max(1),
        })
    }

    pub fn with_fetcher(mut self, fetcher: Box<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_differ(mut self, differ: Box<dyn DiffStrategy>) -> Self {
        self.differ = differ;
        self
    }

    /// Dry runs never write snapshots and never notify
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Check every URL once, printing one line per URL to stdout
    pub async fn run(&self, urls: &[String]) -> Result<RunSummary> {
        let mut stdout = std::io::stdout();
        self.run_to(urls, &mut stdout).await
    }

    /// Check every URL once. Pages are downloaded concurrently but compared,
    /// reported and saved strictly in list order.
    pub async fn run_to<W: Write>(&self, urls: &[String], out: &mut W) -> Result<RunSummary> {
        let fetcher = self
            .fetcher
            .as_deref()
            .ok_or_else(|| WatchError::Config("no fetcher configured for a run".to_string()))?;
        let mut summary = RunSummary::new();

        info!(
            "🔍 Checking {} URL(s){} using {} diff",
            urls.len(),
            if self.dry_run { " (dry run)" } else { "" },
            self.differ.name()
        );

        let mut fetched = stream::iter(urls)
            .map(|url| async move { (url, fetcher.fetch(url).await) })
            .buffered(self.concurrency);

        while let Some((url, body)) = fetched.next().await {
            let outcome = match body {
                Ok(raw) => self.check(url, &raw).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(outcome) => {
                    writeln!(out, "{}\n", outcome.describe(url))?;
                    if let Outcome::Changed { report, dispatch: Dispatch::Printed, .. } = &outcome {
                        writeln!(out, "{}", report.text)?;
                    }
                    summary.record(&outcome);
                }
                Err(e) if self.policy == FailurePolicy::Continue => {
                    warn!("Skipping {}: {}", url, e);
                    writeln!(out, "Could not check {}: {}\n", url, e)?;
                    summary.failures.push((url.clone(), e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }

        summary.finished_at = Utc::now();
        Ok(summary)
    }

    /// Compare a freshly fetched body with the stored snapshot of `url`,
    /// report a content change and update the snapshot.
    pub async fn check(&self, url: &str, raw: &[u8]) -> Result<Outcome> {
        let key = SnapshotStore::key(url);

        let Some(cached) = self.store.load(&key)? else {
            self.persist(&key, raw)?;
            return Ok(Outcome::NowMonitored);
        };

        if cached == raw {
            return Ok(Outcome::Unchanged);
        }

        let before = self.extractor.extract(&cached);
        let after = self.extractor.extract(raw);
        if after.is_empty() {
            debug!("No #{} region in {}", self.extractor.region_id(), url);
        }
        let diff = match self.content_diff(&before, &after) {
            Some(diff) => diff,
            None => {
                self.persist(&key, raw)?;
                return Ok(Outcome::ContentUnchanged);
            }
        };

        let stats = DiffStats::from_records(&diff);
        let report = self.renderer.render(&diff, url)?;
        info!("Content of {} changed: +{} -{}", report.url, stats.added, stats.removed);

        let dispatch = if self.dry_run {
            Dispatch::Printed
        } else {
            let notifier = self
                .notifier
                .as_ref()
                .ok_or_else(|| WatchError::Config("no notifier configured for a live run".to_string()))?;
            let message = Message {
                sender: self.sender.clone(),
                subject: self.subject.clone(),
                text: report.text.clone(),
                html: report.html.clone(),
            };
            Dispatch::Notified(notifier.send(&message).await)
        };

        self.persist(&key, raw)?;
        Ok(Outcome::Changed { stats, report, dispatch })
    }

    /// Render the change between two saved pages, `None` when their content
    /// regions match
    pub fn compare(&self, old: &[u8], new: &[u8], url: &str) -> Result<Option<Report>> {
        let before = self.extractor.extract(old);
        let after = self.extractor.extract(new);
        self.content_diff(&before, &after)
            .map(|diff| self.renderer.render(&diff, url))
            .transpose()
    }

    /// Line diff of two content regions, `None` when nothing a reader would
    /// see differs
    fn content_diff(&self, before: &ExtractedContent, after: &ExtractedContent) -> Option<Vec<DiffRecord>> {
        if before.markup == after.markup {
            return None;
        }

        let diff = self.differ.diff(&split_lines(&before.text), &split_lines(&after.text));
        if diff.iter().any(DiffRecord::is_change) {
            Some(diff)
        } else {
            debug!("Markup differs but text is identical");
            None
        }
    }

    fn persist(&self, key: &str, raw: &[u8]) -> Result<()> {
        if self.dry_run {
            debug!("Dry run, snapshot {} left untouched", key);
            return Ok(());
        }
        self.store.save(key, raw)
    }
}
