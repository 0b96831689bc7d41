use clap::{Parser, Subcommand};
use std::path::PathBuf;
use anyhow::{bail, Context, Result};
use tracing::info;

use crate::config::Config;
use crate::core::{load_list, Engine, FailurePolicy, HttpFetcher, MailgunNotifier, SnapshotStore};

#[derive(Parser)]
#[command(name = "sitewatch")]
#[command(about = "Watches web pages and mails a readable diff when their content changes")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check every watched URL once
    Run {
        /// Mailgun domain
        #[arg(long, env = "SITEWATCH_DOMAIN")]
        domain: Option<String>,

        /// Secret Mailgun API key
        #[arg(long, env = "SITEWATCH_PRIVATE_KEY", hide_env_values = true)]
        private_key: Option<String>,

        /// Public Mailgun API key
        #[arg(long, env = "SITEWATCH_PUBLIC_KEY", hide_env_values = true)]
        public_key: Option<String>,

        /// Do not update the cache and only print to stdout (no e-mail)
        #[arg(long)]
        dry: bool,

        /// Keep checking the remaining URLs when one fails
        #[arg(long)]
        keep_going: bool,
    },

    /// Show the change between the content regions of two saved pages
    Compare {
        /// Older page
        old: PathBuf,

        /// Newer page
        new: PathBuf,

        /// URL named in the report header
        #[arg(long, default_value = "(local file)")]
        url: String,

        /// Print the HTML report instead of plain text
        #[arg(long)]
        html: bool,
    },

    /// Print the snapshot key and cache file of a URL
    Key {
        url: String,
    },
}

impl Cli {
    pub async fn execute(self, mut config: Config) -> Result<()> {
        match self.command {
            Commands::Run { domain, private_key, public_key, dry, keep_going } => {
                // Flags win over the config file
                config.mail.domain = domain.or(config.mail.domain);
                config.mail.private_key = private_key.or(config.mail.private_key);
                config.mail.public_key = public_key.or(config.mail.public_key);
                config.run.keep_going |= keep_going;
                run(config, dry).await
            }
            Commands::Compare { old, new, url, html } => compare(config, old, new, &url, html),
            Commands::Key { url } => {
                let key = SnapshotStore::key(&url);
                let store = SnapshotStore::new(config.paths.cache_dir);
                println!("{}  {}", key, store.path_for(&key).display());
                Ok(())
            }
        }
    }
}

async fn run(config: Config, dry: bool) -> Result<()> {
    let credentials = config.mail.credentials()?;
    let urls = load_list(&config.paths.urls_file)?;

    let fetcher = HttpFetcher::new(&config.fetch)?;
    let policy = if config.run.keep_going {
        FailurePolicy::Continue
    } else {
        FailurePolicy::FailFast
    };
    let mut engine = Engine::new(&config)?
        .with_fetcher(Box::new(fetcher))
        .failure_policy(policy)
        .dry_run(dry);

    if !dry {
        let recipients = load_list(&config.paths.recipients_file)?;
        let notifier = MailgunNotifier::new(&config.mail, &credentials, recipients)?;
        info!("Notifying {} recipient(s) via {}", notifier.recipients().len(), credentials.domain);
        engine = engine.with_notifier(Box::new(notifier));
    }

    let summary = engine.run(&urls).await?;
    summary.log();

    if summary.has_failures() {
        bail!(
            "{} of {} URL(s) could not be checked",
            summary.failures.len(),
            urls.len()
        );
    }
    Ok(())
}

fn compare(config: Config, old: PathBuf, new: PathBuf, url: &str, html: bool) -> Result<()> {
    let old_raw = std::fs::read(&old).with_context(|| format!("reading {}", old.display()))?;
    let new_raw = std::fs::read(&new).with_context(|| format!("reading {}", new.display()))?;

    let engine = Engine::new(&config)?.dry_run(true);
    match engine.compare(&old_raw, &new_raw, url)? {
        Some(report) if html => println!("{}", report.html),
        Some(report) => println!("{}", report.text),
        None => println!("The content stayed the same."),
    }
    Ok(())
}
