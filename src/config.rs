use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{WatchError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input lists and snapshot cache locations
    pub paths: PathsConfig,

    /// Which part of a page counts as its content
    pub content: ContentConfig,

    /// HTTP fetch settings
    pub fetch: FetchConfig,

    /// Mail delivery settings
    pub mail: MailConfig,

    /// Batch behaviour
    pub run: RunConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Newline-delimited list of URLs to watch
    pub urls_file: PathBuf,

    /// Newline-delimited list of mail recipients
    pub recipients_file: PathBuf,

    /// Directory holding one snapshot per URL
    pub cache_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Element id of the region compared between observations
    pub region_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// User agent sent with every request
    pub user_agent: String,

    /// How many pages may be downloaded at the same time
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// Mailgun sending domain
    pub domain: Option<String>,

    /// Mailgun private API key
    pub private_key: Option<String>,

    /// Mailgun public API key
    pub public_key: Option<String>,

    /// Mailgun API endpoint (EU accounts use https://api.eu.mailgun.net)
    pub api_base: String,

    /// From header of outgoing messages
    pub sender: String,

    /// Subject line of outgoing messages
    pub subject: String,

    /// Attempts per recipient before a delivery is given up
    pub max_attempts: u32,

    /// Base pause between attempts, multiplied by the attempt number
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Keep processing remaining URLs after one fails
    pub keep_going: bool,
}

/// Sending credentials, available once all three keys are present.
/// The public key is required but not needed for sending.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub domain: String,
    pub private_key: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            urls_file: PathBuf::from("urls.txt"),
            recipients_file: PathBuf::from("emails.txt"),
            cache_dir: PathBuf::from("cache"),
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            region_id: "content".to_string(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: format!("sitewatch/{}", env!("CARGO_PKG_VERSION")),
            concurrency: 4,
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            domain: None,
            private_key: None,
            public_key: None,
            api_base: "https://api.mailgun.net".to_string(),
            sender: "sitewatch <sitewatch@localhost>".to_string(),
            subject: "[Monitor]: watched page changed".to_string(),
            max_attempts: 3,
            retry_delay_ms: 500,
        }
    }
}

impl MailConfig {
    /// All three credentials, or a config error naming the missing ones
    pub fn credentials(&self) -> Result<Credentials> {
        let present = |value: &Option<String>| value.as_deref().filter(|v| !v.is_empty()).map(str::to_string);

        match (present(&self.domain), present(&self.private_key), present(&self.public_key)) {
            (Some(domain), Some(private_key), Some(_)) => Ok(Credentials { domain, private_key }),
            (domain, private_key, public_key) => {
                let missing: Vec<&str> = [
                    ("domain", domain.is_none()),
                    ("private-key", private_key.is_none()),
                    ("public-key", public_key.is_none()),
                ]
                .iter()
                .filter(|(_, absent)| *absent)
                .map(|(name, _)| *name)
                .collect();

                Err(WatchError::Config(format!(
                    "domain, private-key and public-key are required (missing: {})",
                    missing.join(", ")
                )))
            }
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| WatchError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>, base_dir: &Path) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Err(WatchError::Config(format!(
                        "config file not found: {}",
                        p.as_ref().display()
                    )))
                }
            }
            None => {
                let candidates = ["sitewatch.toml", ".sitewatch.toml"];

                for candidate in &candidates {
                    let path = base_dir.join(candidate);
                    if path.exists() {
                        return Self::load(path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    /// Anchor relative paths at `base_dir` (normally the executable's folder)
    pub fn resolve_paths(&mut self, base_dir: &Path) {
        for path in [
            &mut self.paths.urls_file,
            &mut self.paths.recipients_file,
            &mut self.paths.cache_dir,
        ] {
            if path.is_relative() {
                *path = base_dir.join(&*path);
            }
        }
    }
}

/// Folder containing the running binary; lists and cache live next to it
pub fn executable_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| WatchError::Config(format!("executable has no parent folder: {}", exe.display())))
}
