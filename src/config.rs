//! Configuration: defaults, optional TOML file, environment, then CLI flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::browser::BrowserEngineConfig;
use crate::crawl::{CrawlOptions, RetryPolicy, DEFAULT_TAIL_SLACK, DEFAULT_WINDOW_SIZE};
use crate::extract::SelectorConfig;

/// Config file name looked up in the data directory and the CWD.
pub const CONFIG_FILE_NAME: &str = "starscrape.toml";

/// Default data directory name under the documents (or home) directory.
const DATA_SUBDIR: &str = "starscrape";

/// Effective application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Window checkpoints and the progress record live here.
    pub data_dir: PathBuf,
    /// Merged table; `None` means `<data_dir>/CAST_LIST.csv`.
    pub output: Option<PathBuf>,
    pub window_size: usize,
    pub tail_slack: usize,
    pub workers: usize,
    /// Attempts per fetch, first one included.
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    /// Seconds to wait for an anchor element.
    pub anchor_timeout: u64,
    pub browser: BrowserEngineConfig,
    pub selectors: SelectorConfig,
}

impl Default for Settings {
    fn default() -> Self {
        // Documents dir -> Home dir -> Current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DATA_SUBDIR);

        Self {
            data_dir,
            output: None,
            window_size: DEFAULT_WINDOW_SIZE,
            tail_slack: DEFAULT_TAIL_SLACK,
            workers: 1,
            max_attempts: RetryPolicy::default().max_attempts,
            retry_backoff_ms: 1000,
            anchor_timeout: 10,
            browser: BrowserEngineConfig::default(),
            selectors: SelectorConfig::default(),
        }
    }
}

impl Settings {
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.data_dir.join(crate::crawl::MERGED_FILE_NAME))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn crawl_options(&self, merge: bool) -> CrawlOptions {
        CrawlOptions {
            window_size: self.window_size.max(1),
            tail_slack: self.tail_slack,
            workers: self.workers.max(1),
            retry: self.retry_policy(),
            anchor_timeout: Duration::from_secs(self.anchor_timeout),
            merge,
        }
    }

    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create data directory '{}': {}",
                    self.data_dir.display(),
                    e
                ),
            )
        })
    }
}

/// Configuration file structure. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tail_slack: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_backoff_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<BrowserEngineConfig>,
    #[serde(default, skip_serializing_if = "SelectorConfig::is_default")]
    pub selectors: SelectorConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub async fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML config {}", path.display()))?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Directory of the config file, if loaded from one.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are joined onto `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
        }
        if let Some(ref output) = self.output {
            settings.output = Some(self.resolve_path(output, base_dir));
        }
        if let Some(window_size) = self.window_size {
            settings.window_size = window_size;
        }
        if let Some(tail_slack) = self.tail_slack {
            settings.tail_slack = tail_slack;
        }
        if let Some(workers) = self.workers {
            settings.workers = workers;
        }
        if let Some(max_attempts) = self.max_attempts {
            settings.max_attempts = max_attempts;
        }
        if let Some(backoff) = self.retry_backoff_ms {
            settings.retry_backoff_ms = backoff;
        }
        if let Some(timeout) = self.anchor_timeout {
            settings.anchor_timeout = timeout;
        }
        if let Some(ref browser) = self.browser {
            settings.browser = browser.clone();
        }
        settings.selectors = self.selectors.clone();
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file (`--config`).
    pub config_path: Option<PathBuf>,
    /// Data directory override (`--data-dir`).
    pub data: Option<PathBuf>,
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        current_dir().join(path)
    }
}

/// Find the config file: `--config`, else the data dir, else the CWD.
fn find_config(options: &LoadOptions, data_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(ref path) = options.config_path {
        return Some(path.clone());
    }
    let candidates = data_dir
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .into_iter()
        .chain(std::iter::once(current_dir().join(CONFIG_FILE_NAME)));
    candidates.into_iter().find(|path| path.exists())
}

/// Load settings from every layer.
///
/// An explicit `--config` that cannot be read is an error; an auto-discovered
/// file is only required to parse.
pub async fn load_settings_with_options(options: LoadOptions) -> anyhow::Result<(Settings, Config)> {
    let env_data_dir = std::env::var("STARSCRAPE_DATA_DIR")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from);
    let data_dir_override = options
        .data
        .clone()
        .or(env_data_dir)
        .map(|d| absolute(&d));

    let config = match find_config(&options, data_dir_override.as_deref()) {
        Some(path) => {
            tracing::debug!("Loading config from {}", path.display());
            Config::load_from_path(&path).await?
        }
        None => Config::default(),
    };

    let mut settings = Settings::default();
    let base_dir = config.base_dir().unwrap_or_else(current_dir);
    config.apply_to_settings(&mut settings, &base_dir);

    if let Some(data_dir) = data_dir_override {
        tracing::debug!("Using data directory {}", data_dir.display());
        settings.data_dir = data_dir;
    }

    settings.browser = settings.browser.with_env_overrides();

    Ok((settings, config))
}
