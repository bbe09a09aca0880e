//! Configuration for gnosis paths and processing limits.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (GNOSIS_HOME, GNOSIS_WEB_STREAM, GNOSIS_RAW_PATH,
//!    GNOSIS_ENRICHMENT_PATH, GNOSIS_PROCESSED_PATH)
//! 2. Config file (.gnosis/config.yaml)
//! 3. Defaults (~/.gnosis)
//!
//! Config file discovery:
//! - Searches current directory and parents for .gnosis/config.yaml
//! - `paths.home` is relative to the .gnosis/ directory, every other path to
//!   the project root (the parent of .gnosis/)
//!
//! The resolved [`Config`] is built once per command and passed down. Nothing
//! else reads the environment.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const ENV_HOME: &str = "GNOSIS_HOME";
pub const ENV_STREAM: &str = "GNOSIS_WEB_STREAM";
pub const ENV_ARCHIVES: &str = "GNOSIS_RAW_PATH";
pub const ENV_ENRICHMENTS: &str = "GNOSIS_ENRICHMENT_PATH";
pub const ENV_CONTENT: &str = "GNOSIS_PROCESSED_PATH";

/// Default transcript service
pub const DEFAULT_TRANSCRIPT_ENDPOINT: &str = "https://youtubetranscript.com/";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub processing: Option<ProcessingConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory (relative to .gnosis/)
    pub home: Option<String>,
    /// Input URL stream
    pub stream: Option<String>,
    pub archives: Option<String>,
    pub enrichments: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessingConfig {
    pub concurrency: Option<usize>,
    pub batch_size: Option<usize>,
    pub request_timeout_seconds: Option<u64>,
    pub max_image_length: Option<usize>,
    pub transcript_endpoint: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Engine state (run logs)
    pub home: PathBuf,

    /// Line-delimited URL stream
    pub stream: PathBuf,

    pub archives: PathBuf,

    pub enrichments: PathBuf,

    /// Final content records
    pub content: PathBuf,

    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,

    pub processing: ProcessingSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessingSettings {
    /// Size of the I/O concurrency gate
    pub concurrency: usize,

    /// Events fanned out per chunk
    pub batch_size: usize,

    pub request_timeout_seconds: u64,

    /// Longer image URLs are treated as noise
    pub max_image_length: usize,

    pub transcript_endpoint: String,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            concurrency: 16,
            batch_size: 2000,
            request_timeout_seconds: 30,
            max_image_length: 2048,
            transcript_endpoint: DEFAULT_TRANSCRIPT_ENDPOINT.to_string(),
        }
    }
}

impl ProcessingSettings {
    fn merge(config: Option<ProcessingConfig>) -> Self {
        let defaults = Self::default();
        let Some(config) = config else {
            return defaults;
        };

        Self {
            concurrency: config.concurrency.unwrap_or(defaults.concurrency),
            batch_size: config.batch_size.unwrap_or(defaults.batch_size),
            request_timeout_seconds: config
                .request_timeout_seconds
                .unwrap_or(defaults.request_timeout_seconds),
            max_image_length: config.max_image_length.unwrap_or(defaults.max_image_length),
            transcript_endpoint: config
                .transcript_endpoint
                .unwrap_or(defaults.transcript_endpoint),
        }
    }
}

impl Config {
    /// Load configuration from the environment, config file and defaults
    pub fn load() -> Result<Self> {
        let default_home = dirs::home_dir()
            .context("Failed to determine home directory")?
            .join(".gnosis");

        resolve(
            |key| std::env::var(key).ok(),
            find_config_file().as_deref(),
            default_home,
        )
    }

    /// Defaults rooted at `home`, no environment or config file
    pub fn from_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            stream: home.join("stream.tsv"),
            archives: home.join("archives"),
            enrichments: home.join("enrichments"),
            content: home.join("content"),
            home,
            config_file: None,
            processing: ProcessingSettings::default(),
        }
    }

    /// Directory holding per-run logs ($GNOSIS_HOME/runs)
    pub fn runs_dir(&self) -> PathBuf {
        self.home.join("runs")
    }

    pub fn with_stream(mut self, stream: impl Into<PathBuf>) -> Self {
        self.stream = stream.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.processing.concurrency = concurrency;
        self
    }

    /// Reject settings the processor cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.processing.concurrency == 0 {
            anyhow::bail!("processing.concurrency must be at least 1");
        }
        if self.processing.batch_size == 0 {
            anyhow::bail!("processing.batch_size must be at least 1");
        }
        if self.processing.request_timeout_seconds == 0 {
            anyhow::bail!("processing.request_timeout_seconds must be at least 1");
        }
        Ok(())
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".gnosis").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Merge all sources. `env` looks up a variable by name.
fn resolve(
    env: impl Fn(&str) -> Option<String>,
    config_file: Option<&Path>,
    default_home: PathBuf,
) -> Result<Config> {
    let file = config_file.map(load_config_file).transpose()?;

    // .gnosis/ and the project root around it
    let gnosis_dir = config_file.and_then(Path::parent).unwrap_or(Path::new("."));
    let base_dir = gnosis_dir.parent().unwrap_or(Path::new("."));

    let paths = file.as_ref().map(|f| f.paths.clone()).unwrap_or_default();

    let home = env(ENV_HOME)
        .map(PathBuf::from)
        .or_else(|| paths.home.as_deref().map(|p| resolve_path(gnosis_dir, p)))
        .unwrap_or(default_home);

    let pick = |var: &str, configured: &Option<String>, fallback: &str| {
        env(var)
            .map(PathBuf::from)
            .or_else(|| configured.as_deref().map(|p| resolve_path(base_dir, p)))
            .unwrap_or_else(|| home.join(fallback))
    };

    let config = Config {
        stream: pick(ENV_STREAM, &paths.stream, "stream.tsv"),
        archives: pick(ENV_ARCHIVES, &paths.archives, "archives"),
        enrichments: pick(ENV_ENRICHMENTS, &paths.enrichments, "enrichments"),
        content: pick(ENV_CONTENT, &paths.content, "content"),
        processing: ProcessingSettings::merge(file.and_then(|f| f.processing)),
        config_file: config_file.map(Path::to_path_buf),
        home,
    };

    config.validate()?;
    Ok(config)
}
