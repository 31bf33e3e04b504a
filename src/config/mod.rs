//! Configuration loading.
//!
//! Values are resolved in order: CLI flag, YAML file, built-in default.
//! Logging settings may additionally be overridden by `LOG_LEVEL`,
//! `LOG_FORMAT` and `LOG_FILE` environment variables (a `.env` file is
//! honoured).

mod cli;

pub use cli::Cli;

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::tempo::SearchMode;

/// Config file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "config.yml";

const DEFAULT_GRAPH: &str = "micro";
const DEFAULT_TAG: &str = "service.name";
const DEFAULT_TAG_FILTER: &str = ".*";
const DEFAULT_THRESHOLD_MS: f64 = 40.0;
const DEFAULT_SERVICE_SUBTITLE: &str = "Trace ingress";
const DEFAULT_SEARCH_FROM_SECS: u64 = 7200;

/// Fully resolved application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub graph: GraphConfig,
    pub query: QueryConfig,
    pub schedule: ScheduleConfig,
    pub search: SearchConfig,
    pub tempo: ConnectionConfig,
    pub nodegraph_provider: ConnectionConfig,
    pub logging: LoggingConfig,
}

/// Target graph in the nodegraph provider
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub name: String,
    pub sync: SyncStrategy,
}

/// How the aggregated graph is written to the nodegraph provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// One atomic replace-all request.
    Batch,
    /// Delete, then look up and create/update every node and edge.
    Incremental,
}

impl FromStr for SyncStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "batch" => Ok(SyncStrategy::Batch),
            "incremental" => Ok(SyncStrategy::Incremental),
            _ => Err(format!("Unknown sync strategy: {}", s)),
        }
    }
}

/// Trace query and classification settings
#[derive(Debug, Clone)]
pub struct QueryConfig {
    pub tag: String,
    pub tag_filter: Regex,
    pub use_tag_as_node: bool,
    pub threshold_ms: f64,
    pub service_subtitle: String,
}

/// Loop configuration
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Seconds between cycles, 0 runs a single cycle
    pub interval_secs: u64,
}

/// Search window configuration
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Seconds to search back from now
    pub from_secs: u64,
    pub mode: SearchMode,
}

/// REST connection to one of the backends
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    /// Append log output to this file instead of stderr
    pub file: Option<PathBuf>,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl ConnectionConfig {
    /// Connection with default timeout and no headers or credentials.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            username: None,
            password: None,
            timeout_ms: 10_000,
        }
    }

    /// Add a static header sent with every request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set basic auth credentials
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the per-request timeout
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Build an HTTP client sending the configured headers with the
    /// configured timeout.
    pub fn http_client(&self) -> AppResult<reqwest::Client> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| AppError::Config {
                message: format!("invalid header name {:?}: {}", name, e),
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| AppError::Config {
                message: format!("invalid value for header {}: {}", name, e),
            })?;
            headers.insert(name, value);
        }

        reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(self.timeout_ms))
            .build()
            .map_err(|e| AppError::Config {
                message: format!("cannot build HTTP client for {}: {}", self.url, e),
            })
    }

    /// Apply basic auth when both username and password are configured.
    pub fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => request.basic_auth(username, Some(password)),
            _ => request,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

// ============================================================================
// File representation
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    graph: FileGraph,
    query: FileQuery,
    #[serde(rename = "loop")]
    schedule: FileSchedule,
    search: FileSearch,
    tempo: FileConnection,
    nodegraph_provider: FileConnection,
    logging: FileLogging,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileGraph {
    name: Option<String>,
    sync: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileQuery {
    tag: Option<String>,
    tag_filter: Option<String>,
    use_tag_as_node: Option<bool>,
    threshold_ms: Option<f64>,
    service_subtitle: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSchedule {
    interval: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSearch {
    from: Option<u64>,
    mode: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConnection {
    url: Option<String>,
    headers: Option<HashMap<String, String>>,
    username: Option<String>,
    password: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileLogging {
    level: Option<String>,
    format: Option<String>,
    file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the CLI arguments and the config file they point at.
    pub fn load(cli: &Cli) -> AppResult<Self> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let file = match &cli.config {
            Some(path) => read_file_config(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    read_file_config(default_path)?
                } else {
                    FileConfig::default()
                }
            }
        };

        let mut config = Self::resolve(cli, file)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a YAML document and merge it with CLI arguments.
    pub fn from_yaml_str(cli: &Cli, yaml: &str) -> AppResult<Self> {
        let file = parse_file_config(yaml)?;
        Self::resolve(cli, file)
    }

    fn resolve(cli: &Cli, file: FileConfig) -> AppResult<Self> {
        let sync = match cli.sync.as_deref().or(file.graph.sync.as_deref()) {
            Some(s) => s.parse().map_err(config_error)?,
            None => SyncStrategy::Batch,
        };
        let graph = GraphConfig {
            name: cli
                .graph
                .clone()
                .or(file.graph.name)
                .unwrap_or_else(|| DEFAULT_GRAPH.to_string()),
            sync,
        };

        let pattern = cli
            .tag_filter
            .as_deref()
            .or(file.query.tag_filter.as_deref())
            .unwrap_or(DEFAULT_TAG_FILTER);
        let tag_filter = Regex::new(pattern).map_err(|e| AppError::Config {
            message: format!("invalid tag filter {:?}: {}", pattern, e),
        })?;
        let use_tag_as_node = if cli.not_use_tag_as_node {
            false
        } else {
            file.query.use_tag_as_node.unwrap_or(true)
        };
        let query = QueryConfig {
            tag: cli
                .tag
                .clone()
                .or(file.query.tag)
                .unwrap_or_else(|| DEFAULT_TAG.to_string()),
            tag_filter,
            use_tag_as_node,
            threshold_ms: cli
                .threshold_ms
                .or(file.query.threshold_ms)
                .unwrap_or(DEFAULT_THRESHOLD_MS),
            service_subtitle: file
                .query
                .service_subtitle
                .unwrap_or_else(|| DEFAULT_SERVICE_SUBTITLE.to_string()),
        };

        let schedule = ScheduleConfig {
            interval_secs: cli.loop_interval.or(file.schedule.interval).unwrap_or(0),
        };

        let mode = match cli.search_mode.as_deref().or(file.search.mode.as_deref()) {
            Some(s) => s.parse().map_err(config_error)?,
            None => SearchMode::default(),
        };
        let search = SearchConfig {
            from_secs: cli
                .search_from
                .or(file.search.from)
                .unwrap_or(DEFAULT_SEARCH_FROM_SECS),
            mode,
        };

        let tempo = resolve_connection("tempo", cli.tempo_url.clone(), file.tempo)?;
        let nodegraph_provider = resolve_connection(
            "nodegraph_provider",
            cli.nodegraph_url.clone(),
            file.nodegraph_provider,
        )?;

        let default_logging = LoggingConfig::default();
        let logging = LoggingConfig {
            level: file.logging.level.unwrap_or(default_logging.level),
            format: file
                .logging
                .format
                .map(|f| parse_log_format(&f))
                .unwrap_or(default_logging.format),
            file: file.logging.file,
        };

        Ok(Config {
            graph,
            query,
            schedule,
            search,
            tempo,
            nodegraph_provider,
            logging,
        })
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("LOG_FORMAT") {
            self.logging.format = parse_log_format(&format);
        }
        if let Ok(path) = env::var("LOG_FILE") {
            self.logging.file = (!path.is_empty()).then(|| PathBuf::from(path));
        }
    }
}

fn read_file_config(path: &Path) -> AppResult<FileConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| AppError::Config {
        message: format!("cannot read config file {}: {}", path.display(), e),
    })?;
    parse_file_config(&raw)
}

fn parse_file_config(raw: &str) -> AppResult<FileConfig> {
    // An empty document deserializes to unit, treat it as "no settings"
    if raw.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    Ok(serde_yaml::from_str(raw)?)
}

fn resolve_connection(
    section: &str,
    cli_url: Option<String>,
    file: FileConnection,
) -> AppResult<ConnectionConfig> {
    let url = cli_url.or(file.url).ok_or_else(|| AppError::Config {
        message: format!("{}.url is required", section),
    })?;

    let mut connection = ConnectionConfig::new(url.trim_end_matches('/'));
    connection.headers = file.headers.unwrap_or_default();
    connection.username = file.username;
    connection.password = file.password;
    if let Some(timeout_ms) = file.timeout_ms {
        connection.timeout_ms = timeout_ms;
    }
    Ok(connection)
}

fn parse_log_format(s: &str) -> LogFormat {
    match s.to_lowercase().as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Pretty,
    }
}

fn config_error(message: String) -> AppError {
    AppError::Config { message }
}

/// Path the CLI would read configuration from.
pub fn config_path(cli: &Cli) -> PathBuf {
    cli.config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
