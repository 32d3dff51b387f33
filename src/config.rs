//! Configuration types for kv2couch
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - Store connection settings

use crate::error::ConfigError;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};
use regex::Regex;
use reqwest::Url;
use std::num::NonZeroUsize;
use std::time::Duration;

/// Maximum reasonable worker count
const MAX_WORKERS: usize = 512;

/// Largest number of keys allowed in one bulk request
const MAX_SAVE_LIMIT: usize = 100_000;

/// Default number of keys per job
pub const DEFAULT_SAVE_LIMIT: usize = 100;

/// Default worker pool size
pub const DEFAULT_WORKERS: usize = 20;

/// Move base64-encoded documents from Redis into a CouchDB bulk endpoint
#[derive(Parser, Debug, Clone)]
#[command(
    name = "kv2couch",
    version,
    about = "Move base64-encoded documents from Redis into a CouchDB bulk endpoint",
    long_about = "Enumerates keys in a Redis database, decodes each value from base64 and \
                  submits the documents in batches to a CouchDB _bulk_docs endpoint using a \
                  fixed pool of workers.\n\n\
                  With --flush the Redis database is cleared once every batch has reported.",
    after_help = "EXAMPLES:\n    \
        kv2couch http://localhost:5984/db/_bulk_docs\n    \
        kv2couch --save-url http://couch:5984/db/_bulk_docs --host redis:6379 --db 2\n    \
        kv2couch http://localhost:5984/db/_bulk_docs -l 500 -w 8 -p --flush\n    \
        kv2couch http://localhost:5984/db/_bulk_docs --print-results erroranddoc"
)]
pub struct CliArgs {
    /// Bulk save URL (e.g. http://localhost:5984/db/_bulk_docs)
    #[arg(value_name = "SAVE_URL")]
    pub save_url_arg: Option<String>,

    /// Bulk save URL, flag form (takes precedence over SAVE_URL)
    #[arg(long = "save-url", value_name = "URL")]
    pub save_url: Option<String>,

    /// Redis host and port
    #[arg(long, default_value = "localhost:6379", value_name = "HOST")]
    pub host: String,

    /// Redis password
    #[arg(long, default_value = "", hide_default_value = true)]
    pub password: String,

    /// Redis database index
    #[arg(long, default_value = "0", value_name = "NUM")]
    pub db: i64,

    /// Key pattern to migrate
    #[arg(long, default_value = "*", value_name = "GLOB")]
    pub pattern: String,

    /// Skip keys matching regex (can be repeated)
    #[arg(long = "exclude", value_name = "REGEX", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Number of documents per bulk request
    #[arg(short = 'l', long, default_value_t = DEFAULT_SAVE_LIMIT, value_name = "NUM")]
    pub save_limit: usize,

    /// Number of concurrent workers
    #[arg(short = 'w', long, default_value_t = DEFAULT_WORKERS, value_name = "NUM")]
    pub workers: usize,

    /// Flush the Redis database after every batch has reported
    #[arg(long)]
    pub flush: bool,

    /// HTTP request timeout in seconds (no timeout if not set)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print each bulk request body
    #[arg(long)]
    pub print_request: bool,

    /// Which bulk save results to print
    #[arg(long, value_enum, default_value_t = PrintResults::Silent, value_name = "MODE")]
    pub print_results: PrintResults,

    /// Print a status line per completed batch
    #[arg(long)]
    pub print_status: bool,

    /// Show header, progress bar and summary
    #[arg(short = 'p', long)]
    pub progress: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Result printing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PrintResults {
    /// Print nothing
    #[default]
    Silent,
    /// Every per-document result
    All,
    /// Only rejected documents
    Error,
    /// Rejected documents with the submitted document body
    #[value(name = "erroranddoc")]
    ErrorAndDoc,
    /// Raw response body
    Raw,
}

impl PrintResults {
    /// Whether fetched documents must be kept until their results are printed
    pub fn needs_documents(self) -> bool {
        self == PrintResults::ErrorAndDoc
    }

    /// Whether the raw response body must be kept
    pub fn needs_raw_body(self) -> bool {
        self == PrintResults::Raw
    }
}

/// Connection settings for the source store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// host[:port]
    pub host: String,

    /// Password (empty means no AUTH)
    pub password: String,

    /// Database index
    pub db: i64,
}

impl StoreSettings {
    /// Build a `redis://` connection URL with the password percent-encoded
    pub fn connection_url(&self) -> Result<String, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidStoreHost {
            host: self.host.clone(),
            reason,
        };

        let mut url = Url::parse(&format!("redis://{}/{}", self.host, self.db))
            .map_err(|e| invalid(e.to_string()))?;

        if url.host_str().map_or(true, str::is_empty) {
            return Err(invalid("missing host name".into()));
        }

        if !self.password.is_empty() {
            url.set_password(Some(&self.password))
                .map_err(|()| invalid("URL cannot carry a password".into()))?;
        }

        Ok(url.to_string())
    }

    /// Connection string for display (never includes the password)
    pub fn to_display_string(&self) -> String {
        format!("redis://{}/{}", self.host, self.db)
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct MigrateConfig {
    /// Destination bulk endpoint
    pub save_url: Url,

    /// Source store settings
    pub store: StoreSettings,

    /// Key enumeration pattern
    pub pattern: String,

    /// Compiled exclude patterns
    pub exclude_patterns: Vec<Regex>,

    /// Maximum keys per job
    pub save_limit: NonZeroUsize,

    /// Number of worker threads
    pub worker_count: usize,

    /// Flush the store after a full drain
    pub flush: bool,

    /// Per-request timeout
    pub request_timeout: Option<Duration>,

    /// Echo request bodies
    pub print_request: bool,

    /// Result printing mode
    pub print_results: PrintResults,

    /// Per-job status lines
    pub print_status: bool,

    /// Show progress bar, header and summary
    pub show_progress: bool,
}

impl MigrateConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let save_url_str = args
            .save_url
            .or(args.save_url_arg)
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingSaveUrl)?;

        let save_url = parse_save_url(&save_url_str)?;

        // Validate worker count
        if args.workers == 0 || args.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: args.workers,
                max: MAX_WORKERS,
            });
        }

        // Validate save limit
        let save_limit = NonZeroUsize::new(args.save_limit)
            .filter(|n| n.get() <= MAX_SAVE_LIMIT)
            .ok_or(ConfigError::InvalidSaveLimit {
                size: args.save_limit,
                max: MAX_SAVE_LIMIT,
            })?;

        // Compile exclude patterns
        let exclude_patterns = args
            .exclude_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| ConfigError::InvalidExcludePattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let store = StoreSettings {
            host: args.host,
            password: args.password,
            db: args.db,
        };
        store.connection_url()?;

        Ok(Self {
            save_url,
            store,
            pattern: args.pattern,
            exclude_patterns,
            save_limit,
            worker_count: args.workers,
            flush: args.flush,
            request_timeout: args.timeout.map(Duration::from_secs),
            print_request: args.print_request,
            print_results: args.print_results,
            print_status: args.print_status,
            show_progress: args.progress,
        })
    }

    /// Check if a key should be excluded
    pub fn is_excluded(&self, key: &str) -> bool {
        self.exclude_patterns.iter().any(|re| re.is_match(key))
    }
}

/// Render a configuration error the way clap reports bad arguments, usage included
pub fn usage_error(err: &ConfigError) -> clap::Error {
    let kind = match err {
        ConfigError::MissingSaveUrl => ErrorKind::MissingRequiredArgument,
        _ => ErrorKind::ValueValidation,
    };
    CliArgs::command().error(kind, err)
}

fn parse_save_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidSaveUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidSaveUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("kv2couch").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config =
            MigrateConfig::from_args(parse(&["http://localhost:5984/db/_bulk_docs"])).unwrap();
        assert_eq!(config.save_limit.get(), 100);
        assert_eq!(config.worker_count, 20);
        assert!(!config.flush);
        assert_eq!(config.request_timeout, None);
        assert_eq!(config.print_results, PrintResults::Silent);
        assert_eq!(config.pattern, "*");
        assert_eq!(config.store.host, "localhost:6379");
    }

    #[test]
    fn test_save_url_flag_wins() {
        let config = MigrateConfig::from_args(parse(&[
            "http://positional/db/_bulk_docs",
            "--save-url",
            "http://flag/db/_bulk_docs",
        ]))
        .unwrap();
        assert_eq!(config.save_url.host_str(), Some("flag"));
    }

    #[test]
    fn test_missing_save_url() {
        let err = MigrateConfig::from_args(parse(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSaveUrl));

        let rendered = usage_error(&err);
        assert_eq!(rendered.kind(), ErrorKind::MissingRequiredArgument);
        let text = rendered.to_string();
        assert!(text.contains("Missing bulk save URL"));
        assert!(text.contains("Usage:"));
    }

    #[test]
    fn test_invalid_save_url() {
        let err = MigrateConfig::from_args(parse(&["ftp://host/db"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSaveUrl { .. }));

        let err = MigrateConfig::from_args(parse(&["not a url"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSaveUrl { .. }));
    }

    #[test]
    fn test_invalid_counts() {
        let err = MigrateConfig::from_args(parse(&["http://h/db", "-w", "0"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWorkerCount { .. }));

        let err = MigrateConfig::from_args(parse(&["http://h/db", "-l", "0"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSaveLimit { .. }));
    }

    #[test]
    fn test_print_results_values() {
        let args = parse(&["http://h/db", "--print-results", "erroranddoc"]);
        assert_eq!(args.print_results, PrintResults::ErrorAndDoc);
        assert!(args.print_results.needs_documents());

        let args = parse(&["http://h/db", "--print-results", "raw"]);
        assert!(args.print_results.needs_raw_body());
    }

    #[test]
    fn test_exclude_pattern() {
        let config =
            MigrateConfig::from_args(parse(&["http://h/db", "--exclude", "^tmp:"])).unwrap();
        assert!(config.is_excluded("tmp:1"));
        assert!(!config.is_excluded("doc:1"));

        let err =
            MigrateConfig::from_args(parse(&["http://h/db", "--exclude", "("])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidExcludePattern { .. }));
    }

    #[test]
    fn test_store_connection_url() {
        let settings = StoreSettings {
            host: "redis.local:6380".into(),
            password: "p@ss word".into(),
            db: 3,
        };
        let url = settings.connection_url().unwrap();
        assert!(url.starts_with("redis://:"));
        assert!(url.ends_with("@redis.local:6380/3"));
        assert!(!url.contains("p@ss word"));
        assert_eq!(settings.to_display_string(), "redis://redis.local:6380/3");

        let settings = StoreSettings {
            host: "localhost:6379".into(),
            password: String::new(),
            db: 0,
        };
        assert_eq!(settings.connection_url().unwrap(), "redis://localhost:6379/0");
    }
}
