//! Run settings, from the command line or the environment.

use std::{num::NonZeroUsize, path::PathBuf, time::Duration};

use clap::Args;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://wcc.sc.egov.usda.gov/awdbRestApi/services/v1";

/// AWDB network codes refreshed when none are named.
pub const DEFAULT_NETWORKS: [&str; 10] = [
    "SNTL", "SNOW", "USGS", "COOP", "SCAN", "SNTLT", "OTHER", "BOR", "MPRC", "MSNT",
];

/// Tuning for the station retrieval workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub max_concurrent_workers: NonZeroUsize,
    pub chunk_size: NonZeroUsize,
    pub retry_count: u32,
    pub strict_validation: bool,
}

impl IngestConfig {
    pub fn new(
        max_concurrent_workers: usize,
        chunk_size: usize,
        retry_count: u32,
        strict_validation: bool,
    ) -> Result<Self, ConfigError> {
        Ok(IngestConfig {
            max_concurrent_workers: NonZeroUsize::new(max_concurrent_workers)
                .ok_or(ConfigError::ZeroWorkers)?,
            chunk_size: NonZeroUsize::new(chunk_size).ok_or(ConfigError::ZeroChunkSize)?,
            retry_count,
            strict_validation,
        })
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            max_concurrent_workers: NonZeroUsize::new(10).unwrap_or(NonZeroUsize::MIN),
            chunk_size: NonZeroUsize::new(250).unwrap_or(NonZeroUsize::MIN),
            retry_count: 2,
            strict_validation: false,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// AWDB REST service root
    #[arg(long, env = "AWDB_BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    pub base_url: String,

    /// Maximum number of concurrent retrieval workers
    #[arg(long, env = "AWDB_WORKERS", default_value_t = 10, global = true)]
    pub workers: usize,

    /// Stations per metadata request
    #[arg(long, env = "AWDB_CHUNK_SIZE", default_value_t = 250, global = true)]
    pub chunk_size: usize,

    /// Retries for stations a request did not return, and for whole networks
    #[arg(long, env = "AWDB_RETRIES", default_value_t = 2, global = true)]
    pub retries: u32,

    /// Log every station record rejected by validation
    #[arg(long, env = "AWDB_STRICT_VALIDATION", global = true)]
    pub strict_validation: bool,

    /// HTTP request timeout in seconds
    #[arg(long, env = "AWDB_REQUEST_TIMEOUT", default_value_t = 120, global = true)]
    pub request_timeout_secs: u64,

    /// Where station files are written [default: ~/awdb]
    #[arg(long, env = "AWDB_OUTPUT_DIR", global = true)]
    pub output_dir: Option<PathBuf>,

    /// Root of the dated archive tree [default: <output-dir>/archive]
    #[arg(long, env = "AWDB_ARCHIVE_DIR", global = true)]
    pub archive_dir: Option<PathBuf>,

    /// Directory for the summary and full logs [default: <output-dir>/log]
    #[arg(long, env = "AWDB_LOG_DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, env = "AWDB_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Also write the full log to a daily file in the log directory
    #[arg(long, env = "AWDB_LOG_FILE", global = true)]
    pub log_file: bool,
}

impl Settings {
    pub fn ingest_config(&self) -> Result<IngestConfig, ConfigError> {
        IngestConfig::new(self.workers, self.chunk_size, self.retries, self.strict_validation)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("awdb")
        })
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.archive_dir
            .clone()
            .unwrap_or_else(|| self.output_dir().join("archive"))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| self.output_dir().join("log"))
    }
}

// -- Tests -------------------------------------------------------------------
