//! Error types for the station ingest pipeline.

use thiserror::Error;

use crate::station::StationTriplet;

/// A failed call to the remote AWDB service. Always treated as transient.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error {status} from {url}")]
    Status { status: u16, url: String },

    #[error("could not decode response: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to list stations for network {network}: {source}")]
    Directory {
        network: String,
        #[source]
        source: FetchError,
    },

    #[error("failed to write station record: {0}")]
    Sink(#[from] SinkError),

    #[error("worker task failed: {0}")]
    Worker(String),

    #[error(
        "network {network} incomplete: wrote {written} of {expected} stations, missing {}",
        format_missing(.missing)
    )]
    IncompleteNetwork {
        network: String,
        expected: usize,
        written: usize,
        missing: Vec<StationTriplet>,
    },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("chunk size must be at least 1")]
    ZeroChunkSize,

    #[error("worker count must be at least 1")]
    ZeroWorkers,
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not persist archive: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("{0} has no file name")]
    NoFileName(String),
}

fn format_missing(missing: &[StationTriplet]) -> String {
    const SHOWN: usize = 10;

    let mut listed: Vec<&str> = missing.iter().take(SHOWN).map(|t| t.as_str()).collect();
    if missing.len() > SHOWN {
        listed.push("...");
    }
    format!("[{}]", listed.join(", "))
}

// -- Tests -------------------------------------------------------------------
