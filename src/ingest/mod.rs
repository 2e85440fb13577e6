//! Concurrent station metadata retrieval.
//!
//! A [`Coordinator`] lists the stations of a network, splits them into
//! chunks and hands each chunk to a [`FetchWorker`]. Workers report back over
//! a single results channel which the coordinator drains into a
//! [`StationSink`].

pub mod chunk;
pub mod coordinator;
pub mod worker;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::{
    error::{FetchError, SinkError},
    station::{RawRecord, StationRecord, StationTriplet},
};

pub use chunk::{chunk, Chunk};
pub use coordinator::{Coordinator, IngestReport};
pub use worker::{FetchWorker, WorkerOutcome};

/// Lists the stations belonging to a network.
#[async_trait]
pub trait StationDirectory: Send + Sync {
    async fn list_station_triplets(&self, network: &str) -> Result<Vec<StationTriplet>, FetchError>;
}

/// Fetches station metadata by triplet.
#[async_trait]
pub trait StationMetadata: Send + Sync {
    async fn get_one(&self, triplet: &StationTriplet) -> Result<RawRecord, FetchError>;

    async fn get_many(&self, triplets: &[StationTriplet]) -> Result<Vec<RawRecord>, FetchError>;
}

/// Append-only destination for validated records. Records arrive in no
/// particular order.
pub trait StationSink {
    fn append(&mut self, record: StationRecord) -> Result<(), SinkError>;
}

impl StationSink for Vec<StationRecord> {
    fn append(&mut self, record: StationRecord) -> Result<(), SinkError> {
        self.push(record);
        Ok(())
    }
}

/// Payload of the results channel.
#[derive(Debug)]
pub enum ResultMessage {
    Record(StationRecord),
    Diagnostic(Diagnostic),
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

/// A log line sent by a worker. An error and its detail travel as one
/// message so they cannot be split by another worker's output.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub detail: Option<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            severity,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn log(&self, network: &str) {
        let detail = self.detail.as_deref();
        match self.severity {
            Severity::Debug => debug!(network, detail, "{}", self.message),
            Severity::Info => info!(network, detail, "{}", self.message),
            Severity::Warn => warn!(network, detail, "{}", self.message),
            Severity::Error => error!(network, detail, "{}", self.message),
        }
    }
}

// -- Tests -------------------------------------------------------------------
