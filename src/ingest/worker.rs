//! Fetches the metadata for one chunk of stations, retrying whatever the
//! service did not return.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::{
    error::FetchError,
    station::{validate, RawRecord, StationTriplet, Validation},
};

use super::{Chunk, Diagnostic, ResultMessage, Severity, StationMetadata};

/// What a worker did with its chunk.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WorkerOutcome {
    pub delivered: usize,
    pub rejected: usize,
    pub attempts: u32,
    /// Triplets still pending once the retry budget ran out.
    pub failed: Vec<StationTriplet>,
}

/// The results channel is gone; nobody is listening any more.
struct Closed;

pub struct FetchWorker<M: ?Sized> {
    metadata: Arc<M>,
    retry_count: u32,
    strict_validation: bool,
    results: UnboundedSender<ResultMessage>,
}

impl<M> FetchWorker<M>
where
    M: StationMetadata + ?Sized,
{
    pub fn new(
        metadata: Arc<M>,
        retry_count: u32,
        strict_validation: bool,
        results: UnboundedSender<ResultMessage>,
    ) -> Self {
        FetchWorker {
            metadata,
            retry_count,
            strict_validation,
            results,
        }
    }

    /// Retrieves every station in `chunk`, sending each valid record down the
    /// results channel exactly once.
    pub async fn run(self, chunk: Chunk) -> WorkerOutcome {
        let mut outcome = WorkerOutcome::default();
        let mut pending = chunk;

        // A closed channel means the coordinator gave up; stop quietly.
        let _ = self.retrieve(&mut pending, &mut outcome).await;

        outcome.failed = pending;
        outcome
    }

    async fn retrieve(
        &self,
        pending: &mut Chunk,
        outcome: &mut WorkerOutcome,
    ) -> Result<(), Closed> {
        let mut retries_left = self.retry_count;

        loop {
            outcome.attempts += 1;

            match self.request(pending).await {
                Ok(records) => self.accept(records, pending, outcome)?,
                Err(e) => {
                    let e = anyhow::Error::from(e);
                    self.emit_diagnostic(
                        Diagnostic::new(
                            Severity::Warn,
                            format!("Request for {} stations failed", pending.len()),
                        )
                        .with_detail(format!("{:#}", e)),
                    )?;
                }
            }

            if pending.is_empty() {
                return Ok(());
            }

            if retries_left == 0 {
                let names: Vec<&str> = pending.iter().map(StationTriplet::as_str).collect();
                return self.emit_diagnostic(Diagnostic::new(
                    Severity::Error,
                    format!("Stations could not be retrieved: [{}]", names.join(", ")),
                ));
            }

            retries_left -= 1;
            self.emit_diagnostic(Diagnostic::new(
                Severity::Info,
                format!(
                    "{} stations were not retrieved; retrying ({} retries left)",
                    pending.len(),
                    retries_left
                ),
            ))?;
        }
    }

    async fn request(&self, pending: &[StationTriplet]) -> Result<Vec<RawRecord>, FetchError> {
        match pending {
            [single] => Ok(vec![self.metadata.get_one(single).await?]),
            many => self.metadata.get_many(many).await,
        }
    }

    fn accept(
        &self,
        records: Vec<RawRecord>,
        pending: &mut Chunk,
        outcome: &mut WorkerOutcome,
    ) -> Result<(), Closed> {
        for raw in records {
            let record = match validate(raw) {
                Validation::Valid(record) => record,
                Validation::Invalid(reason) => {
                    outcome.rejected += 1;
                    if self.strict_validation {
                        self.emit_diagnostic(Diagnostic::new(
                            Severity::Warn,
                            format!("Dropped invalid station record: {}", reason),
                        ))?;
                    }
                    continue;
                }
            };

            // Anything not pending was either never asked for or already sent.
            let Some(position) = pending.iter().position(|t| *t == record.station_triplet) else {
                self.emit_diagnostic(Diagnostic::new(
                    Severity::Debug,
                    format!("Ignoring unrequested station {}", record.station_triplet),
                ))?;
                continue;
            };

            pending.remove(position);
            self.results.send(ResultMessage::Record(record)).map_err(|_| Closed)?;
            outcome.delivered += 1;
        }

        Ok(())
    }

    fn emit_diagnostic(&self, diagnostic: Diagnostic) -> Result<(), Closed> {
        self.results
            .send(ResultMessage::Diagnostic(diagnostic))
            .map_err(|_| Closed)
    }
}

// -- Tests -------------------------------------------------------------------
