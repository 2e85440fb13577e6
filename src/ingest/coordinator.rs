//! Orchestrates the retrieval of one network.

use std::{collections::HashSet, sync::Arc};

use tokio::{
    sync::{
        mpsc::{self, UnboundedReceiver, UnboundedSender},
        Semaphore,
    },
    task::JoinSet,
};
use tracing::{debug, info, instrument, warn};

use crate::{config::IngestConfig, error::IngestError, station::StationTriplet};

use super::{
    chunk, Chunk, FetchWorker, ResultMessage, StationDirectory, StationMetadata, StationSink,
    WorkerOutcome,
};

/// Result of a network whose every station was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub network: String,
    pub expected: usize,
    pub written: usize,
    pub rejected: usize,
}

#[derive(Debug, Default)]
struct LaunchSummary {
    rejected: usize,
    failed: usize,
}

pub struct Coordinator<D: ?Sized, M: ?Sized> {
    directory: Arc<D>,
    metadata: Arc<M>,
    config: IngestConfig,
}

impl<D, M> Coordinator<D, M>
where
    D: StationDirectory + ?Sized,
    M: StationMetadata + ?Sized + 'static,
{
    pub fn new(directory: Arc<D>, metadata: Arc<M>, config: IngestConfig) -> Self {
        Coordinator {
            directory,
            metadata,
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Retrieves every station of `network` into `sink`.
    ///
    /// Fails with [`IngestError::IncompleteNetwork`] unless one record was
    /// written for each station the directory listed. Repeated entries in the
    /// listing count once, so `expected` is the number of distinct stations.
    #[instrument(skip(self, sink))]
    pub async fn ingest_network<S>(
        &self,
        network: &str,
        sink: &mut S,
    ) -> Result<IngestReport, IngestError>
    where
        S: StationSink + ?Sized,
    {
        let listed = self
            .directory
            .list_station_triplets(network)
            .await
            .map_err(|source| IngestError::Directory {
                network: network.to_string(),
                source,
            })?;

        let triplets = dedup(listed);
        let expected = triplets.len();
        info!(network, stations = expected, "Found stations in network");

        let chunks = chunk(&triplets, self.config.chunk_size);
        let (tx, rx) = mpsc::unbounded_channel();
        let launcher = tokio::spawn(launch(
            chunks,
            Arc::clone(&self.metadata),
            self.config.clone(),
            tx,
        ));

        let mut pending: HashSet<StationTriplet> = triplets.iter().cloned().collect();
        let written = match drain(network, rx, &mut pending, sink).await {
            Ok(written) => written,
            Err(e) => {
                // Dropping the launcher's JoinSet aborts the running workers.
                launcher.abort();
                return Err(e);
            }
        };

        let summary = launcher
            .await
            .map_err(|e| IngestError::Worker(e.to_string()))??;

        info!(
            network,
            written,
            expected,
            rejected = summary.rejected,
            "Inserted station records"
        );

        if written != expected {
            let missing = triplets
                .into_iter()
                .filter(|t| pending.contains(t))
                .collect();
            return Err(IngestError::IncompleteNetwork {
                network: network.to_string(),
                expected,
                written,
                missing,
            });
        }

        if summary.failed > 0 {
            warn!(
                network,
                failed = summary.failed,
                "Workers reported failures but every station arrived"
            );
        }

        Ok(IngestReport {
            network: network.to_string(),
            expected,
            written,
            rejected: summary.rejected,
        })
    }
}

/// Removes repeated triplets, keeping first occurrences in order.
fn dedup(listed: Vec<StationTriplet>) -> Vec<StationTriplet> {
    let mut seen = HashSet::with_capacity(listed.len());
    let total = listed.len();
    let unique: Vec<StationTriplet> = listed
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect();

    if unique.len() != total {
        warn!(repeated = total - unique.len(), "Directory listed some stations more than once");
    }
    unique
}

/// Runs one worker per chunk, never more than the configured number at once,
/// and sends [`ResultMessage::Done`] after the last one finishes.
async fn launch<M>(
    chunks: Vec<Chunk>,
    metadata: Arc<M>,
    config: IngestConfig,
    results: UnboundedSender<ResultMessage>,
) -> Result<LaunchSummary, IngestError>
where
    M: StationMetadata + ?Sized + 'static,
{
    let permits = Arc::new(Semaphore::new(config.max_concurrent_workers.get()));
    let mut workers: JoinSet<WorkerOutcome> = JoinSet::new();

    for chunk in chunks {
        let permit = Arc::clone(&permits)
            .acquire_owned()
            .await
            .map_err(|e| IngestError::Worker(e.to_string()))?;

        let worker = FetchWorker::new(
            Arc::clone(&metadata),
            config.retry_count,
            config.strict_validation,
            results.clone(),
        );
        workers.spawn(async move {
            let outcome = worker.run(chunk).await;
            drop(permit);
            outcome
        });
    }

    let mut summary = LaunchSummary::default();
    let mut crashed = None;
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(outcome) => {
                debug!(
                    delivered = outcome.delivered,
                    attempts = outcome.attempts,
                    failed = outcome.failed.len(),
                    "Worker finished"
                );
                summary.rejected += outcome.rejected;
                summary.failed += outcome.failed.len();
            }
            Err(e) => crashed = Some(e.to_string()),
        }
    }

    // The receiver may already be gone if the drain loop failed.
    let _ = results.send(ResultMessage::Done);

    match crashed {
        Some(e) => Err(IngestError::Worker(e)),
        None => Ok(summary),
    }
}

/// Writes records to the sink as they arrive until the completion marker.
async fn drain<S>(
    network: &str,
    mut results: UnboundedReceiver<ResultMessage>,
    pending: &mut HashSet<StationTriplet>,
    sink: &mut S,
) -> Result<usize, IngestError>
where
    S: StationSink + ?Sized,
{
    let mut written = 0;

    while let Some(message) = results.recv().await {
        match message {
            ResultMessage::Done => break,
            ResultMessage::Diagnostic(diagnostic) => diagnostic.log(network),
            ResultMessage::Record(record) => {
                if !pending.remove(&record.station_triplet) {
                    warn!(
                        network,
                        station = %record.station_triplet,
                        "Skipping duplicate or unlisted station"
                    );
                    continue;
                }
                sink.append(record)?;
                written += 1;
            }
        }
    }

    Ok(written)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use std::{
        collections::{HashMap, HashSet},
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::{
        error::{FetchError, SinkError},
        station::{RawRecord, StationRecord},
    };

    /// In-process stand-in for the AWDB service.
    struct FakeAwdb {
        triplets: Vec<StationTriplet>,
        /// Stations the service never returns.
        unavailable: HashSet<StationTriplet>,
        /// Number of initial calls per request that fail before succeeding.
        flaky_calls: AtomicUsize,
        latency: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        served: Mutex<HashMap<StationTriplet, usize>>,
        directory_down: bool,
    }

    impl FakeAwdb {
        fn new(count: usize) -> Self {
            FakeAwdb {
                triplets: (0..count)
                    .map(|i| StationTriplet::from(format!("{i}:AK:SNTL")))
                    .collect(),
                unavailable: HashSet::new(),
                flaky_calls: AtomicUsize::new(0),
                latency: Duration::ZERO,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                served: Mutex::new(HashMap::new()),
                directory_down: false,
            }
        }

        fn directory_down(mut self) -> Self {
            self.directory_down = true;
            self
        }

        fn unavailable(mut self, names: &[&str]) -> Self {
            self.unavailable = names.iter().map(|n| StationTriplet::from(*n)).collect();
            self
        }

        fn latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        fn flaky(self, calls: usize) -> Self {
            self.flaky_calls.store(calls, Ordering::SeqCst);
            self
        }

        fn raw(triplet: &StationTriplet) -> RawRecord {
            match json!({
                "stationTriplet": triplet.as_str(),
                "elevation": 3000,
                "latitude": 61.2,
                "longitude": -149.9,
                "endDate": "2100-01-01 00:00:00",
            }) {
                serde_json::Value::Object(map) => map,
                _ => unreachable!(),
            }
        }

        async fn serve(&self, triplets: &[StationTriplet]) -> Result<Vec<RawRecord>, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.latency).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let flaky = self
                .flaky_calls
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if flaky {
                return Err(FetchError::Status {
                    status: 503,
                    url: "fake".to_string(),
                });
            }

            let mut served = self.served.lock().unwrap();
            Ok(triplets
                .iter()
                .filter(|t| !self.unavailable.contains(*t))
                .map(|t| {
                    *served.entry(t.clone()).or_default() += 1;
                    Self::raw(t)
                })
                .collect())
        }
    }

    #[async_trait]
    impl StationDirectory for FakeAwdb {
        async fn list_station_triplets(
            &self,
            _network: &str,
        ) -> Result<Vec<StationTriplet>, FetchError> {
            if self.directory_down {
                return Err(FetchError::Status {
                    status: 500,
                    url: "fake".to_string(),
                });
            }
            Ok(self.triplets.clone())
        }
    }

    /// Metadata service whose requests crash the worker.
    struct PanickingMetadata;

    #[async_trait]
    impl StationMetadata for PanickingMetadata {
        async fn get_one(&self, _triplet: &StationTriplet) -> Result<RawRecord, FetchError> {
            panic!("metadata service crashed");
        }

        async fn get_many(
            &self,
            _triplets: &[StationTriplet],
        ) -> Result<Vec<RawRecord>, FetchError> {
            panic!("metadata service crashed");
        }
    }

    #[async_trait]
    impl StationMetadata for FakeAwdb {
        async fn get_one(&self, triplet: &StationTriplet) -> Result<RawRecord, FetchError> {
            self.serve(std::slice::from_ref(triplet))
                .await?
                .pop()
                .ok_or_else(|| FetchError::Decode("no station".to_string()))
        }

        async fn get_many(
            &self,
            triplets: &[StationTriplet],
        ) -> Result<Vec<RawRecord>, FetchError> {
            self.serve(triplets).await
        }
    }

    struct FailingSink;

    impl StationSink for FailingSink {
        fn append(&mut self, _record: StationRecord) -> Result<(), SinkError> {
            Err(SinkError::Io(std::io::Error::other("disk full")))
        }
    }

    fn config(workers: usize, chunk_size: usize, retries: u32) -> IngestConfig {
        IngestConfig::new(workers, chunk_size, retries, false).unwrap()
    }

    fn setup(
        fake: FakeAwdb,
        config: IngestConfig,
    ) -> (Arc<FakeAwdb>, Coordinator<FakeAwdb, FakeAwdb>) {
        let fake = Arc::new(fake);
        (
            Arc::clone(&fake),
            Coordinator::new(Arc::clone(&fake), fake, config),
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_write_every_station_once() {
        let (fake, coordinator) = setup(FakeAwdb::new(23), config(3, 5, 2));
        let mut sink: Vec<StationRecord> = Vec::new();

        let report = coordinator.ingest_network("SNTL", &mut sink).await.unwrap();

        assert_eq!(report.expected, 23);
        assert_eq!(report.written, 23);
        let unique: HashSet<_> = sink.iter().map(|r| r.station_triplet.clone()).collect();
        assert_eq!(unique.len(), 23);
        assert!(fake.served.lock().unwrap().values().all(|&n| n == 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_never_exceed_worker_cap() {
        let fake = FakeAwdb::new(40).latency(Duration::from_millis(30));
        let (fake, coordinator) = setup(fake, config(3, 4, 0));
        let mut sink: Vec<StationRecord> = Vec::new();

        coordinator.ingest_network("SNOW", &mut sink).await.unwrap();

        assert_eq!(sink.len(), 40);
        assert_eq!(fake.max_in_flight.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn should_recover_from_transient_failures() {
        let (_, coordinator) = setup(FakeAwdb::new(6).flaky(2), config(1, 3, 2));
        let mut sink: Vec<StationRecord> = Vec::new();

        let report = coordinator.ingest_network("SCAN", &mut sink).await.unwrap();

        assert_eq!(report.written, 6);
    }

    #[tokio::test]
    async fn should_fail_incomplete_network() {
        let fake = FakeAwdb::new(5).unavailable(&["1:AK:SNTL", "3:AK:SNTL"]);
        let (_, coordinator) = setup(fake, config(2, 2, 1));
        let mut sink: Vec<StationRecord> = Vec::new();

        let err = coordinator
            .ingest_network("SNTL", &mut sink)
            .await
            .unwrap_err();

        assert_eq!(sink.len(), 3);
        match err {
            IngestError::IncompleteNetwork {
                expected,
                written,
                missing,
                ..
            } => {
                assert_eq!(expected, 5);
                assert_eq!(written, 3);
                assert_eq!(
                    missing,
                    vec![StationTriplet::from("1:AK:SNTL"), "3:AK:SNTL".into()]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn should_succeed_for_empty_network() {
        let (_, coordinator) = setup(FakeAwdb::new(0), config(2, 250, 2));
        let mut sink: Vec<StationRecord> = Vec::new();

        let report = coordinator.ingest_network("MSNT", &mut sink).await.unwrap();

        assert_eq!(report.expected, 0);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn should_propagate_sink_failure() {
        let (_, coordinator) = setup(FakeAwdb::new(4), config(2, 2, 0));

        let err = coordinator
            .ingest_network("BOR", &mut FailingSink)
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Sink(SinkError::Io(_))));
    }

    #[tokio::test]
    async fn should_report_directory_failure() {
        let (_, coordinator) = setup(FakeAwdb::new(4).directory_down(), config(2, 2, 0));
        let mut sink: Vec<StationRecord> = Vec::new();

        let err = coordinator
            .ingest_network("COOP", &mut sink)
            .await
            .unwrap_err();

        match err {
            IngestError::Directory { network, source } => {
                assert_eq!(network, "COOP");
                assert!(matches!(source, FetchError::Status { status: 500, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(sink.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn should_report_crashed_worker() {
        let coordinator = Coordinator::new(
            Arc::new(FakeAwdb::new(5)),
            Arc::new(PanickingMetadata),
            config(2, 2, 0),
        );
        let mut sink: Vec<StationRecord> = Vec::new();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            coordinator.ingest_network("SNTLT", &mut sink),
        )
        .await
        .expect("ingest should not hang after a worker panic");

        assert!(matches!(result, Err(IngestError::Worker(_))));
    }

    #[tokio::test]
    async fn should_send_done_after_worker_panic() {
        let chunks = vec![
            vec![StationTriplet::from("1:AK:SNTL")],
            vec!["2:AK:SNTL".into()],
        ];
        let (tx, mut rx) = mpsc::unbounded_channel();

        let summary = launch(chunks, Arc::new(PanickingMetadata), config(2, 1, 0), tx).await;

        assert!(matches!(summary, Err(IngestError::Worker(_))));
        let mut last = None;
        while let Some(message) = rx.recv().await {
            last = Some(message);
        }
        assert!(matches!(last, Some(ResultMessage::Done)));
    }

    #[test]
    fn should_dedup_listed_triplets_in_order() {
        let listed: Vec<StationTriplet> = ["b", "a", "b", "c", "a"]
            .into_iter()
            .map(Into::into)
            .collect();

        let unique = dedup(listed);

        assert_eq!(unique, vec![StationTriplet::from("b"), "a".into(), "c".into()]);
    }
}
