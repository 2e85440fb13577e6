//! Refresh station metadata for a list of networks and save it to disk.
//!
//! Each network is retrieved in full or not at all; a network that comes back
//! incomplete is retried as a whole and then skipped.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Result};
use chrono::{Local, NaiveDate};
use indicatif::ProgressBar;
use tracing::{error, info, warn};

use crate::{
    archive::archive_file,
    cli::{create_spinner, station_counter_style},
    client::AwdbClient,
    config::{Settings, DEFAULT_NETWORKS},
    error::SinkError,
    ingest::{Coordinator, StationDirectory, StationMetadata, StationSink},
    parquet,
    station::StationRecord,
    summary::{Outcome, SummaryLog},
};

use super::make_parquet_file_name;

pub async fn stations(settings: &Settings, networks: &[String], archive: bool) -> Result<String> {
    let client = Arc::new(AwdbClient::new(
        &settings.base_url,
        settings.request_timeout(),
    )?);
    let coordinator = Coordinator::new(Arc::clone(&client), client, settings.ingest_config()?);

    let output_dir = settings.output_dir();
    fs::create_dir_all(&output_dir)?;
    let summary = SummaryLog::open(&settings.log_dir())?;
    let publisher = Publisher {
        output_dir: output_dir.clone(),
        archive_dir: archive.then(|| settings.archive_dir()),
        date: Local::now().date_naive(),
        summary: &summary,
    };

    let networks: Vec<String> = if networks.is_empty() {
        DEFAULT_NETWORKS.iter().map(|n| n.to_string()).collect()
    } else {
        networks.to_vec()
    };

    let mut failed = 0;
    for network in &networks {
        let Some(records) = fetch_network(&coordinator, network).await else {
            summary.network(network, Outcome::ProcessingFailed);
            failed += 1;
            continue;
        };
        summary.network(network, Outcome::Processed);

        if !publisher.publish(network, &records) {
            failed += 1;
        }
    }

    if failed == networks.len() {
        summary.write("no networks updated");
        bail!("No networks were refreshed; see {}", summary.path().display());
    }

    if failed == 0 {
        summary.write("all networks updated OK");
    } else {
        summary.write(&format!("{} networks FAILED", failed));
    }

    Ok(format!(
        "{} of {} networks saved to `{}`",
        networks.len() - failed,
        networks.len(),
        output_dir.display()
    ))
}

/// Retrieves a whole network, retrying it as a unit. Returns `None` once
/// every attempt came back incomplete or failed.
async fn fetch_network<D, M>(
    coordinator: &Coordinator<D, M>,
    network: &str,
) -> Option<Vec<StationRecord>>
where
    D: StationDirectory + ?Sized,
    M: StationMetadata + ?Sized + 'static,
{
    let attempts = coordinator.config().retry_count + 1;

    for attempt in 1..=attempts {
        let bar = create_spinner(format!("Getting {} stations...", network));
        bar.set_style(station_counter_style());
        let mut sink = ProgressSink::new(&bar);

        match coordinator.ingest_network(network, &mut sink).await {
            Ok(report) => {
                bar.finish_with_message(format!("{} stations retrieved", network));
                info!(
                    network = %report.network,
                    stations = report.written,
                    expected = report.expected,
                    rejected = report.rejected,
                    "Network retrieved"
                );
                return Some(sink.records);
            }
            Err(e) => {
                bar.abandon_with_message(format!("{} retrieval failed", network));
                warn!(network, attempt, error = %e, "Network retrieval failed");
            }
        }
    }

    error!(network, "Failed to retrieve all stations; skipping to next network");
    None
}

/// Collects records in memory, ticking a progress bar per station.
struct ProgressSink<'a> {
    records: Vec<StationRecord>,
    bar: &'a ProgressBar,
}

impl<'a> ProgressSink<'a> {
    fn new(bar: &'a ProgressBar) -> Self {
        ProgressSink {
            records: Vec::new(),
            bar,
        }
    }
}

impl StationSink for ProgressSink<'_> {
    fn append(&mut self, record: StationRecord) -> Result<(), SinkError> {
        self.records.push(record);
        self.bar.inc(1);
        Ok(())
    }
}

/// Writes a retrieved network to its output files and the archive.
struct Publisher<'a> {
    output_dir: PathBuf,
    archive_dir: Option<PathBuf>,
    date: NaiveDate,
    summary: &'a SummaryLog,
}

impl Publisher<'_> {
    /// Returns false if the network's main file could not be saved or a
    /// later copy failed.
    fn publish(&self, network: &str, records: &[StationRecord]) -> bool {
        let all_path = make_parquet_file_name(&self.output_dir, network, false);
        if let Err(e) = parquet::save_stations(records, &all_path) {
            error!(network, error = %e, "Failed to save stations");
            self.summary.network(network, Outcome::SaveFailed);
            return false;
        }
        info!(network, path = %all_path.display(), "Saved stations");
        self.summary.network(network, Outcome::Saved);

        let mut ok = true;

        let active_path = make_parquet_file_name(&self.output_dir, network, true);
        match parquet::save_stations(records.iter().filter(|s| s.is_active()), &active_path) {
            Ok(()) => self.summary.network(network, Outcome::CopiedActive),
            Err(e) => {
                error!(network, error = %e, "Failed to save active stations");
                self.summary.network(network, Outcome::CopyActiveFailed);
                ok = false;
            }
        }

        if let Some(archive_dir) = &self.archive_dir {
            ok &= self.archive(network, &all_path, archive_dir);
        }

        ok
    }

    fn archive(&self, network: &str, file: &Path, archive_dir: &Path) -> bool {
        match archive_file(file, archive_dir, self.date) {
            Ok(path) => {
                info!(network, path = %path.display(), "Archived stations");
                self.summary.network(network, Outcome::Archived);
                true
            }
            Err(e) => {
                error!(network, error = %e, "Failed to archive stations");
                self.summary.network(network, Outcome::ArchiveFailed);
                false
            }
        }
    }
}

// -- Tests -------------------------------------------------------------------
