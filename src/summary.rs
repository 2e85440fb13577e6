//! Operator summary log: one line per network outcome, appended across runs.

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::Local;
use tracing::error;

pub const SUMMARY_FILE_NAME: &str = "AWDB_SUMMARY.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Processed,
    ProcessingFailed,
    Saved,
    SaveFailed,
    CopiedActive,
    CopyActiveFailed,
    Archived,
    ArchiveFailed,
}

impl Outcome {
    fn describe(self) -> &'static str {
        match self {
            Outcome::Processed => "processed OK",
            Outcome::ProcessingFailed => "processing FAILED",
            Outcome::Saved => "saved OK",
            Outcome::SaveFailed => "save FAILED",
            Outcome::CopiedActive => "copied for active",
            Outcome::CopyActiveFailed => "copy for active FAILED",
            Outcome::Archived => "archived OK",
            Outcome::ArchiveFailed => "archive FAILED",
        }
    }
}

pub struct SummaryLog {
    path: PathBuf,
}

impl SummaryLog {
    pub fn open(log_dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(log_dir)?;

        Ok(SummaryLog {
            path: log_dir.join(SUMMARY_FILE_NAME),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn network(&self, network: &str, outcome: Outcome) {
        self.write(&format!("stations_{} {}", network, outcome.describe()));
    }

    /// Appends a timestamped line. The summary is advisory, so a failed write
    /// is logged rather than returned.
    pub fn write(&self, message: &str) {
        if let Err(e) = self.append(message) {
            error!(path = %self.path.display(), error = %e, "Failed to write summary log");
        }
    }

    fn append(&self, message: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}: {}", Local::now().format("%Y-%m-%d %H:%M:%S"), message)
    }
}

// -- Tests -------------------------------------------------------------------
