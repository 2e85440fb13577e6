//! Command line interface.

pub mod command;

use std::time::Duration;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Contains the commands
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Refresh station metadata for the given networks (default: all)
    Stations {
        /// AWDB network codes, e.g. SNTL SNOW
        networks: Vec<String>,

        /// Do not copy finished files into the archive tree
        #[arg(long)]
        no_archive: bool,
    },
    /// Print the station triplets listed for a network
    Triplets {
        /// AWDB network code
        network: String,
    },
}

/// Creates a spinner.
pub fn create_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    bar
}

/// Spinner style that also shows how many stations have been written.
pub fn station_counter_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner} {msg} ({pos} stations written)")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

// -- Tests -------------------------------------------------------------------
