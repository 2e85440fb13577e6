pub mod stations;
pub mod triplets;

use std::path::{Path, PathBuf};

pub use stations::stations;
pub use triplets::triplets;

/// `stations_SNTL.parquet`, or `active_stations_SNTL.parquet` for the
/// active-only subset.
pub fn make_parquet_file_name(output_dir: &Path, network: &str, active_only: bool) -> PathBuf {
    let prefix = if active_only { "active_" } else { "" };

    output_dir.join(format!("{}stations_{}.parquet", prefix, network))
}

// -- Tests -------------------------------------------------------------------
