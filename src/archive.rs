//! Dated tar.gz copies of finished station files.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use flate2::{write::GzEncoder, Compression};
use tar::Builder;
use tempfile::NamedTempFile;

use crate::error::ArchiveError;

/// Archives `file` as `<archive_root>/YYYY/MM/DD/YYYY-MM-DD_<stem>.tar.gz`,
/// storing it inside as `YYYY-MM-DD_<file name>`. Returns the archive path.
pub fn archive_file(
    file: &Path,
    archive_root: &Path,
    date: NaiveDate,
) -> Result<PathBuf, ArchiveError> {
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ArchiveError::NoFileName(file.display().to_string()))?;
    let stem = file
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or(name);

    let prefix = date.format("%Y-%m-%d");
    let dir = archive_root.join(date.format("%Y/%m/%d").to_string());
    fs::create_dir_all(&dir)?;
    let archive_path = dir.join(format!("{}_{}.tar.gz", prefix, stem));

    // Staged beside the target and renamed into place.
    let staging = NamedTempFile::new_in(&dir)?;
    let encoder = GzEncoder::new(staging, Compression::default());
    let mut tar = Builder::new(encoder);
    tar.append_path_with_name(file, format!("{}_{}", prefix, name))?;
    let mut staging = tar.into_inner()?.finish()?;
    staging.flush()?;
    staging.persist(&archive_path)?;

    Ok(archive_path)
}

// -- Tests -------------------------------------------------------------------
