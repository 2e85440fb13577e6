//! Handles serialising and saving station metadata in the _parquet_ file format.

pub mod stations;

pub use stations::save_stations;
