//! Save station records to a parquet file.

use std::{fs::File, path::Path, sync::Arc};

use arrow::{
    array::{ArrayRef, Float64Array, Int16Array, StringArray, TimestampSecondArray},
    datatypes::{DataType, Field, Schema, TimeUnit},
    record_batch::RecordBatch,
};
use chrono::NaiveDateTime;
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};

use crate::{error::SinkError, station::StationRecord};

pub fn schema() -> Schema {
    let timestamp = DataType::Timestamp(TimeUnit::Second, None);

    Schema::new(vec![
        Field::new("stationTriplet", DataType::Utf8, false),
        Field::new("elevation", DataType::Float64, false),
        Field::new("latitude", DataType::Float64, false),
        Field::new("longitude", DataType::Float64, false),
        Field::new("actonId", DataType::Utf8, true),
        Field::new("beginDate", timestamp.clone(), true),
        Field::new("countyName", DataType::Utf8, true),
        Field::new("endDate", timestamp, true),
        Field::new("fipsCountryCd", DataType::Utf8, true),
        Field::new("fipsCountyCd", DataType::Int16, true),
        Field::new("fipsStateNumber", DataType::Int16, true),
        Field::new("huc", DataType::Utf8, true),
        Field::new("name", DataType::Utf8, true),
        Field::new("shefId", DataType::Utf8, true),
        Field::new("stationDataTimeZone", DataType::Float64, true),
        Field::new("stationTimeZone", DataType::Float64, true),
    ])
}

pub fn to_record_batch<'a, I>(stations: I) -> Result<RecordBatch, SinkError>
where
    I: IntoIterator<Item = &'a StationRecord>,
    I::IntoIter: Clone,
{
    let stations = stations.into_iter();

    let text = |f: fn(&StationRecord) -> Option<&str>| -> ArrayRef {
        Arc::new(stations.clone().map(f).collect::<StringArray>())
    };
    let float = |f: fn(&StationRecord) -> Option<f64>| -> ArrayRef {
        Arc::new(stations.clone().map(f).collect::<Float64Array>())
    };
    let short = |f: fn(&StationRecord) -> Option<i16>| -> ArrayRef {
        Arc::new(stations.clone().map(f).collect::<Int16Array>())
    };
    let seconds = |f: fn(&StationRecord) -> Option<NaiveDateTime>| -> ArrayRef {
        Arc::new(
            stations
                .clone()
                .map(|s| f(s).map(|d| d.and_utc().timestamp()))
                .collect::<TimestampSecondArray>(),
        )
    };

    let columns: Vec<ArrayRef> = vec![
        text(|s| Some(s.station_triplet.as_str())),
        float(|s| Some(s.elevation)),
        float(|s| Some(s.latitude)),
        float(|s| Some(s.longitude)),
        text(|s| s.acton_id.as_deref()),
        seconds(|s| s.begin_date),
        text(|s| s.county_name.as_deref()),
        seconds(|s| s.end_date),
        text(|s| s.fips_country_cd.as_deref()),
        short(|s| s.fips_county_cd),
        short(|s| s.fips_state_number),
        text(|s| s.huc.as_deref()),
        text(|s| s.name.as_deref()),
        text(|s| s.shef_id.as_deref()),
        float(|s| s.station_data_time_zone),
        float(|s| s.station_time_zone),
    ];

    Ok(RecordBatch::try_new(Arc::new(schema()), columns)?)
}

/// Writes `stations` to `file_path`, replacing any existing file.
pub fn save_stations<'a, I>(stations: I, file_path: &Path) -> Result<(), SinkError>
where
    I: IntoIterator<Item = &'a StationRecord>,
    I::IntoIter: Clone,
{
    let file = File::create(file_path)?;
    let batch = to_record_batch(stations)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}

// -- Tests -------------------------------------------------------------------
