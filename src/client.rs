//! HTTP client for the AWDB station service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{
    error::FetchError,
    ingest::{StationDirectory, StationMetadata},
    station::{RawRecord, StationTriplet},
};

/// REST field names that differ from the record schema.
const FIELD_RENAMES: [(&str, &str); 1] = [("dataTimeZone", "stationDataTimeZone")];

pub struct AwdbClient {
    http: Client,
    base_url: String,
}

impl AwdbClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(AwdbClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `GET {base}/stations?stationTriplets=...`. The pattern may hold
    /// `*` wildcards or several comma separated triplets.
    async fn stations(&self, triplets: String) -> Result<Value, FetchError> {
        let url = self.stations_url();
        debug!(%url, %triplets, "Requesting");

        let response = self
            .http
            .get(&url)
            .query(&[
                ("stationTriplets", triplets.as_str()),
                ("activeOnly", "false"),
                ("returnStationElements", "false"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url: response.url().to_string(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }

    fn stations_url(&self) -> String {
        format!("{}/stations", self.base_url)
    }
}

#[async_trait]
impl StationDirectory for AwdbClient {
    async fn list_station_triplets(
        &self,
        network: &str,
    ) -> Result<Vec<StationTriplet>, FetchError> {
        let body = self.stations(format!("*:*:{}", network)).await?;

        parse_triplets(body)
    }
}

#[async_trait]
impl StationMetadata for AwdbClient {
    async fn get_one(&self, triplet: &StationTriplet) -> Result<RawRecord, FetchError> {
        let body = self.stations(triplet.to_string()).await?;

        parse_single_record(body)
    }

    async fn get_many(&self, triplets: &[StationTriplet]) -> Result<Vec<RawRecord>, FetchError> {
        let joined = triplets
            .iter()
            .map(StationTriplet::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let body = self.stations(joined).await?;

        parse_records(body)
    }
}

/// A directory entry: a station object or a bare triplet string.
#[derive(Deserialize)]
#[serde(untagged)]
enum DirectoryEntry {
    Triplet(StationTriplet),
    Station {
        #[serde(rename = "stationTriplet")]
        station_triplet: StationTriplet,
    },
}

fn parse_triplets(body: Value) -> Result<Vec<StationTriplet>, FetchError> {
    let entries: Vec<DirectoryEntry> =
        serde_json::from_value(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    Ok(entries
        .into_iter()
        .map(|entry| match entry {
            DirectoryEntry::Triplet(triplet) => triplet,
            DirectoryEntry::Station { station_triplet } => station_triplet,
        })
        .collect())
}

fn parse_records(body: Value) -> Result<Vec<RawRecord>, FetchError> {
    match body {
        Value::Array(entries) => Ok(entries
            .into_iter()
            .filter_map(|entry| match entry {
                Value::Object(map) => Some(rename_fields(map)),
                // Not a record; the worker will see the station as missing.
                _ => None,
            })
            .collect()),
        Value::Null => Ok(Vec::new()),
        _ => Err(FetchError::Decode(
            "expected an array of station records".to_string(),
        )),
    }
}

fn parse_single_record(body: Value) -> Result<RawRecord, FetchError> {
    match body {
        Value::Object(map) => Ok(rename_fields(map)),
        Value::Array(_) => parse_records(body)?
            .pop()
            .ok_or_else(|| FetchError::Decode("empty station response".to_string())),
        _ => Err(FetchError::Decode("expected a station record".to_string())),
    }
}

/// Moves REST field names onto the record schema, unless the record already
/// carries the schema name.
fn rename_fields(mut raw: RawRecord) -> RawRecord {
    for (rest, schema) in FIELD_RENAMES {
        if raw.contains_key(schema) {
            continue;
        }
        if let Some(value) = raw.remove(rest) {
            raw.insert(schema.to_string(), value);
        }
    }
    raw
}

// -- Tests -------------------------------------------------------------------
