//! Validation of raw AWDB station metadata.
//!
//! The service omits fields it has no value for, so a raw record is filled
//! out to the full field schema before it is turned into a [`StationRecord`].

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

use super::StationTriplet;

/// A station record exactly as returned by the service.
pub type RawRecord = Map<String, Value>;

pub const TRIPLET_FIELD: &str = "stationTriplet";

/// Geometry fields. A record without all of them is rejected.
pub const REQUIRED_FIELDS: [&str; 3] = ["elevation", "latitude", "longitude"];

/// Descriptive fields, nullable.
pub const OPTIONAL_FIELDS: [&str; 12] = [
    "actonId",
    "beginDate",
    "countyName",
    "endDate",
    "fipsCountryCd",
    "fipsCountyCd",
    "fipsStateNumber",
    "huc",
    "name",
    "shefId",
    "stationDataTimeZone",
    "stationTimeZone",
];

const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_MINUTE_FORMAT: &str = "%Y-%m-%d %H:%M";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq)]
pub struct StationRecord {
    pub station_triplet: StationTriplet,
    pub elevation: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub acton_id: Option<String>,
    pub begin_date: Option<NaiveDateTime>,
    pub county_name: Option<String>,
    pub end_date: Option<NaiveDateTime>,
    pub fips_country_cd: Option<String>,
    pub fips_county_cd: Option<i16>,
    pub fips_state_number: Option<i16>,
    pub huc: Option<String>,
    pub name: Option<String>,
    pub shef_id: Option<String>,
    pub station_data_time_zone: Option<f64>,
    pub station_time_zone: Option<f64>,
}

impl StationRecord {
    /// A minimal record with every optional field null.
    pub fn new(
        station_triplet: StationTriplet,
        elevation: f64,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        StationRecord {
            station_triplet,
            elevation,
            latitude,
            longitude,
            acton_id: None,
            begin_date: None,
            county_name: None,
            end_date: None,
            fips_country_cd: None,
            fips_county_cd: None,
            fips_state_number: None,
            huc: None,
            name: None,
            shef_id: None,
            station_data_time_zone: None,
            station_time_zone: None,
        }
    }

    /// AWDB marks stations still reporting with an end date of 2100-01-01.
    pub fn is_active(&self) -> bool {
        self.end_date == Some(active_end_date())
    }
}

fn active_end_date() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2100, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Valid(StationRecord),
    Invalid(RejectReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    MissingField(&'static str),
    MissingTriplet,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MissingField(field) => write!(f, "missing required field `{}`", field),
            RejectReason::MissingTriplet => write!(f, "missing `{}`", TRIPLET_FIELD),
        }
    }
}

/// Fills every optional field absent from `raw` with `null`.
pub fn complete(mut raw: RawRecord) -> RawRecord {
    for field in OPTIONAL_FIELDS {
        raw.entry(field).or_insert(Value::Null);
    }
    raw
}

/// Checks a raw record for the required fields and builds a schema-complete
/// [`StationRecord`] from it.
pub fn validate(raw: RawRecord) -> Validation {
    let mut geometry = [0.0; 3];
    for (slot, field) in geometry.iter_mut().zip(REQUIRED_FIELDS) {
        match raw.get(field).and_then(as_f64) {
            Some(v) => *slot = v,
            None => return Validation::Invalid(RejectReason::MissingField(field)),
        }
    }

    let Some(triplet) = raw.get(TRIPLET_FIELD).and_then(as_text) else {
        return Validation::Invalid(RejectReason::MissingTriplet);
    };

    let raw = complete(raw);
    let [elevation, latitude, longitude] = geometry;

    Validation::Valid(StationRecord {
        acton_id: text(&raw, "actonId"),
        begin_date: date_time(&raw, "beginDate"),
        county_name: text(&raw, "countyName"),
        end_date: date_time(&raw, "endDate"),
        fips_country_cd: text(&raw, "fipsCountryCd"),
        fips_county_cd: small_int(&raw, "fipsCountyCd"),
        fips_state_number: small_int(&raw, "fipsStateNumber"),
        huc: text(&raw, "huc"),
        name: text(&raw, "name"),
        shef_id: text(&raw, "shefId"),
        station_data_time_zone: raw.get("stationDataTimeZone").and_then(as_f64),
        station_time_zone: raw.get("stationTimeZone").and_then(as_f64),
        ..StationRecord::new(triplet.into(), elevation, latitude, longitude)
    })
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text(raw: &RawRecord, field: &str) -> Option<String> {
    raw.get(field).and_then(as_text)
}

fn small_int(raw: &RawRecord, field: &str) -> Option<i16> {
    match raw.get(field)? {
        Value::Number(n) => n.as_i64().and_then(|v| i16::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn date_time(raw: &RawRecord, field: &str) -> Option<NaiveDateTime> {
    let s = raw.get(field)?.as_str()?.trim();

    NaiveDateTime::parse_from_str(s, DATE_TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, DATE_MINUTE_FORMAT))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn raw(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    fn minimal() -> RawRecord {
        raw(json!({
            "stationTriplet": "1000:OR:SNTL",
            "elevation": 5900.0,
            "latitude": 44.2,
            "longitude": -121.8,
        }))
    }

    #[test]
    fn should_validate_full_record() {
        let record = raw(json!({
            "stationTriplet": "1000:OR:SNTL",
            "actonId": "21D12S",
            "beginDate": "1979-10-01 00:00:00",
            "countyName": "Deschutes",
            "endDate": "2100-01-01 00:00:00",
            "fipsCountryCd": "US",
            "fipsCountyCd": 17,
            "fipsStateNumber": "41",
            "huc": "170703010304",
            "name": "Three Creeks Meadow",
            "shefId": "TCMO3",
            "stationDataTimeZone": -8.0,
            "stationTimeZone": -8,
            "elevation": 5690,
            "latitude": "44.14",
            "longitude": -121.64,
        }));

        let Validation::Valid(s) = validate(record) else {
            panic!("record should be valid");
        };

        assert_eq!(s.station_triplet.as_str(), "1000:OR:SNTL");
        assert_eq!(s.elevation, 5690.0);
        assert_eq!(s.latitude, 44.14);
        assert_eq!(s.fips_county_cd, Some(17));
        assert_eq!(s.fips_state_number, Some(41));
        assert_eq!(s.station_time_zone, Some(-8.0));
        assert_eq!(s.name.as_deref(), Some("Three Creeks Meadow"));
        assert_eq!(
            s.begin_date,
            NaiveDate::from_ymd_opt(1979, 10, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        assert!(s.is_active());
    }

    #[test]
    fn should_fill_every_optional_field() {
        let completed = complete(minimal());

        for field in OPTIONAL_FIELDS {
            assert_eq!(completed.get(field), Some(&Value::Null), "{field} not filled");
        }

        let Validation::Valid(s) = validate(minimal()) else {
            panic!("record should be valid");
        };
        assert_eq!(
            s,
            StationRecord::new("1000:OR:SNTL".into(), 5900.0, 44.2, -121.8)
        );
    }

    #[test]
    fn should_keep_values_already_present_when_completing() {
        let mut record = minimal();
        record.insert("name".to_string(), json!("Bogus Basin"));

        let completed = complete(record);

        assert_eq!(completed.get("name"), Some(&json!("Bogus Basin")));
    }

    #[test]
    fn should_reject_each_missing_required_field() {
        for field in REQUIRED_FIELDS {
            let mut record = complete(minimal());
            record.insert("name".to_string(), json!("Full Of Optionals"));
            record.remove(field);

            assert_eq!(
                validate(record),
                Validation::Invalid(RejectReason::MissingField(field))
            );
        }
    }

    #[test]
    fn should_treat_null_geometry_as_missing() {
        let mut record = minimal();
        record.insert("latitude".to_string(), Value::Null);

        assert_eq!(
            validate(record),
            Validation::Invalid(RejectReason::MissingField("latitude"))
        );
    }

    #[test]
    fn should_reject_record_without_triplet() {
        let mut record = minimal();
        record.remove(TRIPLET_FIELD);

        assert_eq!(validate(record), Validation::Invalid(RejectReason::MissingTriplet));
    }

    #[test]
    fn should_null_out_badly_typed_optionals() {
        let mut record = minimal();
        record.insert("fipsCountyCd".to_string(), json!(99999));
        record.insert("endDate".to_string(), json!("sometime"));
        record.insert("huc".to_string(), json!(["170703"]));

        let Validation::Valid(s) = validate(record) else {
            panic!("record should be valid");
        };

        assert_eq!(s.fips_county_cd, None);
        assert_eq!(s.end_date, None);
        assert_eq!(s.huc, None);
        assert!(!s.is_active());
    }

    #[test]
    fn should_accept_bare_dates() {
        let mut record = minimal();
        record.insert("endDate".to_string(), json!("2100-01-01"));

        let Validation::Valid(s) = validate(record) else {
            panic!("record should be valid");
        };

        assert!(s.is_active());
    }

    #[test]
    fn should_accept_dates_without_seconds() {
        let mut record = minimal();
        record.insert("beginDate".to_string(), json!("1978-10-01 00:00"));
        record.insert("endDate".to_string(), json!("2100-01-01 00:00"));

        let Validation::Valid(s) = validate(record) else {
            panic!("record should be valid");
        };

        assert_eq!(
            s.begin_date,
            NaiveDate::from_ymd_opt(1978, 10, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        assert!(s.is_active());
    }
}
