//! Hourly station observations from the Meteohub open-data API.

use crate::config::StationSelection;
use crate::error::{Result, SurfaceError};
use crate::source::StationReading;
use chrono::{DateTime, Duration, DurationRound, NaiveDateTime, TimeZone, Utc};
use log::{debug, info, warn};
use serde::Deserialize;
use std::collections::BTreeMap;

pub const DEFAULT_API_URL: &str = "https://meteohub.mistralportal.it/api/observations";
pub const DEFAULT_PRODUCT: &str = "B12101";

/// Start of the current hour and one hour later
pub fn hour_window(now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = now
        .duration_trunc(Duration::hours(1))
        .map_err(|e| SurfaceError::InvalidParameter(format!("cannot truncate {}: {}", now, e)))?;
    Ok((start, start + Duration::hours(1)))
}

/// Value of the `q` filter for one reference-time window
pub fn build_query(product: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format!(
        "reftime: >={},<{};product:{};license:CCBY_COMPLIANT;timerange:254,0,0;level:103,2000,0,0",
        start.format("%Y-%m-%d %H:00"),
        end.format("%Y-%m-%d %H:00"),
        product
    )
}

/// Top-level API response; items are decoded one by one so a malformed
/// record does not sink the whole batch
#[derive(Debug, Deserialize)]
pub struct ObservationPayload {
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Record {
    stat: Station,
    prod: Vec<Product>,
}

#[derive(Debug, Deserialize)]
struct Station {
    lat: f64,
    lon: f64,
    details: Vec<Detail>,
}

#[derive(Debug, Deserialize)]
struct Detail {
    val: Scalar,
}

#[derive(Debug, Deserialize)]
struct Product {
    val: Vec<Measurement>,
}

#[derive(Debug, Deserialize)]
struct Measurement {
    val: Scalar,
    #[serde(rename = "ref")]
    reftime: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Number(f64),
    Text(String),
}

impl Scalar {
    fn as_text(&self) -> String {
        match self {
            Scalar::Number(n) => n.to_string(),
            Scalar::Text(s) => s.clone(),
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Parse a Meteohub reference time; naive times are UTC
pub fn parse_reftime(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn decode_record(item: &serde_json::Value) -> std::result::Result<StationReading, String> {
    let record = Record::deserialize(item).map_err(|e| e.to_string())?;

    let station_id = record
        .stat
        .details
        .first()
        .map(|d| d.val.as_text())
        .ok_or("station has no details")?;
    let measurement = record
        .prod
        .first()
        .and_then(|p| p.val.first())
        .ok_or("record has no measurement")?;
    let value = measurement
        .val
        .as_number()
        .ok_or_else(|| format!("non-numeric value for {}", station_id))?;
    let observed_at = parse_reftime(&measurement.reftime)
        .ok_or_else(|| format!("bad reference time {:?}", measurement.reftime))?;

    Ok(StationReading {
        station_id,
        observed_at,
        lon: record.stat.lon,
        lat: record.stat.lat,
        value,
    })
}

/// Keep one reading per allowlisted station; later records win
pub fn select_readings(
    payload: &ObservationPayload,
    selection: &StationSelection,
) -> BTreeMap<String, StationReading> {
    let mut readings = BTreeMap::new();

    for item in &payload.data {
        match decode_record(item) {
            Ok(reading) => {
                debug!("Station available: {}", reading.station_id);
                if selection.contains(&reading.station_id) {
                    readings.insert(reading.station_id.clone(), reading);
                }
            }
            Err(e) => warn!("Skipping record due to error: {}", e),
        }
    }

    readings
}

/// Allowlisted stations absent from `readings`
pub fn missing_stations(
    readings: &BTreeMap<String, StationReading>,
    selection: &StationSelection,
) -> Vec<String> {
    selection
        .stations
        .iter()
        .filter(|s| !readings.contains_key(s.as_str()))
        .cloned()
        .collect()
}

/// Thin client over the observations endpoint
#[derive(Debug, Clone)]
pub struct MeteohubClient {
    client: reqwest::Client,
    url: String,
    product: String,
}

impl MeteohubClient {
    pub fn new(url: impl Into<String>, product: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            product: product.into(),
        }
    }

    /// Latest observations within [start, end)
    pub async fn fetch(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ObservationPayload> {
        let q = build_query(&self.product, start, end);
        info!("Fetching observations from {} to {}", start, end);
        debug!("Query: {}", q);

        let payload = self
            .client
            .get(&self.url)
            .query(&[
                ("q", q.as_str()),
                ("reliabilityCheck", "true"),
                ("last", "true"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<ObservationPayload>()
            .await?;

        info!("Received {} records", payload.data.len());
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_payload() -> ObservationPayload {
        let value = json!({
            "data": [
                {
                    "stat": {"lat": 38.11, "lon": 13.36, "details": [{"var": "B01019", "val": "Palermo SIAS"}]},
                    "prod": [{"var": "B12101", "val": [{"ref": "2025-03-14T10:00:00", "val": 289.15}]}]
                },
                {
                    "stat": {"lat": 37.5, "lon": 14.0, "details": [{"var": "B01019", "val": "scl016"}]},
                    "prod": [{"var": "B12101", "val": [{"ref": "2025-03-14T10:00:00", "val": "290.5"}]}]
                },
                {
                    "stat": {"lat": 37.0, "lon": 15.0, "details": [{"var": "B01019", "val": "elsewhere"}]},
                    "prod": [{"var": "B12101", "val": [{"ref": "2025-03-14T10:00:00", "val": 280.0}]}]
                },
                {
                    "stat": {"lat": 37.0, "lon": 15.0, "details": []},
                    "prod": []
                },
                {"unexpected": true}
            ]
        });
        serde_json::from_value(value).unwrap()
    }

    fn selection() -> StationSelection {
        StationSelection {
            stations: vec!["Palermo SIAS".to_string(), "scl016".to_string(), "scl069".to_string()],
            quorum: 2,
        }
    }

    #[test]
    fn test_hour_window() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 10, 42, 17).unwrap();
        let (start, end) = hour_window(now).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 3, 14, 11, 0, 0).unwrap());
    }

    #[test]
    fn test_build_query() {
        let start = Utc.with_ymd_and_hms(2025, 3, 14, 23, 0, 0).unwrap();
        let q = build_query(DEFAULT_PRODUCT, start, start + Duration::hours(1));
        assert_eq!(
            q,
            "reftime: >=2025-03-14 23:00,<2025-03-15 00:00;product:B12101;license:CCBY_COMPLIANT;timerange:254,0,0;level:103,2000,0,0"
        );
    }

    #[test]
    fn test_parse_reftime_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap();
        assert_eq!(parse_reftime("2025-03-14T10:00:00"), Some(expected));
        assert_eq!(parse_reftime("2025-03-14 10:00:00"), Some(expected));
        assert_eq!(parse_reftime("2025-03-14T10:00:00Z"), Some(expected));
        assert_eq!(parse_reftime("yesterday"), None);
    }

    #[test]
    fn test_select_readings_filters_allowlist() {
        let readings = select_readings(&sample_payload(), &selection());
        assert_eq!(readings.len(), 2);

        let palermo = &readings["Palermo SIAS"];
        assert_eq!(palermo.lon, 13.36);
        assert_eq!(palermo.lat, 38.11);
        assert_eq!(palermo.value, 289.15);

        // String-encoded values are accepted
        assert_eq!(readings["scl016"].value, 290.5);
    }

    #[test]
    fn test_missing_stations() {
        let readings = select_readings(&sample_payload(), &selection());
        assert_eq!(missing_stations(&readings, &selection()), vec!["scl069"]);
    }

    #[test]
    fn test_empty_payload() {
        let payload: ObservationPayload = serde_json::from_str("{}").unwrap();
        assert!(select_readings(&payload, &selection()).is_empty());
    }
}
