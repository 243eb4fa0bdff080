//! Where interpolation input comes from.
//!
//! Ingestion and interpolation run on different schedules. They only meet
//! through [`PointSource`]: pick the newest timestamp with enough stations,
//! then fetch every reading at that timestamp.

use crate::config::StationSelection;
use crate::error::{Result, SurfaceError};
use crate::geometry::ObservationPoint;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// One station reading as persisted by ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationReading {
    pub station_id: String,
    pub observed_at: DateTime<Utc>,
    pub lon: f64,
    pub lat: f64,
    pub value: f64,
}

impl StationReading {
    /// Readings are stored in lon/lat, the reference raster's system
    pub fn to_point(&self) -> ObservationPoint {
        ObservationPoint::new(self.lon, self.lat, self.value)
    }
}

#[allow(async_fn_in_trait)]
pub trait PointSource {
    /// Newest timestamp with readings from at least `selection.quorum`
    /// distinct allowlisted stations
    async fn latest_complete_timestamp(
        &self,
        selection: &StationSelection,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Every reading at `at`
    async fn points_at(&self, at: DateTime<Utc>) -> Result<Vec<ObservationPoint>>;
}

/// Resolve the quorum timestamp and load its points
pub async fn latest_points<S: PointSource>(
    source: &S,
    selection: &StationSelection,
) -> Result<(DateTime<Utc>, Vec<ObservationPoint>)> {
    let at = source
        .latest_complete_timestamp(selection)
        .await?
        .ok_or(SurfaceError::NoQuorumTimestamp {
            quorum: selection.quorum,
        })?;
    info!("Using data from: {}", at);

    let points = source.points_at(at).await?;
    let total = points.len();
    let points: Vec<ObservationPoint> = points
        .into_iter()
        .filter(|p| p.x.is_finite() && p.y.is_finite() && p.value.is_finite())
        .collect();
    if points.len() < total {
        warn!("Dropped {} non-finite readings", total - points.len());
    }

    info!("Loaded {} observation points", points.len());
    Ok((at, points))
}

/// Latest timestamp meeting the station quorum among `readings`
pub fn latest_quorum_timestamp(
    readings: &[StationReading],
    selection: &StationSelection,
) -> Option<DateTime<Utc>> {
    let mut stations_by_time: BTreeMap<DateTime<Utc>, HashSet<&str>> = BTreeMap::new();
    for reading in readings.iter().filter(|r| selection.contains(&r.station_id)) {
        stations_by_time
            .entry(reading.observed_at)
            .or_default()
            .insert(reading.station_id.as_str());
    }

    stations_by_time
        .into_iter()
        .rev()
        .inspect(|(at, stations)| debug!("{}: {} stations", at, stations.len()))
        .find(|(_, stations)| stations.len() >= selection.quorum)
        .map(|(at, _)| at)
}

/// Readings held in memory, optionally loaded from a JSON array file
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    readings: Vec<StationReading>,
}

impl MemorySource {
    pub fn new(readings: Vec<StationReading>) -> Self {
        Self { readings }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Reading observations from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        let readings: Vec<StationReading> = serde_json::from_str(&text)?;
        debug!("Parsed {} readings", readings.len());
        Ok(Self::new(readings))
    }

    pub fn readings(&self) -> &[StationReading] {
        &self.readings
    }
}

impl PointSource for MemorySource {
    async fn latest_complete_timestamp(
        &self,
        selection: &StationSelection,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(latest_quorum_timestamp(&self.readings, selection))
    }

    async fn points_at(&self, at: DateTime<Utc>) -> Result<Vec<ObservationPoint>> {
        Ok(self
            .readings
            .iter()
            .filter(|r| r.observed_at == at)
            .map(StationReading::to_point)
            .collect())
    }
}
