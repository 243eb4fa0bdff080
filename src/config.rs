use crate::crs::resolve_import_srid;
use crate::error::{Result, SurfaceError};
use crate::idw::IdwParams;
use crate::normalize::DegeneratePolicy;
use crate::smooth::validate_sigma;
use std::path::PathBuf;

/// Stations whose readings are ingested and counted toward the quorum
pub const DEFAULT_STATIONS: [&str; 8] = [
    "scl016",
    "Palermo SIAS",
    "scl069",
    "scl088",
    "scl148",
    "scl421",
    "scl040",
    "scl396",
];

pub const DEFAULT_QUORUM: usize = 7;
pub const DEFAULT_TABLE: &str = "weather_observations";

/// Interpolation, normalization and smoothing parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceConfig {
    pub power: f64,
    pub neighbors: usize,
    pub sigma: f64,
    pub degenerate: DegeneratePolicy,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            power: 2.0,
            neighbors: 4,
            sigma: 3.0,
            degenerate: DegeneratePolicy::ZeroFill,
        }
    }
}

impl SurfaceConfig {
    pub fn idw_params(&self) -> IdwParams {
        IdwParams {
            power: self.power,
            neighbors: self.neighbors,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.idw_params().validate()?;
        validate_sigma(self.sigma)
    }
}

/// Station allowlist and how many of them a timestamp needs
#[derive(Debug, Clone, PartialEq)]
pub struct StationSelection {
    pub stations: Vec<String>,
    pub quorum: usize,
}

impl Default for StationSelection {
    fn default() -> Self {
        Self {
            stations: DEFAULT_STATIONS.iter().map(|s| s.to_string()).collect(),
            quorum: DEFAULT_QUORUM,
        }
    }
}

impl StationSelection {
    /// Build from CLI input, falling back to the default allowlist
    pub fn from_args(stations: &[String], quorum: Option<usize>) -> Result<Self> {
        let mut selection = Self::default();
        if !stations.is_empty() {
            selection.stations = stations.to_vec();
            selection.stations.sort();
            selection.stations.dedup();
            selection.quorum = selection.stations.len();
        }
        if let Some(q) = quorum {
            selection.quorum = q;
        }
        selection.validate()?;
        Ok(selection)
    }

    pub fn contains(&self, station_id: &str) -> bool {
        self.stations.iter().any(|s| s == station_id)
    }

    pub fn validate(&self) -> Result<()> {
        if self.stations.is_empty() {
            return Err(SurfaceError::InvalidParameter(
                "station allowlist is empty".to_string(),
            ));
        }
        if self.quorum == 0 || self.quorum > self.stations.len() {
            return Err(SurfaceError::InvalidParameter(format!(
                "quorum must be between 1 and {}, got {}",
                self.stations.len(),
                self.quorum
            )));
        }
        Ok(())
    }
}

/// Where observations live
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub database_url: String,
    pub table: String,
}

impl StoreConfig {
    pub fn new(database_url: impl Into<String>, table: impl Into<String>) -> Result<Self> {
        let config = Self {
            database_url: database_url.into(),
            table: table.into(),
        };
        validate_identifier(&config.table)?;
        Ok(config)
    }
}

/// How the written raster is loaded back into PostGIS
#[derive(Debug, Clone, PartialEq)]
pub struct ImportConfig {
    pub database_url: String,
    pub table: String,
    /// SRID to tag the raster with; `None` uses the raster's own
    pub srid: Option<u32>,
    /// Accept an SRID that differs from the raster's spatial reference
    pub force_srid: bool,
    pub raster2pgsql: PathBuf,
    pub psql: PathBuf,
}

impl ImportConfig {
    pub fn new(database_url: impl Into<String>, table: impl Into<String>) -> Result<Self> {
        let config = Self {
            database_url: database_url.into(),
            table: table.into(),
            srid: None,
            force_srid: false,
            raster2pgsql: PathBuf::from("raster2pgsql"),
            psql: PathBuf::from("psql"),
        };
        validate_identifier(&config.table)?;
        Ok(config)
    }

    /// SRID the import will use for a raster in `raster_srid`
    pub fn resolve_srid(&self, raster_srid: Option<u32>) -> Result<u32> {
        resolve_import_srid(raster_srid, self.srid, self.force_srid)
    }
}

/// Table names are spliced into SQL, so allow only `[A-Za-z_][A-Za-z0-9_]*`
/// with an optional `schema.` prefix.
pub fn validate_identifier(name: &str) -> Result<()> {
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };

    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 || !parts.iter().all(|p| valid_part(p)) {
        return Err(SurfaceError::InvalidParameter(format!(
            "invalid table name: {:?}",
            name
        )));
    }
    Ok(())
}
