use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Array shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No observation points available for interpolation")]
    InsufficientData,

    #[error("All estimates are equal ({0}), cannot rescale to [0, 1]")]
    DegenerateRange(f64),

    #[error("Grid does not match raster geometry: expected {expected} cells, found {found}")]
    GeometryMismatch { expected: usize, found: usize },

    #[error("Failed to write raster {}: {source}", path.display())]
    RasterWrite {
        path: PathBuf,
        #[source]
        source: gdal::errors::GdalError,
    },

    #[error("Reference raster has invalid dimensions: {0}x{1}")]
    InvalidDimensions(usize, usize),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid compression type: {0}")]
    InvalidCompression(String),

    #[error("Raster is in EPSG:{raster} but import requested SRID {requested} (use --force-srid to override)")]
    SridMismatch { raster: u32, requested: u32 },

    #[error("Raster spatial reference has no EPSG code; pass --srid explicitly")]
    UnknownSrid,

    #[error("Raster import failed: {0}")]
    ImportFailed(String),

    #[error("No timestamp has readings from at least {quorum} required stations")]
    NoQuorumTimestamp { quorum: usize },
}

pub type Result<T> = std::result::Result<T, SurfaceError>;
