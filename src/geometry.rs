use crate::error::{Result, SurfaceError};
use ndarray::Array2;

/// Pixel layout of the reference raster
#[derive(Debug, Clone, PartialEq)]
pub struct RasterProfile {
    /// GDAL data type name of band 1 (e.g. "Byte", "Float32")
    pub data_type: String,
    pub band_count: usize,
    pub nodata: Option<f64>,
}

/// Immutable description of the target raster surface.
///
/// `geotransform` uses GDAL ordering: `x = gt[0] + col*gt[1] + row*gt[2]`,
/// `y = gt[3] + col*gt[4] + row*gt[5]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterGeometry {
    pub width: usize,
    pub height: usize,
    pub geotransform: [f64; 6],
    pub projection: String,
    pub srid: Option<u32>,
    pub profile: RasterProfile,
}

impl RasterGeometry {
    pub fn new(width: usize, height: usize, geotransform: [f64; 6]) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(SurfaceError::InvalidDimensions(width, height));
        }

        Ok(Self {
            width,
            height,
            geotransform,
            projection: String::new(),
            srid: None,
            profile: RasterProfile {
                data_type: "Float32".to_string(),
                band_count: 1,
                nodata: None,
            },
        })
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// Map fractional pixel coordinates to spatial coordinates
    pub fn pixel_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        let gt = &self.geotransform;
        (
            gt[0] + col * gt[1] + row * gt[2],
            gt[3] + col * gt[4] + row * gt[5],
        )
    }

    /// Spatial coordinate of the center of pixel (row, col)
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.pixel_to_geo(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Fail unless `found` cells line up with this geometry
    pub fn check_cells(&self, found: usize) -> Result<()> {
        let expected = self.cell_count();
        if found != expected {
            return Err(SurfaceError::GeometryMismatch { expected, found });
        }
        Ok(())
    }

    pub fn check_grid(&self, grid: &SurfaceGrid) -> Result<()> {
        if grid.dim() != (self.height, self.width) {
            return Err(SurfaceError::GeometryMismatch {
                expected: self.cell_count(),
                found: grid.len(),
            });
        }
        Ok(())
    }
}

/// A known measurement in the raster's spatial reference
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservationPoint {
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

impl ObservationPoint {
    pub fn new(x: f64, y: f64, value: f64) -> Self {
        Self { x, y, value }
    }

    #[inline]
    pub fn dist_sq(&self, qx: f64, qy: f64) -> f64 {
        let dx = self.x - qx;
        let dy = self.y - qy;
        dx * dx + dy * dy
    }
}

/// Pixel-center coordinates of a raster, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct QueryGrid {
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) coords: Vec<(f64, f64)>,
}

impl QueryGrid {
    pub fn new(width: usize, height: usize, coords: Vec<(f64, f64)>) -> Result<Self> {
        if coords.len() != width * height {
            return Err(SurfaceError::GeometryMismatch {
                expected: width * height,
                found: coords.len(),
            });
        }
        Ok(Self {
            width,
            height,
            coords,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn coords(&self) -> &[(f64, f64)] {
        &self.coords
    }

    /// Coordinate at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Option<(f64, f64)> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.coords.get(row * self.width + col).copied()
    }
}

/// Row-major `(height, width)` surface values
pub type SurfaceGrid = Array2<f64>;
