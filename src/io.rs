use crate::crs::srid_from_wkt;
use crate::error::{Result, SurfaceError};
use crate::geometry::{RasterGeometry, RasterProfile, SurfaceGrid};
use clap::ValueEnum;
use gdal::cpl::CslStringList;
use gdal::raster::{Buffer, GdalType, RasterBand};
use gdal::{Dataset, DriverManager};
use log::{debug, info, warn};
use std::path::Path;

/// Numeric type of the written surface band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PixelType {
    #[default]
    Float32,
    Float64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteOptions {
    pub pixel_type: PixelType,
    /// GeoTIFF COMPRESS creation option
    pub compression: Option<String>,
}

impl WriteOptions {
    fn creation_options(&self) -> Result<Vec<String>> {
        match &self.compression {
            Some(c) => {
                validate_compression(c)?;
                Ok(vec![format!("COMPRESS={}", c)])
            }
            None => Ok(Vec::new()),
        }
    }
}

/// Validate compression type
pub fn validate_compression(compression: &str) -> Result<()> {
    let valid_types = ["DEFLATE", "LZW", "ZSTD", "NONE"];
    if !valid_types.contains(&compression) {
        return Err(SurfaceError::InvalidCompression(compression.to_string()));
    }
    Ok(())
}

/// Read the geometry of a reference raster without loading pixel data
pub fn read_reference_geometry(path: impl AsRef<Path>) -> Result<RasterGeometry> {
    let path = path.as_ref();
    info!("Opening reference raster: {}", path.display());
    let dataset = Dataset::open(path)?;

    let rasterband: RasterBand = dataset.rasterband(1)?;
    let width = rasterband.x_size() as usize;
    let height = rasterband.y_size() as usize;

    if width == 0 || height == 0 {
        return Err(SurfaceError::InvalidDimensions(width, height));
    }

    let geotransform = dataset.geo_transform()?;
    let projection = dataset.projection();
    let srid = srid_from_wkt(&projection);

    let profile = RasterProfile {
        data_type: rasterband.band_type().name(),
        band_count: dataset.raster_count() as usize,
        nodata: rasterband.no_data_value(),
    };

    debug!("Reference dimensions: {}x{}", width, height);
    debug!("Reference geotransform: {:?}", geotransform);
    debug!("Reference profile: {:?}, SRID {:?}", profile, srid);

    Ok(RasterGeometry {
        width,
        height,
        geotransform,
        projection,
        srid,
        profile,
    })
}

/// Normalized surfaces live in [0, 1], so such a nodata value can mask real cells
fn nodata_in_unit_range(nodata: f64) -> bool {
    (0.0..=1.0).contains(&nodata)
}

/// Write the surface as a single-band GeoTIFF aligned with `geometry`
pub fn write_surface(
    path: impl AsRef<Path>,
    geometry: &RasterGeometry,
    grid: &SurfaceGrid,
    options: &WriteOptions,
) -> Result<()> {
    let path = path.as_ref();
    geometry.check_grid(grid)?;
    let creation_options = options.creation_options()?;

    if let Some(nodata) = geometry.profile.nodata.filter(|&v| nodata_in_unit_range(v)) {
        warn!(
            "Reference nodata {} lies inside [0, 1]; matching surface cells will read as nodata",
            nodata
        );
    }

    info!(
        "Writing {:?} surface to {} ({}x{})",
        options.pixel_type,
        path.display(),
        geometry.width,
        geometry.height
    );

    let written = match options.pixel_type {
        PixelType::Float32 => {
            let data: Vec<f32> = grid.iter().map(|&v| v as f32).collect();
            write_band(path, geometry, data, &creation_options)
        }
        PixelType::Float64 => {
            let data: Vec<f64> = grid.iter().copied().collect();
            write_band(path, geometry, data, &creation_options)
        }
    };

    written.map_err(|source| SurfaceError::RasterWrite {
        path: path.to_path_buf(),
        source,
    })?;

    info!("Successfully wrote {}", path.display());
    Ok(())
}

fn write_band<T: GdalType + Copy>(
    path: &Path,
    geometry: &RasterGeometry,
    data: Vec<T>,
    options: &[String],
) -> gdal::errors::Result<()> {
    let driver = DriverManager::get_driver_by_name("GTiff")?;

    let mut dataset = if options.is_empty() {
        driver.create_with_band_type::<T, _>(path, geometry.width, geometry.height, 1)?
    } else {
        let mut gdal_options = CslStringList::new();
        for opt in options {
            gdal_options.add_string(opt)?;
        }
        driver.create_with_band_type_with_options::<T, _>(
            path,
            geometry.width,
            geometry.height,
            1,
            &gdal_options,
        )?
    };

    dataset.set_geo_transform(&geometry.geotransform)?;
    if !geometry.projection.is_empty() {
        dataset.set_projection(&geometry.projection)?;
    }

    let mut band = dataset.rasterband(1)?;
    // ndarray and GDAL both use row-major order
    let mut buffer = Buffer::new((geometry.width, geometry.height), data);
    band.write((0, 0), (geometry.width, geometry.height), &mut buffer)?;

    if let Some(nodata) = geometry.profile.nodata {
        band.set_no_data_value(Some(nodata))?;
    }

    Ok(())
}
