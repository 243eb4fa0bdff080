use crate::config::SurfaceConfig;
use crate::error::Result;
use crate::geometry::{ObservationPoint, QueryGrid, RasterGeometry, SurfaceGrid};
use crate::io::{write_surface, WriteOptions};
use crate::{idw, normalize, sampler, smooth};
use log::info;
use ndarray::Array2;
use std::path::Path;

/// Interpolation pipeline bound to one reference geometry.
///
/// Stages run strictly in order: IDW, min-max normalize, Gaussian smooth.
/// Normalizing before smoothing is deliberate; the smoothed surface is not
/// re-clamped.
#[derive(Debug, Clone)]
pub struct SurfacePipeline {
    geometry: RasterGeometry,
    config: SurfaceConfig,
    queries: QueryGrid,
}

impl SurfacePipeline {
    pub fn new(geometry: RasterGeometry, config: SurfaceConfig) -> Result<Self> {
        config.validate()?;
        let queries = sampler::sample(&geometry);
        geometry.check_cells(queries.len())?;

        Ok(Self {
            geometry,
            config,
            queries,
        })
    }

    pub fn geometry(&self) -> &RasterGeometry {
        &self.geometry
    }

    pub fn queries(&self) -> &QueryGrid {
        &self.queries
    }

    /// Raw IDW estimates, row-major
    pub fn estimate(&self, points: &[ObservationPoint]) -> Result<Vec<f64>> {
        idw::interpolate(points, &self.queries, self.config.idw_params())
    }

    /// Estimate, normalize and smooth into the final surface
    pub fn run(&self, points: &[ObservationPoint]) -> Result<SurfaceGrid> {
        let estimates = self.estimate(points)?;
        self.geometry.check_cells(estimates.len())?;

        let normalized = normalize::normalize(&estimates, self.config.degenerate)?;
        self.geometry.check_cells(normalized.len())?;

        let grid = Array2::from_shape_vec((self.geometry.height, self.geometry.width), normalized)?;
        let smoothed = smooth::smooth(&grid, self.config.sigma)?;
        self.geometry.check_grid(&smoothed)?;

        let (lo, hi) = smoothed
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        info!("Surface range after smoothing: [{:.4}, {:.4}]", lo, hi);

        Ok(smoothed)
    }

    /// Run the pipeline and write the surface next to the reference geometry
    pub fn run_to_file(
        &self,
        points: &[ObservationPoint],
        path: impl AsRef<Path>,
        options: &WriteOptions,
    ) -> Result<SurfaceGrid> {
        let surface = self.run(points)?;
        write_surface(path, &self.geometry, &surface, options)?;
        Ok(surface)
    }
}
