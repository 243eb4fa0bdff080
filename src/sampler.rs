use crate::geometry::{QueryGrid, RasterGeometry};
use log::debug;

/// Compute the pixel-center coordinate of every cell, row-major
pub fn sample(geometry: &RasterGeometry) -> QueryGrid {
    let (width, height) = (geometry.width, geometry.height);
    debug!("Sampling {}x{} pixel centers", width, height);

    let coords: Vec<(f64, f64)> = (0..height)
        .flat_map(|row| (0..width).map(move |col| geometry.pixel_center(row, col)))
        .collect();

    QueryGrid {
        width,
        height,
        coords,
    }
}
