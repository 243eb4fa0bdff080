use crate::error::{Result, SurfaceError};
use gdal::spatial_ref::SpatialRef;
use log::{debug, info, warn};

/// EPSG code of a projection WKT, if it carries one
pub fn srid_from_wkt(projection_wkt: &str) -> Option<u32> {
    if projection_wkt.trim().is_empty() {
        debug!("Empty projection WKT, no SRID");
        return None;
    }

    let spatial_ref = match SpatialRef::from_wkt(projection_wkt) {
        Ok(sr) => sr,
        Err(e) => {
            warn!("Failed to parse projection WKT: {}", e);
            return None;
        }
    };

    match spatial_ref.auth_code() {
        Ok(code) if code > 0 => Some(code as u32),
        Ok(_) | Err(_) => {
            warn!("Projection has no EPSG authority code");
            None
        }
    }
}

/// Decide which SRID the raster is tagged with on import.
///
/// A requested SRID that disagrees with the raster's own reference would
/// mislabel every pixel, so it is refused unless `force` is set.
pub fn resolve_import_srid(
    raster_srid: Option<u32>,
    requested: Option<u32>,
    force: bool,
) -> Result<u32> {
    match (raster_srid, requested) {
        (Some(raster), None) => {
            info!("Importing with the raster's own SRID {}", raster);
            Ok(raster)
        }
        (Some(raster), Some(req)) if raster == req => Ok(req),
        (Some(raster), Some(req)) => {
            if force {
                warn!(
                    "Raster is written in EPSG:{} but will be tagged as SRID {} on import",
                    raster, req
                );
                Ok(req)
            } else {
                Err(SurfaceError::SridMismatch {
                    raster,
                    requested: req,
                })
            }
        }
        (None, Some(req)) => {
            warn!(
                "Raster SRID unknown, trusting requested SRID {} without a check",
                req
            );
            Ok(req)
        }
        (None, None) => Err(SurfaceError::UnknownSrid),
    }
}
