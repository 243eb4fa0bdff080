use crate::error::{Result, SurfaceError};
use clap::ValueEnum;
use log::{debug, warn};

/// What to do when every estimate is identical and min-max has no range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DegeneratePolicy {
    /// Emit an all-zero surface (what a min-max scaler does with zero range)
    #[default]
    ZeroFill,
    /// Abort with `DegenerateRange`
    Fail,
}

/// Ranges at or below this many ulps of the data magnitude count as zero
const DEGENERATE_ULPS: f64 = 10.0;

/// True when `max - min` is rounding noise rather than real spread
fn is_degenerate(min: f64, max: f64) -> bool {
    let scale = min.abs().max(max.abs()).max(1.0);
    max - min <= DEGENERATE_ULPS * f64::EPSILON * scale
}

/// Linear min-max rescale into [0, 1]
pub fn normalize(values: &[f64], policy: DegeneratePolicy) -> Result<Vec<f64>> {
    if values.is_empty() {
        return Ok(Vec::new());
    }

    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    if is_degenerate(min, max) {
        return match policy {
            DegeneratePolicy::ZeroFill => {
                warn!(
                    "All {} estimates equal {}; writing an all-zero surface",
                    values.len(),
                    min
                );
                Ok(vec![0.0; values.len()])
            }
            DegeneratePolicy::Fail => Err(SurfaceError::DegenerateRange(min)),
        };
    }

    let range = max - min;
    debug!("Normalizing range [{}, {}]", min, max);
    Ok(values.iter().map(|&v| (v - min) / range).collect())
}
