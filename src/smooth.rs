use crate::error::{Result, SurfaceError};
use crate::geometry::SurfaceGrid;
use log::{debug, info};
use ndarray::Array2;
use rayon::prelude::*;

/// Kernel half-width in standard deviations
const TRUNCATE: f64 = 4.0;

/// Largest kernel half-width accepted, in cells
pub const MAX_KERNEL_RADIUS: usize = 4096;

fn kernel_radius(sigma: f64) -> f64 {
    (TRUNCATE * sigma + 0.5).floor()
}

/// Reject sigma values that are not positive or need an oversized kernel
pub fn validate_sigma(sigma: f64) -> Result<()> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(SurfaceError::InvalidParameter(format!(
            "sigma must be a finite value > 0, got {}",
            sigma
        )));
    }
    if kernel_radius(sigma) > MAX_KERNEL_RADIUS as f64 {
        return Err(SurfaceError::InvalidParameter(format!(
            "sigma {} needs a kernel radius above {} cells",
            sigma, MAX_KERNEL_RADIUS
        )));
    }
    Ok(())
}

/// Normalized 1-D Gaussian weights for offsets -radius..=radius.
///
/// `sigma` must have passed `validate_sigma`.
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = kernel_radius(sigma) as usize;
    if radius == 0 {
        return vec![1.0];
    }
    let weights: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-0.5 * x * x / (sigma * sigma)).exp()
        })
        .collect();

    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Mirror an out-of-range index back into [0, len): `d c b a | a b c d`
fn reflect(index: isize, len: usize) -> usize {
    let period = 2 * len as isize;
    let m = index.rem_euclid(period);
    if m < len as isize {
        m as usize
    } else {
        (period - 1 - m) as usize
    }
}

/// Convolve `line` with `kernel` using reflective edges
fn convolve_line(line: &[f64], kernel: &[f64]) -> Vec<f64> {
    let radius = (kernel.len() / 2) as isize;
    let len = line.len();

    (0..len as isize)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .map(|(j, w)| w * line[reflect(i + j as isize - radius, len)])
                .sum()
        })
        .collect()
}

/// Apply a 2-D Gaussian low-pass filter with equal sigma on both axes.
///
/// Separable: rows first, then columns. Borders are handled by reflection,
/// so edge pixels see their own neighborhood mirrored.
pub fn smooth(grid: &SurfaceGrid, sigma: f64) -> Result<SurfaceGrid> {
    validate_sigma(sigma)?;

    let (nrows, ncols) = grid.dim();
    if nrows == 0 || ncols == 0 {
        return Ok(grid.clone());
    }

    let kernel = gaussian_kernel(sigma);
    info!(
        "Gaussian smoothing (sigma={}, kernel={} taps)",
        sigma,
        kernel.len()
    );

    // Horizontal pass over rows in parallel
    let rows: Vec<Vec<f64>> = (0..nrows)
        .into_par_iter()
        .map(|row| {
            let line: Vec<f64> = grid.row(row).to_vec();
            convolve_line(&line, &kernel)
        })
        .collect();
    let horizontal = Array2::from_shape_vec((nrows, ncols), rows.into_iter().flatten().collect())?;

    // Vertical pass over columns in parallel
    let cols: Vec<Vec<f64>> = (0..ncols)
        .into_par_iter()
        .map(|col| {
            let line: Vec<f64> = horizontal.column(col).to_vec();
            convolve_line(&line, &kernel)
        })
        .collect();

    debug!("Reassembling {}x{} smoothed grid", nrows, ncols);
    let smoothed = Array2::from_shape_fn((nrows, ncols), |(r, c)| cols[c][r]);

    Ok(smoothed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_kernel_sums_to_one() {
        for sigma in [0.3, 1.0, 3.0] {
            let kernel = gaussian_kernel(sigma);
            let total: f64 = kernel.iter().sum();
            assert!((total - 1.0).abs() < 1e-12);
            assert_eq!(kernel.len() % 2, 1);
        }
        // radius = floor(4 * 3 + 0.5) = 12
        assert_eq!(gaussian_kernel(3.0).len(), 25);
    }

    #[test]
    fn test_reflect() {
        assert_eq!(reflect(-1, 4), 0);
        assert_eq!(reflect(-2, 4), 1);
        assert_eq!(reflect(4, 4), 3);
        assert_eq!(reflect(5, 4), 2);
        assert_eq!(reflect(9, 4), 1);
        assert_eq!(reflect(-7, 1), 0);
    }

    #[test]
    fn test_preserves_dimensions() {
        let grid = Array2::from_shape_fn((5, 7), |(r, c)| (r * 7 + c) as f64);
        let out = smooth(&grid, 1.5).unwrap();
        assert_eq!(out.dim(), (5, 7));
    }

    #[test]
    fn test_constant_grid_unchanged() {
        let grid = Array2::from_elem((6, 4), 0.25);
        let out = smooth(&grid, 3.0).unwrap();
        for &v in out.iter() {
            assert!((v - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn test_tiny_sigma_is_identity() {
        let grid = arr2(&[[0.0, 0.5], [0.5, 1.0]]);
        let out = smooth(&grid, 1e-3).unwrap();
        for (a, b) in out.iter().zip(grid.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_small_sigma_close_but_not_identical() {
        let grid = arr2(&[[0.0, 0.5], [0.5, 1.0]]);
        let out = smooth(&grid, 0.5).unwrap();
        let mut any_changed = false;
        for (a, b) in out.iter().zip(grid.iter()) {
            assert!((a - b).abs() < 0.3);
            if (a - b).abs() > 1e-6 {
                any_changed = true;
            }
        }
        assert!(any_changed);
    }

    #[test]
    fn test_mass_preserved_with_reflection() {
        // Reflective borders keep a symmetric spike's mean unchanged along a line
        let line = vec![0.0, 0.0, 1.0, 0.0, 0.0];
        let out = convolve_line(&line, &gaussian_kernel(0.8));
        let total: f64 = out.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(out[2] > out[1] && out[1] > out[0]);
    }

    #[test]
    fn test_invalid_sigma() {
        let grid = Array2::zeros((2, 2));
        assert!(smooth(&grid, 0.0).is_err());
        assert!(smooth(&grid, -1.0).is_err());
        assert!(smooth(&grid, f64::NAN).is_err());
    }

    #[test]
    fn test_oversized_sigma_rejected() {
        let grid = Array2::zeros((2, 2));
        for sigma in [1e7, 1e19, f64::MAX] {
            assert!(matches!(
                smooth(&grid, sigma),
                Err(SurfaceError::InvalidParameter(_))
            ));
        }
        // radius = floor(4 * 1024 + 0.5) = 4096, the largest accepted
        assert!(smooth(&grid, 1024.0).is_ok());
        assert!(smooth(&grid, 1024.2).is_err());
    }

    #[test]
    fn test_underflowing_sigma_is_identity() {
        let grid = arr2(&[[0.0, 0.5], [0.5, 1.0]]);
        let out = smooth(&grid, 1e-200).unwrap();
        assert_eq!(out, grid);
    }
}
