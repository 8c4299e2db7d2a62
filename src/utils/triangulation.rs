//! Triangle meshes for trisurface rendering

use crate::error::Result;
use crate::models::{interpolate_grid, GridSurface, SurfaceSample, VolatilitySurface};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub vertices: [SurfaceSample; 3],
}

impl Triangle {
    pub fn new(a: SurfaceSample, b: SurfaceSample, c: SurfaceSample) -> Self {
        Self { vertices: [a, b, c] }
    }

    /// Mean volatility of the three corners, used for colouring
    pub fn mean_volatility(&self) -> f64 {
        self.vertices.iter().map(|v| v.volatility).sum::<f64>() / 3.0
    }

    fn is_finite(&self) -> bool {
        self.vertices
            .iter()
            .all(|v| v.strike.is_finite() && v.volatility.is_finite())
    }
}

/// Mesh the scattered samples by stitching each contributing expiry slice to
/// the next one.
///
/// Two slices with `a` and `b` points give `a + b - 2` triangles. A surface
/// with a single contributing expiry has no mesh.
pub fn triangulate_samples(surface: &VolatilitySurface) -> Vec<Triangle> {
    let slices: Vec<Vec<SurfaceSample>> = surface
        .contributing_indices()
        .into_iter()
        .map(|index| {
            let mut slice: Vec<SurfaceSample> = surface
                .slice(index)
                .into_iter()
                .filter(|s| s.strike.is_finite() && s.volatility.is_finite())
                .collect();
            slice.sort_by(|a, b| a.strike.total_cmp(&b.strike));
            slice
        })
        .filter(|slice| !slice.is_empty())
        .collect();

    let mut triangles = Vec::new();
    for pair in slices.windows(2) {
        stitch(&pair[0], &pair[1], &mut triangles);
    }
    triangles
}

/// Zipper two strike-sorted slices together, always advancing along the side
/// whose next strike is lower
fn stitch(a: &[SurfaceSample], b: &[SurfaceSample], out: &mut Vec<Triangle>) {
    let (mut i, mut j) = (0, 0);
    while i + 1 < a.len() || j + 1 < b.len() {
        let advance_a = if i + 1 >= a.len() {
            false
        } else if j + 1 >= b.len() {
            true
        } else {
            a[i + 1].strike <= b[j + 1].strike
        };

        if advance_a {
            out.push(Triangle::new(a[i], a[i + 1], b[j]));
            i += 1;
        } else {
            out.push(Triangle::new(a[i], b[j], b[j + 1]));
            j += 1;
        }
    }
}

/// Two triangles per grid cell; triangles touching a `NaN` cell are dropped
pub fn triangulate_grid(grid: &GridSurface) -> Vec<Triangle> {
    let (rows, cols) = grid.shape();
    let mut triangles = Vec::new();
    if rows < 2 || cols < 2 {
        return triangles;
    }

    for r in 0..rows - 1 {
        for c in 0..cols - 1 {
            let p00 = grid.sample(r, c);
            let p01 = grid.sample(r, c + 1);
            let p10 = grid.sample(r + 1, c);
            let p11 = grid.sample(r + 1, c + 1);

            for tri in [Triangle::new(p00, p10, p01), Triangle::new(p11, p01, p10)] {
                if tri.is_finite() {
                    triangles.push(tri);
                }
            }
        }
    }
    triangles
}

/// Mesh for rendering: straight from the samples, or from a regular grid of
/// `grid_strikes` strikes when one is requested
pub fn build_mesh(surface: &VolatilitySurface, grid_strikes: Option<usize>) -> Result<Vec<Triangle>> {
    let mesh = match grid_strikes {
        Some(points) => {
            let grid = interpolate_grid(surface, points)?;
            debug!(
                "Interpolated {} of {} grid cells",
                grid.filled(),
                grid.values.len()
            );
            triangulate_grid(&grid)
        }
        None => triangulate_samples(surface),
    };
    debug!("Surface mesh has {} triangles", mesh.len());
    Ok(mesh)
}
