//! Regularisation of scattered surface samples onto a strike grid

use crate::error::{Result, SurfaceError};
use crate::models::volatility::{SurfaceSample, VolatilitySurface};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Volatilities on a regular (expiry index x strike) grid.
///
/// Cells that cannot be interpolated hold `NaN`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSurface {
    /// One row per expiry index, consecutive
    pub expiry_indices: Vec<usize>,
    /// Uniformly spaced strikes
    pub strikes: Vec<f64>,
    /// Values (2D array: expiry rows x strikes)
    pub values: Array2<f64>,
    pub log_scale: bool,
}

impl GridSurface {
    pub fn shape(&self) -> (usize, usize) {
        (self.expiry_indices.len(), self.strikes.len())
    }

    /// Grid cell as a surface sample
    pub fn sample(&self, row: usize, col: usize) -> SurfaceSample {
        SurfaceSample {
            expiry_index: self.expiry_indices[row],
            strike: self.strikes[col],
            volatility: self.values[[row, col]],
        }
    }

    /// Number of cells holding a value
    pub fn filled(&self) -> usize {
        self.values.iter().filter(|v| !v.is_nan()).count()
    }
}

/// Interpolate a scattered surface onto `strike_points` uniformly spaced strikes.
///
/// Each contributing expiry is interpolated linearly along strike within its own
/// strike range. Expiries skipped during assembly are filled linearly from the
/// nearest contributing expiries on either side.
pub fn interpolate_grid(surface: &VolatilitySurface, strike_points: usize) -> Result<GridSurface> {
    if strike_points < 2 {
        return Err(SurfaceError::VolatilityError(format!(
            "Grid needs at least 2 strikes, got {}",
            strike_points
        )));
    }
    if surface.is_empty() {
        return Err(SurfaceError::EmptySurface);
    }

    let slices = sorted_slices(surface);

    let min_strike = surface.strikes().iter().copied().fold(f64::INFINITY, f64::min);
    let max_strike = surface
        .strikes()
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    if !(max_strike > min_strike) {
        return Err(SurfaceError::VolatilityError(
            "Cannot build a strike grid from a single strike".to_string(),
        ));
    }

    let step = (max_strike - min_strike) / (strike_points - 1) as f64;
    let strikes: Vec<f64> = (0..strike_points)
        .map(|j| {
            if j == strike_points - 1 {
                max_strike
            } else {
                min_strike + step * j as f64
            }
        })
        .collect();

    // slices is non-empty because the surface is
    let first = *slices.keys().next().unwrap_or(&0);
    let last = *slices.keys().next_back().unwrap_or(&0);
    let expiry_indices: Vec<usize> = (first..=last).collect();

    let mut values = Array2::from_elem((expiry_indices.len(), strike_points), f64::NAN);

    for (row, &index) in expiry_indices.iter().enumerate() {
        if let Some(points) = slices.get(&index) {
            for (col, &strike) in strikes.iter().enumerate() {
                values[[row, col]] = interpolate_linear(points, strike);
            }
            continue;
        }

        let (lower, lower_points) = match slices.range(..index).next_back() {
            Some((&i, p)) => (i, p),
            None => continue,
        };
        let (upper, upper_points) = match slices.range(index + 1..).next() {
            Some((&i, p)) => (i, p),
            None => continue,
        };
        let weight = (index - lower) as f64 / (upper - lower) as f64;
        for (col, &strike) in strikes.iter().enumerate() {
            let below = interpolate_linear(lower_points, strike);
            let above = interpolate_linear(upper_points, strike);
            values[[row, col]] = (1.0 - weight) * below + weight * above;
        }
    }

    Ok(GridSurface {
        expiry_indices,
        strikes,
        values,
        log_scale: surface.log_scale(),
    })
}

/// (strike, volatility) points per expiry index, sorted by strike with
/// duplicate strikes averaged
fn sorted_slices(surface: &VolatilitySurface) -> BTreeMap<usize, Vec<(f64, f64)>> {
    let mut raw: BTreeMap<usize, Vec<(f64, f64)>> = BTreeMap::new();
    for sample in surface.samples() {
        raw.entry(sample.expiry_index)
            .or_default()
            .push((sample.strike, sample.volatility));
    }

    raw.into_iter()
        .map(|(index, mut points)| {
            points.sort_by(|a, b| a.0.total_cmp(&b.0));
            let mut merged: Vec<(f64, f64, usize)> = Vec::with_capacity(points.len());
            for (strike, vol) in points {
                match merged.last_mut() {
                    Some(last) if last.0 == strike => {
                        last.1 += vol;
                        last.2 += 1;
                    }
                    _ => merged.push((strike, vol, 1)),
                }
            }
            let points = merged
                .into_iter()
                .map(|(strike, sum, n)| (strike, sum / n as f64))
                .collect();
            (index, points)
        })
        .collect()
}

/// Piecewise-linear value at `x`; `NaN` outside the points' range
fn interpolate_linear(points: &[(f64, f64)], x: f64) -> f64 {
    let (first, last) = match (points.first(), points.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => return f64::NAN,
    };
    if x < first.0 || x > last.0 {
        return f64::NAN;
    }

    // First point with strike >= x
    let upper = points.partition_point(|p| p.0 < x);
    let (x1, y1) = points[upper];
    if x1 == x || upper == 0 {
        return y1;
    }
    let (x0, y0) = points[upper - 1];
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}
