use crate::error::{Result, SurfaceError};
use crate::models::{Expiry, VolatilitySurface};
use crate::utils::triangulation::Triangle;
use crate::utils::viewer::show_surface_window;
use egui::ColorImage;
use plotters::backend::{BitMapBackend, SVGBackend};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Only every n-th expiry date is written on the expiry axis
pub const EXPIRY_LABEL_STRIDE: usize = 3;

pub const PLOT_WIDTH: u32 = 1200;
pub const PLOT_HEIGHT: u32 = 900;

fn plot_err<E: std::fmt::Display>(e: E) -> SurfaceError {
    SurfaceError::PlotError(e.to_string())
}

/// `(expiry index, label)` for every `stride`-th expiry, starting at 0
pub fn expiry_tick_labels(expiries: &[Expiry], stride: usize) -> Vec<(usize, String)> {
    expiries
        .iter()
        .enumerate()
        .step_by(stride.max(1))
        .map(|(i, e)| (i, e.label()))
        .collect()
}

pub fn volatility_axis_label(log_scale: bool) -> &'static str {
    if log_scale {
        "Log Implied Volatility"
    } else {
        "Implied Volatility"
    }
}

/// Min/max of `values` widened by `pad` of the range on each side. A flat
/// range is widened by 5% of its magnitude instead.
fn padded_range(values: impl Iterator<Item = f64>, pad: f64) -> (f64, f64) {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }

    let range = max - min;
    if range > 0.0 {
        (min - pad * range, max + pad * range)
    } else {
        let widen = if min != 0.0 { 0.05 * min.abs() } else { 0.05 };
        (min - widen, max + widen)
    }
}

/// Axis ranges `(strike, volatility)` covering every sample
pub fn axis_ranges(surface: &VolatilitySurface) -> ((f64, f64), (f64, f64)) {
    let strikes = padded_range(surface.strikes().iter().copied(), 0.05);
    let vols = padded_range(surface.volatilities().iter().copied(), 0.1);
    (strikes, vols)
}

fn draw_surface<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    surface: &VolatilitySurface,
    mesh: &[Triangle],
) -> Result<()> {
    let (width, height) = root.dim_in_pixel();
    root.fill(&WHITE).map_err(plot_err)?;

    let ((strike_min, strike_max), (vol_min, vol_max)) = axis_ranges(surface);
    let n_expiries = surface.expiries().len().max(1);
    let x_max = (n_expiries as i32 - 1).max(1);

    let mut chart = ChartBuilder::on(root)
        .caption(
            format!(
                "{} {} Implied Volatility Surface",
                surface.symbol(),
                surface.option_type()
            ),
            ("sans-serif", 30).into_font(),
        )
        .margin(20)
        .margin_right(160)
        .build_cartesian_3d(0..x_max, vol_min..vol_max, strike_min..strike_max)
        .map_err(plot_err)?;

    chart.with_projection(|mut pb| {
        pb.yaw = 0.7;
        pb.pitch = 0.3;
        pb.scale = 0.85;
        pb.into_matrix()
    });

    let tick_labels: HashMap<i32, String> =
        expiry_tick_labels(surface.expiries(), EXPIRY_LABEL_STRIDE)
            .into_iter()
            .map(|(i, label)| (i as i32, label))
            .collect();
    let expiry_formatter = |idx: &i32| tick_labels.get(idx).cloned().unwrap_or_default();
    let vol_formatter = |v: &f64| format!("{:.2}", v);
    let strike_formatter = |k: &f64| format!("{:.0}", k);

    chart
        .configure_axes()
        .light_grid_style(BLACK.mix(0.15))
        .max_light_lines(3)
        .x_labels(n_expiries)
        .x_formatter(&expiry_formatter)
        .y_formatter(&vol_formatter)
        .z_formatter(&strike_formatter)
        .label_style(("sans-serif", 12))
        .draw()
        .map_err(plot_err)?;

    let color_gradient = colorous::VIRIDIS;
    let vol_span = (vol_max - vol_min).max(f64::EPSILON);

    chart
        .draw_series(mesh.iter().map(|tri| {
            let normalized_vol = ((tri.mean_volatility() - vol_min) / vol_span).clamp(0.0, 1.0);
            let color = color_gradient.eval_continuous(normalized_vol);
            let points: Vec<(i32, f64, f64)> = tri
                .vertices
                .iter()
                .map(|v| (v.expiry_index as i32, v.volatility, v.strike))
                .collect();
            Polygon::new(points, RGBColor(color.r, color.g, color.b).mix(0.85).filled())
        }))
        .map_err(plot_err)?;

    chart
        .draw_series(surface.samples().map(|s| {
            Circle::new(
                (s.expiry_index as i32, s.volatility, s.strike),
                2,
                BLACK.mix(0.6).filled(),
            )
        }))
        .map_err(plot_err)?;

    // Colour bar along the right edge
    let color_bar_width = 20;
    let color_bar_height = (height as i32 / 2).max(1);
    let color_bar_x = width as i32 - 110;
    let color_bar_y = height as i32 / 4;

    for i in 0..color_bar_height {
        let normalized_pos = 1.0 - (i as f64 / color_bar_height as f64);
        let color = color_gradient.eval_continuous(normalized_pos);
        root.draw(&Rectangle::new(
            [
                (color_bar_x, color_bar_y + i),
                (color_bar_x + color_bar_width, color_bar_y + i + 1),
            ],
            RGBColor(color.r, color.g, color.b).filled(),
        ))
        .map_err(plot_err)?;
    }

    let small = TextStyle::from(("sans-serif", 12)).color(&BLACK);
    root.draw_text(
        &format!("{:.2}", vol_max),
        &small,
        (color_bar_x + color_bar_width + 5, color_bar_y),
    )
    .map_err(plot_err)?;
    root.draw_text(
        &format!("{:.2}", vol_min),
        &small,
        (color_bar_x + color_bar_width + 5, color_bar_y + color_bar_height),
    )
    .map_err(plot_err)?;
    root.draw_text(
        if surface.log_scale() { "log IV" } else { "IV" },
        &small,
        (color_bar_x, color_bar_y - 20),
    )
    .map_err(plot_err)?;

    // 3D axes carry no titles of their own
    root.draw_text(
        &format!(
            "x: Expiry Dates    y: {}    z: Strike Prices",
            volatility_axis_label(surface.log_scale())
        ),
        &TextStyle::from(("sans-serif", 16)).color(&BLACK),
        (20, height as i32 - 50),
    )
    .map_err(plot_err)?;

    root.draw_text(
        &format!(
            "Generated: {}",
            surface.timestamp().format("%Y-%m-%d %H:%M:%S UTC")
        ),
        &TextStyle::from(("sans-serif", 15)).color(&BLACK),
        (20, height as i32 - 25),
    )
    .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

/// Render the surface into an RGB8 buffer of `PLOT_WIDTH x PLOT_HEIGHT`
fn render_rgb(surface: &VolatilitySurface, mesh: &[Triangle]) -> Result<Vec<u8>> {
    if surface.is_empty() {
        return Err(SurfaceError::EmptySurface);
    }

    let mut buffer = vec![0u8; (PLOT_WIDTH * PLOT_HEIGHT * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (PLOT_WIDTH, PLOT_HEIGHT))
            .into_drawing_area();
        draw_surface(&root, surface, mesh)?;
    }
    Ok(buffer)
}

pub fn plot_volatility_surface_in_memory(
    surface: &VolatilitySurface,
    mesh: &[Triangle],
) -> Result<ColorImage> {
    let buffer = render_rgb(surface, mesh)?;
    Ok(ColorImage::from_rgb(
        [PLOT_WIDTH as usize, PLOT_HEIGHT as usize],
        &buffer,
    ))
}

/// Write the figure to `output_path`.
///
/// `.svg` goes through the SVG backend; any other extension is rendered to a
/// bitmap and encoded by the `image` crate in the format the extension names.
pub fn save_volatility_surface<P: AsRef<Path>>(
    surface: &VolatilitySurface,
    mesh: &[Triangle],
    output_path: P,
) -> Result<()> {
    let output_path = output_path.as_ref();
    if surface.is_empty() {
        return Err(SurfaceError::EmptySurface);
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let is_svg = output_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("svg"))
        .unwrap_or(false);

    if is_svg {
        let root = SVGBackend::new(output_path, (PLOT_WIDTH, PLOT_HEIGHT)).into_drawing_area();
        draw_surface(&root, surface, mesh)?;
    } else {
        // Fail on an unknown extension before spending time rendering
        image::ImageFormat::from_path(output_path)?;
        let buffer = render_rgb(surface, mesh)?;
        image::save_buffer(
            output_path,
            &buffer,
            PLOT_WIDTH,
            PLOT_HEIGHT,
            image::ColorType::Rgb8,
        )?;
    }

    debug!("Wrote {} triangles to {:?}", mesh.len(), output_path);
    Ok(())
}

/// Render the surface, save it if `save_path` is given, then optionally open
/// it in a window. Saving always happens before the window opens.
pub fn plot_volatility_surface(
    surface: &VolatilitySurface,
    mesh: &[Triangle],
    save_path: Option<&Path>,
    show: bool,
) -> Result<()> {
    if surface.is_empty() {
        return Err(SurfaceError::EmptySurface);
    }

    if let Some(path) = save_path {
        save_volatility_surface(surface, mesh, path)?;
        info!("Volatility surface saved to {:?}", path);
    }

    if show {
        let image = plot_volatility_surface_in_memory(surface, mesh)?;
        let title = format!(
            "{} {} Volatility Surface",
            surface.symbol(),
            surface.option_type()
        );
        show_surface_window(&title, &surface.summary(), image)?;
    }

    Ok(())
}
