//! Figure-of-merit history and device shape plots.

use std::path::Path;

use plotters::prelude::*;
use yb_geometry::{Point, Polygon};
use yb_types::{to_um, ArtifactError};

const SIZE: (u32, u32) = (900, 600);

fn plot_error<E: std::fmt::Display>(e: E) -> ArtifactError {
    ArtifactError::Plot {
        message: e.to_string(),
    }
}

/// Render `(iteration, fom)` points as a PNG line chart.
pub fn plot_fom_history(points: &[(u64, f64)], path: &Path, title: &str) -> Result<(), ArtifactError> {
    if points.is_empty() {
        return Err(ArtifactError::Plot {
            message: "no iterations to plot".into(),
        });
    }

    let first = points.iter().map(|p| p.0).min().unwrap_or(0);
    let last = points.iter().map(|p| p.0).max().unwrap_or(1).max(first + 1);
    let (lo, hi) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.1), hi.max(p.1)));
    let pad = ((hi - lo) * 0.1).max(1e-3);

    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 22))
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(first as f64..last as f64, (lo - pad)..(hi + pad))
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_desc("iteration")
        .y_desc("figure of merit")
        .draw()
        .map_err(plot_error)?;

    let series = points.iter().map(|&(i, fom)| (i as f64, fom));
    chart
        .draw_series(LineSeries::new(series.clone(), &BLUE))
        .map_err(plot_error)?;
    chart
        .draw_series(series.map(|p| Circle::new(p, 3, BLUE.filled())))
        .map_err(plot_error)?;

    root.present().map_err(plot_error)?;
    Ok(())
}

/// Render the device outline in μm with its spline control points on top.
/// Control points of the upper half are mirrored below the axis.
pub fn plot_shape(
    polygon: &Polygon,
    control_points: &[Point],
    path: &Path,
    title: &str,
) -> Result<(), ArtifactError> {
    let bbox = polygon.bounding_box().ok_or_else(|| ArtifactError::Plot {
        message: "empty outline".into(),
    })?;
    let pad = 0.05 * to_um(bbox.width().max(bbox.height()));
    let x_range = (to_um(bbox.min.x) - pad)..(to_um(bbox.max.x) + pad);
    let y_range = (to_um(bbox.min.y) - pad)..(to_um(bbox.max.y) + pad);

    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 22))
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_desc("x (um)")
        .y_desc("y (um)")
        .draw()
        .map_err(plot_error)?;

    let outline: Vec<(f64, f64)> = polygon
        .vertices()
        .iter()
        .map(|p| (to_um(p.x), to_um(p.y)))
        .collect();
    chart
        .draw_series(std::iter::once(plotters::element::Polygon::new(
            outline.clone(),
            BLUE.mix(0.25).filled(),
        )))
        .map_err(plot_error)?;
    let closed = outline.iter().chain(outline.first()).copied();
    chart
        .draw_series(LineSeries::new(closed, &BLUE))
        .map_err(plot_error)?;

    let knots = control_points
        .iter()
        .flat_map(|p| [(to_um(p.x), to_um(p.y)), (to_um(p.x), -to_um(p.y))]);
    chart
        .draw_series(knots.map(|p| Circle::new(p, 4, RED.filled())))
        .map_err(plot_error)?;

    root.present().map_err(plot_error)?;
    Ok(())
}
