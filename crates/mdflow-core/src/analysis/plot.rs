use super::AnalysisError;
use plotters::prelude::*;
use std::path::Path;

const PLOT_SIZE: (u32, u32) = (1024, 768);
const SERIES_COLORS: [RGBColor; 3] = [BLUE, RED, GREEN];

fn padded(range: (f64, f64)) -> (f64, f64) {
    let (min, max) = range;
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    if (max - min).abs() < f64::EPSILON {
        return (min - 0.5, max + 0.5);
    }
    (min, max)
}

/// Renders one PNG line chart with the step count on the x axis. Series
/// with no points at all are skipped entirely (no file is written); a
/// legend is drawn only for multi-series charts.
pub fn line_chart(
    path: &Path,
    title: &str,
    y_label: &str,
    series: &[(&str, &[(f64, f64)])],
) -> Result<(), AnalysisError> {
    let points: Vec<(f64, f64)> = series
        .iter()
        .flat_map(|(_, data)| data.iter().copied())
        .collect();
    if points.is_empty() {
        return Ok(());
    }

    let (x_min, x_max) = padded(points.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY),
        |(min, max), (x, _)| (min.min(*x), max.max(*x)),
    ));
    let (y_min, y_max) = padded(points.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY),
        |(min, max), (_, y)| (min.min(*y), max.max(*y)),
    ));

    let to_plot = |e: &dyn std::fmt::Display| AnalysisError::Plot(e.to_string());

    let root = BitMapBackend::new(path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(|e| to_plot(&e))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(12)
        .x_label_area_size(44)
        .y_label_area_size(64)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(|e| to_plot(&e))?;

    chart
        .configure_mesh()
        .x_desc("step")
        .y_desc(y_label)
        .draw()
        .map_err(|e| to_plot(&e))?;

    for (index, (name, data)) in series.iter().enumerate() {
        let color = SERIES_COLORS[index % SERIES_COLORS.len()];
        chart
            .draw_series(LineSeries::new(data.iter().copied(), &color))
            .map_err(|e| to_plot(&e))?
            .label(*name)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], color));
    }

    if series.len() > 1 {
        chart
            .configure_series_labels()
            .border_style(BLACK)
            .background_style(WHITE.mix(0.8))
            .draw()
            .map_err(|e| to_plot(&e))?;
    }

    root.present().map_err(|e| to_plot(&e))
}
