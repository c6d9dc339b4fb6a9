//! PNG export of the three 2D projection panels (plotters bitmap backend).

use color_eyre::Result;
use plotters::prelude::{
    BitMapBackend, ChartBuilder, Circle, Color, EmptyElement, IntoDrawingArea, PointSeries,
    RGBColor, WHITE,
};
use std::path::Path;

use crate::palette::parse_hex;
use crate::plot::{Figure, Trace, Visibility};

/// Axis bounds of one panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

/// Bounds covering every point of the given traces, padded by 5% on each side.
/// Returns `None` when there are no points.
pub fn panel_bounds<'a>(traces: impl IntoIterator<Item = &'a Trace>) -> Option<PanelBounds> {
    let mut bounds: Option<PanelBounds> = None;
    for trace in traces {
        for (&x, &y) in trace.x.iter().zip(&trace.y) {
            let b = bounds.get_or_insert(PanelBounds {
                x_min: x,
                x_max: x,
                y_min: y,
                y_max: y,
            });
            b.x_min = b.x_min.min(x);
            b.x_max = b.x_max.max(x);
            b.y_min = b.y_min.min(y);
            b.y_max = b.y_max.max(y);
        }
    }
    bounds.map(|b| {
        let pad_x = padding(b.x_min, b.x_max);
        let pad_y = padding(b.y_min, b.y_max);
        PanelBounds {
            x_min: b.x_min - pad_x,
            x_max: b.x_max + pad_x,
            y_min: b.y_min - pad_y,
            y_max: b.y_max + pad_y,
        }
    })
}

fn padding(min: f64, max: f64) -> f64 {
    let range = max - min;
    if range > 0.0 {
        range * 0.05
    } else {
        1.0
    }
}

fn is_drawn(trace: &Trace) -> bool {
    trace.visible == Visibility::Visible
}

/// Render the x–y, x–z and y–z panels of `figure`, stacked top to bottom.
/// Hidden and legend-only groups are left out.
pub fn write_projections_png(path: &Path, figure: &Figure, size: (u32, u32)) -> Result<()> {
    let drawn: Vec<Vec<&Trace>> = (0..3)
        .map(|panel| figure.panel_traces(panel).filter(|t| is_drawn(t)).collect())
        .collect();
    if drawn.iter().flatten().all(|t| t.x.is_empty()) {
        return Err(color_eyre::eyre::eyre!("No data to export"));
    }

    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let areas = root.split_evenly((3, 1));

    for (panel, area) in areas.iter().enumerate() {
        let Some(bounds) = panel_bounds(drawn[panel].iter().copied()) else {
            continue;
        };
        let (x_label, y_label) = figure
            .layout
            .panel_axes(panel)
            .map(|(x, y)| (x.title.text.clone(), y.title.text.clone()))
            .unwrap_or_default();

        let mut chart = ChartBuilder::on(area)
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(45)
            .build_cartesian_2d(bounds.x_min..bounds.x_max, bounds.y_min..bounds.y_max)?;

        chart
            .configure_mesh()
            .x_desc(x_label.as_str())
            .y_desc(y_label.as_str())
            .draw()?;

        for trace in &drawn[panel] {
            let (r, g, b) = parse_hex(&trace.marker.color).unwrap_or((0, 0, 0));
            let color = RGBColor(r, g, b);
            let radius = (trace.marker.size / 2.0).round().max(1.0) as i32;
            chart.draw_series(PointSeries::of_element(
                trace.x.iter().copied().zip(trace.y.iter().copied()),
                radius,
                color,
                &|c, s, _| EmptyElement::at(c) + Circle::new((0, 0), s, color.filled()),
            ))?;
        }
    }

    root.present()?;
    Ok(())
}
