#![cfg(feature = "web")]
//! Server-side SVG rendering of a [`Figure`] with plotters
//!
//! Used by clients that cannot run the browser chart widget. The drawing
//! follows the figure's layout: title, axis titles, grid in the grid color,
//! background, legend, border and explicit X ticks.

use plotters::coord::ranged1d::{DefaultFormatting, KeyPointHint, Ranged};
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use std::ops::Range;

use crate::error::{ChartError, ChartResult};
use crate::graph::{Color as ChartColor, Figure, LineDash, Trace};
use crate::table::Value;

/// Default SVG size in pixels
pub const DEFAULT_SVG_SIZE: (u32, u32) = (800, 500);

/// Number of ticks aimed for when placement is automatic
const AUTO_TICKS: usize = 10;

/// Upper bound on generated ticks per axis
const MAX_TICKS: usize = 100;

fn render_err(e: impl std::fmt::Display) -> ChartError {
    ChartError::Render(e.to_string())
}

fn to_rgb(color: &ChartColor) -> RGBColor {
    let (r, g, b) = color.rgb();
    RGBColor(r, g, b)
}

/// Dash length and gap in pixels, `None` for a solid line
fn dash_pattern(dash: LineDash) -> Option<(i32, i32)> {
    match dash {
        LineDash::Solid => None,
        LineDash::Dot => Some((2, 4)),
        LineDash::Dash => Some((8, 5)),
        LineDash::LongDash => Some((16, 6)),
        LineDash::DashDot => Some((6, 3)),
        LineDash::LongDashDot => Some((12, 4)),
    }
}

/// Plot positions of a trace
///
/// Non-numeric X values are placed at their row index. Points whose Y is not a
/// finite number are dropped.
fn trace_points(trace: &Trace) -> Vec<(f64, f64)> {
    trace
        .x
        .iter()
        .zip(trace.y.iter())
        .enumerate()
        .filter_map(|(i, (x, y))| {
            let x = match x {
                Value::Number(n) => *n,
                _ => i as f64,
            };
            let y = y.as_f64()?;
            (x.is_finite() && y.is_finite()).then_some((x, y))
        })
        .collect()
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if lo > hi {
        (0.0, 1.0)
    } else if lo == hi {
        (lo - 1.0, hi + 1.0)
    } else {
        (lo, hi)
    }
}

/// Evenly spaced "nice" tick positions covering `[lo, hi]`
///
/// When the step is too small to move a value of this magnitude, only the
/// two bounds are returned.
fn auto_ticks(lo: f64, hi: f64, target: usize) -> Vec<f64> {
    let raw = (hi - lo) / target.max(1) as f64;
    if !(raw.is_finite() && raw > 0.0) {
        return vec![lo];
    }

    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw)
        .unwrap_or(10.0 * magnitude);

    let first = (lo / step).ceil() * step;
    if first + step == first || first > hi {
        return vec![lo, hi];
    }

    let count = (((hi - first) / step + 1e-9).floor() as usize + 1).min(MAX_TICKS);
    (0..count).map(|i| first + i as f64 * step).collect()
}

/// Linear axis whose labels and grid lines sit on a fixed list of ticks
struct TickAxis {
    range: RangedCoordf64,
    ticks: Vec<f64>,
}

impl TickAxis {
    fn new(range: Range<f64>, ticks: Vec<f64>) -> Self {
        TickAxis {
            range: range.into(),
            ticks,
        }
    }
}

impl Ranged for TickAxis {
    type FormatOption = DefaultFormatting;
    type ValueType = f64;

    fn map(&self, value: &f64, limit: (i32, i32)) -> i32 {
        self.range.map(value, limit)
    }

    fn key_points<Hint: KeyPointHint>(&self, hint: Hint) -> Vec<f64> {
        // Only the bold mesh gets lines, at the ticks themselves.
        if hint.weight().allow_light_points() {
            return Vec::new();
        }
        self.ticks.clone()
    }

    fn range(&self) -> Range<f64> {
        self.range.range()
    }
}

fn format_tick(value: &f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// Renders `figure` as an SVG document
///
/// # Arguments
/// * `figure` - Figure built by [`crate::graph::build_figure`]
/// * `size` - Width and height in pixels
///
/// # Returns
/// * `ChartResult<String>` - The SVG markup
pub fn render_svg(figure: &Figure, size: (u32, u32)) -> ChartResult<String> {
    let layout = &figure.layout;
    let traces: Vec<(&Trace, Vec<(f64, f64)>)> = figure
        .data
        .iter()
        .map(|t| (t, trace_points(t)))
        .collect();

    let (x_min, x_max) = bounds(traces.iter().flat_map(|(_, p)| p.iter().map(|p| p.0)));
    let (y_min, y_max) = bounds(traces.iter().flat_map(|(_, p)| p.iter().map(|p| p.1)));

    let mut x_ticks: Vec<f64> = match &layout.xaxis.tickvals {
        Some(values) => values
            .iter()
            .copied()
            .filter(|v| *v >= x_min && *v <= x_max)
            .collect(),
        None => Vec::new(),
    };
    if x_ticks.is_empty() {
        x_ticks = auto_ticks(x_min, x_max, AUTO_TICKS);
    }

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
        root.fill(&to_rgb(&layout.paper_bgcolor))
            .map_err(render_err)?;

        let margin = layout.margin.t.min(layout.margin.l) as i32;
        let mut chart = ChartBuilder::on(&root)
            .caption(&layout.title.text, ("sans-serif", 22).into_font())
            .margin(margin / 2)
            .x_label_area_size(margin)
            .y_label_area_size(margin + 10)
            .build_cartesian_2d(
                TickAxis::new(x_min..x_max, x_ticks),
                TickAxis::new(y_min..y_max, auto_ticks(y_min, y_max, AUTO_TICKS)),
            )
            .map_err(render_err)?;

        chart
            .plotting_area()
            .fill(&to_rgb(&layout.plot_bgcolor))
            .map_err(render_err)?;

        let mut mesh = chart.configure_mesh();
        mesh.x_desc(layout.xaxis.title.text.as_str())
            .y_desc(layout.yaxis.title.text.as_str())
            .x_label_formatter(&format_tick)
            .y_label_formatter(&format_tick);
        match &layout.xaxis.gridcolor {
            Some(grid) if layout.xaxis.showgrid => {
                let grid = to_rgb(grid);
                mesh.bold_line_style(grid.stroke_width(1));
            }
            _ => {
                mesh.disable_mesh();
            }
        }
        mesh.draw().map_err(render_err)?;

        for (trace, points) in &traces {
            let style = to_rgb(&trace.line.color).stroke_width(2);
            let anno = match dash_pattern(trace.line.dash) {
                None => chart
                    .draw_series(LineSeries::new(points.iter().copied(), style))
                    .map_err(render_err)?,
                Some((size, spacing)) => chart
                    .draw_series(DashedLineSeries::new(
                        points.iter().copied(),
                        size,
                        spacing,
                        style,
                    ))
                    .map_err(render_err)?,
            };
            anno.label(trace.name.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
        }

        if layout.showlegend && !traces.is_empty() {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperRight)
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .draw()
                .map_err(render_err)?;
        }

        // Frame around the plotting area
        chart
            .plotting_area()
            .draw(&Rectangle::new(
                [(x_min, y_min), (x_max, y_max)],
                BLACK.stroke_width(1),
            ))
            .map_err(render_err)?;

        root.present().map_err(render_err)?;
    }

    Ok(svg)
}
