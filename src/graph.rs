//! Chart options and the renderable figure
//!
//! [`ChartSpec`] is what the chart form sends. [`build_figure`] turns it and a
//! [`Table`] into a [`Figure`], the `data`/`layout` document drawn by the
//! browser chart widget or by [`crate::plot`] as SVG.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ChartError, ChartResult};
use crate::table::{Table, Value};

/// Chart types offered in the chart selector
///
/// Only `Line` has a rendering path. The others are accepted by the selector
/// and rejected by [`build_figure`] with [`ChartError::UnsupportedChartType`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Line,
    Bars,
    Histogram,
    Pie,
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChartType::Line => "Line",
            ChartType::Bars => "Bars",
            ChartType::Histogram => "Histogram",
            ChartType::Pie => "Pie",
        };
        f.write_str(name)
    }
}

/// Dash pattern of a line trace, named the way the browser chart widget names them
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineDash {
    #[default]
    Solid,
    Dot,
    Dash,
    LongDash,
    DashDot,
    LongDashDot,
}

impl LineDash {
    pub const ALL: [LineDash; 6] = [
        LineDash::Solid,
        LineDash::Dot,
        LineDash::Dash,
        LineDash::LongDash,
        LineDash::DashDot,
        LineDash::LongDashDot,
    ];
}

/// A `#RRGGBB` color, stored upper-case
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(String);

impl Color {
    pub fn black() -> Self {
        Color("#000000".to_string())
    }

    pub fn white() -> Self {
        Color("#FFFFFF".to_string())
    }

    pub fn light_gray() -> Self {
        Color("#CCCCCC".to_string())
    }

    /// Red, green and blue components
    pub fn rgb(&self) -> (u8, u8, u8) {
        let channel = |i: usize| u8::from_str_radix(&self.0[i..i + 2], 16).unwrap_or(0);
        (channel(1), channel(3), channel(5))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Color {
    type Error = ChartError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::str::FromStr for Color {
    type Err = ChartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let valid = s.len() == 7
            && s.starts_with('#')
            && s[1..].chars().all(|c| c.is_ascii_hexdigit());
        if !valid {
            return Err(ChartError::InvalidColor(s.to_string()));
        }
        Ok(Color(s.to_ascii_uppercase()))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// X-axis tick scale presets
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickPreset {
    /// Automatic tick placement
    #[default]
    Default,
    /// Ticks every 25 from -50 to 200
    Step25,
    /// Ticks every 10 from -50 to 200
    Step10,
}

impl TickPreset {
    pub const ALL: [TickPreset; 3] = [TickPreset::Default, TickPreset::Step25, TickPreset::Step10];

    /// Explicit tick positions, `None` when placement is automatic
    pub fn tick_values(&self) -> Option<Vec<f64>> {
        let step = match self {
            TickPreset::Default => return None,
            TickPreset::Step25 => 25,
            TickPreset::Step10 => 10,
        };
        Some((-50..=200).step_by(step).map(f64::from).collect())
    }

    /// Label shown in the scale selector
    pub fn label(&self) -> &'static str {
        match self {
            TickPreset::Default => "Default scale",
            TickPreset::Step25 => "Step of 25",
            TickPreset::Step10 => "Step of 10",
        }
    }
}

fn default_color() -> Color {
    Color::black()
}

/// Options of one Y column
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesSpec {
    pub column: String,
    #[serde(default = "default_color")]
    pub color: Color,
    #[serde(default)]
    pub dash: LineDash,
    /// Plot the natural logarithm of the column
    #[serde(default)]
    pub log: bool,
}

impl SeriesSpec {
    pub fn new(column: impl Into<String>) -> Self {
        SeriesSpec {
            column: column.into(),
            color: Color::black(),
            dash: LineDash::Solid,
            log: false,
        }
    }

    /// Legend label of the trace built from this series
    pub fn trace_name(&self) -> String {
        if self.log {
            format!("log({})", self.column)
        } else {
            self.column.clone()
        }
    }
}

/// Chart-wide layout options from the sidebar
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    pub show_grid: bool,
    /// Only used while `show_grid` is on
    pub grid_color: Color,
    /// Applied to both the plot area and the surrounding paper
    pub background: Color,
    pub show_legend: bool,
    pub x_ticks: TickPreset,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            title: "Line Chart".to_string(),
            x_title: "X Axis".to_string(),
            y_title: "Y Axis".to_string(),
            show_grid: true,
            grid_color: Color::light_gray(),
            background: Color::white(),
            show_legend: true,
            x_ticks: TickPreset::Default,
        }
    }
}

/// Everything the user picked to draw one chart
///
/// Deserialized straight from the chart form on every interaction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(default)]
    pub chart_type: ChartType,
    #[serde(default)]
    pub x_column: String,
    #[serde(default)]
    pub series: Vec<SeriesSpec>,
    #[serde(default)]
    pub layout: LayoutOptions,
}

/// Margin around the plot on every side
pub const CHART_MARGIN: u32 = 40;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Title {
    pub text: String,
}

impl Title {
    fn new(text: &str) -> Self {
        Title {
            text: text.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TraceLine {
    pub color: Color,
    pub dash: LineDash,
}

/// One plotted series
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Trace {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub x: Vec<Value>,
    pub y: Vec<Value>,
    pub mode: &'static str,
    pub name: String,
    pub line: TraceLine,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TickMode {
    Auto,
    Array,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Axis {
    pub title: Title,
    pub showgrid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gridcolor: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zeroline: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickmode: Option<TickMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickvals: Option<Vec<f64>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Margin {
    pub l: u32,
    pub r: u32,
    pub t: u32,
    pub b: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ShapeLine {
    pub color: &'static str,
    pub width: u32,
}

/// Decorative shape drawn in paper coordinates
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Shape {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub xref: &'static str,
    pub yref: &'static str,
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    pub line: ShapeLine,
    pub fillcolor: &'static str,
}

impl Shape {
    /// Black frame around the whole plotting area
    pub fn border() -> Self {
        Shape {
            kind: "rect",
            xref: "paper",
            yref: "paper",
            x0: 0.0,
            y0: 0.0,
            x1: 1.0,
            y1: 1.0,
            line: ShapeLine {
                color: "black",
                width: 1,
            },
            fillcolor: "rgba(0,0,0,0)",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Layout {
    pub title: Title,
    pub xaxis: Axis,
    pub yaxis: Axis,
    pub plot_bgcolor: Color,
    pub paper_bgcolor: Color,
    pub showlegend: bool,
    pub autosize: bool,
    pub margin: Margin,
    pub shapes: Vec<Shape>,
}

/// Renderable chart description
///
/// Serializes to the `{"data": [...], "layout": {...}}` document the page
/// hands to the browser chart widget.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

/// State of the visualization panel after one interaction
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Visualization {
    /// Nothing uploaded yet
    NoTable,
    /// A table is loaded but no Y column is selected
    NoSeries,
    Chart { figure: Figure },
}

/// Computes the visualization state for the current table and chart form
///
/// # Arguments
/// * `table` - The session's table, if any
/// * `spec` - Chart options collected from the form
///
/// # Returns
/// * `ChartResult<Visualization>` - Idle states or a full figure
pub fn visualize(table: Option<&Table>, spec: &ChartSpec) -> ChartResult<Visualization> {
    let Some(table) = table else {
        return Ok(Visualization::NoTable);
    };

    let figure = build_figure(table, spec)?;
    if figure.data.is_empty() {
        Ok(Visualization::NoSeries)
    } else {
        Ok(Visualization::Chart { figure })
    }
}

/// Builds the figure for `spec` from `table`
///
/// One trace per selected Y column, in selection order. With no Y column the
/// figure has no traces and the X column is not checked.
///
/// # Errors
/// * `UnsupportedChartType` for anything but a line chart
/// * `UnknownColumn` if the X or a Y column is not in the table
pub fn build_figure(table: &Table, spec: &ChartSpec) -> ChartResult<Figure> {
    if spec.chart_type != ChartType::Line {
        return Err(ChartError::UnsupportedChartType(spec.chart_type.to_string()));
    }

    let mut data = Vec::with_capacity(spec.series.len());
    if !spec.series.is_empty() {
        let x = table
            .column(&spec.x_column)
            .ok_or_else(|| ChartError::UnknownColumn(spec.x_column.clone()))?;

        for series in &spec.series {
            let column = table
                .column(&series.column)
                .ok_or_else(|| ChartError::UnknownColumn(series.column.clone()))?;

            let y = if series.log {
                column.values.iter().map(natural_log).collect()
            } else {
                column.values.clone()
            };

            data.push(Trace {
                kind: "scatter",
                x: x.values.clone(),
                y,
                mode: "lines",
                name: series.trace_name(),
                line: TraceLine {
                    color: series.color.clone(),
                    dash: series.dash,
                },
            });
        }
    }

    Ok(Figure {
        data,
        layout: build_layout(&spec.layout),
    })
}

// Non-positive inputs give NaN or -inf, serialized as null.
fn natural_log(value: &Value) -> Value {
    match value.as_f64() {
        Some(n) => Value::Number(n.ln()),
        None => Value::Missing,
    }
}

fn build_layout(options: &LayoutOptions) -> Layout {
    let gridcolor = options.show_grid.then(|| options.grid_color.clone());

    let tickvals = options.x_ticks.tick_values();
    let tickmode = if tickvals.is_some() {
        TickMode::Array
    } else {
        TickMode::Auto
    };

    Layout {
        title: Title::new(&options.title),
        xaxis: Axis {
            title: Title::new(&options.x_title),
            showgrid: options.show_grid,
            gridcolor: gridcolor.clone(),
            zeroline: None,
            tickmode: Some(tickmode),
            tickvals,
        },
        yaxis: Axis {
            title: Title::new(&options.y_title),
            showgrid: options.show_grid,
            gridcolor,
            zeroline: Some(false),
            tickmode: None,
            tickvals: None,
        },
        plot_bgcolor: options.background.clone(),
        paper_bgcolor: options.background.clone(),
        showlegend: options.show_legend,
        autosize: true,
        margin: Margin {
            l: CHART_MARGIN,
            r: CHART_MARGIN,
            t: CHART_MARGIN,
            b: CHART_MARGIN,
        },
        shapes: vec![Shape::border()],
    }
}
