use std::ops::Range;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use plotters::coord::ranged1d::ValueFormatter;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::{debug, warn};

use crate::error::{AnalyzeError, Result};
use crate::keysum::{AggregatedGroup, Dimension, KeyValue, Metric};

/// Drawing parameters for one chart. Built per call, nothing is shared between charts.
#[derive(Debug, Clone)]
pub struct ChartStyle {
    pub width: u32,
    pub height: u32,
    pub legend_height: u32,
    pub margin: u32,
    pub title_font: u32,
    pub label_font: u32,
    pub legend_font: u32,
    pub x_label_area: u32,
    pub y_label_area: u32,
    pub line_width: u32,
    pub point_size: u32,
    /// divisor applied to every y value (microseconds to milliseconds)
    pub y_divisor: f64,
    pub y_unit: &'static str,
}

impl Default for ChartStyle {
    fn default() -> Self {
        ChartStyle {
            width: 1000,
            height: 500,
            legend_height: 36,
            margin: 10,
            title_font: 16,
            label_font: 12,
            legend_font: 14,
            x_label_area: 40,
            y_label_area: 60,
            line_width: 2,
            point_size: 3,
            y_divisor: 1000.0,
            y_unit: "ms",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
}

impl Series {
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.xs.iter().copied().zip(self.ys.iter().copied())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subplot {
    pub title: String,
    pub series: Vec<Series>,
}

/// Successful groups split into subplots and lines, in first-seen order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlotLayout {
    pub subplots: Vec<Subplot>,
}

impl PlotLayout {
    /// Series labels over all subplots, each once, in first-seen order.
    pub fn labels(&self) -> Vec<&str> {
        self.subplots
            .iter()
            .flat_map(|s| s.series.iter().map(|l| l.label.as_str()))
            .unique()
            .collect()
    }

    fn y_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.subplots.iter().flat_map(|s| s.series.iter().flat_map(|l| l.ys.iter().copied()))
    }
}

fn key_of(group: &AggregatedGroup, dim: Dimension) -> Result<&KeyValue> {
    group.key(dim).ok_or_else(|| AnalyzeError::NotGrouped { field: dim.column().to_string() })
}

/// Human readable form of a key selection, e.g. `subj size 10, query size 5`.
pub fn render_key(fields: &[Dimension], group: &AggregatedGroup) -> Result<String> {
    let parts = fields
        .iter()
        .map(|d| key_of(group, *d).map(|v| format!("{} {}", d.column(), v)))
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join(", "))
}

pub fn build_layout(
    plot_key_fields: &[Dimension],
    line_key_fields: &[Dimension],
    x_field: Dimension,
    y_field: Metric,
    groups: &[AggregatedGroup],
    y_divisor: f64,
) -> Result<PlotLayout> {
    let mut layout = PlotLayout::default();
    for group in groups.iter().filter(|g| g.is_success()) {
        let plot_key = render_key(plot_key_fields, group)?;
        let line_key = render_key(line_key_fields, group)?;
        let x = match key_of(group, x_field)? {
            KeyValue::Int(v) => *v as f64,
            KeyValue::Text(s) => {
                return Err(AnalyzeError::NonNumericAxis { field: x_field.column().to_string(), value: s.clone() })
            }
        };
        let y = group.metric(y_field).average as f64 / y_divisor;

        let pi = match layout.subplots.iter().position(|s| s.title == plot_key) {
            Some(i) => i,
            None => {
                layout.subplots.push(Subplot { title: plot_key, series: vec![] });
                layout.subplots.len() - 1
            }
        };
        let subplot = &mut layout.subplots[pi];
        let li = match subplot.series.iter().position(|s| s.label == line_key) {
            Some(i) => i,
            None => {
                subplot.series.push(Series { label: line_key, xs: vec![], ys: vec![] });
                subplot.series.len() - 1
            }
        };
        subplot.series[li].xs.push(x);
        subplot.series[li].ys.push(y);
    }
    Ok(layout)
}

pub fn chart_file_name(plot_key_fields: &[Dimension], x_field: Dimension, y_field: Metric) -> String {
    let mut name = String::new();
    for d in plot_key_fields {
        name.push_str(&d.compact());
        name.push('_');
    }
    name.push_str(&x_field.compact());
    name.push('_');
    name.push_str(&y_field.compact());
    name.push_str(".svg");
    name
}

fn chart_err<E: std::fmt::Display>(e: E) -> AnalyzeError {
    AnalyzeError::Chart(e.to_string())
}

fn log_bounds(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values.filter(|v| *v > 0.0).fold((f64::MAX, 0f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if hi <= 0.0 {
        return 0.1..10.0;
    }
    (lo / 2.0)..(hi * 2.0)
}

fn linear_bounds(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values.fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo > hi {
        return 0.0..1.0;
    }
    let pad = ((hi - lo) * 0.05).max(0.5);
    (lo - pad)..(hi + pad)
}

/// Only the subject size spans orders of magnitude, so only it gets a logarithmic x axis.
pub fn x_axis_is_log(x_field: Dimension) -> bool {
    x_field == Dimension::SubjSize
}

/// Points of `series` that fit the axes: y is always logarithmic, x only when `x_log` is set.
fn drawable_points(series: &Series, x_log: bool) -> Vec<(f64, f64)> {
    series
        .points()
        .filter(|&(x, y)| {
            let keep = y > 0.0 && (!x_log || x > 0.0);
            if !keep {
                debug!(series = %series.label, x, y, "point not drawable on log axis");
            }
            keep
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn draw_subplot<X>(
    area: &DrawingArea<SVGBackend<'_>, Shift>,
    subplot: &Subplot,
    x_coord: X,
    y_coord: LogCoord<f64>,
    x_log: bool,
    style: &ChartStyle,
    (x_desc, y_desc): (&str, &str),
    labels: &[&str],
) -> Result<()>
where
    X: Ranged<ValueType = f64> + ValueFormatter<f64>,
{
    let mut chart = ChartBuilder::on(area)
        .caption(subplot.title.as_str(), ("sans-serif", style.title_font))
        .margin(style.margin)
        .x_label_area_size(style.x_label_area)
        .y_label_area_size(style.y_label_area)
        .build_cartesian_2d(x_coord, y_coord)
        .map_err(chart_err)?;
    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .label_style(("sans-serif", style.label_font))
        .axis_desc_style(("sans-serif", style.label_font))
        .draw()
        .map_err(chart_err)?;
    for series in &subplot.series {
        let idx = labels.iter().position(|l| *l == series.label.as_str()).unwrap_or(0);
        let color = Palette99::pick(idx);
        let points = drawable_points(series, x_log);
        let point_style = color.filled();
        let point_size = style.point_size;
        chart
            .draw_series(LineSeries::new(points.clone(), color.stroke_width(style.line_width)))
            .map_err(chart_err)?;
        chart
            .draw_series(points.into_iter().map(move |p| Circle::new(p, point_size, point_style)))
            .map_err(chart_err)?;
    }
    Ok(())
}

/// Draw one SVG line chart of successful groups and return its path.
///
/// The x axis is logarithmic when plotting over the subject size; the y axis always is.
pub fn create_plot(
    plot_key_fields: &[Dimension],
    line_key_fields: &[Dimension],
    x_field: Dimension,
    y_field: Metric,
    groups: &[AggregatedGroup],
    output_dir: &Path,
    style: &ChartStyle,
) -> Result<PathBuf> {
    let layout = build_layout(plot_key_fields, line_key_fields, x_field, y_field, groups, style.y_divisor)?;
    let path = output_dir.join(chart_file_name(plot_key_fields, x_field, y_field));
    let x_log = x_axis_is_log(x_field);
    let labels = layout.labels();
    let y_range = log_bounds(layout.y_values());
    let x_desc = x_field.column();
    let y_desc = format!("{} [{}]", y_field.column(), style.y_unit);

    {
        let root = SVGBackend::new(&path, (style.width, style.height)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;
        let (legend_area, body) = root.split_vertically(style.legend_height);

        if layout.subplots.is_empty() {
            warn!(path = %path.display(), "no successful runs to plot");
            body.draw(&Text::new(
                "no successful runs".to_string(),
                (style.width as i32 / 2 - 60, (style.height - style.legend_height) as i32 / 2),
                ("sans-serif", style.title_font),
            ))
            .map_err(chart_err)?;
        }

        let panels = body.split_evenly((1, layout.subplots.len().max(1)));
        for (i, (panel, subplot)) in panels.iter().zip(&layout.subplots).enumerate() {
            // only the first panel carries the shared y description
            let y_desc = if i == 0 { y_desc.as_str() } else { "" };
            let x_values = subplot.series.iter().flat_map(|s| s.xs.iter().copied());
            let y_coord = LogCoord::from(y_range.clone().log_scale());
            let descs = (x_desc, y_desc);
            if x_log {
                let x_coord = LogCoord::from(log_bounds(x_values).log_scale());
                draw_subplot(panel, subplot, x_coord, y_coord, true, style, descs, &labels)?;
            } else {
                let x_coord = RangedCoordf64::from(linear_bounds(x_values));
                draw_subplot(panel, subplot, x_coord, y_coord, false, style, descs, &labels)?;
            }
        }

        let slot = style.width as i32 / labels.len().max(1) as i32;
        let mid = style.legend_height as i32 / 2;
        for (i, label) in labels.iter().enumerate() {
            let color = Palette99::pick(i);
            let x0 = i as i32 * slot + 10;
            legend_area
                .draw(&PathElement::new(vec![(x0, mid), (x0 + 24, mid)], color.stroke_width(style.line_width)))
                .map_err(chart_err)?;
            legend_area.draw(&Circle::new((x0 + 12, mid), style.point_size, color.filled())).map_err(chart_err)?;
            legend_area
                .draw(&Text::new(label.to_string(), (x0 + 30, mid - style.legend_font as i32 / 2), ("sans-serif", style.legend_font)))
                .map_err(chart_err)?;
        }

        root.present().map_err(chart_err)?;
    }
    debug!(path = %path.display(), subplots = layout.subplots.len(), series = labels.len(), "wrote chart");
    Ok(path)
}
