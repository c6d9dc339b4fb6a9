//! Linked 3D/2D scatter figure, serialized as plotly.js figure JSON.
//!
//! The layout is fixed: one 3D scene on the left spanning all rows and three
//! 2D projections (x–y, x–z, y–z) stacked on the right. Every group gets four
//! traces that share one legend entry.

use color_eyre::Result;
use polars::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;

use crate::config::PlotConfig;
use crate::merge::MergedView;
use crate::record::{string_values, GROUP_LABEL_COL, TREE_COL};

/// Number of traces emitted per group: one 3D and three 2D projections.
pub const TRACES_PER_GROUP: usize = 4;

/// Show/hide state of one trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
    /// Hidden from the plot but still listed in the legend.
    LegendOnly,
}

impl Serialize for Visibility {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Visible => serializer.serialize_bool(true),
            Self::Hidden => serializer.serialize_bool(false),
            Self::LegendOnly => serializer.serialize_str("legendonly"),
        }
    }
}

impl<'de> Deserialize<'de> for Visibility {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Mode(String),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Flag(true) => Self::Visible,
            Raw::Flag(false) => Self::Hidden,
            Raw::Mode(mode) if mode == "legendonly" => Self::LegendOnly,
            Raw::Mode(_) => Self::Visible,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceKind {
    Scatter3d,
    #[default]
    Scatter,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Marker {
    pub color: String,
    pub size: f64,
}

/// One plotted series: all points of one group in one panel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Trace {
    #[serde(rename = "type")]
    pub kind: TraceKind,
    pub name: String,
    pub legendgroup: String,
    pub showlegend: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<Vec<f64>>,
    pub marker: Marker,
    pub hovertemplate: String,
    /// `[tree]` per point, referenced by the hover template.
    pub customdata: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xaxis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaxis: Option<String>,
    pub visible: Visibility,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Title {
    pub text: String,
}

impl Title {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneAxis {
    pub title: Title,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Domain {
    pub x: [f64; 2],
    pub y: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scene {
    pub domain: Domain,
    pub xaxis: SceneAxis,
    pub yaxis: SceneAxis,
    pub zaxis: SceneAxis,
}

/// A 2D cartesian axis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Axis {
    pub domain: [f64; 2],
    pub anchor: String,
    pub title: Title,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Legend {
    pub orientation: String,
    pub yanchor: String,
    pub y: f64,
    pub bgcolor: String,
    pub xanchor: String,
    pub x: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    pub scene: Scene,
    pub xaxis: Axis,
    pub yaxis: Axis,
    pub xaxis2: Axis,
    pub yaxis2: Axis,
    pub xaxis3: Axis,
    pub yaxis3: Axis,
    pub legend: Legend,
    /// Constant so the front end keeps camera and zoom across re-renders.
    pub uirevision: String,
}

impl Layout {
    /// The `(x, y)` axes of the 2D panel at `index` (0..3, top to bottom).
    pub fn panel_axes(&self, index: usize) -> Option<(&Axis, &Axis)> {
        match index {
            0 => Some((&self.xaxis, &self.yaxis)),
            1 => Some((&self.xaxis2, &self.yaxis2)),
            2 => Some((&self.xaxis3, &self.yaxis3)),
            _ => None,
        }
    }
}

/// A complete chart description.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

impl Figure {
    /// Visibility of every legend group. The trace carrying the legend entry
    /// wins; otherwise the first trace of the group is used.
    pub fn group_visibility(&self) -> HashMap<String, Visibility> {
        let mut out: HashMap<String, Visibility> = HashMap::new();
        for trace in &self.data {
            if trace.showlegend {
                out.insert(trace.legendgroup.clone(), trace.visible);
            } else {
                out.entry(trace.legendgroup.clone())
                    .or_insert(trace.visible);
            }
        }
        out
    }

    /// Apply a group → visibility map to every trace; unknown groups are left as is.
    pub fn apply_group_visibility(&mut self, visibility: &HashMap<String, Visibility>) {
        for trace in &mut self.data {
            if let Some(v) = visibility.get(&trace.legendgroup) {
                trace.visible = *v;
            }
        }
    }

    /// Legend click: hide a visible group (legend entry stays), show a hidden one.
    /// Returns `false` when the figure has no such group.
    pub fn toggle_group(&mut self, group: &str) -> bool {
        let current = match self.group_visibility().get(group) {
            Some(v) => *v,
            None => return false,
        };
        let next = match current {
            Visibility::Visible => Visibility::LegendOnly,
            Visibility::Hidden | Visibility::LegendOnly => Visibility::Visible,
        };
        for trace in self.data.iter_mut().filter(|t| t.legendgroup == group) {
            trace.visible = next;
        }
        true
    }

    /// Traces drawn in the 2D panel at `index` (0..3, top to bottom).
    pub fn panel_traces(&self, index: usize) -> impl Iterator<Item = &Trace> {
        let axis = axis_ref("x", index);
        self.data.iter().filter(move |t| {
            t.kind == TraceKind::Scatter && t.xaxis.as_deref() == Some(axis.as_str())
        })
    }
}

/// Plotly axis reference: `x`, `x2`, `x3`, ...
fn axis_ref(prefix: &str, index: usize) -> String {
    if index == 0 {
        prefix.to_string()
    } else {
        format!("{}{}", prefix, index + 1)
    }
}

/// Subplot geometry: rows of equal height, columns sized by relative width.
#[derive(Debug, Clone)]
pub struct SubplotGrid {
    pub rows: usize,
    pub column_widths: Vec<f64>,
    pub horizontal_spacing: f64,
    pub vertical_spacing: f64,
}

impl Default for SubplotGrid {
    fn default() -> Self {
        Self {
            rows: 3,
            column_widths: vec![0.75, 0.25],
            horizontal_spacing: 0.05,
            vertical_spacing: 0.1,
        }
    }
}

impl SubplotGrid {
    /// Horizontal extent of column `col` in paper coordinates.
    pub fn column_domain(&self, col: usize) -> [f64; 2] {
        let cols = self.column_widths.len();
        let total: f64 = self.column_widths.iter().sum();
        let available = 1.0 - self.horizontal_spacing * (cols.saturating_sub(1)) as f64;
        let before: f64 = self.column_widths[..col].iter().sum();
        let start = before / total * available + self.horizontal_spacing * col as f64;
        let end = start + self.column_widths[col] / total * available;
        [start, end.min(1.0)]
    }

    /// Vertical extent of rows `row..row + span`, row 0 being the top.
    pub fn row_domain(&self, row: usize, span: usize) -> [f64; 2] {
        let available = 1.0 - self.vertical_spacing * (self.rows.saturating_sub(1)) as f64;
        let height = available / self.rows as f64;
        let top = 1.0 - row as f64 * (height + self.vertical_spacing);
        let last = row + span - 1;
        let bottom = 1.0 - last as f64 * (height + self.vertical_spacing) - height;
        [bottom.max(0.0), top.min(1.0)]
    }
}

#[derive(Default)]
struct GroupPoints {
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
    tree: Vec<Vec<String>>,
}

fn float_values(frame: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = frame.column(name)?.cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().collect())
}

/// Bucket rows by group label, dropping rows with a null or non-finite coordinate.
fn collect_points(rows: &DataFrame, dims: &[String; 3]) -> Result<HashMap<String, GroupPoints>> {
    let labels = string_values(rows, GROUP_LABEL_COL)?;
    let trees = string_values(rows, TREE_COL)?;
    let xs = float_values(rows, &dims[0])?;
    let ys = float_values(rows, &dims[1])?;
    let zs = float_values(rows, &dims[2])?;

    let mut out: HashMap<String, GroupPoints> = HashMap::new();
    for (i, label) in labels.into_iter().enumerate() {
        let (Some(x), Some(y), Some(z)) = (xs[i], ys[i], zs[i]) else {
            continue;
        };
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            continue;
        }
        let points = out.entry(label).or_default();
        points.x.push(x);
        points.y.push(y);
        points.z.push(z);
        points.tree.push(vec![trees[i].clone()]);
    }
    Ok(out)
}

fn hover_template(group: &str) -> String {
    format!("{}<br>Tree: %{{customdata[0]}}<extra></extra>", group)
}

fn projection_trace(
    group: &str,
    color: &str,
    size: f64,
    x: &[f64],
    y: &[f64],
    tree: &[Vec<String>],
    panel: usize,
) -> Trace {
    Trace {
        kind: TraceKind::Scatter,
        name: group.to_string(),
        legendgroup: group.to_string(),
        showlegend: false,
        mode: Some("markers".to_string()),
        x: x.to_vec(),
        y: y.to_vec(),
        z: None,
        marker: Marker {
            color: color.to_string(),
            size,
        },
        hovertemplate: hover_template(group),
        customdata: tree.to_vec(),
        scene: None,
        xaxis: Some(axis_ref("x", panel)),
        yaxis: Some(axis_ref("y", panel)),
        visible: Visibility::Visible,
    }
}

fn build_layout(dims: &[String; 3], config: &PlotConfig) -> Layout {
    let grid = SubplotGrid::default();
    let left = grid.column_domain(0);
    let right = grid.column_domain(1);
    let [x, y, z] = dims;

    let panel = |row: usize, x_title: &str, y_title: &str| -> (Axis, Axis) {
        let x_axis = Axis {
            domain: right,
            anchor: axis_ref("y", row),
            title: Title::new(x_title),
        };
        let y_axis = Axis {
            domain: grid.row_domain(row, 1),
            anchor: axis_ref("x", row),
            title: Title::new(y_title),
        };
        (x_axis, y_axis)
    };
    let (xaxis, yaxis) = panel(0, x, y);
    let (xaxis2, yaxis2) = panel(1, x, z);
    let (xaxis3, yaxis3) = panel(2, y, z);

    Layout {
        scene: Scene {
            domain: Domain {
                x: left,
                y: grid.row_domain(0, grid.rows),
            },
            xaxis: SceneAxis { title: Title::new(x) },
            yaxis: SceneAxis { title: Title::new(y) },
            zaxis: SceneAxis { title: Title::new(z) },
        },
        xaxis,
        yaxis,
        xaxis2,
        yaxis2,
        xaxis3,
        yaxis3,
        legend: Legend {
            orientation: "v".to_string(),
            yanchor: "auto".to_string(),
            y: 1.0,
            bgcolor: "rgba(0,0,0,0)".to_string(),
            xanchor: "left".to_string(),
            x: config.legend_x,
        },
        uirevision: "constant".to_string(),
    }
}

/// Build the figure for `rows` (a subset of `view.combined`) on dimensions `dims`.
///
/// Traces are emitted for every group of the view, in order, even when the
/// rows hold no points for it. When `previous` is given, its per-group
/// visibility is carried over; groups it does not know stay visible.
pub fn build_figure(
    view: &MergedView,
    rows: &DataFrame,
    dims: &[String; 3],
    previous: Option<&Figure>,
    config: &PlotConfig,
) -> Result<Figure> {
    let mut points = collect_points(rows, dims)?;
    let mut data = Vec::with_capacity(view.groups.len() * TRACES_PER_GROUP);

    for group in &view.groups {
        let color = view.color_of(group).unwrap_or_default();
        let p = points.remove(group).unwrap_or_default();

        data.push(Trace {
            kind: TraceKind::Scatter3d,
            name: group.clone(),
            legendgroup: group.clone(),
            showlegend: true,
            mode: None,
            x: p.x.clone(),
            y: p.y.clone(),
            z: Some(p.z.clone()),
            marker: Marker {
                color: color.to_string(),
                size: config.marker_size_3d,
            },
            hovertemplate: hover_template(group),
            customdata: p.tree.clone(),
            scene: Some("scene".to_string()),
            xaxis: None,
            yaxis: None,
            visible: Visibility::Visible,
        });
        let size = config.marker_size_2d;
        data.push(projection_trace(group, color, size, &p.x, &p.y, &p.tree, 0));
        data.push(projection_trace(group, color, size, &p.x, &p.z, &p.tree, 1));
        data.push(projection_trace(group, color, size, &p.y, &p.z, &p.tree, 2));
    }

    let mut figure = Figure {
        data,
        layout: build_layout(dims, config),
    };
    if let Some(previous) = previous {
        figure.apply_group_visibility(&previous.group_visibility());
    }
    Ok(figure)
}
