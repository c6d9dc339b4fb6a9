//! Dimension and tree-number filtering of the merged view.

use color_eyre::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::config::PlotConfig;
use crate::merge::MergedView;
use crate::plot::{build_figure, Figure};
use crate::record::TREE_NUMBER_COL;

/// Filter inputs: the three plotted dimensions and an inclusive tree-number range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRequest {
    pub dimensions: Vec<String>,
    pub tree_range: (u32, u32),
}

impl FilterRequest {
    pub fn new(dimensions: Vec<String>, tree_range: (u32, u32)) -> Self {
        Self {
            dimensions,
            tree_range,
        }
    }

    /// The three axes, when the request names exactly three distinct dimensions
    /// that all exist in `options`.
    pub fn axes(&self, options: &[String]) -> Option<[String; 3]> {
        let [x, y, z] = self.dimensions.as_slice() else {
            return None;
        };
        let distinct: HashSet<&String> = self.dimensions.iter().collect();
        if distinct.len() != 3 || !self.dimensions.iter().all(|d| options.contains(d)) {
            return None;
        }
        Some([x.clone(), y.clone(), z.clone()])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutcome {
    /// The request could not be plotted; keep the current chart.
    Unchanged,
    Updated(Figure),
}

/// Rows of the view whose tree number lies in `[min, max]`. The view is not modified.
pub fn filter_rows(view: &MergedView, (min, max): (u32, u32)) -> Result<DataFrame> {
    let rows = view
        .combined
        .clone()
        .lazy()
        .filter(
            col(TREE_NUMBER_COL)
                .gt_eq(lit(min))
                .and(col(TREE_NUMBER_COL).lt_eq(lit(max))),
        )
        .collect()?;
    Ok(rows)
}

/// Re-slice the view and rebuild the figure, carrying over group visibility
/// from `previous`.
pub fn apply(
    view: &MergedView,
    request: &FilterRequest,
    previous: Option<&Figure>,
    config: &PlotConfig,
) -> Result<FilterOutcome> {
    let Some(axes) = request.axes(&view.dimensions) else {
        debug!(dimensions = ?request.dimensions, "need exactly three known dimensions, keeping chart");
        return Ok(FilterOutcome::Unchanged);
    };
    let rows = filter_rows(view, request.tree_range)?;
    debug!(
        min = request.tree_range.0,
        max = request.tree_range.1,
        rows = rows.height(),
        "filtered merged view"
    );
    let figure = build_figure(view, &rows, &axes, previous, config)?;
    Ok(FilterOutcome::Updated(figure))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestConfig;
    use crate::ingest::{ingest_batch, UploadedFile};
    use crate::merge::merge_selection;
    use crate::palette::Palette;
    use crate::plot::Visibility;
    use crate::record::string_values;
    use crate::record::GROUP_LABEL_COL;
    use crate::registry::DatasetRegistry;

    /// Groups A and B, tree numbers 1..=5 each, interleaved.
    fn view() -> MergedView {
        let mut content = String::from("tree\tgroup\tV1\tV2\tV3\tV4\n");
        for i in 0..10 {
            let group = if i % 2 == 0 { "A" } else { "B" };
            content.push_str(&format!("t{}\t{}\t{}\t{}\t{}\t{}\n", i, group, i, i, i, i));
        }
        let mut registry = DatasetRegistry::new();
        ingest_batch(
            &mut registry,
            &[UploadedFile::from_bytes("fileA.tsv", content.into_bytes())],
            &IngestConfig::default(),
        );
        merge_selection(&registry, &["fileA.tsv".to_string()], &Palette::default())
            .unwrap()
            .unwrap()
    }

    fn dims(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn range_is_inclusive_on_both_ends() {
        let v = view();
        let rows = filter_rows(&v, (2, 4)).unwrap();
        assert_eq!(rows.height(), 6);
        let numbers: Vec<u32> = rows
            .column(TREE_NUMBER_COL)
            .unwrap()
            .u32()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert!(numbers.iter().all(|n| (2..=4).contains(n)));
        // single file: labels are the bare groups
        let labels = string_values(&rows, GROUP_LABEL_COL).unwrap();
        assert_eq!(labels.iter().filter(|l| *l == "A").count(), 3);
        assert_eq!(labels.iter().filter(|l| *l == "B").count(), 3);
        // the view itself is untouched
        assert_eq!(v.num_rows(), 10);
    }

    #[test]
    fn wrong_dimension_count_is_unchanged() {
        let v = view();
        for request in [
            FilterRequest::new(dims(&["MDS1", "MDS2"]), (1, 5)),
            FilterRequest::new(dims(&["MDS1", "MDS2", "MDS3", "MDS4"]), (1, 5)),
            FilterRequest::new(dims(&["MDS1", "MDS1", "MDS2"]), (1, 5)),
            FilterRequest::new(dims(&["MDS1", "MDS2", "MDS9"]), (1, 5)),
        ] {
            let outcome = apply(&v, &request, None, &PlotConfig::default()).unwrap();
            assert_eq!(outcome, FilterOutcome::Unchanged);
        }
    }

    #[test]
    fn rebuild_uses_chosen_axes_and_keeps_visibility() {
        let v = view();
        let first = apply(
            &v,
            &FilterRequest::new(dims(&["MDS1", "MDS2", "MDS3"]), (1, 5)),
            None,
            &PlotConfig::default(),
        )
        .unwrap();
        let FilterOutcome::Updated(mut figure) = first else {
            panic!("expected a figure");
        };
        figure.toggle_group("A");

        let second = apply(
            &v,
            &FilterRequest::new(dims(&["MDS2", "MDS4", "MDS1"]), (2, 3)),
            Some(&figure),
            &PlotConfig::default(),
        )
        .unwrap();
        let FilterOutcome::Updated(updated) = second else {
            panic!("expected a figure");
        };
        assert_eq!(updated.layout.scene.xaxis.title.text, "MDS2");
        assert_eq!(updated.layout.scene.zaxis.title.text, "MDS1");
        assert_eq!(updated.data[0].x.len(), 2);
        assert_eq!(updated.group_visibility()["A"], Visibility::LegendOnly);
        assert_eq!(updated.group_visibility()["B"], Visibility::Visible);
    }

    #[test]
    fn empty_range_keeps_all_group_traces() {
        let v = view();
        let outcome = apply(
            &v,
            &FilterRequest::new(dims(&["MDS1", "MDS2", "MDS3"]), (9, 12)),
            None,
            &PlotConfig::default(),
        )
        .unwrap();
        let FilterOutcome::Updated(figure) = outcome else {
            panic!("expected a figure");
        };
        assert_eq!(figure.data.len(), 8);
        assert!(figure.data.iter().all(|t| t.x.is_empty()));
    }
}
