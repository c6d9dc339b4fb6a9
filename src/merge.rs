//! Merge the selected files into one view with a colour per group.

use color_eyre::Result;
use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::palette::Palette;
use crate::record::{TraceRecord, GROUP_LABEL_COL};
use crate::registry::DatasetRegistry;

/// The combined dataset of the current selection.
///
/// Derived from the registry on every selection change and never written back.
#[derive(Debug, Clone)]
pub struct MergedView {
    /// Rows of every selected file, in selection order, with a [`GROUP_LABEL_COL`] column.
    pub combined: DataFrame,
    /// Distinct group labels in first-seen order.
    pub groups: Vec<String>,
    /// Colour of every label in `groups`.
    pub colors: HashMap<String, String>,
    /// Dimension options, taken from the first selected file.
    pub dimensions: Vec<String>,
    /// Smallest and largest tree number across the selected files.
    pub tree_range: (u32, u32),
    /// Files that contributed rows, in merge order.
    pub selected_files: Vec<String>,
}

impl MergedView {
    /// First three dimension options, or `None` when fewer than three exist.
    pub fn default_dimensions(&self) -> Option<[String; 3]> {
        match self.dimensions.as_slice() {
            [x, y, z, ..] => Some([x.clone(), y.clone(), z.clone()]),
            _ => None,
        }
    }

    pub fn color_of(&self, label: &str) -> Option<&str> {
        self.colors.get(label).map(String::as_str)
    }

    pub fn num_rows(&self) -> usize {
        self.combined.height()
    }
}

/// Label of a group once merged: the bare group for a single file,
/// `filename/group` when several files are merged.
pub fn group_label(filename: &str, group: &str, disambiguate: bool) -> String {
    if disambiguate {
        format!("{}/{}", filename, group)
    } else {
        group.to_string()
    }
}

/// Merge the selected files. Names missing from the registry are skipped;
/// returns `None` when nothing remains.
pub fn merge_selection(
    registry: &DatasetRegistry,
    selected: &[String],
    palette: &Palette,
) -> Result<Option<MergedView>> {
    let mut seen_files = HashSet::new();
    let records: Vec<&TraceRecord> = selected
        .iter()
        .filter(|name| seen_files.insert(name.as_str()))
        .filter_map(|name| {
            let record = registry.get(name);
            if record.is_none() {
                debug!(filename = %name, "selected file is not registered, skipping");
            }
            record
        })
        .collect();

    let Some(first) = records.first() else {
        return Ok(None);
    };
    let dimensions = first.dimension_columns.clone();
    let disambiguate = records.len() > 1;

    let mut groups = Vec::new();
    let mut seen_groups = HashSet::new();
    let mut tree_range: Option<(u32, u32)> = None;
    let mut frames = Vec::with_capacity(records.len());

    for record in &records {
        let labels: Vec<String> = record
            .groups()?
            .iter()
            .map(|g| group_label(&record.filename, g, disambiguate))
            .collect();
        for label in &labels {
            if seen_groups.insert(label.clone()) {
                groups.push(label.clone());
            }
        }

        if let Some((lo, hi)) = record.tree_number_range()? {
            tree_range = Some(match tree_range {
                Some((min, max)) => (min.min(lo), max.max(hi)),
                None => (lo, hi),
            });
        }

        let mut frame = record.frame.clone();
        frame.with_column(Column::new(GROUP_LABEL_COL.into(), labels))?;
        frames.push(frame.lazy());
    }

    let combined = if frames.len() == 1 {
        frames.remove(0).collect()?
    } else {
        // files may carry different dimension sets; missing columns become null
        let args = UnionArgs {
            to_supertypes: true,
            ..Default::default()
        };
        concat_lf_diagonal(frames, args)?.collect()?
    };

    let colors = palette.assign(&groups);
    let view = MergedView {
        combined,
        groups,
        colors,
        dimensions,
        tree_range: tree_range.unwrap_or((0, 0)),
        selected_files: records.iter().map(|r| r.filename.clone()).collect(),
    };
    info!(
        files = view.selected_files.len(),
        rows = view.num_rows(),
        groups = view.groups.len(),
        "merged selection"
    );
    Ok(Some(view))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestConfig;
    use crate::ingest::{ingest_batch, UploadedFile};
    use crate::record::{string_values, FILE_COL};

    fn upload(registry: &mut DatasetRegistry, name: &str, header: &str, rows: &[&str]) {
        let mut content = format!("{}\n", header);
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        let file = UploadedFile::from_bytes(name, content.into_bytes());
        let report = ingest_batch(registry, &[file], &IngestConfig::default());
        assert!(!report.show_alert(), "{}", report.message());
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn two_file_registry() -> DatasetRegistry {
        let mut registry = DatasetRegistry::new();
        upload(
            &mut registry,
            "fileA.tsv",
            "tree\tgroup\tV1\tV2\tV3",
            &["a1\tX\t1\t2\t3", "a2\tX\t4\t5\t6"],
        );
        upload(
            &mut registry,
            "fileB.tsv",
            "tree\tgroup\tV1\tV2\tV3\tV4",
            &["b1\tX\t1\t2\t3\t4", "b2\tY\t4\t5\t6\t7", "b3\tY\t4\t5\t6\t7"],
        );
        registry
    }

    #[test]
    fn single_file_keeps_bare_groups() {
        let registry = two_file_registry();
        let view = merge_selection(&registry, &names(&["fileB.tsv"]), &Palette::default())
            .unwrap()
            .unwrap();
        assert_eq!(view.groups, vec!["X", "Y"]);
        assert_eq!(
            string_values(&view.combined, GROUP_LABEL_COL).unwrap(),
            vec!["X", "Y", "Y"]
        );
        assert_eq!(view.dimensions, vec!["MDS1", "MDS2", "MDS3", "MDS4"]);
        assert_eq!(view.tree_range, (1, 2));
    }

    #[test]
    fn multiple_files_disambiguate_groups() {
        let registry = two_file_registry();
        let view = merge_selection(
            &registry,
            &names(&["fileA.tsv", "fileB.tsv"]),
            &Palette::default(),
        )
        .unwrap()
        .unwrap();

        assert_eq!(
            view.groups,
            vec!["fileA.tsv/X", "fileB.tsv/X", "fileB.tsv/Y"]
        );
        assert_eq!(view.num_rows(), 5);
        assert_ne!(
            view.color_of("fileA.tsv/X"),
            view.color_of("fileB.tsv/X")
        );
        assert_eq!(view.colors.len(), view.groups.len());
    }

    #[test]
    fn rows_follow_selection_order() {
        let registry = two_file_registry();
        let view = merge_selection(
            &registry,
            &names(&["fileB.tsv", "fileA.tsv"]),
            &Palette::default(),
        )
        .unwrap()
        .unwrap();
        let files = string_values(&view.combined, FILE_COL).unwrap();
        assert_eq!(files.first().unwrap(), "fileB.tsv");
        assert_eq!(files.last().unwrap(), "fileA.tsv");
        // dimension options come from the first selected file
        assert_eq!(view.dimensions.len(), 4);
        assert_eq!(view.groups[0], "fileB.tsv/X");
    }

    #[test]
    fn differing_dimensions_merge_with_nulls() {
        let registry = two_file_registry();
        let view = merge_selection(
            &registry,
            &names(&["fileA.tsv", "fileB.tsv"]),
            &Palette::default(),
        )
        .unwrap()
        .unwrap();
        let mds4 = view.combined.column("MDS4").unwrap();
        assert_eq!(mds4.null_count(), 2);
    }

    #[test]
    fn missing_names_are_skipped() {
        let registry = two_file_registry();
        let view = merge_selection(
            &registry,
            &names(&["gone.tsv", "fileA.tsv"]),
            &Palette::default(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(view.selected_files, vec!["fileA.tsv"]);
        assert_eq!(view.groups, vec!["X"]);

        let none = merge_selection(&registry, &names(&["gone.tsv"]), &Palette::default()).unwrap();
        assert!(none.is_none());
        let empty = merge_selection(&registry, &[], &Palette::default()).unwrap();
        assert!(empty.is_none());
    }

    #[test]
    fn default_dimensions_need_three() {
        let mut registry = DatasetRegistry::new();
        upload(&mut registry, "two.tsv", "group\tV1\tV2", &["A\t1\t2"]);
        let view = merge_selection(&registry, &names(&["two.tsv"]), &Palette::default())
            .unwrap()
            .unwrap();
        assert!(view.default_dimensions().is_none());

        let registry = two_file_registry();
        let view = merge_selection(&registry, &names(&["fileB.tsv"]), &Palette::default())
            .unwrap()
            .unwrap();
        assert_eq!(
            view.default_dimensions().unwrap(),
            ["MDS1".to_string(), "MDS2".to_string(), "MDS3".to_string()]
        );
    }

    #[test]
    fn tree_range_spans_all_selected_files() {
        let mut registry = two_file_registry();
        upload(
            &mut registry,
            "long.tsv",
            "tree\tgroup\tV1\tV2\tV3",
            &["l1\tQ\t1\t1\t1", "l2\tQ\t2\t2\t2", "l3\tQ\t3\t3\t3", "l4\tQ\t4\t4\t4"],
        );

        let range = |selection: &[&str]| {
            merge_selection(&registry, &names(selection), &Palette::default())
                .unwrap()
                .unwrap()
                .tree_range
        };
        assert_eq!(range(&["fileA.tsv"]), (1, 2));
        assert_eq!(range(&["long.tsv"]), (1, 4));
        assert_eq!(range(&["fileA.tsv", "long.tsv"]), (1, 4));
        assert_eq!(range(&["long.tsv", "fileA.tsv"]), (1, 4));
    }
}
