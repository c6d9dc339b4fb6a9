//! Parsed representation of one uploaded trace file.

use color_eyre::Result;
use polars::prelude::*;

/// Column holding the group (chain/run) label of each tree.
pub const GROUP_COL: &str = "group";
/// Column holding the tree identifier shown on hover.
pub const TREE_COL: &str = "tree";
/// Derived categorical code of [`GROUP_COL`], in first-seen order.
pub const GROUP_CODE_COL: &str = "group_col";
/// Derived column holding the source filename.
pub const FILE_COL: &str = "file";
/// Derived per-group sequence number, starting at 1.
pub const TREE_NUMBER_COL: &str = "treenum";
/// Derived label used for grouping once files are merged.
pub const GROUP_LABEL_COL: &str = "group_label";

/// One ingested file: its frame plus the inventories derived at ingest.
///
/// The frame always carries [`GROUP_COL`] and [`TREE_COL`] as strings, every
/// dimension column as `Float64`, and the derived [`GROUP_CODE_COL`],
/// [`FILE_COL`] and [`TREE_NUMBER_COL`] columns.
#[derive(Debug, Clone)]
pub struct TraceRecord {
    pub filename: String,
    pub frame: DataFrame,
    /// Dimension columns, sorted ascending and duplicate-free.
    pub dimension_columns: Vec<String>,
    /// Distinct groups in first-seen order; the position is the group code.
    pub group_index: Vec<String>,
}

impl TraceRecord {
    pub fn num_rows(&self) -> usize {
        self.frame.height()
    }

    /// Categorical code of `group`, if the group occurs in this file.
    pub fn group_code(&self, group: &str) -> Option<u32> {
        self.group_index
            .iter()
            .position(|g| g == group)
            .map(|idx| idx as u32)
    }

    /// Group value of every row, in file order.
    pub fn groups(&self) -> Result<Vec<String>> {
        string_values(&self.frame, GROUP_COL)
    }

    /// Tree number of every row, in file order.
    pub fn tree_numbers(&self) -> Result<Vec<u32>> {
        let column = self.frame.column(TREE_NUMBER_COL)?;
        Ok(column.u32()?.into_iter().map(|v| v.unwrap_or(0)).collect())
    }

    /// Smallest and largest tree number, or `None` for an empty file.
    pub fn tree_number_range(&self) -> Result<Option<(u32, u32)>> {
        let numbers = self.tree_numbers()?;
        let min = numbers.iter().copied().min();
        let max = numbers.iter().copied().max();
        Ok(min.zip(max))
    }
}

/// Read a column as owned strings; nulls become empty strings.
pub(crate) fn string_values(frame: &DataFrame, name: &str) -> Result<Vec<String>> {
    let column = frame.column(name)?.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect())
}
