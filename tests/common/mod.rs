#![allow(dead_code)]

use polars::prelude::*;
use treetracer::{App, AppEvent, UploadedFile};

/// Trace file content: `rows_per_group` rows for every group, interleaved,
/// with `dims` embedding columns named `V1..Vn`.
pub fn trace_tsv(groups: &[&str], dims: usize, rows_per_group: usize) -> Vec<u8> {
    let mut trees = Vec::new();
    let mut group_values = Vec::new();
    let mut coords: Vec<Vec<f64>> = vec![Vec::new(); dims];
    for r in 0..rows_per_group {
        for (g, group) in groups.iter().enumerate() {
            trees.push(format!("({group}:{r},x:1);"));
            group_values.push(group.to_string());
            for (d, values) in coords.iter_mut().enumerate() {
                values.push(g as f64 * 10.0 + r as f64 + d as f64 * 0.5);
            }
        }
    }

    let mut columns = vec![
        Column::new("tree".into(), trees),
        Column::new("group".into(), group_values),
    ];
    for (d, values) in coords.into_iter().enumerate() {
        columns.push(Column::new(format!("V{}", d + 1).into(), values));
    }
    let mut df = DataFrame::new(columns).unwrap();

    let mut buf = Vec::new();
    CsvWriter::new(&mut buf)
        .with_separator(b'\t')
        .finish(&mut df)
        .unwrap();
    buf
}

pub fn trace_file(name: &str, groups: &[&str], dims: usize, rows_per_group: usize) -> UploadedFile {
    UploadedFile::from_bytes(name, trace_tsv(groups, dims, rows_per_group))
}

/// Send an event and every follow-up it produces.
pub fn dispatch(app: &mut App, event: AppEvent) {
    let mut next = Some(event);
    while let Some(event) = next {
        next = app.event(&event);
    }
}

pub fn upload(app: &mut App, files: Vec<UploadedFile>) {
    dispatch(app, AppEvent::Upload(files));
}
