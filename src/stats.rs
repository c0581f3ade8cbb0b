//! Table inspection: head preview and descriptive statistics

use serde::Serialize;

use crate::table::{ColumnKind, Table, Value};

/// Default number of rows shown in the preview
pub const DEFAULT_PREVIEW_ROWS: usize = 5;

/// Descriptive statistics of one numeric column
///
/// Statistics that are undefined for the column (mean of no values, standard
/// deviation of a single value) are `None`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnStats {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    #[serde(rename = "25%")]
    pub q25: Option<f64>,
    #[serde(rename = "50%")]
    pub q50: Option<f64>,
    #[serde(rename = "75%")]
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ColumnKind,
}

/// Everything the inspection panel shows for a table
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Inspection {
    pub columns: Vec<ColumnInfo>,
    pub row_count: usize,
    pub preview: Vec<Vec<Value>>,
    pub stats: Vec<ColumnStats>,
}

/// Builds the preview and statistics for `table`
pub fn inspect(table: &Table, preview_rows: usize) -> Inspection {
    Inspection {
        columns: table
            .columns()
            .iter()
            .map(|c| ColumnInfo {
                name: c.name.clone(),
                kind: c.kind,
            })
            .collect(),
        row_count: table.row_count(),
        preview: head(table, preview_rows),
        stats: describe(table),
    }
}

/// First `n` rows, cells in column order with their original values
pub fn head(table: &Table, n: usize) -> Vec<Vec<Value>> {
    (0..n.min(table.row_count()))
        .filter_map(|i| table.row(i))
        .map(|row| row.into_iter().cloned().collect())
        .collect()
}

/// Statistics for every numeric column, in column order
///
/// Text columns are skipped, so a table without numeric columns yields an
/// empty list.
pub fn describe(table: &Table) -> Vec<ColumnStats> {
    table
        .columns()
        .iter()
        .filter(|c| c.is_numeric())
        .map(|c| {
            let mut values: Vec<f64> = c.numbers().collect();
            values.sort_by(f64::total_cmp);
            summarize(&c.name, &values)
        })
        .collect()
}

fn summarize(name: &str, sorted: &[f64]) -> ColumnStats {
    let count = sorted.len();
    let mean = (count > 0).then(|| sorted.iter().sum::<f64>() / count as f64);
    let std = match mean {
        Some(m) if count > 1 => {
            let var = sorted.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (count - 1) as f64;
            Some(var.sqrt())
        }
        _ => None,
    };

    ColumnStats {
        column: name.to_string(),
        count,
        mean,
        std,
        min: sorted.first().copied(),
        q25: percentile(sorted, 0.25),
        q50: percentile(sorted, 0.50),
        q75: percentile(sorted, 0.75),
        max: sorted.last().copied(),
    }
}

/// Linear interpolation between closest ranks, `sorted` ascending
fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = p * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}
